use csv_api::ApiSurface;

/// A directive `transition` hands back to the caller instead of performing
/// I/O itself, keeping L6 free of blocking calls per spec.md §5.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    /// Write the union/difference surface to the OperatorGroup's
    /// `olm.providedAPIs` annotation.
    UpdateOperatorGroupProvidedApis {
        group_namespace: String,
        group_name: String,
        provided_apis: ApiSurface,
    },
    /// Tear down this CSV's generated Deployments after an
    /// `InterOperatorGroupOwnerConflict` failure.
    TearDownDeployments,
    /// Re-enqueue this CSV onto the `csv` queue.
    RequeueSelf,
    /// Re-enqueue a named sibling CSV (same namespace) onto the `csv` queue.
    RequeueNamed(String),
    /// Issue `ObjectStore.Delete(self, gracePeriod=0)`.
    DeleteSelf,
    /// Request a fresh certificate from the `CertProvider`.
    IssueCertRotation,
    /// Ensure cluster roles/bindings exist granting view access to this
    /// CSV's provided APIs, re-asserted on every steady-state `Succeeded` tick.
    EnsureClusterRoles(ApiSurface),
}
