use thiserror::Error;

/// The error taxonomy from spec.md §7: kinds, not class names. The queue
/// wrapper (`csv-queue::scheduler`) matches on the variant to decide
/// drop / rate-limit / record-and-rate-limit.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Bad spec: invalid install modes, invalid webhook, invalid strategy.
    /// Recovery is a user edit; the Failed branch rechecks every sync.
    #[error("permanent CSV fault: {0}")]
    PermanentCsvFault(String),

    /// Another CSV or OperatorGroup owns what we need. Recovery is
    /// automatic once the conflict goes away.
    #[error("configuration conflict: {0}")]
    ConfigConflict(String),

    /// Transient until dependencies appear.
    #[error("requirements not met")]
    RequirementsNotMet,

    /// Orchestration API RPC unavailable or optimistic-concurrency
    /// conflict; the queue rate-limiter handles retry.
    #[error("transient platform error: {0}")]
    TransientPlatformError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The `Installer` said stop; no automatic retry until a cluster
    /// resource change clears `status.reason`.
    #[error("unrecoverable install failure: {0}")]
    UnrecoverableInstall(String),

    /// A handler's type assertion on a watched object failed: the event
    /// itself is invalid, there is nothing to retry.
    #[error("programmer precondition violated: {0}")]
    ProgrammerPrecondition(String),

    /// The object store rejected the write (not-found, conflict, etc.)
    /// after a sync otherwise succeeded; upgraded to a retryable error
    /// per spec.md §7's "status updates are best-effort" rule.
    #[error("object store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SyncError {
    /// Whether the queue should retry this item at all. `PermanentCsvFault`
    /// and `ProgrammerPrecondition` are not retried on their own — the
    /// Failed-branch recheck or a new watch event is what drives a retry,
    /// not the rate limiter.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SyncError::PermanentCsvFault(_) | SyncError::ProgrammerPrecondition(_)
        )
    }

    /// Whether this error should also be recorded as an event, versus
    /// silently rate-limited.
    #[must_use]
    pub fn should_record(&self) -> bool {
        !matches!(self, SyncError::ProgrammerPrecondition(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
