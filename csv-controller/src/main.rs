//! The CSV lifecycle controller binary: bootstraps the `ClusterServiceVersion`/
//! `OperatorGroup` CRDs, wires the five L10 work queues to watch streams via
//! L11's fan-out, and runs one worker loop per queue calling into `csv-core`.

mod cert_provider;
mod config;
mod events;
mod installer;
mod kube_store;
mod metrics;
mod rbac_ensurer;
mod reconcile;
mod watchers;
mod workers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use csv_api::consts::FIELD_MANAGER;
use csv_api::csv::ClusterServiceVersion;
use csv_api::operatorgroup::OperatorGroup;
use csv_api::store::ObjectStore;
use csv_queue::{Backoff, KeyQueue, Queues};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::runtime::wait::{await_condition, conditions};
use kube::{Api, Client, CustomResourceExt};
use tokio::signal;
use tracing::{debug, info, warn};

use cert_provider::SelfSignedCertProvider;
use config::Config;
use events::TracingEventRecorder;
use installer::DeploymentInstaller;
use kube_store::KubeObjectStore;
use metrics::Metrics;
use rbac_ensurer::KubeRbacEnsurer;
use reconcile::ReconcileContext;

/// How long to wait for a freshly-applied CRD to reach `Established`.
const CRD_ESTABLISH_TIMEOUT: Duration = Duration::from_secs(20);
/// Number of concurrent workers draining the primary `csv` queue; the
/// other four queues get one worker each, matching their lower share of
/// total reconcile volume (spec.md §2's per-component budget).
const CSV_WORKER_COUNT: usize = 4;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let config = Config::parse();
    Controller::new(config).run().await
}

/// Owns the process lifetime: CRD bootstrap, collaborator wiring, the
/// watch/fan-out tasks, and one worker loop per queue.
struct Controller {
    config: Config,
}

impl Controller {
    fn new(config: Config) -> Self {
        Self { config }
    }

    async fn run(self) -> Result<()> {
        let client = Client::try_default().await?;
        self.prepare_crds(&client).await?;

        let store: Arc<dyn ObjectStore> = Arc::new(KubeObjectStore::new(client.clone()));
        let installer = Arc::new(DeploymentInstaller::new(client.clone(), self.config.namespace.clone()));
        let cert_provider = Arc::new(SelfSignedCertProvider);
        let rbac = Arc::new(KubeRbacEnsurer::new(client.clone()));
        let queues = Arc::new(Queues::new(self.config.backoff_base(), self.config.backoff_ceiling()));
        let metrics = Arc::new(Metrics::new());

        let ctx = Arc::new(ReconcileContext {
            client: client.clone(),
            store: Arc::clone(&store),
            installer,
            cert_provider,
            rbac,
            queues: Arc::clone(&queues),
            config: self.config.transition_config(),
            events: Arc::new(TracingEventRecorder),
        });

        let mut handles = Vec::new();

        handles.push(tokio::spawn(Self::web_server(
            self.config.listen_addr.parse()?,
            Arc::clone(&queues),
            Arc::clone(&metrics),
        )));

        handles.extend(self.spawn_watchers(client.clone(), Arc::clone(&queues), Arc::clone(&store)));

        for _ in 0..CSV_WORKER_COUNT {
            handles.push(tokio::spawn(Self::csv_worker(Arc::clone(&ctx), Arc::clone(&metrics))));
        }
        handles.push(tokio::spawn(Self::csv_copy_worker(Arc::clone(&ctx))));
        handles.push(tokio::spawn(Self::csv_gc_worker(Arc::clone(&ctx))));
        handles.push(tokio::spawn(Self::og_worker(Arc::clone(&ctx))));
        handles.push(tokio::spawn(Self::obj_gc_worker(Arc::clone(&ctx))));

        signal::ctrl_c().await?;
        info!("shutdown signal received, draining in-flight syncs");
        for handle in handles {
            handle.abort();
        }
        Ok(())
    }

    fn spawn_watchers(
        &self,
        client: Client,
        queues: Arc<Queues>,
        store: Arc<dyn ObjectStore>,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let cluster_wide = self.config.cluster_wide;
        let namespace = self.config.namespace.clone();
        vec![
            tokio::spawn(watchers::watch_csv(client.clone(), Arc::clone(&queues), cluster_wide, namespace.clone())),
            tokio::spawn(watchers::watch_operator_group(client.clone(), Arc::clone(&queues), cluster_wide, namespace)),
            tokio::spawn(watchers::watch_namespace(client.clone(), Arc::clone(&queues), Arc::clone(&store))),
            tokio::spawn(watchers::watch_crd(client.clone(), Arc::clone(&queues))),
            tokio::spawn(watchers::watch_cluster_scoped_owned(client, queues, store)),
        ]
    }

    /// Creates the `ClusterServiceVersion` and `OperatorGroup` CRDs if
    /// missing, and waits for each to reach `Established`.
    async fn prepare_crds(&self, client: &Client) -> Result<()> {
        self.apply_crd(client, ClusterServiceVersion::crd()).await?;
        self.apply_crd(client, OperatorGroup::crd()).await?;
        Ok(())
    }

    /// Mirrors the teacher's `Operator::prepare_crd`: create the CRD if it
    /// does not exist yet, patch it in place only when `--create-crd` opts
    /// into overwriting whatever version is already on the cluster, then
    /// wait for `Established` via `await_condition`.
    async fn apply_crd(&self, client: &Client, definition: CustomResourceDefinition) -> Result<()> {
        let api: Api<CustomResourceDefinition> = Api::all(client.clone());
        let name = definition.metadata.name.clone().unwrap_or_default();
        match api.get_opt(&name).await? {
            None => {
                debug!(crd = %name, "crd not found, creating it");
                let _crd = api.create(&kube::api::PostParams::default(), &definition).await?;
            }
            Some(_) if self.config.create_crd => {
                debug!(crd = %name, "create_crd set, patching crd in place");
                let _crd = api.patch(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(&definition)).await?;
            }
            Some(_) => {
                debug!(crd = %name, "crd already present, leaving as-is");
            }
        }
        let establish = await_condition(api, &name, conditions::is_crd_established());
        tokio::time::timeout(CRD_ESTABLISH_TIMEOUT, establish).await??;
        debug!(crd = %name, "crd established");
        Ok(())
    }

    async fn web_server(addr: std::net::SocketAddr, queues: Arc<Queues>, metrics: Arc<Metrics>) -> Result<()> {
        let app = Router::new()
            .route("/healthz", get(|| async { "ok" }))
            .route(
                "/metrics",
                get(|State((queues, metrics)): State<(Arc<Queues>, Arc<Metrics>)>| async move {
                    metrics.render(&queues)
                }),
            )
            .with_state((queues, metrics));
        axum::Server::bind(&addr)
            .serve(app.into_make_service())
            .with_graceful_shutdown(async {
                let _ = signal::ctrl_c().await;
            })
            .await?;
        Ok(())
    }

    /// Drains the `csv` queue: `sync_csv` already records a transition for
    /// metrics and applies the retry decision via the queue's own backoff.
    async fn csv_worker(ctx: Arc<ReconcileContext>, metrics: Arc<Metrics>) {
        loop {
            let key = ctx.queues.csv.get().await;
            let result = reconcile::sync_csv(&ctx, &key).await;
            if let Ok(Some(csv)) = ctx.store.get_csv(&key.namespace, &key.name).await {
                if let Some(status) = &csv.status {
                    metrics.record_transition(status.phase, status.reason);
                }
            }
            Self::finish(
                Arc::clone(&ctx.queues),
                key,
                result.err(),
                |q| &q.csv,
                Queues::csv_backoff,
                |e| e.is_retryable(),
            );
        }
    }

    async fn csv_copy_worker(ctx: Arc<ReconcileContext>) {
        loop {
            let key = ctx.queues.csv_copy.get().await;
            let result = workers::sync_csv_copy(&ctx, &key).await;
            Self::finish_anyhow(Arc::clone(&ctx.queues), key, result.err(), |q| &q.csv_copy, Queues::csv_copy_backoff);
        }
    }

    async fn csv_gc_worker(ctx: Arc<ReconcileContext>) {
        loop {
            let key = ctx.queues.csv_gc.get().await;
            let result = workers::sync_csv_gc(&ctx, &key).await;
            Self::finish_anyhow(Arc::clone(&ctx.queues), key, result.err(), |q| &q.csv_gc, Queues::csv_gc_backoff);
        }
    }

    async fn og_worker(ctx: Arc<ReconcileContext>) {
        loop {
            let key = ctx.queues.og.get().await;
            let result = workers::sync_operator_group(&ctx, &key).await;
            Self::finish_anyhow(Arc::clone(&ctx.queues), key, result.err(), |q| &q.og, Queues::og_backoff);
        }
    }

    async fn obj_gc_worker(ctx: Arc<ReconcileContext>) {
        loop {
            let key = ctx.queues.obj_gc.get().await;
            let result = Self::sync_obj_gc_key(&ctx, &key).await;
            Self::finish_anyhow(Arc::clone(&ctx.queues), key, result.err(), |q| &q.obj_gc, Queues::obj_gc_backoff);
        }
    }

    /// `obj-gc` keys are `"kind/name"`; the owner namespace/name aren't part
    /// of the key, so a requeue simply re-attempts the delete, which is
    /// idempotent — `watch_cluster_scoped_owned` already resolved ownership
    /// before the key was first enqueued.
    async fn sync_obj_gc_key(ctx: &ReconcileContext, key: &str) -> anyhow::Result<()> {
        let Some((kind, name)) = key.split_once('/') else {
            anyhow::bail!("malformed obj-gc key: {key}");
        };
        ctx.store.delete_cluster_scoped(kind, name).await
    }

    /// Releases `key` back to `queue`, consulting `is_retryable` to decide
    /// between a backoff-delayed requeue and dropping the error, the same
    /// split `csv_queue::decide_retry` encodes for `SyncError`.
    fn finish<K, E>(
        queues: Arc<Queues>,
        key: K,
        error: Option<E>,
        queue: fn(&Queues) -> &KeyQueue<K>,
        backoff: fn(&Queues) -> &Backoff<K>,
        is_retryable: fn(&E) -> bool,
    ) where
        K: Eq + std::hash::Hash + Clone + Send + 'static,
        E: std::fmt::Display,
    {
        match error {
            None => csv_queue::record_success(&key, backoff(&queues)),
            Some(err) => {
                warn!(error = %err, "sync returned an error");
                if is_retryable(&err) {
                    let delay = backoff(&queues).next_delay(&key);
                    Self::requeue_after(Arc::clone(&queues), key.clone(), delay, queue);
                }
            }
        }
        queue(&queues).done(&key);
    }

    fn finish_anyhow<K>(
        queues: Arc<Queues>,
        key: K,
        error: Option<anyhow::Error>,
        queue: fn(&Queues) -> &KeyQueue<K>,
        backoff: fn(&Queues) -> &Backoff<K>,
    ) where
        K: Eq + std::hash::Hash + Clone + Send + 'static,
    {
        Self::finish(queues, key, error, queue, backoff, |_| true);
    }

    fn requeue_after<K>(queues: Arc<Queues>, key: K, delay: Duration, queue: fn(&Queues) -> &KeyQueue<K>)
    where
        K: Eq + std::hash::Hash + Clone + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue(&queues).add(key);
        });
    }
}
