use std::future::{ready, Future};
use std::sync::Arc;

use anyhow::bail;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::controller::{self, Controller};
use kube::runtime::reflector::Store;
use kube::runtime::watcher;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::core::config::OperatorConfig;
use crate::model::context::ContextData;
use crate::model::event::Notification;
use crate::model::spec::Function;
use crate::policy::error::{error_policy, settle_outcome, RateLimiter};
use crate::policy::reconciliation::{reconcile, FunctionReconciler};
use crate::service::cluster_svc::{ClusterApi, KubeClusterApi, KubeStores};
use crate::service::informer_svc::Informer;
use crate::service::router_svc::EventRouter;

/// Watch caches of the three kinds, with the notifications of the changes applied to them.
pub struct Watches {
    pub stores: KubeStores,
    pub functions: BoxStream<'static, Notification<Function>>,
    pub bundles: BoxStream<'static, Notification<ConfigMap>>,
    pub workloads: BoxStream<'static, Notification<Deployment>>,
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

fn spawn_informer<K>(api: Api<K>) -> (Store<K>, BoxStream<'static, Notification<K>>, JoinHandle<()>)
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static,
{
    let informer = Informer::new(api, watcher::Config::default());
    let store = informer.store();
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(informer.run(move |notification| {
        if tx.send(notification).is_err() {
            log::debug!("Notification channel closed");
        }
    }));
    (store, UnboundedReceiverStream::new(rx).boxed(), handle)
}

/// Watches the cluster and runs the control loop until `shutdown` resolves.
pub async fn run_controller<S, R>(client: Client, cfg: &OperatorConfig, shutdown: S, on_synced: R) -> anyhow::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
    R: FnOnce() + Send,
{
    let namespace = cfg.namespace.as_deref();
    let (functions, function_events, functions_task) = spawn_informer(scoped_api::<Function>(&client, namespace));
    let (bundles, bundle_events, bundles_task) = spawn_informer(scoped_api::<ConfigMap>(&client, namespace));
    let (workloads, workload_events, workloads_task) = spawn_informer(scoped_api::<Deployment>(&client, namespace));

    let watches = Watches {
        stores: KubeStores { functions, bundles, workloads },
        functions: function_events,
        bundles: bundle_events,
        workloads: workload_events,
    };
    let res = run_control_loop(watches, KubeClusterApi::new(client), cfg, shutdown, on_synced).await;

    for task in [functions_task, bundles_task, workloads_task] {
        task.abort();
    }
    res
}

/// Runs the control loop over the given watches until `shutdown` resolves.
///
/// Workers start only once the Function, ConfigMap and Deployment caches have all completed
/// their initial listing; notifications received earlier are routed afterwards. On shutdown
/// no new key is handed out and in-flight reconciliations run to completion.
pub async fn run_control_loop<A, S, R>(watches: Watches, api: A, cfg: &OperatorConfig, shutdown: S, on_synced: R) -> anyhow::Result<()>
where
    A: ClusterApi + 'static,
    S: Future<Output = ()> + Send + 'static,
    R: FnOnce() + Send,
{
    let shutdown = shutdown.shared();
    let Watches { stores, functions, bundles, workloads } = watches;

    let router = Arc::new(EventRouter::new(stores.clone()));
    let triggers = futures::stream::select_all([
        functions.map({
            let router = router.clone();
            move |n| router.route_function(n)
        }).boxed(),
        bundles.map({
            let router = router.clone();
            move |n| router.route_owned(n)
        }).boxed(),
        workloads.map(move |n| router.route_owned(n)).boxed(),
    ]).filter_map(|key| ready(key.map(|key| key.object_ref::<Function>())));

    log::info!("Waiting for caches to sync");
    let synced = async {
        tokio::try_join!(
            stores.functions.wait_until_ready(),
            stores.bundles.wait_until_ready(),
            stores.workloads.wait_until_ready(),
        )
    };
    tokio::select! {
        res = synced => if res.is_err() {
            bail!("Watch terminated before the caches synced");
        },
        _ = shutdown.clone() => {
            log::info!("Shutdown requested before the caches synced");
            return Ok(());
        }
    }
    on_synced();
    log::info!("Caches synced, starting {} workers", cfg.workers);

    let context = Arc::new(ContextData {
        reconciler: FunctionReconciler::new(stores.clone(), api, cfg.default_overlay()),
        rate_limiter: RateLimiter::new(cfg.backoff.base_delay(), cfg.backoff.max_delay()),
        resync_period: cfg.resync_period(),
    });
    let outcomes = context.clone();

    Controller::for_stream(futures::stream::pending::<Result<Function, watcher::Error>>(), stores.functions)
        .with_config(controller::Config::default().concurrency(cfg.workers))
        .reconcile_on(triggers)
        .graceful_shutdown_on(shutdown)
        .run(reconcile::<KubeStores, A>, error_policy::<KubeStores, A>, context)
        .for_each(|outcome| {
            settle_outcome(&outcome, &outcomes.rate_limiter);
            ready(())
        })
        .await;

    log::info!("Controller stopped");
    Ok(())
}
