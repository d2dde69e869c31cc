use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::controller::Action;

use crate::core::error::Error;
use crate::model::context::ContextData;
use crate::model::function_config::{DefaultOverlay, FunctionConfig};
use crate::model::key::FunctionKey;
use crate::model::spec::{Function, FunctionStatus};
use crate::policy::bundle::{build_config_bundle, merge_bundle};
use crate::policy::digest::config_digest;
use crate::policy::derivation::derive_config;
use crate::policy::workload::{available_replicas, build_workload, is_satisfied_by, merge_workload};
use crate::service::cluster_svc::{ClusterApi, ObjectCache};

const OBJECT_WRITES_METRIC_NAME: &str = "kfn_object_writes_total";

/// Drives the bundle and the workload of a Function towards the state its spec implies.
///
/// Steps run strictly in sequence: the bundle is written before the workload is built so
/// that the workload digest annotation always refers to the bundle that is actually stored.
pub struct FunctionReconciler<C, A> {
    cache: C,
    api: A,
    defaults: Arc<DefaultOverlay>,
}

impl<C: ObjectCache, A: ClusterApi> FunctionReconciler<C, A> {
    pub fn new(cache: C, api: A, defaults: DefaultOverlay) -> Self {
        Self {
            cache,
            api,
            defaults: Arc::new(defaults),
        }
    }

    pub async fn reconcile(&self, key: &FunctionKey) -> Result<(), Error> {
        let Some(function) = self.cache.function(key) else {
            log::debug!("Function {key} not found, nothing to reconcile");
            return Ok(());
        };
        metrics::counter!("kfn_reconciliations_total").increment(1);

        let config = derive_config(&self.defaults, &function);
        let bundle = self.sync_bundle(key, &function, &config).await?;
        let workload = self.sync_workload(key, &function, &bundle).await?;
        self.sync_status(key, &function, &workload).await
    }

    async fn sync_bundle(&self, key: &FunctionKey, function: &Function, config: &FunctionConfig) -> Result<ConfigMap, Error> {
        let desired = build_config_bundle(function, config)?;
        match self.cache.bundle(key) {
            None => {
                log::info!("Creating config bundle for {key}");
                let created = self.api.create_bundle(&desired).await?;
                record_write("ConfigMap", "create");
                Ok(created)
            }
            Some(observed) if config_digest(&observed) == config_digest(&desired) => {
                Ok(observed.as_ref().clone())
            }
            Some(observed) => {
                log::info!("Updating config bundle for {key}");
                let updated = self.api.update_bundle(&merge_bundle(&observed, &desired)).await?;
                record_write("ConfigMap", "update");
                Ok(updated)
            }
        }
    }

    async fn sync_workload(&self, key: &FunctionKey, function: &Function, bundle: &ConfigMap) -> Result<Option<Arc<Deployment>>, Error> {
        let desired = build_workload(function, bundle)?;
        match self.cache.workload(key) {
            None => {
                log::info!("Creating workload for {key}");
                self.api.create_workload(&desired).await?;
                record_write("Deployment", "create");
                Ok(None)
            }
            Some(observed) if is_satisfied_by(&desired, &observed) => Ok(Some(observed)),
            Some(observed) => {
                log::info!("Updating workload for {key}");
                self.api.update_workload(&merge_workload(&observed, &desired)).await?;
                record_write("Deployment", "update");
                Ok(Some(observed))
            }
        }
    }

    /// Status mirrors the observed workload; a freshly created workload has no available replicas yet.
    async fn sync_status(&self, key: &FunctionKey, function: &Function, workload: &Option<Arc<Deployment>>) -> Result<(), Error> {
        let status = FunctionStatus {
            observed_generation: function.metadata.generation.unwrap_or_default(),
            available_replicas: workload.as_deref().map(available_replicas).unwrap_or_default(),
        };
        if function.status.clone().unwrap_or_default() == status {
            return Ok(());
        }

        log::debug!("Updating status of {key}: {status:?}");
        let mut updated = function.clone();
        updated.status = Some(status);
        self.api.update_status(&updated).await?;
        record_write("Function", "update-status");
        Ok(())
    }
}

fn record_write(kind: &'static str, op: &'static str) {
    metrics::counter!(OBJECT_WRITES_METRIC_NAME, "kind" => kind, "op" => op).increment(1);
}

/// Entry point invoked by the controller for every Function key it dequeues.
pub async fn reconcile<C, A>(function: Arc<Function>, ctx: Arc<ContextData<C, A>>) -> Result<Action, Error>
where
    C: ObjectCache,
    A: ClusterApi,
{
    let key = FunctionKey::from_resource(function.as_ref())?;
    ctx.reconciler.reconcile(&key).await?;
    ctx.rate_limiter.forget(&key);
    Ok(Action::requeue(ctx.resync_period))
}
