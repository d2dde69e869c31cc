use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::PostParams;
use kube::runtime::reflector::Store;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::error::Error;
use crate::model::key::FunctionKey;
use crate::model::spec::Function;

/// Read-only view over the watch caches, keyed by Function identity.
pub trait ObjectCache: Send + Sync {
    fn function(&self, key: &FunctionKey) -> Option<Arc<Function>>;
    fn bundle(&self, key: &FunctionKey) -> Option<Arc<ConfigMap>>;
    fn workload(&self, key: &FunctionKey) -> Option<Arc<Deployment>>;
}

/// Writes issued by the reconciler. Every call may fail with a not-found or conflict
/// condition, both handled by retrying the whole reconciliation.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn create_bundle(&self, bundle: &ConfigMap) -> Result<ConfigMap, Error>;
    async fn update_bundle(&self, bundle: &ConfigMap) -> Result<ConfigMap, Error>;
    async fn create_workload(&self, workload: &Deployment) -> Result<Deployment, Error>;
    async fn update_workload(&self, workload: &Deployment) -> Result<Deployment, Error>;
    async fn update_status(&self, function: &Function) -> Result<Function, Error>;
}

#[derive(Clone)]
pub struct KubeStores {
    pub functions: Store<Function>,
    pub bundles: Store<ConfigMap>,
    pub workloads: Store<Deployment>,
}

impl ObjectCache for KubeStores {
    fn function(&self, key: &FunctionKey) -> Option<Arc<Function>> {
        self.functions.get(&key.object_ref())
    }

    fn bundle(&self, key: &FunctionKey) -> Option<Arc<ConfigMap>> {
        self.bundles.get(&key.object_ref())
    }

    fn workload(&self, key: &FunctionKey) -> Option<Arc<Deployment>> {
        self.workloads.get(&key.object_ref())
    }
}

pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, obj: &K) -> Result<Api<K>, Error>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        let namespace = obj.namespace()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        Ok(Api::namespaced(self.client.clone(), &namespace))
    }

    async fn create<K>(&self, obj: &K) -> Result<K, Error>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + std::fmt::Debug,
        K::DynamicType: Default,
    {
        Ok(self.api(obj)?.create(&PostParams::default(), obj).await?)
    }

    async fn replace<K>(&self, obj: &K) -> Result<K, Error>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + std::fmt::Debug,
        K::DynamicType: Default,
    {
        let name = obj.meta().name.clone()
            .ok_or(Error::MissingObjectKey(".metadata.name"))?;
        Ok(self.api(obj)?.replace(&name, &PostParams::default(), obj).await?)
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn create_bundle(&self, bundle: &ConfigMap) -> Result<ConfigMap, Error> {
        self.create(bundle).await
    }

    async fn update_bundle(&self, bundle: &ConfigMap) -> Result<ConfigMap, Error> {
        self.replace(bundle).await
    }

    async fn create_workload(&self, workload: &Deployment) -> Result<Deployment, Error> {
        self.create(workload).await
    }

    async fn update_workload(&self, workload: &Deployment) -> Result<Deployment, Error> {
        self.replace(workload).await
    }

    async fn update_status(&self, function: &Function) -> Result<Function, Error> {
        let name = function.name_any();
        let body = serde_json::to_vec(function)?;
        Ok(self.api(function)?.replace_status(&name, &PostParams::default(), body).await?)
    }
}
