use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::error::ErrorResponse;
use kube::Resource;
use tokio::sync::Semaphore;

use kfn_operator::core::error::Error;
use kfn_operator::model::key::FunctionKey;
use kfn_operator::model::spec::{Function, FunctionStatus};
use kfn_operator::service::cluster_svc::{ClusterApi, ObjectCache};

#[derive(Debug, Clone)]
pub enum Write {
    CreateBundle(ConfigMap),
    UpdateBundle(ConfigMap),
    CreateWorkload(Deployment),
    UpdateWorkload(Deployment),
    UpdateStatus(FunctionStatus),
}

#[derive(Default)]
struct State {
    functions: HashMap<FunctionKey, Arc<Function>>,
    bundles: HashMap<FunctionKey, Arc<ConfigMap>>,
    workloads: HashMap<FunctionKey, Arc<Deployment>>,
    writes: Vec<Write>,
    rejection: Option<u16>,
    revision: u64,
    gate: Option<Arc<Semaphore>>,
    waiting: usize,
}

impl State {
    fn next_revision(&mut self) -> Option<String> {
        self.revision += 1;
        Some(self.revision.to_string())
    }

    fn check_rejection(&mut self) -> Result<(), Error> {
        match self.rejection.take() {
            Some(code) => Err(Error::from(kube::Error::Api(ErrorResponse {
                status: String::from("Failure"),
                message: String::from("rejected by fake cluster"),
                reason: String::from("Rejected"),
                code,
            }))),
            None => Ok(()),
        }
    }
}

fn key_of<K: Resource>(obj: &K) -> FunctionKey {
    FunctionKey::from_resource(obj).expect("Object without key")
}

/// In-memory cluster: every accepted write is recorded and immediately visible through the cache.
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<State>>,
}

impl FakeCluster {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("Poisoned fake cluster")
    }

    pub fn apply_function(&self, mut function: Function) {
        let mut state = self.lock();
        function.metadata.resource_version = state.next_revision();
        state.functions.insert(key_of(&function), Arc::new(function));
    }

    /// Edits the spec of a stored Function, bumping its generation.
    pub fn edit_function<F: FnOnce(&mut Function)>(&self, key: &FunctionKey, edit: F) {
        let mut function = self.function(key).expect("Function not found").as_ref().clone();
        edit(&mut function);
        function.metadata.generation = Some(function.metadata.generation.unwrap_or_default() + 1);
        self.apply_function(function);
    }

    pub fn edit_workload<F: FnOnce(&mut Deployment)>(&self, key: &FunctionKey, edit: F) {
        let mut state = self.lock();
        let mut workload = state.workloads.get(key).expect("Workload not found").as_ref().clone();
        edit(&mut workload);
        workload.metadata.resource_version = state.next_revision();
        state.workloads.insert(key.clone(), Arc::new(workload));
    }

    pub fn reject_next_write(&self, code: u16) {
        self.lock().rejection = Some(code);
    }

    /// Holds every following write until the returned semaphore is given permits.
    pub fn gate_writes(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.lock().gate = Some(gate.clone());
        gate
    }

    /// Writes currently held by the gate.
    pub fn waiting_writes(&self) -> usize {
        self.lock().waiting
    }

    pub fn writes(&self) -> Vec<Write> {
        self.lock().writes.clone()
    }

    async fn pass_gate(&self) {
        let gate = self.lock().gate.clone();
        if let Some(gate) = gate {
            self.lock().waiting += 1;
            gate.acquire().await.expect("Gate closed").forget();
            self.lock().waiting -= 1;
        }
    }

    /// Writes recorded so far; the log is cleared.
    pub fn take_writes(&self) -> Vec<Write> {
        std::mem::take(&mut self.lock().writes)
    }

    fn store<K: Resource + Clone>(
        &self,
        obj: &K,
        select: fn(&mut State) -> &mut HashMap<FunctionKey, Arc<K>>,
        record: fn(K) -> Write,
    ) -> Result<K, Error> {
        let mut state = self.lock();
        state.check_rejection()?;
        let mut stored = obj.clone();
        stored.meta_mut().resource_version = state.next_revision();
        state.writes.push(record(obj.clone()));
        select(&mut state).insert(key_of(obj), Arc::new(stored.clone()));
        Ok(stored)
    }
}

impl ObjectCache for FakeCluster {
    fn function(&self, key: &FunctionKey) -> Option<Arc<Function>> {
        self.lock().functions.get(key).cloned()
    }

    fn bundle(&self, key: &FunctionKey) -> Option<Arc<ConfigMap>> {
        self.lock().bundles.get(key).cloned()
    }

    fn workload(&self, key: &FunctionKey) -> Option<Arc<Deployment>> {
        self.lock().workloads.get(key).cloned()
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn create_bundle(&self, bundle: &ConfigMap) -> Result<ConfigMap, Error> {
        self.pass_gate().await;
        self.store(bundle, |state| &mut state.bundles, Write::CreateBundle)
    }

    async fn update_bundle(&self, bundle: &ConfigMap) -> Result<ConfigMap, Error> {
        self.pass_gate().await;
        self.store(bundle, |state| &mut state.bundles, Write::UpdateBundle)
    }

    async fn create_workload(&self, workload: &Deployment) -> Result<Deployment, Error> {
        self.pass_gate().await;
        self.store(workload, |state| &mut state.workloads, Write::CreateWorkload)
    }

    async fn update_workload(&self, workload: &Deployment) -> Result<Deployment, Error> {
        self.pass_gate().await;
        self.store(workload, |state| &mut state.workloads, Write::UpdateWorkload)
    }

    async fn update_status(&self, function: &Function) -> Result<Function, Error> {
        self.pass_gate().await;
        self.store(function, |state| &mut state.functions, |f| Write::UpdateStatus(f.status.unwrap_or_default()))
    }
}
