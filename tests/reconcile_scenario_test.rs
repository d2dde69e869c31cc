mod fake;

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::{ConfigMap, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use kfn_operator::core::error::Error;
use kfn_operator::model::key::FunctionKey;
use kfn_operator::policy::bundle::PROPERTIES_KEY;
use kfn_operator::policy::digest::config_digest;
use kfn_operator::policy::reconciliation::FunctionReconciler;
use kfn_operator::policy::workload::{config_hash, image, replicas};
use kfn_operator::service::cluster_svc::ObjectCache;

use crate::fake::cluster::{FakeCluster, Write};
use crate::fake::resources::{function, overlay};

fn reconciler(cluster: &FakeCluster) -> FunctionReconciler<FakeCluster, FakeCluster> {
    FunctionReconciler::new(cluster.clone(), cluster.clone(), overlay("kafka:9092"))
}

fn properties(bundle: &ConfigMap) -> &str {
    bundle.data.as_ref()
        .and_then(|data| data.get(PROPERTIES_KEY))
        .map(String::as_str)
        .unwrap_or_default()
}

fn workload_updates(writes: &[Write]) -> Vec<&Deployment> {
    writes.iter()
        .filter_map(|write| match write {
            Write::UpdateWorkload(workload) => Some(workload),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn copy_function_converges() {
    let cluster = FakeCluster::default();
    let key = FunctionKey::new("streams", "copy-fn");
    cluster.apply_function(function("streams", "copy-fn", "img:1", 2));
    let reconciler = reconciler(&cluster);

    reconciler.reconcile(&key).await.expect("Error on first reconciliation");
    let writes = cluster.take_writes();

    let [Write::CreateBundle(bundle), Write::CreateWorkload(workload), Write::UpdateStatus(status)] = writes.as_slice() else {
        panic!("Unexpected writes {writes:?}");
    };
    for line in ["consumer.bootstrap.servers=kafka:9092", "consumer.group.id=copy-fn", "function.name=copy-fn", "function.class=Copy"] {
        assert!(properties(bundle).lines().any(|l| l == line), "missing '{line}' in {}", properties(bundle));
    }
    assert_eq!(replicas(workload), Some(2));
    assert_eq!(image(workload), Some("img:1"));
    assert_eq!(config_hash(workload), Some(config_digest(bundle).as_str()));
    assert_eq!(status.observed_generation, 1);
    assert_eq!(status.available_replicas, 0);

    reconciler.reconcile(&key).await.expect("Error on second reconciliation");
    assert!(cluster.take_writes().is_empty());

    cluster.edit_function(&key, |f| f.spec.replicas = 3);
    reconciler.reconcile(&key).await.expect("Error after scaling");
    let writes = cluster.take_writes();

    let updates = workload_updates(&writes);
    assert_eq!(updates.len(), 1);
    assert_eq!(replicas(updates[0]), Some(3));
    assert_eq!(config_hash(updates[0]), config_hash(workload));
    assert!(!writes.iter().any(|w| matches!(w, Write::CreateBundle(_) | Write::UpdateBundle(_))));
}

#[tokio::test]
async fn override_change_rolls_the_workload() {
    let cluster = FakeCluster::default();
    let key = FunctionKey::new("streams", "copy-fn");
    cluster.apply_function(function("streams", "copy-fn", "img:1", 1));
    let reconciler = reconciler(&cluster);
    reconciler.reconcile(&key).await.expect("Error on first reconciliation");
    let initial_hash = cluster.workload(&key).and_then(|w| config_hash(&w).map(String::from));
    cluster.take_writes();

    cluster.edit_function(&key, |f| {
        f.spec.consumer_config = Some(BTreeMap::from([(String::from("max.poll.records"), String::from("10"))]));
    });
    reconciler.reconcile(&key).await.expect("Error after override change");
    let writes = cluster.take_writes();

    let bundle = writes.iter()
        .find_map(|w| match w {
            Write::UpdateBundle(bundle) => Some(bundle),
            _ => None,
        })
        .expect("Bundle not updated");
    assert!(properties(bundle).contains("consumer.max.poll.records=10\n"));

    let updates = workload_updates(&writes);
    assert_eq!(updates.len(), 1);
    assert_eq!(replicas(updates[0]), Some(1));
    assert_eq!(config_hash(updates[0]), Some(config_digest(bundle).as_str()));
    assert_ne!(config_hash(updates[0]).map(String::from), initial_hash);
}

#[tokio::test]
async fn status_mirrors_available_replicas() {
    let cluster = FakeCluster::default();
    let key = FunctionKey::new("streams", "copy-fn");
    cluster.apply_function(function("streams", "copy-fn", "img:1", 2));
    let reconciler = reconciler(&cluster);
    reconciler.reconcile(&key).await.expect("Error on first reconciliation");
    cluster.take_writes();

    cluster.edit_workload(&key, |w| {
        w.status = Some(DeploymentStatus {
            available_replicas: Some(2),
            ..DeploymentStatus::default()
        });
    });
    reconciler.reconcile(&key).await.expect("Error mirroring availability");

    let writes = cluster.take_writes();
    assert!(matches!(writes.as_slice(), [Write::UpdateStatus(status)] if status.available_replicas == 2 && status.observed_generation == 1));

    reconciler.reconcile(&key).await.expect("Error on steady state");
    assert!(cluster.take_writes().is_empty());
}

#[tokio::test]
async fn hand_edits_to_unmanaged_fields_survive() {
    let cluster = FakeCluster::default();
    let key = FunctionKey::new("streams", "copy-fn");
    cluster.apply_function(function("streams", "copy-fn", "img:1", 1));
    let reconciler = reconciler(&cluster);
    reconciler.reconcile(&key).await.expect("Error on first reconciliation");

    let limits = BTreeMap::from([(String::from("memory"), Quantity(String::from("512Mi")))]);
    cluster.edit_workload(&key, |w| {
        let pod = w.spec.as_mut().and_then(|s| s.template.spec.as_mut()).expect("Missing pod spec");
        pod.containers[0].resources = Some(ResourceRequirements {
            limits: Some(limits.clone()),
            ..ResourceRequirements::default()
        });
    });
    let observed_version = cluster.workload(&key).and_then(|w| w.metadata.resource_version.clone());
    cluster.take_writes();

    reconciler.reconcile(&key).await.expect("Error with hand edits only");
    assert!(workload_updates(&cluster.take_writes()).is_empty());

    cluster.edit_function(&key, |f| f.spec.image = String::from("img:2"));
    reconciler.reconcile(&key).await.expect("Error after image change");
    let writes = cluster.take_writes();
    let updates = workload_updates(&writes);

    assert_eq!(updates.len(), 1);
    assert_eq!(image(updates[0]), Some("img:2"));
    assert_eq!(updates[0].metadata.resource_version, observed_version);
    let resources = updates[0].spec.as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|pod| pod.containers[0].resources.as_ref())
        .and_then(|r| r.limits.clone());
    assert_eq!(resources, Some(limits));
}

#[tokio::test]
async fn missing_function_is_not_an_error() {
    let cluster = FakeCluster::default();

    reconciler(&cluster).reconcile(&FunctionKey::new("streams", "gone")).await
        .expect("Missing Function should reconcile successfully");

    assert!(cluster.take_writes().is_empty());
}

#[tokio::test]
async fn conflicts_abort_and_succeed_on_retry() {
    let cluster = FakeCluster::default();
    let key = FunctionKey::new("streams", "copy-fn");
    cluster.apply_function(function("streams", "copy-fn", "img:1", 1));
    let reconciler = reconciler(&cluster);

    cluster.reject_next_write(409);
    let err = reconciler.reconcile(&key).await.expect_err("Conflict should abort the reconciliation");
    assert!(matches!(err, Error::Conflict(_)));
    assert!(err.is_retryable());
    assert!(cluster.take_writes().is_empty());
    assert!(cluster.workload(&key).is_none());

    reconciler.reconcile(&key).await.expect("Error on retry");
    let writes = cluster.take_writes();
    assert!(matches!(writes.first(), Some(Write::CreateBundle(_))));
    assert!(matches!(writes.get(1), Some(Write::CreateWorkload(_))));
}

#[tokio::test]
async fn functions_without_uid_cannot_own_objects() {
    let cluster = FakeCluster::default();
    let key = FunctionKey::new("streams", "copy-fn");
    let mut unowned = function("streams", "copy-fn", "img:1", 1);
    unowned.metadata.uid = None;
    cluster.apply_function(unowned);

    let err = reconciler(&cluster).reconcile(&key).await.expect_err("Missing uid should fail");

    assert!(matches!(err, Error::MissingObjectKey(_)));
    assert!(!err.is_retryable());
    assert!(cluster.take_writes().is_empty());
}
