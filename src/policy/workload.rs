use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{ConfigMap, ConfigMapVolumeSource, Container, KeyToPath, PodSpec, PodTemplateSpec, Volume, VolumeMount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use kube::ResourceExt;

use crate::core::error::Error;
use crate::model::spec::Function;
use crate::policy::bundle::{owned_metadata, PROPERTIES_KEY};
use crate::policy::digest::config_digest;

/// Pod template annotation carrying the digest of the mounted bundle.
pub const CONFIG_HASH_ANNOTATION: &str = "kfn.io/config-hash";
pub const INVOKER_CONTAINER: &str = "function-invoker";
pub static LABEL_FUNCTION: &str = "function";

static CONFIG_VOLUME: &str = "config";
static CONFIG_MOUNT_PATH: &str = "/etc/kfn";
static INVOKER_COMMAND: &[&str] = &[
    "java",
    "-cp",
    "/usr/lib/kfn/*",
    "io.kfn.invoker.FunctionInvoker",
    "/etc/kfn/function.properties",
];

pub fn build_workload(function: &Function, bundle: &ConfigMap) -> Result<Deployment, Error> {
    let labels: BTreeMap<String, String> = [
        (String::from(LABEL_FUNCTION), function.name_any()),
    ].into_iter().collect();

    Ok(Deployment {
        metadata: owned_metadata(function)?,
        spec: Some(DeploymentSpec {
            replicas: Some(function.spec.replicas),
            selector: LabelSelector {
                match_expressions: None,
                match_labels: Some(labels.clone()),
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: Some([
                        (String::from(CONFIG_HASH_ANNOTATION), config_digest(bundle)),
                    ].into_iter().collect()),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: String::from(INVOKER_CONTAINER),
                        image: Some(function.spec.image.clone()),
                        image_pull_policy: Some(String::from("Always")),
                        command: Some(INVOKER_COMMAND.iter().map(|arg| String::from(*arg)).collect()),
                        volume_mounts: Some(vec![VolumeMount {
                            name: String::from(CONFIG_VOLUME),
                            mount_path: String::from(CONFIG_MOUNT_PATH),
                            ..VolumeMount::default()
                        }]),
                        ..Container::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: String::from(CONFIG_VOLUME),
                        config_map: Some(ConfigMapVolumeSource {
                            name: Some(bundle.name_any()),
                            items: Some(vec![KeyToPath {
                                key: String::from(PROPERTIES_KEY),
                                path: String::from(PROPERTIES_KEY),
                                mode: None,
                            }]),
                            ..ConfigMapVolumeSource::default()
                        }),
                        ..Volume::default()
                    }]),
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    })
}

pub fn replicas(workload: &Deployment) -> Option<i32> {
    workload.spec.as_ref().and_then(|spec| spec.replicas)
}

pub fn image(workload: &Deployment) -> Option<&str> {
    workload.spec.as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .and_then(|pod| pod.containers.first())
        .and_then(|container| container.image.as_deref())
}

pub fn config_hash(workload: &Deployment) -> Option<&str> {
    workload.spec.as_ref()
        .and_then(|spec| spec.template.metadata.as_ref())
        .and_then(|meta| meta.annotations.as_ref())
        .and_then(|annotations| annotations.get(CONFIG_HASH_ANNOTATION))
        .map(String::as_str)
}

pub fn available_replicas(workload: &Deployment) -> i32 {
    workload.status.as_ref()
        .and_then(|status| status.available_replicas)
        .unwrap_or_default()
}

/// Compares only the fields this controller manages: replica count, image and config hash.
pub fn is_satisfied_by(desired: &Deployment, observed: &Deployment) -> bool {
    replicas(desired) == replicas(observed)
        && image(desired) == image(observed)
        && config_hash(desired) == config_hash(observed)
}

/// Observed workload with the managed fields taken from `desired`.
///
/// Unmanaged fields edited by hand (resources, probes, tolerations...) survive the update.
pub fn merge_workload(observed: &Deployment, desired: &Deployment) -> Deployment {
    let mut merged = observed.clone();
    let Some(desired_spec) = desired.spec.as_ref() else {
        return merged;
    };
    let spec = merged.spec.get_or_insert_with(|| desired_spec.clone());
    spec.replicas = desired_spec.replicas;

    if let Some(hash) = config_hash(desired) {
        spec.template.metadata
            .get_or_insert_with(ObjectMeta::default)
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(String::from(CONFIG_HASH_ANNOTATION), String::from(hash));
    }

    let desired_container = desired_spec.template.spec.as_ref()
        .and_then(|pod| pod.containers.first());
    if let Some(desired_container) = desired_container {
        let pod = spec.template.spec.get_or_insert_with(PodSpec::default);
        match pod.containers.first_mut() {
            Some(container) => container.image = desired_container.image.clone(),
            None => pod.containers.push(desired_container.clone()),
        }
    }
    merged
}
