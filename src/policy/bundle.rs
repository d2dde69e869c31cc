use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};

use crate::core::error::Error;
use crate::model::function_config::FunctionConfig;
use crate::model::spec::Function;
use crate::policy::derivation::serialize_properties;

/// Data entry of the bundle, also the file name seen by the invoker.
pub const PROPERTIES_KEY: &str = "function.properties";

/// Metadata shared by every object derived from a Function: same namespace and name,
/// controlled by the Function so that deleting it garbage collects the object.
pub fn owned_metadata(function: &Function) -> Result<ObjectMeta, Error> {
    let namespace = function.namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let oref = function.controller_owner_ref(&())
        .ok_or(Error::MissingObjectKey(".metadata.uid"))?;

    Ok(ObjectMeta {
        name: Some(function.name_any()),
        namespace: Some(namespace),
        owner_references: Some(vec![oref]),
        ..ObjectMeta::default()
    })
}

pub fn build_config_bundle(function: &Function, config: &FunctionConfig) -> Result<ConfigMap, Error> {
    Ok(ConfigMap {
        metadata: owned_metadata(function)?,
        data: Some([
            (String::from(PROPERTIES_KEY), serialize_properties(config)),
        ].into_iter().collect()),
        ..ConfigMap::default()
    })
}

/// Observed bundle carrying the desired property file. Everything else, resource version
/// included, is kept from the observed object.
pub fn merge_bundle(observed: &ConfigMap, desired: &ConfigMap) -> ConfigMap {
    let mut merged = observed.clone();
    let props = desired.data.as_ref()
        .and_then(|data| data.get(PROPERTIES_KEY))
        .cloned()
        .unwrap_or_default();
    merged.data
        .get_or_insert_with(Default::default)
        .insert(String::from(PROPERTIES_KEY), props);
    merged
}
