use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Spec object for Function
///
/// A Function is a stream-processing job: records are consumed from `input`, handed to
/// `class` and the results produced to `output`.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[kube(group = "kfn.io", version = "v1alpha1", kind = "Function", namespaced)]
#[kube(status = "FunctionStatus")]
#[kube(scale = r#"{"specReplicasPath":".spec.replicas", "statusReplicasPath":".status.availableReplicas"}"#)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    /// Container image, expected to ship the function invoker and the function class.
    pub image: String,
    #[schemars(range(min = 0))]
    pub replicas: i32,
    /// Fully qualified name of the function class.
    pub class: String,
    pub input: String,
    /// Alias (`bytes`, `string`, `double`, `float`, `int`, `long`, `short`) or fully
    /// qualified class name of the deserializer.
    #[serde(default = "default_serde_alias")]
    pub input_key_deserializer: String,
    #[serde(default = "default_serde_alias")]
    pub input_value_deserializer: String,
    pub output: String,
    #[serde(default = "default_serde_alias")]
    pub output_key_serializer: String,
    #[serde(default = "default_serde_alias")]
    pub output_value_serializer: String,
    /// Passed verbatim to the function `configure` method.
    #[serde(default, rename = "function", skip_serializing_if = "Option::is_none")]
    pub function_config: Option<BTreeMap<String, String>>,
    /// Passed verbatim to the consumer.
    #[serde(default, rename = "consumer", skip_serializing_if = "Option::is_none")]
    pub consumer_config: Option<BTreeMap<String, String>>,
    /// Passed verbatim to the producer.
    #[serde(default, rename = "producer", skip_serializing_if = "Option::is_none")]
    pub producer_config: Option<BTreeMap<String, String>>,
}

fn default_serde_alias() -> String {
    String::from("bytes")
}

/// Status object for Function
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FunctionStatus {
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default)]
    pub available_replicas: i32,
}
