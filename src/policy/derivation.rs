//! Derivation of the effective function configuration and its property-file rendering.
//!
//! Layers are applied in order, a later layer replacing keys of an earlier one:
//! built-in defaults, the startup default overlay, the values implied by the Function,
//! the resolved serializer classes and finally the Function's own override maps.
//! Override keys are not validated: they are the escape hatch to native client settings.

use kube::ResourceExt;

use crate::model::function_config::{DefaultOverlay, FunctionConfig};
use crate::model::spec::Function;

pub const FUNCTION_PREFIX: &str = "function";
pub const CONSUMER_PREFIX: &str = "consumer";
pub const PRODUCER_PREFIX: &str = "producer";

const SERIALIZATION_PACKAGE: &str = "org.apache.kafka.common.serialization";

static CONSUMER_DEFAULTS: &[(&str, &str)] = &[("auto.offset.reset", "earliest")];

static PRODUCER_DEFAULTS: &[(&str, &str)] = &[
    ("acks", "all"),
    ("retries", "3"),
];

pub fn derive_config(defaults: &DefaultOverlay, function: &Function) -> FunctionConfig {
    let mut cfg = FunctionConfig::default();

    for (key, value) in CONSUMER_DEFAULTS {
        cfg.consumer.insert(String::from(*key), String::from(*value));
    }
    for (key, value) in PRODUCER_DEFAULTS {
        cfg.producer.insert(String::from(*key), String::from(*value));
    }

    cfg.consumer.insert(String::from("bootstrap.servers"), defaults.bootstrap_servers.clone());
    cfg.producer.insert(String::from("bootstrap.servers"), defaults.bootstrap_servers.clone());
    cfg.override_function_properties(&defaults.function);
    cfg.override_consumer_properties(&defaults.consumer);
    cfg.override_producer_properties(&defaults.producer);

    let name = function.name_any();
    let spec = &function.spec;
    cfg.function.insert(String::from("name"), name.clone());
    cfg.function.insert(String::from("class"), spec.class.clone());
    cfg.function.insert(String::from("input"), spec.input.clone());
    cfg.function.insert(String::from("output"), spec.output.clone());
    cfg.consumer.insert(String::from("group.id"), name);

    cfg.consumer.insert(String::from("key.deserializer"), resolve_deserializer(&spec.input_key_deserializer));
    cfg.consumer.insert(String::from("value.deserializer"), resolve_deserializer(&spec.input_value_deserializer));
    cfg.producer.insert(String::from("key.serializer"), resolve_serializer(&spec.output_key_serializer));
    cfg.producer.insert(String::from("value.serializer"), resolve_serializer(&spec.output_value_serializer));

    if let Some(props) = &spec.function_config {
        cfg.override_function_properties(props);
    }
    if let Some(props) = &spec.consumer_config {
        cfg.override_consumer_properties(props);
    }
    if let Some(props) = &spec.producer_config {
        cfg.override_producer_properties(props);
    }

    cfg
}

fn serialization_class(alias: &str) -> Option<&'static str> {
    match alias {
        "bytes" => Some("ByteArray"),
        "string" => Some("String"),
        "double" => Some("Double"),
        "float" => Some("Float"),
        "int" => Some("Integer"),
        "long" => Some("Long"),
        "short" => Some("Short"),
        _ => None,
    }
}

/// Maps a short alias to the serializer class; anything else is taken as a class name.
pub fn resolve_serializer(alias: &str) -> String {
    match serialization_class(alias) {
        Some(class) => format!("{SERIALIZATION_PACKAGE}.{class}Serializer"),
        None => String::from(alias),
    }
}

/// Deserializer counterpart of [`resolve_serializer`].
pub fn resolve_deserializer(alias: &str) -> String {
    match serialization_class(alias) {
        Some(class) => format!("{SERIALIZATION_PACKAGE}.{class}Deserializer"),
        None => String::from(alias),
    }
}

/// Renders the configuration as a line-oriented property file.
///
/// Every namespace emits its keys in lexicographic order as `prefix.key=value` lines;
/// namespaces are separated by one empty line. Only newline and carriage return are
/// escaped in values.
pub fn serialize_properties(cfg: &FunctionConfig) -> String {
    let mut out = String::new();
    write_section(&mut out, FUNCTION_PREFIX, &cfg.function);
    out.push('\n');
    write_section(&mut out, CONSUMER_PREFIX, &cfg.consumer);
    out.push('\n');
    write_section(&mut out, PRODUCER_PREFIX, &cfg.producer);
    out
}

fn write_section<'a, I>(out: &mut String, prefix: &str, props: I)
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    for (key, value) in props {
        out.push_str(&format!("{prefix}.{key}={}\n", escape(value)));
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}
