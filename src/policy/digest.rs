use k8s_openapi::api::core::v1::ConfigMap;
use ring::digest::{digest, SHA256};

use crate::policy::bundle::PROPERTIES_KEY;

/// Hex encoded SHA-256 of the bundle's property file.
///
/// Only the property entry takes part in the digest, so metadata changes on the bundle
/// never roll the workload. A bundle without the entry digests as an empty file.
pub fn config_digest(bundle: &ConfigMap) -> String {
    let props = bundle.data.as_ref()
        .and_then(|data| data.get(PROPERTIES_KEY))
        .map(String::as_str)
        .unwrap_or_default();
    hex::encode(digest(&SHA256, props.as_bytes()))
}
