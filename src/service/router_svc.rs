use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::model::event::{Notification, Payload};
use crate::model::key::FunctionKey;
use crate::model::spec::Function;
use crate::service::cluster_svc::ObjectCache;

/// Identity and ownership of a notified object, whichever form it was delivered in.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
    pub controller: Option<OwnerReference>,
}

impl ObjectRecord {
    pub fn from_payload<K: Resource<DynamicType = ()>>(payload: &Payload<K>) -> Self {
        if let Payload::Tombstone(tombstone) = payload {
            log::debug!("Recovered deleted object '{}' from tombstone", tombstone.key);
        }
        let obj = payload.object();
        Self {
            kind: K::kind(&()).into_owned(),
            namespace: obj.namespace(),
            name: obj.name_any(),
            controller: obj.owner_references().iter()
                .find(|oref| oref.controller == Some(true))
                .cloned(),
        }
    }
}

/// Turns watch notifications into the keys of the Functions to reconcile.
pub struct EventRouter<C> {
    cache: C,
}

impl<C: ObjectCache> EventRouter<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    /// Any change to a Function, deletion included, is reconciled under its own key.
    pub fn route_function(&self, notification: Notification<Function>) -> Option<FunctionKey> {
        let record = ObjectRecord::from_payload(&notification.into_payload());
        let Some(namespace) = record.namespace else {
            log::warn!("Ignoring Function {} without namespace", record.name);
            return None;
        };
        log::debug!("Enqueue Function {namespace}/{}", record.name);
        Some(FunctionKey {
            namespace,
            name: record.name,
        })
    }

    /// Changes to derived objects are reconciled under the key of the Function controlling
    /// them. Objects with no controller, controlled by another kind, or whose Function is
    /// no longer cached are ignored.
    pub fn route_owned<K: Resource<DynamicType = ()>>(&self, notification: Notification<K>) -> Option<FunctionKey> {
        let record = ObjectRecord::from_payload(&notification.into_payload());
        self.resolve_owner(&record)
    }

    pub fn resolve_owner(&self, record: &ObjectRecord) -> Option<FunctionKey> {
        let oref = record.controller.as_ref()?;
        if oref.kind != Function::kind(&()) {
            return None;
        }
        let namespace = record.namespace.as_deref()?;

        let key = FunctionKey::new(namespace, &oref.name);
        match self.cache.function(&key) {
            Some(_) => {
                log::debug!("Enqueue Function {key} due to {} {namespace}/{}", record.kind, record.name);
                Some(key)
            }
            None => {
                log::debug!("Ignoring orphaned {} {namespace}/{} of Function {}", record.kind, record.name, oref.name);
                None
            }
        }
    }
}
