use std::fmt;

use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};

use crate::core::error::Error;

/// `namespace/name` identity of a Function, shared by its bundle and workload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionKey {
    pub namespace: String,
    pub name: String,
}

impl FunctionKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: String::from(namespace),
            name: String::from(name),
        }
    }

    pub fn from_resource<K: Resource>(obj: &K) -> Result<Self, Error> {
        let name = obj.meta().name.clone()
            .ok_or(Error::MissingObjectKey(".metadata.name"))?;
        let namespace = obj.namespace()
            .ok_or_else(|| Error::InvalidKey(format!("/{name}")))?;
        Ok(Self { namespace, name })
    }

    pub fn object_ref<K: Resource<DynamicType = ()>>(&self) -> ObjectRef<K> {
        ObjectRef::new(&self.name).within(&self.namespace)
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
