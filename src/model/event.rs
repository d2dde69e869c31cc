use std::sync::Arc;

/// Object carried by a watch notification.
#[derive(Debug, Clone)]
pub enum Payload<K> {
    /// Object as delivered by the watch.
    Live(K),
    /// Object whose deletion was not observed directly (it vanished across a relist);
    /// only the last state known to the cache is available.
    Tombstone(Tombstone<K>),
}

#[derive(Debug, Clone)]
pub struct Tombstone<K> {
    pub key: String,
    pub last_known: K,
}

#[derive(Debug, Clone)]
pub enum Notification<K> {
    Added(K),
    Updated { old: Arc<K>, new: K },
    Deleted(Payload<K>),
}

impl<K> Payload<K> {
    pub fn object(&self) -> &K {
        match self {
            Payload::Live(obj) => obj,
            Payload::Tombstone(tombstone) => &tombstone.last_known,
        }
    }
}

impl<K> Notification<K> {
    /// Object the routing decision is based on; updates are routed by their new state.
    pub fn into_payload(self) -> Payload<K> {
        match self {
            Notification::Added(obj) => Payload::Live(obj),
            Notification::Updated { new, .. } => Payload::Live(new),
            Notification::Deleted(payload) => payload,
        }
    }
}
