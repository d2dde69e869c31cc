use std::collections::HashSet;
use std::fmt::Debug;

use futures::StreamExt;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::reflector::store::Writer;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;

use crate::model::event::{Notification, Payload, Tombstone};

/// Watches one kind, keeps its cache and reports every change as a [`Notification`].
///
/// The cache is updated before the notification is handed out, so handlers always see a
/// store at least as fresh as the event they are processing.
pub struct Informer<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    api: Api<K>,
    config: watcher::Config,
    reader: Store<K>,
    writer: Writer<K>,
}

impl<K> Informer<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    pub fn new(api: Api<K>, config: watcher::Config) -> Self {
        let (reader, writer) = reflector::store();
        Self {
            api,
            config,
            reader,
            writer,
        }
    }

    /// Shared read handle; ready once the first full listing has been applied.
    pub fn store(&self) -> Store<K> {
        self.reader.clone()
    }

    pub async fn run<F>(mut self, mut handler: F)
    where
        F: FnMut(Notification<K>) + Send,
    {
        let kind = K::kind(&());
        let mut events = watcher::watcher(self.api.clone(), self.config.clone())
            .default_backoff()
            .boxed();

        while let Some(event) = events.next().await {
            match event {
                Ok(event) => self.apply(event).into_iter().for_each(&mut handler),
                Err(err) => log::warn!("Watch error on {kind} - {err}"),
            }
        }
        log::debug!("Watch on {kind} terminated");
    }

    fn apply(&mut self, event: Event<K>) -> Vec<Notification<K>> {
        let notifications = notifications_for(&self.reader, &event);
        self.writer.apply_watcher_event(&event);
        notifications
    }
}

/// Translates a watch event into notifications, comparing it with the cache state that
/// precedes it. A relist reports the objects it no longer contains as tombstones.
pub fn notifications_for<K>(cache: &Store<K>, event: &Event<K>) -> Vec<Notification<K>>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    match event {
        Event::Applied(obj) => vec![applied(cache, obj)],
        Event::Deleted(obj) => vec![Notification::Deleted(Payload::Live(obj.clone()))],
        Event::Restarted(objs) => {
            let listed = objs.iter()
                .map(ObjectRef::from_obj)
                .collect::<HashSet<_>>();
            let vanished = cache.state()
                .into_iter()
                .filter(|obj| !listed.contains(&ObjectRef::from_obj(obj.as_ref())))
                .map(|obj| {
                    log::debug!("{} {} vanished across relist", K::kind(&()), obj.name_any());
                    Notification::Deleted(Payload::Tombstone(Tombstone {
                        key: store_key(obj.as_ref()),
                        last_known: obj.as_ref().clone(),
                    }))
                })
                .collect::<Vec<_>>();

            objs.iter()
                .map(|obj| applied(cache, obj))
                .chain(vanished)
                .collect()
        }
    }
}

fn applied<K>(cache: &Store<K>, obj: &K) -> Notification<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    match cache.get(&ObjectRef::from_obj(obj)) {
        Some(old) => Notification::Updated { old, new: obj.clone() },
        None => Notification::Added(obj.clone()),
    }
}

fn store_key<K: ResourceExt>(obj: &K) -> String {
    match obj.namespace() {
        Some(namespace) => format!("{namespace}/{}", obj.name_any()),
        None => obj.name_any(),
    }
}
