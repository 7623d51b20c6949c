use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use futures_util::{StreamExt, stream::BoxStream};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

use super::{
    ObjectKey, ObjectStore, StoreError, StoreResult, StoredObject, kind_of,
};
use crate::scheme::{Scheme, type_key};

/// Store operations that can be made to fail on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Get,
    Create,
    Replace,
    ReplaceStatus,
}

struct Inner<K> {
    objects: HashMap<ObjectKey, K>,
    last_version: u64,
    faults: VecDeque<(StoreOp, StoreError)>,
}

impl<K> Inner<K> {
    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }

    fn take_fault(&mut self, op: StoreOp) -> Option<StoreError> {
        let idx = self.faults.iter().position(|(o, _)| *o == op)?;
        self.faults.remove(idx).map(|(_, e)| e)
    }
}

/// In-process [`ObjectStore`] with API-server semantics: resource versions,
/// a status subresource, finalizer-gated deletion and a change feed.
///
/// Clones share state, so a test can hand one clone to the reconciler and
/// keep another to inspect or tamper with objects.
pub struct MemoryStore<K> {
    inner: Arc<RwLock<Inner<K>>>,
    writes: Arc<AtomicUsize>,
    events: broadcast::Sender<ObjectKey>,
}

impl<K> Clone for MemoryStore<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            writes: self.writes.clone(),
            events: self.events.clone(),
        }
    }
}

impl<K: StoredObject> MemoryStore<K> {
    pub fn new(scheme: &Scheme) -> StoreResult<Self> {
        if !scheme.is_registered::<K>() {
            return Err(StoreError::UnregisteredKind(type_key::<K>()));
        }
        let (events, _) = broadcast::channel(64);
        Ok(Self {
            inner: Arc::new(RwLock::new(Inner {
                objects: HashMap::new(),
                last_version: 0,
                faults: VecDeque::new(),
            })),
            writes: Arc::new(AtomicUsize::new(0)),
            events,
        })
    }

    /// Number of write calls (create, replace, replace_status) attempted so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next call of `op` fail with `err`.
    pub async fn fail_next(&self, op: StoreOp, err: StoreError) {
        self.inner.write().await.faults.push_back((op, err));
    }

    /// Mark the object for deletion the way the API server does: objects
    /// without finalizers disappear, others get a deletion timestamp and
    /// linger until their last finalizer is removed.
    pub async fn request_deletion(&self, key: &ObjectKey) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let version = inner.next_version();
        let obj = inner
            .objects
            .get_mut(key)
            .ok_or_else(|| not_found::<K>(key))?;
        let has_finalizers = obj
            .meta()
            .finalizers
            .as_ref()
            .is_some_and(|f| !f.is_empty());
        if has_finalizers {
            let meta = obj.meta_mut();
            if meta.deletion_timestamp.is_none() {
                meta.deletion_timestamp = Some(Time(Utc::now()));
            }
            meta.resource_version = Some(version);
        } else {
            inner.objects.remove(key);
        }
        drop(inner);
        self.notify(key);
        Ok(())
    }

    /// Mutate a stored object out of band, as another writer would.
    pub async fn modify(
        &self,
        key: &ObjectKey,
        f: impl FnOnce(&mut K),
    ) -> StoreResult<K> {
        let mut inner = self.inner.write().await;
        let version = inner.next_version();
        let obj = inner
            .objects
            .get_mut(key)
            .ok_or_else(|| not_found::<K>(key))?;
        f(obj);
        obj.meta_mut().resource_version = Some(version);
        let out = obj.clone();
        drop(inner);
        self.notify(key);
        Ok(out)
    }

    fn notify(&self, key: &ObjectKey) {
        // no receivers is fine
        let _ = self.events.send(key.clone());
    }

    fn count_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn not_found<K: StoredObject>(key: &ObjectKey) -> StoreError {
    StoreError::NotFound {
        kind: kind_of::<K>(),
        key: key.clone(),
    }
}

fn check_version<K: StoredObject>(
    key: &ObjectKey,
    stored: &K,
    incoming: &K,
) -> StoreResult<()> {
    let have = stored.meta().resource_version.as_deref();
    match incoming.meta().resource_version.as_deref() {
        Some(got) if Some(got) != have => Err(StoreError::Conflict {
            kind: kind_of::<K>(),
            key: key.clone(),
            message: format!(
                "resourceVersion {got} is stale (current {})",
                have.unwrap_or("none")
            ),
        }),
        _ => Ok(()),
    }
}

/// `target` with its `status` taken from `source`.
fn with_status_of<K: StoredObject>(target: &K, source: &K) -> StoreResult<K> {
    let mut out = serde_json::to_value(target)?;
    let status = serde_json::to_value(source)?
        .get("status")
        .filter(|s| !s.is_null())
        .cloned();
    if let Some(map) = out.as_object_mut() {
        match status {
            Some(s) => {
                map.insert("status".into(), s);
            }
            None => {
                map.remove("status");
            }
        }
    }
    Ok(serde_json::from_value(out)?)
}

#[async_trait]
impl<K: StoredObject> ObjectStore<K> for MemoryStore<K> {
    async fn get(&self, key: &ObjectKey) -> StoreResult<K> {
        let mut inner = self.inner.write().await;
        if let Some(err) = inner.take_fault(StoreOp::Get) {
            return Err(err);
        }
        inner
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| not_found::<K>(key))
    }

    async fn create(&self, obj: &K) -> StoreResult<K> {
        self.count_write();
        let key = ObjectKey::of(obj);
        let mut inner = self.inner.write().await;
        if let Some(err) = inner.take_fault(StoreOp::Create) {
            return Err(err);
        }
        if inner.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: kind_of::<K>(),
                key,
            });
        }
        let mut created = obj.clone();
        let version = inner.next_version();
        let meta = created.meta_mut();
        meta.namespace = Some(key.namespace.clone());
        meta.resource_version = Some(version);
        meta.uid = Some(nanoid::nanoid!());
        meta.creation_timestamp = Some(Time(Utc::now()));
        meta.deletion_timestamp = None;
        inner.objects.insert(key.clone(), created.clone());
        drop(inner);
        trace!(%key, "memory store: created");
        self.notify(&key);
        Ok(created)
    }

    async fn replace(&self, obj: &K) -> StoreResult<K> {
        self.count_write();
        let key = ObjectKey::of(obj);
        let mut inner = self.inner.write().await;
        if let Some(err) = inner.take_fault(StoreOp::Replace) {
            return Err(err);
        }
        let stored = inner
            .objects
            .get(&key)
            .ok_or_else(|| not_found::<K>(&key))?;
        check_version(&key, stored, obj)?;

        let mut replaced = with_status_of(obj, stored)?;
        let (uid, created, deleting) = {
            let m = stored.meta();
            (
                m.uid.clone(),
                m.creation_timestamp.clone(),
                m.deletion_timestamp.clone(),
            )
        };
        let version = inner.next_version();
        let meta = replaced.meta_mut();
        meta.uid = uid;
        meta.creation_timestamp = created;
        meta.deletion_timestamp = deleting;
        meta.resource_version = Some(version);

        let finalized = replaced.meta().deletion_timestamp.is_some()
            && replaced
                .meta()
                .finalizers
                .as_ref()
                .is_none_or(|f| f.is_empty());
        if finalized {
            inner.objects.remove(&key);
            trace!(%key, "memory store: last finalizer removed; object deleted");
        } else {
            inner.objects.insert(key.clone(), replaced.clone());
        }
        drop(inner);
        self.notify(&key);
        Ok(replaced)
    }

    async fn replace_status(&self, obj: &K) -> StoreResult<K> {
        self.count_write();
        let key = ObjectKey::of(obj);
        let mut inner = self.inner.write().await;
        if let Some(err) = inner.take_fault(StoreOp::ReplaceStatus) {
            return Err(err);
        }
        let stored = inner
            .objects
            .get(&key)
            .ok_or_else(|| not_found::<K>(&key))?;
        check_version(&key, stored, obj)?;

        let mut updated = with_status_of(stored, obj)?;
        updated.meta_mut().resource_version = Some(inner.next_version());
        inner.objects.insert(key.clone(), updated.clone());
        drop(inner);
        self.notify(&key);
        Ok(updated)
    }

    fn watch(&self) -> BoxStream<'static, ObjectKey> {
        BroadcastStream::new(self.events.subscribe())
            .filter_map(|res| async move { res.ok() })
            .boxed()
    }
}
