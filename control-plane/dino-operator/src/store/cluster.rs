use std::marker::PhantomData;

use async_trait::async_trait;
use futures_util::{StreamExt, stream::BoxStream};
use kube::Client;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::discovery::ApiResource;
use kube::runtime::{WatchStreamExt, watcher};
use serde_json::{Value, json};
use tracing::{instrument, trace};

use super::{ObjectKey, ObjectStore, StoreError, StoreResult, StoredObject};
use crate::scheme::{Scheme, type_key};

/// [`ObjectStore`] backed by the Kubernetes API server.
pub struct KubeStore<K> {
    client: Client,
    resource: ApiResource,
    watch_namespace: Option<String>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            resource: self.resource.clone(),
            watch_namespace: self.watch_namespace.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: StoredObject> KubeStore<K> {
    pub fn new(client: Client, scheme: &Scheme) -> StoreResult<Self> {
        let registered = scheme
            .lookup::<K>()
            .ok_or_else(|| StoreError::UnregisteredKind(type_key::<K>()))?;
        Ok(Self {
            client,
            resource: registered.resource.clone(),
            watch_namespace: None,
            _kind: PhantomData,
        })
    }

    /// Limit [`ObjectStore::watch`] to one namespace; `None` watches all.
    pub fn watching(mut self, namespace: Option<String>) -> Self {
        self.watch_namespace = namespace;
        self
    }

    pub fn watch_namespace(&self) -> Option<&str> {
        self.watch_namespace.as_deref()
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn map_err(&self, key: &ObjectKey) -> impl FnOnce(kube::Error) -> StoreError {
        let kind = self.resource.kind.clone();
        let key = key.clone();
        move |e| map_kube_error(&kind, &key, e)
    }
}

/// Sort API errors into the store taxonomy. Anything that is not a
/// well-formed 404/409 answer is treated as transient.
pub(crate) fn map_kube_error(
    kind: &str,
    key: &ObjectKey,
    err: kube::Error,
) -> StoreError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound {
            kind: kind.to_string(),
            key: key.clone(),
        },
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            StoreError::AlreadyExists {
                kind: kind.to_string(),
                key: key.clone(),
            }
        }
        kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict {
            kind: kind.to_string(),
            key: key.clone(),
            message: ae.message,
        },
        other => StoreError::Transient(other.to_string()),
    }
}

#[async_trait]
impl<K: StoredObject> ObjectStore<K> for KubeStore<K> {
    #[instrument(level = "trace", skip_all, fields(key = %key))]
    async fn get(&self, key: &ObjectKey) -> StoreResult<K> {
        self.api(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(self.map_err(key))?
            .ok_or_else(|| StoreError::NotFound {
                kind: self.resource.kind.clone(),
                key: key.clone(),
            })
    }

    async fn create(&self, obj: &K) -> StoreResult<K> {
        let key = ObjectKey::of(obj);
        trace!(%key, plural = %self.resource.plural, "kube store: create");
        self.api(&key.namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(self.map_err(&key))
    }

    async fn replace(&self, obj: &K) -> StoreResult<K> {
        let key = ObjectKey::of(obj);
        trace!(%key, rv = ?obj.meta().resource_version, "kube store: replace");
        self.api(&key.namespace)
            .replace(&key.name, &PostParams::default(), obj)
            .await
            .map_err(self.map_err(&key))
    }

    async fn replace_status(&self, obj: &K) -> StoreResult<K> {
        let key = ObjectKey::of(obj);
        trace!(%key, rv = ?obj.meta().resource_version, "kube store: replace status");
        let mut body = serde_json::to_value(obj)?;
        let status = body
            .get_mut("status")
            .map(Value::take)
            .unwrap_or(Value::Null);
        // resourceVersion in a merge patch makes the API server reject stale writes
        let patch = json!({
            "metadata": { "resourceVersion": obj.meta().resource_version },
            "status": status,
        });
        self.api(&key.namespace)
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(self.map_err(&key))
    }

    fn watch(&self) -> BoxStream<'static, ObjectKey> {
        let api: Api<K> = match self.watch_namespace() {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        watcher(api, watcher::Config::default())
            .applied_objects()
            .filter_map(|res| async move { res.ok().map(|obj| ObjectKey::of(&obj)) })
            .boxed()
    }
}
