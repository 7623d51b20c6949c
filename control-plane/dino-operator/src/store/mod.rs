pub mod cluster;
pub mod error;
pub mod memory;

use std::fmt::Debug;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use kube::{Resource, ResourceExt, core::NamespaceResourceScope};
use serde::{Serialize, de::DeserializeOwned};

pub use cluster::KubeStore;
pub use error::StoreError;
pub use memory::{MemoryStore, StoreOp};

pub type StoreResult<T> = Result<T, StoreError>;

/// Namespaced object kinds a store can hold.
pub trait StoredObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> StoredObject for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// `(namespace, name)` address of an object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn of<K: Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace().unwrap_or_else(|| "default".into()),
            name: obj.name_any(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

pub(crate) fn kind_of<K: Resource<DynamicType = ()>>() -> String {
    K::kind(&()).into_owned()
}

/// Declarative object store for one kind.
///
/// Writes are optimistic: `replace` and `replace_status` carry the
/// `metadata.resourceVersion` last read and fail with
/// [`StoreError::Conflict`] when the stored version moved on. Implementations
/// never retry internally.
#[async_trait]
pub trait ObjectStore<K: StoredObject>: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> StoreResult<K>;

    async fn create(&self, obj: &K) -> StoreResult<K>;

    /// Replace everything except `status`.
    async fn replace(&self, obj: &K) -> StoreResult<K>;

    /// Replace only `status`.
    async fn replace_status(&self, obj: &K) -> StoreResult<K>;

    /// Keys of objects as they are created or modified.
    fn watch(&self) -> BoxStream<'static, ObjectKey>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Bird, BirdSpec};

    #[test]
    fn key_of_object_defaults_namespace() {
        let bird = Bird::new("robin", BirdSpec::default());
        assert_eq!(ObjectKey::of(&bird), ObjectKey::new("default", "robin"));

        let mut bird = Bird::new("robin", BirdSpec::default());
        bird.metadata.namespace = Some("aviary".into());
        assert_eq!(ObjectKey::of(&bird).to_string(), "aviary/robin");
    }
}
