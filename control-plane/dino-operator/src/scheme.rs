//! Registry of the object kinds the operator is allowed to touch.
//!
//! A [`Scheme`] is assembled once at start-up and shared read-only
//! (`Arc<Scheme>`) with every store. Stores refuse kinds that were never
//! registered, so a missing registration fails loudly at construction time
//! instead of surfacing as a 404 from the API server.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::discovery::ApiResource;
use kube::{CustomResourceExt, Resource};

use crate::crd::{Beak, Bird};

/// Everything the operator knows about one registered kind.
#[derive(Clone, Debug)]
pub struct RegisteredKind {
    pub resource: ApiResource,
    pub crd: CustomResourceDefinition,
}

#[derive(Debug, Default)]
pub struct Scheme {
    kinds: BTreeMap<String, RegisteredKind>,
}

#[derive(Debug, Default)]
pub struct SchemeBuilder {
    kinds: BTreeMap<String, RegisteredKind>,
}

/// `group/version/Kind` identifier of `K`.
pub fn type_key<K: Resource<DynamicType = ()>>() -> String {
    format!("{}/{}", K::api_version(&()), K::kind(&()))
}

impl Scheme {
    pub fn builder() -> SchemeBuilder {
        SchemeBuilder::default()
    }

    pub fn lookup<K: Resource<DynamicType = ()>>(
        &self,
    ) -> Option<&RegisteredKind> {
        self.kinds.get(&type_key::<K>())
    }

    pub fn is_registered<K: Resource<DynamicType = ()>>(&self) -> bool {
        self.lookup::<K>().is_some()
    }

    /// Registered kinds in `group/version/Kind` order.
    pub fn kinds(&self) -> impl Iterator<Item = &RegisteredKind> {
        self.kinds.values()
    }
}

impl SchemeBuilder {
    pub fn register<K>(mut self) -> Self
    where
        K: CustomResourceExt + Resource<DynamicType = ()>,
    {
        self.kinds.insert(
            type_key::<K>(),
            RegisteredKind {
                resource: ApiResource::erase::<K>(&()),
                crd: K::crd(),
            },
        );
        self
    }

    pub fn build(self) -> Arc<Scheme> {
        Arc::new(Scheme { kinds: self.kinds })
    }
}

/// The scheme used by the operator binaries: Bird (parent) and Beak (child).
pub fn dino_scheme() -> Arc<Scheme> {
    Scheme::builder().register::<Bird>().register::<Beak>().build()
}
