use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    ObjectMeta, OwnerReference,
};
use kube::Resource;
use tracing::{info, instrument, trace};

use super::{Invocation, ReconcileError};
use crate::crd::{Beak, BeakSpec, Bird, BirdSpec};
use crate::store::{ObjectKey, ObjectStore, StoreError};

/// Value every Beak is converged to.
pub const BEAK_FOO: &str = "peck";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildChange {
    Created,
    Updated,
    Unchanged,
}

impl ChildChange {
    pub fn changed(self) -> bool {
        !matches!(self, ChildChange::Unchanged)
    }
}

/// Desired Beak spec for a Bird spec. Pure: the same input always yields an
/// identical spec, which is what makes repeated passes write-free.
pub fn desired_beak_spec(_spec: &BirdSpec) -> BeakSpec {
    BeakSpec {
        foo: BEAK_FOO.to_string(),
    }
}

/// Controller owner reference pointing at `bird`, used by the store's
/// garbage collector to cascade deletion to the Beak. Foreground deletion of
/// the Bird blocks on the Beak.
pub fn owner_reference(bird: &Bird) -> Result<OwnerReference, ReconcileError> {
    let mut owner = bird.controller_owner_ref(&()).ok_or_else(|| {
        ReconcileError::OwnerReference(format!(
            "Bird {} has no uid yet",
            ObjectKey::of(bird)
        ))
    })?;
    owner.block_owner_deletion = Some(true);
    Ok(owner)
}

/// Make `owner` the controller reference of `meta`, keeping unrelated
/// references. Returns whether `meta` changed. Fails when a different object
/// already controls it.
pub fn ensure_controller_reference(
    meta: &mut ObjectMeta,
    owner: OwnerReference,
) -> Result<bool, ReconcileError> {
    let refs = meta.owner_references.get_or_insert_with(Vec::new);
    if let Some(other) = refs
        .iter()
        .find(|r| r.controller == Some(true) && r.uid != owner.uid)
    {
        return Err(ReconcileError::OwnerReference(format!(
            "already controlled by {} {}",
            other.kind, other.name
        )));
    }
    match refs.iter_mut().find(|r| r.uid == owner.uid) {
        Some(existing) if *existing == owner => Ok(false),
        Some(existing) => {
            *existing = owner;
            Ok(true)
        }
        None => {
            refs.push(owner);
            Ok(true)
        }
    }
}

/// Creates or repairs the Beak that mirrors a Bird. One fetch, then at most
/// one write; never retries.
#[derive(Clone)]
pub struct ConvergenceEngine {
    children: Arc<dyn ObjectStore<Beak>>,
}

impl ConvergenceEngine {
    pub fn new(children: Arc<dyn ObjectStore<Beak>>) -> Self {
        Self { children }
    }

    #[instrument(skip_all, fields(key = %ObjectKey::of(bird)))]
    pub async fn converge(
        &self,
        bird: &Bird,
        inv: &Invocation,
    ) -> Result<ChildChange, ReconcileError> {
        let owner = owner_reference(bird)?;
        let desired = desired_beak_spec(&bird.spec);
        let key = ObjectKey::of(bird);

        inv.checkpoint("fetching beak")?;
        let mut beak = match self.children.get(&key).await {
            Ok(beak) => beak,
            Err(e) if e.is_not_found() => {
                return self.create(&key, desired, owner, inv).await;
            }
            Err(e) => return Err(e.into()),
        };

        let spec_changed = beak.spec != desired;
        if spec_changed {
            beak.spec = desired;
        }
        let owner_changed =
            ensure_controller_reference(&mut beak.metadata, owner)?;
        if !spec_changed && !owner_changed {
            trace!(%key, "converge: beak already matches");
            return Ok(ChildChange::Unchanged);
        }

        inv.checkpoint("updating beak")?;
        self.children.replace(&beak).await?;
        info!(%key, spec_changed, owner_changed, "converge: updated matching Beak");
        Ok(ChildChange::Updated)
    }

    async fn create(
        &self,
        key: &ObjectKey,
        spec: BeakSpec,
        owner: OwnerReference,
        inv: &Invocation,
    ) -> Result<ChildChange, ReconcileError> {
        let mut beak = Beak::new(&key.name, spec);
        beak.metadata.namespace = Some(key.namespace.clone());
        beak.metadata.owner_references = Some(vec![owner]);

        inv.checkpoint("creating beak")?;
        match self.children.create(&beak).await {
            Ok(_) => {
                info!(%key, "converge: created matching Beak");
                Ok(ChildChange::Created)
            }
            // lost a race with another writer; treat like any stale read
            Err(StoreError::AlreadyExists { kind, key }) => {
                Err(ReconcileError::Store(StoreError::Conflict {
                    kind,
                    key,
                    message: "created concurrently".into(),
                }))
            }
            Err(e) => Err(e.into()),
        }
    }
}
