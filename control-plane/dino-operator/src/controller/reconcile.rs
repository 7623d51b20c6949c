use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use super::conditions;
use super::converge::{ChildChange, ConvergenceEngine};
use super::lifecycle::{self, LifecycleAction};
use super::{Invocation, ReconcileError};
use crate::crd::{BIRD_CONDITION_CHILD_READY, BIRD_REASON_CREATED, Beak, Bird};
use crate::store::{ObjectKey, ObjectStore};

pub const FINALIZER: &str = "bird.dino.hpe.com";

/// What a successful pass accomplished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    FinalizerAttached,
    FinalizerDetached,
    Converged {
        child: ChildChange,
        status_written: bool,
    },
}

#[derive(Debug)]
pub enum DropReason {
    /// The Bird no longer exists.
    Gone,
    /// The Bird is being deleted and our finalizer is already released.
    Finalizing,
    /// A failure that is logged and left for the next trigger to heal.
    Absorbed(ReconcileError),
}

/// Result of one reconcile pass. Only `Retryable` asks the caller for a
/// guaranteed re-delivery; everything else waits for the next event or
/// resync.
#[derive(Debug)]
pub enum Outcome {
    Success(Progress),
    Dropped(DropReason),
    Retryable(ReconcileError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Outcome::Retryable(_))
    }
}

/// Drives one Bird through finalizer handling, Beak convergence and the
/// `ChildReady` condition.
#[derive(Clone)]
pub struct Reconciler {
    parents: Arc<dyn ObjectStore<Bird>>,
    engine: ConvergenceEngine,
}

impl Reconciler {
    pub fn new(
        parents: Arc<dyn ObjectStore<Bird>>,
        children: Arc<dyn ObjectStore<Beak>>,
    ) -> Self {
        Self {
            parents,
            engine: ConvergenceEngine::new(children),
        }
    }

    #[instrument(skip_all, fields(ns = %key.namespace, name = %key.name))]
    pub async fn reconcile(&self, key: &ObjectKey, inv: &Invocation) -> Outcome {
        if let Err(e) = inv.checkpoint("fetching bird") {
            return Outcome::Retryable(e);
        }
        let mut bird = match self.parents.get(key).await {
            Ok(bird) => bird,
            Err(e) if e.is_not_found() => {
                // deleted requests land here; nothing to requeue for
                debug!("reconcile: bird is gone");
                return Outcome::Dropped(DropReason::Gone);
            }
            Err(e) => {
                error!(error = %e, "reconcile: unable to fetch bird");
                return Outcome::Dropped(DropReason::Absorbed(e.into()));
            }
        };

        let transition = lifecycle::advance(&mut bird, FINALIZER);
        let progress = match transition.action {
            LifecycleAction::RequeueNoop => {
                debug!("reconcile: deletion in progress, finalizer released");
                return Outcome::Dropped(DropReason::Finalizing);
            }
            LifecycleAction::AttachFinalizer => Progress::FinalizerAttached,
            LifecycleAction::DetachFinalizer => Progress::FinalizerDetached,
            LifecycleAction::Proceed => {
                return self.converge(bird, inv).await;
            }
        };

        // The finalizer write must be observed by the store before any Beak
        // exists, so stop here and let the resulting watch event re-invoke us.
        info!(?progress, "reconcile: persisting finalizers");
        if let Err(e) = inv.checkpoint("persisting finalizers") {
            return Outcome::Retryable(e);
        }
        match self.parents.replace(&bird).await {
            Ok(_) => Outcome::Success(progress),
            Err(e) => {
                error!(error = %e, "reconcile: unable to persist finalizers");
                Outcome::Dropped(DropReason::Absorbed(e.into()))
            }
        }
    }

    async fn converge(&self, mut bird: Bird, inv: &Invocation) -> Outcome {
        let child = match self.engine.converge(&bird, inv).await {
            Ok(child) => child,
            Err(e @ ReconcileError::Cancelled(_)) => {
                return Outcome::Retryable(e);
            }
            Err(e) => {
                error!(
                    error = %e,
                    class = ?e.class(),
                    "reconcile: unable to converge the matching Beak"
                );
                return Outcome::Dropped(DropReason::Absorbed(e));
            }
        };

        let status = bird.status.get_or_insert_with(Default::default);
        let changed = conditions::set_true(
            &mut status.conditions,
            BIRD_CONDITION_CHILD_READY,
            BIRD_REASON_CREATED,
        );
        if !changed {
            return Outcome::Success(Progress::Converged {
                child,
                status_written: false,
            });
        }

        if let Err(e) = inv.checkpoint("updating status") {
            return Outcome::Retryable(e);
        }
        match self.parents.replace_status(&bird).await {
            Ok(_) => {
                info!(?child, "reconcile: ChildReady condition recorded");
                Outcome::Success(Progress::Converged {
                    child,
                    status_written: true,
                })
            }
            // Conflicts are a normal part of a reconciler's life; retry quietly.
            Err(e) if e.is_conflict() => {
                debug!(error = %e, "reconcile: status conflict; requesting retry");
                Outcome::Retryable(e.into())
            }
            Err(e) => {
                error!(error = %e, "reconcile: unable to update status");
                Outcome::Dropped(DropReason::Absorbed(e.into()))
            }
        }
    }
}
