pub mod conditions;
pub mod converge;
pub mod invocation;
pub mod lifecycle;
pub mod reconcile;

use std::sync::Arc;

use futures_util::StreamExt;
use kube::{
    Client,
    api::Api,
    runtime::{
        Controller,
        controller::{Action, Config as ControllerConfig},
        watcher::Config,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{OperatorConfig, ReconcileConfig};
use crate::crd::{Beak, Bird};
use crate::scheme::dino_scheme;
use crate::store::{KubeStore, ObjectKey, StoreError};

pub use converge::{ChildChange, ConvergenceEngine};
pub use invocation::Invocation;
pub use reconcile::{DropReason, FINALIZER, Outcome, Progress, Reconciler};

#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("owner reference: {0}")]
    OwnerReference(String),
    #[error("cancelled before {0}")]
    Cancelled(&'static str),
}

/// Coarse error taxonomy used for logging and the retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Conflict,
    Transient,
    Programming,
}

impl ReconcileError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ReconcileError::Store(StoreError::NotFound { .. }) => {
                ErrorClass::NotFound
            }
            ReconcileError::Store(
                StoreError::Conflict { .. } | StoreError::AlreadyExists { .. },
            ) => ErrorClass::Conflict,
            ReconcileError::Store(StoreError::Transient(_))
            | ReconcileError::Cancelled(_) => ErrorClass::Transient,
            ReconcileError::Store(
                StoreError::UnregisteredKind(_) | StoreError::Serialization(_),
            )
            | ReconcileError::OwnerReference(_) => ErrorClass::Programming,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.class() == ErrorClass::Conflict
    }
}

pub struct ControllerContext {
    pub reconciler: Reconciler,
    pub cfg: OperatorConfig,
    pub shutdown: CancellationToken,
}

impl ControllerContext {
    /// Fresh cancellation scope for one pass: cancelled on shutdown or when
    /// the configured timeout elapses.
    pub fn invocation(&self) -> Invocation {
        Invocation::new(self.shutdown.child_token(), self.cfg.reconcile.timeout())
    }
}

pub async fn run_controller(
    client: Client,
    cfg: OperatorConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let scheme = dino_scheme();
    let parents = Arc::new(
        KubeStore::<Bird>::new(client.clone(), &scheme)?
            .watching(cfg.watch_namespace.clone()),
    );
    let children = Arc::new(
        KubeStore::<Beak>::new(client.clone(), &scheme)?
            .watching(cfg.watch_namespace.clone()),
    );

    let (birds, beaks): (Api<Bird>, Api<Beak>) =
        match cfg.watch_namespace.as_deref() {
            Some(ns) => (
                Api::namespaced(client.clone(), ns),
                Api::namespaced(client, ns),
            ),
            None => (Api::all(client.clone()), Api::all(client)),
        };

    let concurrency = cfg.reconcile.concurrency;
    let ctx = Arc::new(ControllerContext {
        reconciler: Reconciler::new(parents, children),
        cfg,
        shutdown: shutdown.clone(),
    });
    info!(namespace = ?ctx.cfg.watch_namespace, "controller: watching Birds");

    // Owning Beaks means tampering with one re-triggers its Bird.
    let controller = Controller::new(birds, Config::default())
        .owns(beaks, Config::default())
        .with_config(ControllerConfig::default().concurrency(concurrency))
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj_ref, action)) => {
                    debug!(%obj_ref, ?action, "reconciled")
                }
                Err(e) => warn!(error = %e, "reconcile error"),
            }
        });

    tokio::select! {
        _ = controller => {}
        _ = shutdown.cancelled() => info!("controller: shutdown requested"),
    }
    Ok(())
}

async fn reconcile(
    obj: Arc<Bird>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileError> {
    let key = ObjectKey::of(obj.as_ref());
    let outcome = ctx.reconciler.reconcile(&key, &ctx.invocation()).await;
    action_for(outcome, &ctx.cfg.reconcile)
}

/// Translate an [`Outcome`] into what the controller runtime understands.
/// Absorbed failures fall back to the periodic resync; only retryable
/// errors go through `error_policy`.
pub fn action_for(
    outcome: Outcome,
    cfg: &ReconcileConfig,
) -> Result<Action, ReconcileError> {
    let resync = || {
        cfg.resync()
            .map(Action::requeue)
            .unwrap_or_else(Action::await_change)
    };
    match outcome {
        Outcome::Success(Progress::Converged { .. }) => Ok(resync()),
        Outcome::Success(_) => Ok(Action::await_change()),
        Outcome::Dropped(DropReason::Absorbed(_)) => Ok(resync()),
        Outcome::Dropped(_) => Ok(Action::await_change()),
        Outcome::Retryable(e) => Err(e),
    }
}

fn error_policy(
    obj: Arc<Bird>,
    error: &ReconcileError,
    ctx: Arc<ControllerContext>,
) -> Action {
    debug!(key = %ObjectKey::of(obj.as_ref()), %error, class = ?error.class(), "requeueing after retryable error");
    Action::requeue(ctx.cfg.reconcile.conflict_requeue())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn conflict() -> ReconcileError {
        ReconcileError::Store(StoreError::Conflict {
            kind: "Bird".into(),
            key: ObjectKey::new("default", "robin"),
            message: "stale".into(),
        })
    }

    #[test]
    fn classifies_errors() {
        assert_eq!(conflict().class(), ErrorClass::Conflict);
        assert_eq!(
            ReconcileError::Store(StoreError::Transient("eof".into())).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            ReconcileError::Cancelled("fetching bird").class(),
            ErrorClass::Transient
        );
        assert_eq!(
            ReconcileError::OwnerReference("no uid".into()).class(),
            ErrorClass::Programming
        );
        assert_eq!(
            ReconcileError::Store(StoreError::UnregisteredKind("x".into()))
                .class(),
            ErrorClass::Programming
        );
    }

    #[test]
    fn outcomes_map_to_actions() {
        let cfg = ReconcileConfig::default();
        let resync = Action::requeue(Duration::from_secs(300));

        let converged = Outcome::Success(Progress::Converged {
            child: ChildChange::Unchanged,
            status_written: false,
        });
        assert_eq!(action_for(converged, &cfg).unwrap(), resync);
        assert_eq!(
            action_for(Outcome::Success(Progress::FinalizerAttached), &cfg)
                .unwrap(),
            Action::await_change()
        );
        assert_eq!(
            action_for(Outcome::Dropped(DropReason::Gone), &cfg).unwrap(),
            Action::await_change()
        );
        assert_eq!(
            action_for(
                Outcome::Dropped(DropReason::Absorbed(ReconcileError::Store(
                    StoreError::Transient("eof".into())
                ))),
                &cfg
            )
            .unwrap(),
            resync
        );
        assert!(action_for(Outcome::Retryable(conflict()), &cfg)
            .unwrap_err()
            .is_conflict());
    }

    #[test]
    fn zero_resync_waits_for_changes() {
        let cfg = ReconcileConfig {
            resync_secs: 0,
            ..Default::default()
        };
        let converged = Outcome::Success(Progress::Converged {
            child: ChildChange::Created,
            status_written: true,
        });
        assert_eq!(action_for(converged, &cfg).unwrap(), Action::await_change());
    }
}
