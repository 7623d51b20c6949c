use kube::Resource;

/// What the reconciler must do next for an object, decided purely from its
/// deletion timestamp and finalizer list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Deletion is in progress and our finalizer is already gone.
    RequeueNoop,
    /// Finalizer was added; persist and stop, the write re-triggers us.
    AttachFinalizer,
    /// Finalizer was removed; persist so the store can finish the deletion.
    DetachFinalizer,
    /// Safe to converge children.
    Proceed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub action: LifecycleAction,
    pub requires_persist: bool,
}

impl Transition {
    const fn persist(action: LifecycleAction) -> Self {
        Self {
            action,
            requires_persist: true,
        }
    }

    const fn stay(action: LifecycleAction) -> Self {
        Self {
            action,
            requires_persist: false,
        }
    }
}

pub fn is_deleting<K: Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}

pub fn has_finalizer<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

/// Advance the finalizer state machine one step, mutating `obj`'s finalizer
/// list in place when the returned transition requires a persist.
pub fn advance<K: Resource>(obj: &mut K, finalizer: &str) -> Transition {
    if is_deleting(obj) {
        if !has_finalizer(obj, finalizer) {
            return Transition::stay(LifecycleAction::RequeueNoop);
        }
        if let Some(finals) = obj.meta_mut().finalizers.as_mut() {
            finals.retain(|f| f != finalizer);
        }
        return Transition::persist(LifecycleAction::DetachFinalizer);
    }

    if !has_finalizer(obj, finalizer) {
        obj.meta_mut()
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(finalizer.to_string());
        return Transition::persist(LifecycleAction::AttachFinalizer);
    }

    Transition::stay(LifecycleAction::Proceed)
}
