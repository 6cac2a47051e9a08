//! Hooks attached to states and transitions.
//!
//! Behaviors run for their side effects when a state is entered, running or
//! exited, and as the effect of a transition. Guards are predicates deciding
//! whether a transition may fire. Both are implemented for plain closures.

use crate::fsm::event::Event;
use crate::fsm::execution::MachineExecution;
use std::sync::Arc;

/// Side-effecting hook.
///
/// Behaviors receive the execution as it is at the moment they run. They
/// cannot change it; a machine execution only moves through its own
/// operations.
pub trait Behavior: Send + Sync {
    fn run(&self, execution: &MachineExecution);
}

impl<F> Behavior for F
where
    F: Fn(&MachineExecution) + Send + Sync,
{
    fn run(&self, execution: &MachineExecution) {
        self(execution)
    }
}

/// Behavior that does nothing; the default for omitted hooks.
#[derive(Clone, Copy, Debug, Default)]
pub struct Noop;

impl Behavior for Noop {
    fn run(&self, _execution: &MachineExecution) {}
}

/// Predicate gating a transition.
///
/// `event` is the event being handled, or `None` when the current state is
/// being completed without one. Guards may consult state outside the
/// machine; a changed answer on a later call is how an execution in error
/// recovers.
pub trait Guard: Send + Sync {
    fn evaluate(&self, execution: &MachineExecution, event: Option<&Event>) -> bool;
}

impl<F> Guard for F
where
    F: Fn(&MachineExecution, Option<&Event>) -> bool + Send + Sync,
{
    fn evaluate(&self, execution: &MachineExecution, event: Option<&Event>) -> bool {
        self(execution, event)
    }
}

/// Guard that always passes; the default for unguarded transitions.
#[derive(Clone, Copy, Debug, Default)]
pub struct Always;

impl Guard for Always {
    fn evaluate(&self, _execution: &MachineExecution, _event: Option<&Event>) -> bool {
        true
    }
}

pub(crate) fn noop() -> Arc<dyn Behavior> {
    Arc::new(Noop)
}
