//! State machine errors.

use crate::fsm::execution::Condition;
use crate::symbol::Symbol;
use thiserror::Error;

/// A structural problem in a state machine definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelViolation {
    #[error("No start state")]
    NoStartState,

    #[error("More than one start state: {states:?}")]
    MultipleStartStates { states: Vec<Symbol> },

    #[error("No final state")]
    NoFinalState,

    #[error("More than one final state: {states:?}")]
    MultipleFinalStates { states: Vec<Symbol> },

    #[error("State '{name}' is declared more than once")]
    DuplicateState { name: Symbol },

    #[error("Transition '{from}' -> '{to}' references unknown state '{name}'")]
    UnknownState { from: Symbol, to: Symbol, name: Symbol },

    #[error("Internal transition '{from}' -> '{to}' must not change state")]
    InternalChangesState { from: Symbol, to: Symbol },

    #[error("State '{state}' has {count} unguarded outgoing transitions")]
    AmbiguousUnguarded { state: Symbol, count: usize },
}

/// A state machine definition failed validation.
///
/// Carries every violation found, not just the first.
#[derive(Debug, Error)]
#[error("State machine '{machine}' is invalid: {}", join(.violations))]
pub struct ModelError {
    pub machine: Symbol,
    pub violations: Vec<ModelViolation>,
}

/// Misuse of a machine execution.
///
/// These are programming errors; a blocked or ambiguous transition is not
/// an error but the `InError` condition of the execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Cannot {operation} an execution that is {condition}")]
    InvalidCondition {
        operation: &'static str,
        condition: Condition,
    },

    #[error("Event '{event}' is not declared by state machine '{machine}'")]
    UnknownEvent { machine: Symbol, event: Symbol },
}

fn join(violations: &[ModelViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
