//! Petri net errors.

use crate::symbol::Symbol;
use thiserror::Error;

/// A structural problem in a net definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetViolation {
    #[error("Net has no places")]
    NoPlaces,

    #[error("Net has no transitions")]
    NoTransitions,

    #[error("Net has no arcs")]
    NoArcs,

    #[error("Name '{name}' is both a place and a transition")]
    PlaceAndTransition { name: Symbol },

    #[error("Arc endpoint '{name}' is neither a place nor a transition")]
    UnknownEndpoint { name: Symbol },

    #[error("Arc '{from}' -> '{to}' must connect a place and a transition")]
    SameKindEndpoints { from: Symbol, to: Symbol },

    #[error("Inhibitor arc '{from}' -> '{to}' is not allowed in this net")]
    InhibitorNotAllowed { from: Symbol, to: Symbol },
}

/// Errors raised by net construction and execution setup.
///
/// These indicate a mistake in the program building the net, not a runtime
/// condition, and are meant to be propagated.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("Petri net '{net}' is invalid: {}", join(.violations))]
    Invalid {
        net: Symbol,
        violations: Vec<NetViolation>,
    },

    #[error("Place '{place}' is not part of net '{net}'")]
    UnknownPlace { net: Symbol, place: Symbol },

    #[error("Transition '{transition}' is not part of net '{net}'")]
    UnknownTransition { net: Symbol, transition: Symbol },

    #[error("Transition '{transition}' is not enabled")]
    NotEnabled { transition: Symbol },
}

fn join(violations: &[NetViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
