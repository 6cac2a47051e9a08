//! Place/transition Petri nets.
//!
//! A [`PetriNet`] is validated once by [`NetBuilder::build`]; structural
//! mistakes come back as a [`NetError`] to propagate. A [`NetExecution`]
//! owns the marking and fires transitions against it, reporting every token
//! movement as a [`NetEvent`].
//!
//! # Step semantics
//!
//! [`NetExecution::execute_step`] fires every transition enabled at the start
//! of the round, in shuffled order, each against the marking left by the
//! previous firing. [`NetExecution::execute`] repeats rounds until nothing is
//! enabled.

mod error;
mod execution;
mod net;

pub use error::{NetError, NetViolation};
pub use execution::{Marking, NetEvent, NetEventKind, NetExecution, NetExecutionBuilder, Token};
pub use net::{NetArc, NetBuilder, PetriNet};
