//! Event-driven finite state machines.
//!
//! A [`StateMachine`] declares states, transitions between them, and the
//! events it accepts. Building it checks the structure once: exactly one
//! start and one final state, transitions between declared states, internal
//! transitions that stay put, and at most one unguarded transition leaving
//! any state. A broken definition is a [`ModelError`].
//!
//! A [`MachineExecution`] runs a model. It moves through [`Condition`]s:
//!
//! ```text
//! Created --start--> Active <--> InError
//!                      |            |
//!                      v            v
//!                       Completed
//! ```
//!
//! When an event finds no transition it is ignored. When guards refuse every
//! candidate, or pass more than one, the execution is `InError` and stays
//! where it is until a later event or completion resolves exactly one
//! transition.
//!
//! # Example
//!
//! ```rust
//! use behavior::fsm::{MachineEvent, MachineExecution, State, StateMachine, Transition};
//! use behavior::reporter::BufferingReporter;
//! use std::sync::Arc;
//!
//! let model = StateMachine::builder("turnstile")
//!     .state(State::start("locked"))
//!     .state(State::normal("unlocked"))
//!     .state(State::final_state("broken"))
//!     .transition(Transition::new("locked", "unlocked").on("coin"))
//!     .transition(Transition::new("unlocked", "locked").on("push"))
//!     .transition(Transition::new("locked", "broken").on("kick").guard(|_, _| true))
//!     .build()?;
//!
//! let history = Arc::new(BufferingReporter::<MachineEvent>::new());
//! let execution = MachineExecution::with_reporter(model, history.clone())
//!     .start()?
//!     .handle_event("coin")?
//!     .handle_event("push")?;
//!
//! assert_eq!(execution.current_state_name().map(|s| s.as_str()), Some("locked"));
//! assert!(execution.is_active());
//! assert!(!history.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod behavior;
mod error;
mod event;
mod execution;
mod model;

pub use behavior::{Always, Behavior, Guard, Noop};
pub use error::{ExecutionError, ModelError, ModelViolation};
pub use event::{Event, MachineEvent, MachineEventKind, TransitionSummary};
pub use execution::{Condition, MachineExecution};
pub use model::{State, StateKind, StateMachine, StateMachineBuilder, Transition};
