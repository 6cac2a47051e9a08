//! Behavior: executable behavioral models
//!
//! Three engines that run small behavioral models and describe everything
//! they do as a stream of typed history events:
//!
//! - [`fsm`]: event-driven state machines with guards, effects and
//!   entry/do/exit behaviors, and a recoverable error condition
//! - [`markov`]: discrete-time Markov chains walked at random
//! - [`petri`]: place/transition Petri nets fired in nondeterministic rounds
//!
//! Each engine keeps an immutable **model** apart from an **execution**, a
//! run of that model. History goes to a [`reporter::Reporter`], which the
//! engines call synchronously in the order things happen.
//!
//! # Example
//!
//! ```rust
//! use behavior::markov::{ChainExecution, MkChain, Row};
//! use behavior::petri::{NetExecution, PetriNet};
//! use stillwater::validation::Validation;
//!
//! // A chain that always ends in `done`.
//! let Validation::Success(chain) = MkChain::new(vec![
//!     Row::new("start").to("done", 1.0),
//!     Row::new("done"),
//! ]) else {
//!     panic!("rows are valid");
//! };
//! let walk: Vec<_> = ChainExecution::new(chain, "start").unwrap().walk().collect();
//! assert_eq!(walk.len(), 2);
//!
//! // A net moving one token from `in` to `out`.
//! let net = PetriNet::builder("move")
//!     .places(["in", "out"])
//!     .transition("t")
//!     .arc("in", "t", 1)
//!     .arc("t", "out", 1)
//!     .build()?;
//! let mut execution = NetExecution::builder(net).tokens("in", 1).build()?;
//! execution.execute();
//! assert_eq!(execution.token_count("out"), 1);
//! # Ok::<(), behavior::petri::NetError>(())
//! ```

pub mod fsm;
pub mod markov;
pub mod petri;
pub mod reporter;
mod symbol;

pub use symbol::Symbol;
