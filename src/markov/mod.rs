//! Discrete-time Markov chains.
//!
//! A chain is a validated transition matrix over symbolic states. Building
//! one is expected to fail on bad input, so [`MkChain::new`] returns a
//! `stillwater` [`Validation`](stillwater::validation::Validation) listing
//! every problem instead of an error to propagate.
//!
//! A [`ChainExecution`] walks the chain one random step at a time. It either
//! keeps its own trace or hands each visited state to a reporter.

mod chain;
mod error;
mod execution;
mod graph;

pub use chain::{MkChain, Row, PROBABILITY_TOLERANCE};
pub use error::ChainError;
pub use execution::{ChainEvent, ChainExecution, ChainTrace, ChainWalk, ExecutionBuilder};
pub use graph::{to_graph_text, Graph};
