//! Random walks over a chain.

use crate::markov::chain::MkChain;
use crate::reporter::{HistoryEvent, SharedReporter};
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

/// A state visited by a chain execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub timestamp: DateTime<Utc>,
    /// Number of steps taken when the state was entered; the start state is
    /// step 0.
    pub step: usize,
    pub state: Symbol,
}

impl fmt::Display for ChainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {}: {}", self.step, self.state)
    }
}

impl HistoryEvent for ChainEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug)]
struct TraceNode {
    state: Symbol,
    previous: Option<Arc<TraceNode>>,
}

/// Ordered record of visited states.
///
/// Recording returns a new trace that shares every earlier entry with the
/// one it was recorded on, so older executions keep their own view.
#[derive(Clone, Debug, Default)]
pub struct ChainTrace {
    last: Option<Arc<TraceNode>>,
    len: usize,
}

impl ChainTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visited state, returning a new trace.
    pub fn record(&self, state: Symbol) -> Self {
        ChainTrace {
            last: Some(Arc::new(TraceNode {
                state,
                previous: self.last.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// Visited states, oldest first.
    pub fn states(&self) -> Vec<Symbol> {
        let mut states = Vec::with_capacity(self.len);
        let mut node = self.last.as_deref();
        while let Some(current) = node {
            states.push(current.state.clone());
            node = current.previous.as_deref();
        }
        states.reverse();
        states
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Where an execution keeps its history.
#[derive(Clone)]
enum Memory {
    /// The execution records every visited state itself.
    Trace(ChainTrace),
    /// Visited states go to the reporter; only the current one is kept.
    Reporter(SharedReporter<ChainEvent>),
}

/// A point-in-time random walk over a chain.
///
/// Executions are values: [`step`](Self::step) and
/// [`execute`](Self::execute) return a new execution and leave the receiver
/// untouched. The random number generator is part of the value, so stepping
/// the same execution twice yields the same successor.
///
/// # Example
///
/// ```rust
/// use behavior::markov::{ChainExecution, MkChain, Row};
/// use behavior::Symbol;
/// use stillwater::validation::Validation;
///
/// let Validation::Success(chain) = MkChain::new(vec![
///     Row::new("a").to("b", 1.0),
///     Row::new("b").to("c", 1.0),
///     Row::new("c"),
/// ]) else {
///     panic!("rows are valid");
/// };
///
/// let execution = ChainExecution::new(chain, "a").expect("a is a state");
/// let finished = execution.execute(10);
///
/// assert_eq!(finished.current(), "c");
/// assert!(finished.is_done());
/// assert_eq!(finished.trace(), vec![Symbol::from("a"), Symbol::from("b"), Symbol::from("c")]);
/// ```
#[derive(Clone)]
pub struct ChainExecution {
    chain: Arc<MkChain>,
    current: Symbol,
    memory: Memory,
    rng: ChaCha8Rng,
    steps: usize,
    done: bool,
}

impl fmt::Debug for ChainExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainExecution")
            .field("current", &self.current)
            .field("steps", &self.steps)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Options for starting a chain execution.
pub struct ExecutionBuilder {
    chain: Arc<MkChain>,
    start: Symbol,
    reporter: Option<SharedReporter<ChainEvent>>,
    seed: Option<u64>,
}

impl ExecutionBuilder {
    /// Send visited states to `reporter` instead of keeping a trace.
    pub fn reporter(mut self, reporter: SharedReporter<ChainEvent>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Seed the random walk for reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Start the execution, or return `None` if the start state is not part
    /// of the chain.
    pub fn build(self) -> Option<ChainExecution> {
        if !self.chain.contains(self.start.as_str()) {
            tracing::debug!(start = %self.start, "start state is not in the chain");
            return None;
        }

        let rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let memory = match self.reporter {
            Some(reporter) => Memory::Reporter(reporter),
            None => Memory::Trace(ChainTrace::new()),
        };
        let done = self.chain.is_absorbing(self.start.as_str());

        let execution = ChainExecution {
            chain: self.chain,
            current: self.start.clone(),
            memory,
            rng,
            steps: 0,
            done,
        };
        Some(execution.visit(self.start))
    }
}

impl ChainExecution {
    /// Begin configuring an execution of `chain` starting at `start`.
    pub fn builder(chain: impl Into<Arc<MkChain>>, start: impl Into<Symbol>) -> ExecutionBuilder {
        ExecutionBuilder {
            chain: chain.into(),
            start: start.into(),
            reporter: None,
            seed: None,
        }
    }

    /// Start an execution that keeps its own trace.
    pub fn new(chain: impl Into<Arc<MkChain>>, start: impl Into<Symbol>) -> Option<Self> {
        Self::builder(chain, start).build()
    }

    /// Start an execution that reports visited states to `reporter`.
    pub fn with_reporter(
        chain: impl Into<Arc<MkChain>>,
        start: impl Into<Symbol>,
        reporter: SharedReporter<ChainEvent>,
    ) -> Option<Self> {
        Self::builder(chain, start).reporter(reporter).build()
    }

    pub fn chain(&self) -> &MkChain {
        &self.chain
    }

    pub fn current(&self) -> &Symbol {
        &self.current
    }

    /// True once an absorbing state has been reached.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of steps that moved the execution.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Visited states, oldest first.
    ///
    /// An execution with a reporter only remembers its current state.
    pub fn trace(&self) -> Vec<Symbol> {
        match &self.memory {
            Memory::Trace(trace) => trace.states(),
            Memory::Reporter(_) => vec![self.current.clone()],
        }
    }

    /// Take one step. A finished execution is returned unchanged.
    pub fn step(&self) -> Self {
        if self.done {
            return self.clone();
        }

        let mut rng = self.rng.clone();
        let draw: f64 = rng.gen();
        let Some(next) = self.chain.select(self.current.as_str(), draw).cloned() else {
            let mut finished = self.clone();
            finished.done = true;
            return finished;
        };
        tracing::trace!(from = %self.current, to = %next, draw, "chain step");

        let moved = ChainExecution {
            chain: Arc::clone(&self.chain),
            current: next.clone(),
            memory: self.memory.clone(),
            rng,
            steps: self.steps + 1,
            done: self.chain.is_absorbing(next.as_str()),
        };
        moved.visit(next)
    }

    /// Take up to `steps` steps, stopping early once done.
    pub fn execute(&self, steps: usize) -> Self {
        let mut execution = self.clone();
        for _ in 0..steps {
            if execution.done {
                break;
            }
            execution = execution.step();
        }
        execution
    }

    /// Lazily walk the chain, one visited state per item.
    pub fn walk(self) -> ChainWalk {
        ChainWalk {
            execution: Some(self),
            started: false,
        }
    }

    fn visit(mut self, state: Symbol) -> Self {
        match &self.memory {
            Memory::Trace(trace) => self.memory = Memory::Trace(trace.record(state)),
            Memory::Reporter(reporter) => reporter.report(ChainEvent {
                timestamp: Utc::now(),
                step: self.steps,
                state,
            }),
        }
        self
    }
}

/// Pull-based walk over a chain execution.
///
/// Yields the start state first, then each state the walk moves to. The
/// sequence ends after an absorbing state has been yielded; a chain without
/// a reachable absorbing state walks forever. Once exhausted it stays
/// exhausted.
pub struct ChainWalk {
    execution: Option<ChainExecution>,
    started: bool,
}

impl ChainWalk {
    /// The execution as of the last yielded state, if not yet exhausted.
    pub fn execution(&self) -> Option<&ChainExecution> {
        self.execution.as_ref()
    }
}

impl Iterator for ChainWalk {
    type Item = Symbol;

    fn next(&mut self) -> Option<Symbol> {
        let execution = self.execution.as_ref()?;
        if !self.started {
            self.started = true;
            return Some(execution.current.clone());
        }
        if execution.done {
            self.execution = None;
            return None;
        }

        let next = execution.step();
        let state = next.current.clone();
        self.execution = Some(next);
        Some(state)
    }
}

impl FusedIterator for ChainWalk {}
