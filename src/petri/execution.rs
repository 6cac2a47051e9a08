//! Running a net: markings, firing and step rounds.

use crate::petri::error::NetError;
use crate::petri::net::PetriNet;
use crate::reporter::{self, HistoryEvent, SharedReporter};
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// An individual token held by a place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(Uuid);

impl Token {
    pub fn new() -> Self {
        Token(Uuid::new_v4())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::new()
    }
}

/// Distribution of tokens over the places of a net.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Marking {
    tokens: HashMap<Symbol, Vec<Token>>,
}

impl Marking {
    /// Number of tokens at `place`; unknown places hold none.
    pub fn count(&self, place: &str) -> usize {
        self.tokens.get(place).map_or(0, Vec::len)
    }

    /// Tokens at `place`, oldest first.
    pub fn tokens(&self, place: &str) -> &[Token] {
        self.tokens.get(place).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Token count of every place, ordered by place name.
    pub fn counts(&self) -> BTreeMap<Symbol, usize> {
        self.tokens
            .iter()
            .map(|(place, tokens)| (place.clone(), tokens.len()))
            .collect()
    }

    /// Total number of tokens in the net.
    pub fn total(&self) -> usize {
        self.tokens.values().map(Vec::len).sum()
    }

    fn add(&mut self, place: &Symbol, tokens: &[Token]) {
        self.tokens
            .entry(place.clone())
            .or_default()
            .extend_from_slice(tokens);
    }

    fn remove(&mut self, place: &Symbol, count: usize) -> Vec<Token> {
        match self.tokens.get_mut(place) {
            Some(held) => {
                let count = count.min(held.len());
                held.drain(..count).collect()
            }
            None => Vec::new(),
        }
    }
}

/// What happened during a firing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetEventKind {
    /// An input place gave up tokens to a firing transition.
    Emits { place: Symbol, tokens: Vec<Token> },
    /// A transition fired.
    Firing { transition: Symbol },
    /// An output place received fresh tokens from a firing transition.
    Consumes { place: Symbol, tokens: Vec<Token> },
}

/// History event of a net execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetEvent {
    pub timestamp: DateTime<Utc>,
    pub net: Symbol,
    #[serde(flatten)]
    pub kind: NetEventKind,
}

impl fmt::Display for NetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NetEventKind::Emits { place, tokens } => {
                write!(f, "{}: place {} emits {} token(s)", self.net, place, tokens.len())
            }
            NetEventKind::Firing { transition } => {
                write!(f, "{}: transition {} firing", self.net, transition)
            }
            NetEventKind::Consumes { place, tokens } => {
                write!(f, "{}: place {} consumes {} token(s)", self.net, place, tokens.len())
            }
        }
    }
}

impl HistoryEvent for NetEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Options for starting a net execution.
pub struct NetExecutionBuilder {
    net: Arc<PetriNet>,
    initial: Vec<(Symbol, usize)>,
    reporter: Option<SharedReporter<NetEvent>>,
    seed: Option<u64>,
}

impl NetExecutionBuilder {
    /// Put `count` fresh tokens at `place`.
    pub fn tokens(mut self, place: impl Into<Symbol>, count: usize) -> Self {
        self.initial.push((place.into(), count));
        self
    }

    /// Set the initial marking from `(place, count)` pairs.
    pub fn marking<I, S>(mut self, marking: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<Symbol>,
    {
        self.initial
            .extend(marking.into_iter().map(|(place, count)| (place.into(), count)));
        self
    }

    pub fn reporter(mut self, reporter: SharedReporter<NetEvent>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Seed the order in which enabled transitions fire.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Create the execution. Fails if the marking names an unknown place.
    pub fn build(self) -> Result<NetExecution, NetError> {
        let mut marking = Marking::default();
        for place in self.net.places() {
            marking.tokens.insert(place.clone(), Vec::new());
        }
        for (place, count) in self.initial {
            if !self.net.has_place(place.as_str()) {
                return Err(NetError::UnknownPlace {
                    net: self.net.name().clone(),
                    place,
                });
            }
            let fresh: Vec<Token> = (0..count).map(|_| Token::new()).collect();
            marking.add(&place, &fresh);
        }

        let rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(NetExecution {
            net: self.net,
            marking,
            reporter: self.reporter.unwrap_or_else(reporter::discard),
            rng,
            steps: 0,
        })
    }
}

/// A run of a net.
///
/// The execution exclusively owns its marking and mutates it in place; run
/// separate executions over a shared net to simulate in parallel.
///
/// # Example
///
/// ```rust
/// use behavior::petri::{NetExecution, PetriNet};
///
/// let net = PetriNet::builder("move")
///     .places(["a", "b"])
///     .transition("t")
///     .arc("a", "t", 1)
///     .arc("t", "b", 1)
///     .build()?;
///
/// let mut execution = NetExecution::builder(net).tokens("a", 1).build()?;
/// execution.execute();
///
/// assert_eq!(execution.token_count("a"), 0);
/// assert_eq!(execution.token_count("b"), 1);
/// assert!(execution.is_complete());
/// # Ok::<(), behavior::petri::NetError>(())
/// ```
pub struct NetExecution {
    net: Arc<PetriNet>,
    marking: Marking,
    reporter: SharedReporter<NetEvent>,
    rng: ChaCha8Rng,
    steps: usize,
}

impl fmt::Debug for NetExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetExecution")
            .field("net", self.net.name())
            .field("marking", &self.marking.counts())
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl NetExecution {
    pub fn builder(net: impl Into<Arc<PetriNet>>) -> NetExecutionBuilder {
        NetExecutionBuilder {
            net: net.into(),
            initial: Vec::new(),
            reporter: None,
            seed: None,
        }
    }

    pub fn net(&self) -> &PetriNet {
        &self.net
    }

    pub fn marking(&self) -> &Marking {
        &self.marking
    }

    pub fn token_count(&self, place: &str) -> usize {
        self.marking.count(place)
    }

    pub fn tokens(&self, place: &str) -> &[Token] {
        self.marking.tokens(place)
    }

    /// Number of step rounds run so far.
    pub fn step_count(&self) -> usize {
        self.steps
    }

    /// Transitions enabled under the current marking, in definition order.
    pub fn enabled(&self) -> Vec<Symbol> {
        self.net.enabled(&self.marking)
    }

    /// True when no transition is enabled.
    pub fn is_complete(&self) -> bool {
        self.enabled().is_empty()
    }

    /// Fire one specific transition.
    pub fn fire(&mut self, transition: &str) -> Result<(), NetError> {
        if !self.net.has_transition(transition) {
            return Err(NetError::UnknownTransition {
                net: self.net.name().clone(),
                transition: transition.into(),
            });
        }
        if !self.net.is_enabled(transition, &self.marking) {
            return Err(NetError::NotEnabled {
                transition: transition.into(),
            });
        }
        self.fire_enabled(&Symbol::from(transition));
        Ok(())
    }

    /// Fire every currently enabled transition once, in random order.
    ///
    /// Each firing sees the marking left by the ones before it. A transition
    /// that an earlier firing in the same round disabled is skipped.
    /// Returns the transitions that fired, in firing order.
    pub fn execute_step(&mut self) -> Vec<Symbol> {
        let mut candidates = self.enabled();
        candidates.shuffle(&mut self.rng);

        let mut fired = Vec::with_capacity(candidates.len());
        for transition in candidates {
            if self.net.is_enabled(transition.as_str(), &self.marking) {
                self.fire_enabled(&transition);
                fired.push(transition);
            } else {
                tracing::debug!(
                    net = %self.net.name(),
                    %transition,
                    "transition disabled earlier in this step"
                );
            }
        }
        self.steps += 1;
        fired
    }

    /// Run step rounds until no transition is enabled.
    ///
    /// A net with an input-less transition never completes; use
    /// [`execute_bounded`](Self::execute_bounded) for such nets.
    pub fn execute(&mut self) {
        while !self.is_complete() {
            self.execute_step();
        }
    }

    /// Run at most `max_steps` step rounds. Returns whether the net
    /// completed.
    pub fn execute_bounded(&mut self, max_steps: usize) -> bool {
        for _ in 0..max_steps {
            if self.is_complete() {
                return true;
            }
            self.execute_step();
        }
        self.is_complete()
    }

    fn fire_enabled(&mut self, transition: &Symbol) {
        let net = Arc::clone(&self.net);
        tracing::trace!(net = %net.name(), %transition, "firing");

        for arc in net.inputs(transition.as_str()) {
            let tokens = self.marking.remove(&arc.source, arc.multiplicity as usize);
            self.report(NetEventKind::Emits {
                place: arc.source.clone(),
                tokens,
            });
        }

        self.report(NetEventKind::Firing {
            transition: transition.clone(),
        });

        for arc in net.outputs(transition.as_str()) {
            let tokens: Vec<Token> = (0..arc.multiplicity).map(|_| Token::new()).collect();
            self.marking.add(&arc.target, &tokens);
            self.report(NetEventKind::Consumes {
                place: arc.target.clone(),
                tokens,
            });
        }
    }

    fn report(&self, kind: NetEventKind) {
        self.reporter.report(NetEvent {
            timestamp: Utc::now(),
            net: self.net.name().clone(),
            kind,
        });
    }
}
