//! State machine definitions.
//!
//! A [`StateMachine`] is built once through [`StateMachineBuilder`], which
//! checks every structural rule and reports all violations together. After
//! that the model is immutable and can be shared by any number of
//! executions.

use crate::fsm::behavior::{self, Always, Behavior, Guard};
use crate::fsm::error::{ModelError, ModelViolation};
use crate::fsm::event::Event;
use crate::fsm::execution::MachineExecution;
use crate::symbol::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Role of a state within its machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Start,
    Normal,
    Final,
}

/// A named state with entry, do and exit behaviors.
///
/// # Example
///
/// ```rust
/// use behavior::fsm::{State, StateKind};
///
/// let idle = State::start("idle").on_entry(|exec: &behavior::fsm::MachineExecution| {
///     assert!(exec.current_state_name().is_some());
/// });
///
/// assert_eq!(idle.name(), "idle");
/// assert_eq!(idle.kind(), StateKind::Start);
/// ```
#[derive(Clone)]
pub struct State {
    name: Symbol,
    kind: StateKind,
    on_entry: Arc<dyn Behavior>,
    on_do: Arc<dyn Behavior>,
    on_exit: Arc<dyn Behavior>,
}

impl State {
    /// A state of the given kind with no-op behaviors.
    pub fn new(name: impl Into<Symbol>, kind: StateKind) -> Self {
        State {
            name: name.into(),
            kind,
            on_entry: behavior::noop(),
            on_do: behavior::noop(),
            on_exit: behavior::noop(),
        }
    }

    /// The machine's initial state.
    pub fn start(name: impl Into<Symbol>) -> Self {
        Self::new(name, StateKind::Start)
    }

    /// An intermediate state.
    pub fn normal(name: impl Into<Symbol>) -> Self {
        Self::new(name, StateKind::Normal)
    }

    /// A state that completes the execution when entered.
    pub fn final_state(name: impl Into<Symbol>) -> Self {
        Self::new(name, StateKind::Final)
    }

    /// Run `behavior` when the state is entered.
    pub fn on_entry<F>(self, behavior: F) -> Self
    where
        F: Fn(&MachineExecution) + Send + Sync + 'static,
    {
        self.entry_behavior(Arc::new(behavior))
    }

    /// Run `behavior` after entry, while the state is current.
    pub fn on_do<F>(self, behavior: F) -> Self
    where
        F: Fn(&MachineExecution) + Send + Sync + 'static,
    {
        self.do_behavior(Arc::new(behavior))
    }

    /// Run `behavior` when the state is left by an external transition.
    pub fn on_exit<F>(self, behavior: F) -> Self
    where
        F: Fn(&MachineExecution) + Send + Sync + 'static,
    {
        self.exit_behavior(Arc::new(behavior))
    }

    /// Like [`State::on_entry`] for an already shared behavior.
    pub fn entry_behavior(mut self, behavior: Arc<dyn Behavior>) -> Self {
        self.on_entry = behavior;
        self
    }

    /// Like [`State::on_do`] for an already shared behavior.
    pub fn do_behavior(mut self, behavior: Arc<dyn Behavior>) -> Self {
        self.on_do = behavior;
        self
    }

    /// Like [`State::on_exit`] for an already shared behavior.
    pub fn exit_behavior(mut self, behavior: Arc<dyn Behavior>) -> Self {
        self.on_exit = behavior;
        self
    }

    /// The state's name, unique within its machine.
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Start, normal or final.
    pub fn kind(&self) -> StateKind {
        self.kind
    }

    /// Whether entering this state completes the execution.
    pub fn is_final(&self) -> bool {
        self.kind == StateKind::Final
    }

    pub(crate) fn enter(&self, execution: &MachineExecution) {
        self.on_entry.run(execution)
    }

    pub(crate) fn run(&self, execution: &MachineExecution) {
        self.on_do.run(execution)
    }

    pub(crate) fn exit(&self, execution: &MachineExecution) {
        self.on_exit.run(execution)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A transition between two states.
///
/// A transition with a trigger fires when that event is handled; any
/// transition may also be taken by completing its source state. An
/// internal transition runs its effect without leaving the state.
///
/// # Example
///
/// ```rust
/// use behavior::fsm::Transition;
///
/// let open = Transition::new("closed", "open").on("push");
/// let hum = Transition::new("open", "open").internal().on("tick");
///
/// assert_eq!(open.trigger().map(|t| t.as_str()), Some("push"));
/// assert!(!open.is_guarded());
/// assert!(hum.is_internal());
/// ```
#[derive(Clone)]
pub struct Transition {
    source: Symbol,
    target: Symbol,
    internal: bool,
    trigger: Option<Symbol>,
    guard: Option<Arc<dyn Guard>>,
    effect: Arc<dyn Behavior>,
}

impl Transition {
    /// An unguarded, untriggered transition from `source` to `target`.
    pub fn new(source: impl Into<Symbol>, target: impl Into<Symbol>) -> Self {
        Transition {
            source: source.into(),
            target: target.into(),
            internal: false,
            trigger: None,
            guard: None,
            effect: behavior::noop(),
        }
    }

    /// Fire on `event`.
    pub fn on(mut self, event: impl Into<Symbol>) -> Self {
        self.trigger = Some(event.into());
        self
    }

    /// Stay in the source state: no exit or entry behaviors run.
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Only fire when `guard` passes.
    pub fn guard<F>(self, guard: F) -> Self
    where
        F: Fn(&MachineExecution, Option<&Event>) -> bool + Send + Sync + 'static,
    {
        self.guarded_by(Arc::new(guard))
    }

    /// Like [`Transition::guard`] for an already shared guard.
    pub fn guarded_by(mut self, guard: Arc<dyn Guard>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Run `effect` when the transition fires, between exit and entry.
    pub fn effect<F>(self, effect: F) -> Self
    where
        F: Fn(&MachineExecution) + Send + Sync + 'static,
    {
        self.effect_behavior(Arc::new(effect))
    }

    /// Like [`Transition::effect`] for an already shared behavior.
    pub fn effect_behavior(mut self, effect: Arc<dyn Behavior>) -> Self {
        self.effect = effect;
        self
    }

    /// State the transition leaves.
    pub fn source(&self) -> &Symbol {
        &self.source
    }

    /// State the transition enters.
    pub fn target(&self) -> &Symbol {
        &self.target
    }

    /// Event kind that fires the transition, if any.
    pub fn trigger(&self) -> Option<&Symbol> {
        self.trigger.as_ref()
    }

    /// Whether the transition skips exit and entry behaviors.
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    /// Whether a guard was attached.
    pub fn is_guarded(&self) -> bool {
        self.guard.is_some()
    }

    /// Evaluate the guard; unguarded transitions always pass.
    pub fn is_enabled(&self, execution: &MachineExecution, event: Option<&Event>) -> bool {
        match &self.guard {
            Some(guard) => guard.evaluate(execution, event),
            None => Always.evaluate(execution, event),
        }
    }

    pub(crate) fn apply_effect(&self, execution: &MachineExecution) {
        self.effect.run(execution)
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("internal", &self.internal)
            .field("trigger", &self.trigger)
            .field("guarded", &self.is_guarded())
            .finish_non_exhaustive()
    }
}

/// A validated state machine model.
#[derive(Clone, Debug)]
pub struct StateMachine {
    name: Symbol,
    states: Vec<State>,
    state_index: HashMap<Symbol, usize>,
    start: usize,
    event_index: HashMap<Symbol, Vec<Transition>>,
    transition_index: HashMap<Symbol, Vec<Transition>>,
    additional_events: Vec<Symbol>,
}

impl StateMachine {
    /// Start defining a machine named `name`.
    pub fn builder(name: impl Into<Symbol>) -> StateMachineBuilder {
        StateMachineBuilder::new(name)
    }

    /// The machine's name.
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// States in declaration order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Look up a state by name.
    pub fn state(&self, name: &str) -> Option<&State> {
        self.state_index.get(name).map(|&i| &self.states[i])
    }

    /// The single start state.
    pub fn start_state(&self) -> &State {
        &self.states[self.start]
    }

    /// Transitions leaving `state`, in declaration order.
    pub fn transitions_from(&self, state: &str) -> &[Transition] {
        self.transition_index
            .get(state)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Transitions triggered by `event`, in declaration order.
    pub fn transitions_on(&self, event: &str) -> &[Transition] {
        self.event_index.get(event).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every event this machine accepts: all triggers plus the additional
    /// events, sorted.
    pub fn events(&self) -> Vec<Symbol> {
        let mut events: Vec<Symbol> = self
            .event_index
            .keys()
            .chain(self.additional_events.iter())
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        events.sort();
        events
    }

    /// Whether `event` is in [`StateMachine::events`].
    pub fn declares_event(&self, event: &str) -> bool {
        self.event_index.contains_key(event)
            || self.additional_events.iter().any(|known| known == event)
    }
}

/// Fluent construction of a [`StateMachine`].
///
/// # Example
///
/// ```rust
/// use behavior::fsm::{State, StateMachine, Transition};
///
/// let model = StateMachine::builder("doorbell")
///     .state(State::start("hello"))
///     .state(State::final_state("goodbye"))
///     .transition(Transition::new("hello", "goodbye").on("wake"))
///     .additional_event("sleep")
///     .build()
///     .expect("model is valid");
///
/// assert!(model.declares_event("wake"));
/// assert!(model.declares_event("sleep"));
/// assert!(!model.declares_event("dance"));
/// ```
pub struct StateMachineBuilder {
    name: Symbol,
    states: Vec<State>,
    transitions: Vec<Transition>,
    additional_events: Vec<Symbol>,
}

impl StateMachineBuilder {
    /// An empty definition named `name`.
    pub fn new(name: impl Into<Symbol>) -> Self {
        StateMachineBuilder {
            name: name.into(),
            states: Vec::new(),
            transitions: Vec::new(),
            additional_events: Vec::new(),
        }
    }

    /// Add a state.
    pub fn state(mut self, state: State) -> Self {
        self.states.push(state);
        self
    }

    /// Add several states in order.
    pub fn states(mut self, states: impl IntoIterator<Item = State>) -> Self {
        self.states.extend(states);
        self
    }

    /// Add a transition.
    pub fn transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Add several transitions in order.
    pub fn transitions(mut self, transitions: impl IntoIterator<Item = Transition>) -> Self {
        self.transitions.extend(transitions);
        self
    }

    /// Declare an event no transition is triggered by. Handling it is
    /// legal and simply ignored.
    pub fn additional_event(mut self, event: impl Into<Symbol>) -> Self {
        self.additional_events.push(event.into());
        self
    }

    /// Declare several events at once.
    pub fn additional_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        self.additional_events
            .extend(events.into_iter().map(Into::into));
        self
    }

    /// Validate the definition and build the model.
    pub fn build(self) -> Result<StateMachine, ModelError> {
        let mut checks: Vec<Validation<(), NonEmptyVec<ModelViolation>>> = Vec::new();

        let mut state_index = HashMap::new();
        for (position, state) in self.states.iter().enumerate() {
            if state_index.insert(state.name.clone(), position).is_some() {
                checks.push(Validation::fail(ModelViolation::DuplicateState {
                    name: state.name.clone(),
                }));
            }
        }

        checks.push(exactly_one(
            &self.states,
            StateKind::Start,
            ModelViolation::NoStartState,
            |states| ModelViolation::MultipleStartStates { states },
        ));
        checks.push(exactly_one(
            &self.states,
            StateKind::Final,
            ModelViolation::NoFinalState,
            |states| ModelViolation::MultipleFinalStates { states },
        ));

        for transition in &self.transitions {
            checks.extend(check_transition(transition, &state_index));
        }
        checks.extend(check_unguarded(&self.transitions));

        if let Validation::Failure(errors) = Validation::all_vec(checks) {
            return Err(ModelError {
                machine: self.name,
                violations: errors.iter().cloned().collect(),
            });
        }

        let start = self
            .states
            .iter()
            .position(|state| state.kind == StateKind::Start)
            .unwrap_or_default();

        let mut event_index: HashMap<Symbol, Vec<Transition>> = HashMap::new();
        let mut transition_index: HashMap<Symbol, Vec<Transition>> = HashMap::new();
        for transition in self.transitions {
            if let Some(trigger) = &transition.trigger {
                event_index
                    .entry(trigger.clone())
                    .or_default()
                    .push(transition.clone());
            }
            transition_index
                .entry(transition.source.clone())
                .or_default()
                .push(transition);
        }

        tracing::debug!(
            machine = %self.name,
            states = self.states.len(),
            events = event_index.len() + self.additional_events.len(),
            "built state machine"
        );

        Ok(StateMachine {
            name: self.name,
            states: self.states,
            state_index,
            start,
            event_index,
            transition_index,
            additional_events: self.additional_events,
        })
    }
}

fn exactly_one(
    states: &[State],
    kind: StateKind,
    none: ModelViolation,
    many: impl FnOnce(Vec<Symbol>) -> ModelViolation,
) -> Validation<(), NonEmptyVec<ModelViolation>> {
    let matching: Vec<Symbol> = states
        .iter()
        .filter(|state| state.kind == kind)
        .map(|state| state.name.clone())
        .collect();
    match matching.len() {
        1 => Validation::success(()),
        0 => Validation::fail(none),
        _ => Validation::fail(many(matching)),
    }
}

fn check_transition(
    transition: &Transition,
    states: &HashMap<Symbol, usize>,
) -> Vec<Validation<(), NonEmptyVec<ModelViolation>>> {
    let mut checks = Vec::new();

    let mut endpoints = vec![&transition.source];
    if transition.target != transition.source {
        endpoints.push(&transition.target);
    }
    for name in endpoints {
        if !states.contains_key(name) {
            checks.push(Validation::fail(ModelViolation::UnknownState {
                from: transition.source.clone(),
                to: transition.target.clone(),
                name: name.clone(),
            }));
        }
    }

    if transition.internal && transition.source != transition.target {
        checks.push(Validation::fail(ModelViolation::InternalChangesState {
            from: transition.source.clone(),
            to: transition.target.clone(),
        }));
    }

    checks
}

fn check_unguarded(transitions: &[Transition]) -> Vec<Validation<(), NonEmptyVec<ModelViolation>>> {
    let mut unguarded: Vec<(&Symbol, usize)> = Vec::new();
    for transition in transitions.iter().filter(|t| !t.is_guarded()) {
        match unguarded.iter_mut().find(|(state, _)| *state == &transition.source) {
            Some((_, count)) => *count += 1,
            None => unguarded.push((&transition.source, 1)),
        }
    }

    unguarded
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(state, count)| {
            Validation::fail(ModelViolation::AmbiguousUnguarded {
                state: state.clone(),
                count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violations(builder: StateMachineBuilder) -> Vec<ModelViolation> {
        match builder.build() {
            Err(error) => error.violations,
            Ok(_) => panic!("expected an invalid model"),
        }
    }

    fn minimal() -> StateMachineBuilder {
        StateMachine::builder("minimal")
            .state(State::start("a"))
            .state(State::final_state("z"))
    }

    #[test]
    fn builds_valid_model_with_indexes() {
        let model = minimal()
            .state(State::normal("m"))
            .transition(Transition::new("a", "m").on("go"))
            .transition(Transition::new("m", "z").on("go"))
            .additional_event("noise")
            .build()
            .unwrap();

        assert_eq!(model.name(), "minimal");
        assert_eq!(model.start_state().name(), "a");
        assert_eq!(model.transitions_on("go").len(), 2);
        assert_eq!(model.transitions_from("a").len(), 1);
        assert!(model.transitions_from("z").is_empty());
        assert_eq!(
            model.events(),
            vec![Symbol::from("go"), Symbol::from("noise")]
        );
    }

    #[test]
    fn rejects_missing_start_state() {
        let found = violations(
            StateMachine::builder("m")
                .state(State::normal("a"))
                .state(State::final_state("z")),
        );
        assert_eq!(found, vec![ModelViolation::NoStartState]);
    }

    #[test]
    fn rejects_two_start_states() {
        let found = violations(minimal().state(State::start("b")));
        assert_eq!(
            found,
            vec![ModelViolation::MultipleStartStates {
                states: vec!["a".into(), "b".into()]
            }]
        );
    }

    #[test]
    fn rejects_missing_final_state() {
        let found = violations(StateMachine::builder("m").state(State::start("a")));
        assert_eq!(found, vec![ModelViolation::NoFinalState]);
    }

    #[test]
    fn rejects_two_final_states() {
        let found = violations(minimal().state(State::final_state("y")));
        assert_eq!(
            found,
            vec![ModelViolation::MultipleFinalStates {
                states: vec!["z".into(), "y".into()]
            }]
        );
    }

    #[test]
    fn rejects_transition_to_undeclared_state() {
        let found = violations(minimal().transition(Transition::new("a", "nowhere")));
        assert_eq!(
            found,
            vec![ModelViolation::UnknownState {
                from: "a".into(),
                to: "nowhere".into(),
                name: "nowhere".into()
            }]
        );
    }

    #[test]
    fn rejects_internal_transition_changing_state() {
        let found = violations(minimal().transition(Transition::new("a", "z").internal()));
        assert_eq!(
            found,
            vec![ModelViolation::InternalChangesState {
                from: "a".into(),
                to: "z".into()
            }]
        );
    }

    #[test]
    fn rejects_two_unguarded_transitions_from_one_state() {
        let found = violations(
            minimal()
                .transition(Transition::new("a", "z").on("x"))
                .transition(Transition::new("a", "a").on("y")),
        );
        assert_eq!(
            found,
            vec![ModelViolation::AmbiguousUnguarded {
                state: "a".into(),
                count: 2
            }]
        );
    }

    #[test]
    fn guarded_alternatives_are_accepted() {
        let model = minimal()
            .transition(Transition::new("a", "z").on("x"))
            .transition(Transition::new("a", "a").on("y").guard(|_, _| true))
            .build();
        assert!(model.is_ok());
    }

    #[test]
    fn rejects_duplicate_state_names() {
        let found = violations(minimal().state(State::normal("a")));
        assert!(found.contains(&ModelViolation::DuplicateState { name: "a".into() }));
    }

    #[test]
    fn reports_all_violations_at_once() {
        let error = StateMachine::builder("broken")
            .state(State::normal("a"))
            .transition(Transition::new("a", "b").internal())
            .build()
            .unwrap_err();

        assert!(error.violations.contains(&ModelViolation::NoStartState));
        assert!(error.violations.contains(&ModelViolation::NoFinalState));
        assert!(error
            .violations
            .iter()
            .any(|v| matches!(v, ModelViolation::UnknownState { .. })));
        assert!(error
            .violations
            .iter()
            .any(|v| matches!(v, ModelViolation::InternalChangesState { .. })));
        let message = error.to_string();
        assert!(message.starts_with("State machine 'broken' is invalid"));
        assert!(message.contains("No start state"));
        assert!(message.contains("No final state"));
    }
}
