//! Running a state machine.

use crate::fsm::error::ExecutionError;
use crate::fsm::event::{Event, MachineEvent, MachineEventKind, TransitionSummary};
use crate::fsm::model::{State, StateMachine, Transition};
use crate::reporter::{self, SharedReporter};
use crate::symbol::Symbol;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lifecycle of a machine execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    /// Built but not started.
    Created,
    /// Started and accepting events.
    Active,
    /// The last resolution was blocked or ambiguous. Events are still
    /// accepted; resolving exactly one transition makes the execution
    /// active again.
    InError,
    /// Reached a final state or a state without outgoing transitions.
    Completed,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Created => "created",
            Condition::Active => "active",
            Condition::InError => "in-error",
            Condition::Completed => "completed",
        }
    }

    fn accepts_events(&self) -> bool {
        matches!(self, Condition::Active | Condition::InError)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single run of a [`StateMachine`].
///
/// Executions are values. [`start`](Self::start),
/// [`handle_event`](Self::handle_event) and
/// [`complete_current_state`](Self::complete_current_state) return the
/// execution that results and leave the receiver as it was, so an earlier
/// execution can be kept and resumed. Every action along the way is reported
/// as a [`MachineEvent`].
///
/// # Example
///
/// ```rust
/// use behavior::fsm::{Condition, MachineExecution, State, StateMachine, Transition};
///
/// let model = StateMachine::builder("greeter")
///     .state(State::start("hello"))
///     .state(State::final_state("goodbye"))
///     .transition(Transition::new("hello", "goodbye").on("wake"))
///     .additional_event("sleep")
///     .build()?;
///
/// let execution = MachineExecution::new(model).start()?;
/// let still_here = execution.handle_event("sleep")?;
/// assert_eq!(still_here.condition(), Condition::Active);
///
/// let done = still_here.handle_event("wake")?;
/// assert_eq!(done.current_state_name().map(|s| s.as_str()), Some("goodbye"));
/// assert!(done.is_complete());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct MachineExecution {
    model: Arc<StateMachine>,
    condition: Condition,
    current: Option<Symbol>,
    reporter: SharedReporter<MachineEvent>,
}

impl fmt::Debug for MachineExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineExecution")
            .field("machine", self.model.name())
            .field("condition", &self.condition)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl MachineExecution {
    /// Create an execution whose history is discarded.
    pub fn new(model: impl Into<Arc<StateMachine>>) -> Self {
        Self::with_reporter(model, reporter::discard())
    }

    pub fn with_reporter(
        model: impl Into<Arc<StateMachine>>,
        reporter: SharedReporter<MachineEvent>,
    ) -> Self {
        MachineExecution {
            model: model.into(),
            condition: Condition::Created,
            current: None,
            reporter,
        }
    }

    pub fn model(&self) -> &StateMachine {
        &self.model
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn current_state(&self) -> Option<&State> {
        self.current
            .as_ref()
            .and_then(|name| self.model.state(name.as_str()))
    }

    pub fn current_state_name(&self) -> Option<&Symbol> {
        self.current.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.condition == Condition::Active
    }

    pub fn is_in_error(&self) -> bool {
        self.condition == Condition::InError
    }

    pub fn is_complete(&self) -> bool {
        self.condition == Condition::Completed
    }

    /// Enter the start state.
    ///
    /// Only a freshly created execution can be started.
    pub fn start(&self) -> Result<Self, ExecutionError> {
        if self.condition != Condition::Created {
            return Err(ExecutionError::InvalidCondition {
                operation: "start",
                condition: self.condition,
            });
        }

        let mut next = self.clone();
        next.report(MachineEventKind::Starting);
        next.condition = Condition::Active;

        let model = Arc::clone(&self.model);
        next.enter(model.start_state());
        Ok(next)
    }

    /// Deliver an event.
    ///
    /// The transitions triggered by the event that leave the current state
    /// are the candidates. Without candidates the event is ignored. If
    /// exactly one candidate's guard passes it fires; if none or several do,
    /// the execution goes `InError` and stays in its current state.
    ///
    /// # Errors
    ///
    /// Fails if the execution is not started or already completed, or if
    /// the model does not declare the event.
    pub fn handle_event(&self, event: impl Into<Event>) -> Result<Self, ExecutionError> {
        let event = event.into();
        self.ensure_accepting("handle events for")?;
        if !self.model.declares_event(event.kind.as_str()) {
            return Err(ExecutionError::UnknownEvent {
                machine: self.model.name().clone(),
                event: event.kind,
            });
        }

        let mut next = self.clone();
        next.report(MachineEventKind::Handling {
            event: event.clone(),
        });

        let model = Arc::clone(&self.model);
        let candidates: Vec<&Transition> = model
            .transitions_on(event.kind.as_str())
            .iter()
            .filter(|transition| next.is_current(transition.source()))
            .collect();
        next.resolve(candidates, Some(&event));
        Ok(next)
    }

    /// Leave the current state without an event.
    ///
    /// Resolves like [`handle_event`](Self::handle_event) over every
    /// transition leaving the current state, triggered or not.
    pub fn complete_current_state(&self) -> Result<Self, ExecutionError> {
        self.ensure_accepting("complete the current state of")?;

        let mut next = self.clone();
        let Some(state) = next.current.clone() else {
            return Ok(next);
        };
        next.report(MachineEventKind::Completing {
            state: state.clone(),
        });

        let model = Arc::clone(&self.model);
        let candidates: Vec<&Transition> = model.transitions_from(state.as_str()).iter().collect();
        next.resolve(candidates, None);
        Ok(next)
    }

    fn ensure_accepting(&self, operation: &'static str) -> Result<(), ExecutionError> {
        if self.condition.accepts_events() {
            Ok(())
        } else {
            Err(ExecutionError::InvalidCondition {
                operation,
                condition: self.condition,
            })
        }
    }

    fn is_current(&self, state: &Symbol) -> bool {
        self.current.as_ref() == Some(state)
    }

    fn resolve(&mut self, candidates: Vec<&Transition>, event: Option<&Event>) {
        if candidates.is_empty() {
            self.report(MachineEventKind::Unhandled {
                event: event.cloned(),
            });
            return;
        }

        let enabled: Vec<&Transition> = candidates
            .iter()
            .copied()
            .filter(|transition| transition.is_enabled(self, event))
            .collect();

        match enabled.as_slice() {
            [transition] => self.fire(transition),
            [] => {
                self.condition = Condition::InError;
                tracing::warn!(
                    machine = %self.model.name(),
                    state = ?self.current,
                    candidates = candidates.len(),
                    "every guard refused, execution is in error"
                );
                self.report(MachineEventKind::Blocked {
                    event: event.cloned(),
                    candidates: summarize(&candidates),
                });
            }
            _ => {
                self.condition = Condition::InError;
                tracing::warn!(
                    machine = %self.model.name(),
                    state = ?self.current,
                    enabled = enabled.len(),
                    "several transitions enabled, execution is in error"
                );
                self.report(MachineEventKind::Ambiguous {
                    event: event.cloned(),
                    candidates: summarize(&enabled),
                });
            }
        }
    }

    fn fire(&mut self, transition: &Transition) {
        let summary = TransitionSummary::from(transition);
        tracing::debug!(machine = %self.model.name(), transition = %summary, "firing");
        self.report(MachineEventKind::Transitioning {
            transition: summary.clone(),
        });

        if self.condition == Condition::InError {
            self.condition = Condition::Active;
            self.report(MachineEventKind::Recovered);
        }

        let model = Arc::clone(&self.model);
        if !transition.is_internal() {
            if let Some(source) = model.state(transition.source().as_str()) {
                self.report(MachineEventKind::Exiting {
                    state: source.name().clone(),
                });
                source.exit(self);
            }
        }

        self.report(MachineEventKind::Guard {
            transition: summary.clone(),
        });
        transition.apply_effect(self);
        self.report(MachineEventKind::Effect {
            transition: summary,
        });

        if !transition.is_internal() {
            if let Some(target) = model.state(transition.target().as_str()) {
                self.enter(target);
            }
        }
    }

    fn enter(&mut self, state: &State) {
        self.current = Some(state.name().clone());
        self.report(MachineEventKind::Entering {
            state: state.name().clone(),
        });
        state.enter(self);

        self.report(MachineEventKind::Running {
            state: state.name().clone(),
        });
        state.run(self);

        if state.is_final() || self.model.transitions_from(state.name().as_str()).is_empty() {
            self.condition = Condition::Completed;
            self.report(MachineEventKind::Completed);
        }
    }

    fn report(&self, kind: MachineEventKind) {
        self.reporter.report(MachineEvent {
            timestamp: Utc::now(),
            machine: self.model.name().clone(),
            current: self.current.clone(),
            condition: self.condition,
            kind,
        });
    }
}

fn summarize(transitions: &[&Transition]) -> Vec<TransitionSummary> {
    transitions
        .iter()
        .map(|transition| TransitionSummary::from(*transition))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::BufferingReporter;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn greeter() -> StateMachine {
        StateMachine::builder("greeter")
            .state(State::start("hello"))
            .state(State::final_state("goodbye"))
            .transition(Transition::new("hello", "goodbye").on("wake"))
            .additional_event("sleep")
            .build()
            .unwrap()
    }

    type Labels = Arc<BufferingReporter<MachineEvent, String>>;

    fn recorded(model: StateMachine) -> (MachineExecution, Labels) {
        let buffer = Arc::new(BufferingReporter::with_selector(|event: MachineEvent| {
            event.kind.to_string()
        }));
        let execution = MachineExecution::with_reporter(model, buffer.clone());
        (execution, buffer)
    }

    #[test]
    fn new_execution_is_created_without_state() {
        let execution = MachineExecution::new(greeter());
        assert_eq!(execution.condition(), Condition::Created);
        assert!(execution.current_state().is_none());
    }

    #[test]
    fn start_enters_start_state() {
        let (execution, buffer) = recorded(greeter());
        let started = execution.start().unwrap();

        assert!(started.is_active());
        assert_eq!(started.current_state().map(|s| s.name().as_str()), Some("hello"));
        assert_eq!(
            buffer.events(),
            vec!["starting", "entering hello", "running hello"]
        );
    }

    #[test]
    fn start_twice_is_rejected() {
        let started = MachineExecution::new(greeter()).start().unwrap();
        assert_eq!(
            started.start().unwrap_err(),
            ExecutionError::InvalidCondition {
                operation: "start",
                condition: Condition::Active
            }
        );
    }

    #[test]
    fn events_before_start_are_rejected() {
        let error = MachineExecution::new(greeter())
            .handle_event("wake")
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Cannot handle events for an execution that is created"
        );
    }

    #[test]
    fn undeclared_event_is_rejected() {
        let started = MachineExecution::new(greeter()).start().unwrap();
        assert_eq!(
            started.handle_event("dance").unwrap_err(),
            ExecutionError::UnknownEvent {
                machine: "greeter".into(),
                event: "dance".into()
            }
        );
    }

    #[test]
    fn unmatched_event_is_ignored() {
        let (execution, buffer) = recorded(greeter());
        let started = execution.start().unwrap();
        buffer.drain();

        let after = started.handle_event("sleep").unwrap();

        assert!(after.is_active());
        assert_eq!(after.current_state_name(), started.current_state_name());
        assert_eq!(buffer.events(), vec!["handling sleep", "no transition for sleep"]);
    }

    #[test]
    fn matching_event_fires_and_completes() {
        let (execution, buffer) = recorded(greeter());
        let started = execution.start().unwrap();
        buffer.drain();

        let done = started.handle_event("wake").unwrap();

        assert!(done.is_complete());
        assert_eq!(
            buffer.events(),
            vec![
                "handling wake",
                "transitioning hello -> goodbye on wake",
                "exiting hello",
                "guard passed for hello -> goodbye on wake",
                "effect of hello -> goodbye on wake",
                "entering goodbye",
                "running goodbye",
                "completed",
            ]
        );
    }

    #[test]
    fn completed_execution_rejects_events() {
        let done = MachineExecution::new(greeter())
            .start()
            .and_then(|e| e.handle_event("wake"))
            .unwrap();
        assert!(matches!(
            done.handle_event("wake"),
            Err(ExecutionError::InvalidCondition {
                condition: Condition::Completed,
                ..
            })
        ));
        assert!(done.complete_current_state().is_err());
    }

    #[test]
    fn operations_leave_receiver_untouched() {
        let started = MachineExecution::new(greeter()).start().unwrap();
        let done = started.handle_event("wake").unwrap();

        assert!(started.is_active());
        assert_eq!(started.current_state_name().map(Symbol::as_str), Some("hello"));
        assert!(done.is_complete());
    }

    #[test]
    fn hooks_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let push = |label: &'static str| {
            let log = Arc::clone(&log);
            move |exec: &MachineExecution| {
                let state = exec.current_state_name().map(|s| s.to_string());
                log.lock().unwrap().push(format!("{label}@{}", state.unwrap_or_default()));
            }
        };

        let model = StateMachine::builder("hooks")
            .state(State::start("a").on_entry(push("entry")).on_do(push("do")).on_exit(push("exit")))
            .state(State::final_state("b").on_entry(push("entry")))
            .transition(Transition::new("a", "b").on("go").effect(push("effect")))
            .build()
            .unwrap();

        MachineExecution::new(model)
            .start()
            .and_then(|e| e.handle_event("go"))
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["entry@a", "do@a", "exit@a", "effect@a", "entry@b"]
        );
    }

    #[test]
    fn effect_is_reported_after_it_runs() {
        let history = Arc::new(BufferingReporter::with_selector(|event: MachineEvent| {
            event.kind.to_string()
        }));
        let seen_by_effect = Arc::new(Mutex::new(None::<String>));

        let snapshot = Arc::clone(&history);
        let last_seen = Arc::clone(&seen_by_effect);
        let model = StateMachine::builder("ordered")
            .state(State::start("a"))
            .state(State::final_state("b"))
            .transition(Transition::new("a", "b").on("go").effect(move |_: &MachineExecution| {
                *last_seen.lock().unwrap() = snapshot.events().last().cloned();
            }))
            .build()
            .unwrap();

        MachineExecution::with_reporter(model, history.clone())
            .start()
            .and_then(|e| e.handle_event("go"))
            .unwrap();

        assert_eq!(
            seen_by_effect.lock().unwrap().as_deref(),
            Some("guard passed for a -> b on go")
        );
        let events = history.events();
        let effect = events.iter().position(|e| e == "effect of a -> b on go");
        let entering = events.iter().position(|e| e == "entering b");
        assert!(effect.is_some() && effect < entering);
    }

    #[test]
    fn internal_transition_skips_exit_and_entry() {
        let exits = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&exits);
        let model = StateMachine::builder("counter")
            .state(State::start("idle").on_exit(move |_: &MachineExecution| {
                seen.store(true, Ordering::SeqCst);
            }))
            .state(State::final_state("off"))
            .transition(Transition::new("idle", "idle").internal().on("tick"))
            .transition(
                Transition::new("idle", "off")
                    .on("stop")
                    .guard(|_, event| event.is_some()),
            )
            .build()
            .unwrap();

        let (execution, buffer) = recorded(model);
        let started = execution.start().unwrap();
        buffer.drain();
        let ticked = started.handle_event("tick").unwrap();

        assert!(ticked.is_active());
        assert!(!exits.load(Ordering::SeqCst));
        assert!(!buffer.events().iter().any(|e| e.starts_with("exiting") || e.starts_with("entering")));
    }

    #[test]
    fn refused_guard_puts_execution_in_error() {
        let model = StateMachine::builder("locked")
            .state(State::start("closed"))
            .state(State::final_state("open"))
            .transition(Transition::new("closed", "open").on("push").guard(|_, _| false))
            .build()
            .unwrap();

        let started = MachineExecution::new(model).start().unwrap();
        let blocked = started.handle_event("push").unwrap();

        assert!(blocked.is_in_error());
        assert_eq!(blocked.current_state_name().map(Symbol::as_str), Some("closed"));
    }

    #[test]
    fn two_enabled_guards_are_ambiguous() {
        let model = StateMachine::builder("fork")
            .state(State::start("a"))
            .state(State::normal("b"))
            .state(State::final_state("c"))
            .transition(Transition::new("a", "b").on("go").guard(|_, _| true))
            .transition(Transition::new("a", "c").on("go").guard(|_, _| true))
            .transition(Transition::new("b", "c").on("go"))
            .build()
            .unwrap();

        let (execution, buffer) = recorded(model);
        let after = execution.start().and_then(|e| e.handle_event("go")).unwrap();

        assert!(after.is_in_error());
        assert_eq!(
            buffer.events().last().map(String::as_str),
            Some("ambiguous between [a -> b on go, a -> c on go]")
        );
    }

    #[test]
    fn in_error_recovers_when_guard_opens() {
        let open = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&open);
        let model = StateMachine::builder("gate")
            .state(State::start("waiting"))
            .state(State::final_state("through"))
            .transition(
                Transition::new("waiting", "through")
                    .on("push")
                    .guard(move |_, _| flag.load(Ordering::SeqCst)),
            )
            .build()
            .unwrap();

        let (execution, buffer) = recorded(model);
        let blocked = execution.start().and_then(|e| e.handle_event("push")).unwrap();
        assert!(blocked.is_in_error());

        open.store(true, Ordering::SeqCst);
        let done = blocked.complete_current_state().unwrap();

        assert!(done.is_complete());
        assert!(buffer.events().contains(&"recovered".to_string()));
    }

    #[test]
    fn state_without_outgoing_transitions_completes() {
        let model = StateMachine::builder("dead-end")
            .state(State::start("a"))
            .state(State::normal("stuck"))
            .state(State::final_state("z"))
            .transition(Transition::new("a", "stuck").on("go"))
            .build()
            .unwrap();

        let after = MachineExecution::new(model)
            .start()
            .and_then(|e| e.handle_event("go"))
            .unwrap();

        assert!(after.is_complete());
        assert_eq!(after.current_state_name().map(Symbol::as_str), Some("stuck"));
    }

    #[test]
    fn history_events_carry_condition_and_state() {
        let buffer = Arc::new(BufferingReporter::<MachineEvent>::new());
        MachineExecution::with_reporter(greeter(), buffer.clone())
            .start()
            .unwrap();

        let events = buffer.events();
        assert_eq!(events[0].condition, Condition::Created);
        assert_eq!(events[0].current, None);
        assert_eq!(events[1].condition, Condition::Active);
        assert_eq!(events[1].current.as_ref().map(Symbol::as_str), Some("hello"));
        assert!(events.iter().all(|e| e.machine == "greeter"));
    }

    #[test]
    fn condition_serializes_kebab_case() {
        assert_eq!(serde_json::to_value(Condition::InError).unwrap(), "in-error");
        assert_eq!(Condition::InError.to_string(), "in-error");
    }
}
