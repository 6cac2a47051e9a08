//! Events delivered to machines and history events reported by them.

use crate::fsm::execution::Condition;
use crate::fsm::model::Transition;
use crate::reporter::HistoryEvent;
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An external event handed to [`MachineExecution::handle_event`].
///
/// [`MachineExecution::handle_event`]: crate::fsm::MachineExecution::handle_event
///
/// # Example
///
/// ```rust
/// use behavior::fsm::Event;
/// use serde_json::json;
///
/// let plain: Event = "wake".into();
/// let loaded = Event::with_data("deposit", json!({ "amount": 25 }));
///
/// assert_eq!(plain.kind, "wake");
/// assert_eq!(loaded.data.unwrap()["amount"], 25);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: Symbol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Event {
    pub fn new(kind: impl Into<Symbol>) -> Self {
        Event {
            kind: kind.into(),
            data: None,
        }
    }

    pub fn with_data(kind: impl Into<Symbol>, data: serde_json::Value) -> Self {
        Event {
            kind: kind.into(),
            data: Some(data),
        }
    }
}

impl From<&str> for Event {
    fn from(kind: &str) -> Self {
        Event::new(kind)
    }
}

impl From<Symbol> for Event {
    fn from(kind: Symbol) -> Self {
        Event::new(kind)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(data) => write!(f, "{}({})", self.kind, data),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Serializable description of a transition inside a history event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSummary {
    pub source: Symbol,
    pub target: Symbol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Symbol>,
    pub internal: bool,
}

impl From<&Transition> for TransitionSummary {
    fn from(transition: &Transition) -> Self {
        TransitionSummary {
            source: transition.source().clone(),
            target: transition.target().clone(),
            trigger: transition.trigger().cloned(),
            internal: transition.is_internal(),
        }
    }
}

impl fmt::Display for TransitionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)?;
        if let Some(trigger) = &self.trigger {
            write!(f, " on {trigger}")?;
        }
        Ok(())
    }
}

/// What a machine execution did.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MachineEventKind {
    /// The execution is starting.
    Starting,
    /// A state is being entered; its entry behavior runs next.
    Entering { state: Symbol },
    /// A state's do behavior runs next.
    Running { state: Symbol },
    /// A state is being left; its exit behavior runs next.
    Exiting { state: Symbol },
    /// An external event was delivered.
    Handling { event: Event },
    /// The current state is being completed without an event.
    Completing { state: Symbol },
    /// No transition leaves the current state for the event; it is ignored.
    Unhandled {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event: Option<Event>,
    },
    /// Candidate transitions exist but every guard refused.
    Blocked {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event: Option<Event>,
        candidates: Vec<TransitionSummary>,
    },
    /// More than one guard passed.
    Ambiguous {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event: Option<Event>,
        candidates: Vec<TransitionSummary>,
    },
    /// Exactly one transition was selected.
    Transitioning { transition: TransitionSummary },
    /// An execution in error resolved a transition and is active again.
    Recovered,
    /// The selected transition's guard passed.
    Guard { transition: TransitionSummary },
    /// The selected transition's effect has run.
    Effect { transition: TransitionSummary },
    /// The execution reached a state it cannot leave.
    Completed,
}

impl fmt::Display for MachineEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Entering { state } => write!(f, "entering {state}"),
            Self::Running { state } => write!(f, "running {state}"),
            Self::Exiting { state } => write!(f, "exiting {state}"),
            Self::Handling { event } => write!(f, "handling {event}"),
            Self::Completing { state } => write!(f, "completing {state}"),
            Self::Unhandled { event: Some(event) } => write!(f, "no transition for {event}"),
            Self::Unhandled { event: None } => write!(f, "no transition"),
            Self::Blocked { candidates, .. } => {
                write!(f, "blocked, {} guarded candidate(s) refused", candidates.len())
            }
            Self::Ambiguous { candidates, .. } => {
                let names: Vec<String> = candidates.iter().map(ToString::to_string).collect();
                write!(f, "ambiguous between [{}]", names.join(", "))
            }
            Self::Transitioning { transition } => write!(f, "transitioning {transition}"),
            Self::Recovered => write!(f, "recovered"),
            Self::Guard { transition } => write!(f, "guard passed for {transition}"),
            Self::Effect { transition } => write!(f, "effect of {transition}"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// History event of a machine execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineEvent {
    pub timestamp: DateTime<Utc>,
    pub machine: Symbol,
    /// Current state when the event was reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Symbol>,
    pub condition: Condition,
    #[serde(flatten)]
    pub kind: MachineEventKind,
}

impl fmt::Display for MachineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.machine, self.condition, self.kind)
    }
}

impl HistoryEvent for MachineEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
