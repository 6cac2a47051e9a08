//! Net definitions: places, transitions and weighted arcs.

use crate::petri::error::{NetError, NetViolation};
use crate::petri::execution::Marking;
use crate::symbol::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// A weighted arc between a place and a transition.
///
/// A multiplicity of zero marks an inhibitor arc.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetArc {
    pub source: Symbol,
    pub target: Symbol,
    pub multiplicity: u32,
}

impl NetArc {
    /// Arc from `source` to `target` consuming or producing `multiplicity` tokens.
    pub fn new(source: impl Into<Symbol>, target: impl Into<Symbol>, multiplicity: u32) -> Self {
        NetArc {
            source: source.into(),
            target: target.into(),
            multiplicity,
        }
    }

    /// True for zero-multiplicity arcs.
    pub fn is_inhibitor(&self) -> bool {
        self.multiplicity == 0
    }
}

/// A validated place/transition net.
///
/// Nets are immutable once built and can back any number of executions.
#[derive(Clone, Debug)]
pub struct PetriNet {
    name: Symbol,
    places: Vec<Symbol>,
    transitions: Vec<Symbol>,
    inputs: HashMap<Symbol, Vec<NetArc>>,
    outputs: HashMap<Symbol, Vec<NetArc>>,
    inhibitors_allowed: bool,
}

impl PetriNet {
    /// Start building a net named `name`.
    pub fn builder(name: impl Into<Symbol>) -> NetBuilder {
        NetBuilder::new(name)
    }

    /// The net's name.
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Place names in definition order.
    pub fn places(&self) -> &[Symbol] {
        &self.places
    }

    /// Transition names in definition order.
    pub fn transitions(&self) -> &[Symbol] {
        &self.transitions
    }

    /// Whether `name` is a place of this net.
    pub fn has_place(&self, name: &str) -> bool {
        self.places.iter().any(|place| place == name)
    }

    /// Whether `name` is a transition of this net.
    pub fn has_transition(&self, name: &str) -> bool {
        self.transitions.iter().any(|transition| transition == name)
    }

    /// Arcs from places into `transition`.
    pub fn inputs(&self, transition: &str) -> &[NetArc] {
        self.inputs.get(transition).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Arcs from `transition` out to places.
    pub fn outputs(&self, transition: &str) -> &[NetArc] {
        self.outputs.get(transition).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the net was built with inhibitor arcs permitted.
    pub fn inhibitors_allowed(&self) -> bool {
        self.inhibitors_allowed
    }

    /// True if `transition` may fire under `marking`.
    ///
    /// Every input place must hold at least as many tokens as its arc's
    /// multiplicity. An inhibitor input arc disables the transition
    /// outright.
    pub fn is_enabled(&self, transition: &str, marking: &Marking) -> bool {
        self.inputs(transition).iter().all(|arc| {
            !arc.is_inhibitor() && marking.count(arc.source.as_str()) >= arc.multiplicity as usize
        })
    }

    /// Transitions enabled under `marking`, in definition order.
    pub fn enabled(&self, marking: &Marking) -> Vec<Symbol> {
        self.transitions
            .iter()
            .filter(|transition| self.is_enabled(transition.as_str(), marking))
            .cloned()
            .collect()
    }
}

/// Fluent construction of a [`PetriNet`].
///
/// # Example
///
/// ```rust
/// use behavior::petri::PetriNet;
///
/// let net = PetriNet::builder("handoff")
///     .places(["ready", "done"])
///     .transition("work")
///     .arc("ready", "work", 1)
///     .arc("work", "done", 1)
///     .build()
///     .expect("net is well formed");
///
/// assert_eq!(net.inputs("work").len(), 1);
/// assert_eq!(net.outputs("work")[0].target, "done");
/// ```
pub struct NetBuilder {
    name: Symbol,
    places: Vec<Symbol>,
    transitions: Vec<Symbol>,
    arcs: Vec<NetArc>,
    allow_inhibitors: bool,
}

impl NetBuilder {
    /// An empty builder for a net named `name`.
    pub fn new(name: impl Into<Symbol>) -> Self {
        NetBuilder {
            name: name.into(),
            places: Vec::new(),
            transitions: Vec::new(),
            arcs: Vec::new(),
            allow_inhibitors: false,
        }
    }

    /// Declare a place. Repeated names are ignored.
    pub fn place(mut self, name: impl Into<Symbol>) -> Self {
        push_unique(&mut self.places, name.into());
        self
    }

    /// Declare several places.
    pub fn places<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        for name in names {
            push_unique(&mut self.places, name.into());
        }
        self
    }

    /// Declare a transition. Repeated names are ignored.
    pub fn transition(mut self, name: impl Into<Symbol>) -> Self {
        push_unique(&mut self.transitions, name.into());
        self
    }

    /// Declare several transitions.
    pub fn transitions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        for name in names {
            push_unique(&mut self.transitions, name.into());
        }
        self
    }

    /// Add an arc; direction is taken from the endpoints.
    pub fn arc(
        mut self,
        source: impl Into<Symbol>,
        target: impl Into<Symbol>,
        multiplicity: u32,
    ) -> Self {
        self.arcs.push(NetArc::new(source, target, multiplicity));
        self
    }

    /// Permit zero-multiplicity (inhibitor) arcs.
    pub fn allow_inhibitors(mut self, allow: bool) -> Self {
        self.allow_inhibitors = allow;
        self
    }

    /// Validate and build the net.
    ///
    /// Every structural violation is collected and returned together.
    pub fn build(self) -> Result<PetriNet, NetError> {
        let places: HashSet<&Symbol> = self.places.iter().collect();
        let transitions: HashSet<&Symbol> = self.transitions.iter().collect();
        let mut checks: Vec<Validation<(), NonEmptyVec<NetViolation>>> = Vec::new();

        if self.places.is_empty() {
            checks.push(Validation::fail(NetViolation::NoPlaces));
        }
        if self.transitions.is_empty() {
            checks.push(Validation::fail(NetViolation::NoTransitions));
        }
        if self.arcs.is_empty() {
            checks.push(Validation::fail(NetViolation::NoArcs));
        }
        for name in places.intersection(&transitions) {
            checks.push(Validation::fail(NetViolation::PlaceAndTransition {
                name: (*name).clone(),
            }));
        }
        for arc in &self.arcs {
            checks.extend(check_arc(arc, &places, &transitions, self.allow_inhibitors));
        }

        if let Validation::Failure(errors) = Validation::all_vec(checks) {
            return Err(NetError::Invalid {
                net: self.name,
                violations: errors.iter().cloned().collect(),
            });
        }

        let mut inputs: HashMap<Symbol, Vec<NetArc>> = HashMap::new();
        let mut outputs: HashMap<Symbol, Vec<NetArc>> = HashMap::new();
        for arc in self.arcs {
            if transitions.contains(&arc.target) {
                inputs.entry(arc.target.clone()).or_default().push(arc);
            } else {
                outputs.entry(arc.source.clone()).or_default().push(arc);
            }
        }

        tracing::debug!(
            net = %self.name,
            places = self.places.len(),
            transitions = self.transitions.len(),
            "built petri net"
        );

        Ok(PetriNet {
            name: self.name,
            places: self.places,
            transitions: self.transitions,
            inputs,
            outputs,
            inhibitors_allowed: self.allow_inhibitors,
        })
    }
}

fn push_unique(names: &mut Vec<Symbol>, name: Symbol) {
    if !names.contains(&name) {
        names.push(name);
    }
}

fn check_arc(
    arc: &NetArc,
    places: &HashSet<&Symbol>,
    transitions: &HashSet<&Symbol>,
    allow_inhibitors: bool,
) -> Vec<Validation<(), NonEmptyVec<NetViolation>>> {
    let mut checks = Vec::new();
    let known = |name: &Symbol| places.contains(name) || transitions.contains(name);

    for endpoint in [&arc.source, &arc.target] {
        if !known(endpoint) {
            checks.push(Validation::fail(NetViolation::UnknownEndpoint {
                name: endpoint.clone(),
            }));
        }
    }

    let both_places = places.contains(&arc.source) && places.contains(&arc.target);
    let both_transitions = transitions.contains(&arc.source) && transitions.contains(&arc.target);
    if both_places || both_transitions {
        checks.push(Validation::fail(NetViolation::SameKindEndpoints {
            from: arc.source.clone(),
            to: arc.target.clone(),
        }));
    }

    if arc.is_inhibitor() && !allow_inhibitors {
        checks.push(Validation::fail(NetViolation::InhibitorNotAllowed {
            from: arc.source.clone(),
            to: arc.target.clone(),
        }));
    }

    checks
}
