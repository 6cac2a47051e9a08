//! Chain definitions: rows of transition probabilities over symbolic states.

use crate::markov::error::ChainError;
use crate::symbol::Symbol;
use std::collections::{HashMap, HashSet};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Tolerance used when comparing probability sums.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// One row of the transition matrix: the outgoing probabilities of a state.
///
/// Targets keep their insertion order, which is the order the cumulative
/// ranges are walked in during execution.
///
/// # Example
///
/// ```rust
/// use behavior::markov::Row;
///
/// let row = Row::new("sunny").to("sunny", 0.9).to("rainy", 0.1);
/// assert_eq!(row.targets().len(), 2);
///
/// let sink = Row::new("gone");
/// assert!(sink.targets().is_empty());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    state: Symbol,
    targets: Vec<(Symbol, f64)>,
}

impl Row {
    /// Start a row with no outgoing probability.
    pub fn new(state: impl Into<Symbol>) -> Self {
        Row {
            state: state.into(),
            targets: Vec::new(),
        }
    }

    /// Add a target state with its probability.
    pub fn to(mut self, target: impl Into<Symbol>, probability: f64) -> Self {
        self.targets.push((target.into(), probability));
        self
    }

    pub fn state(&self) -> &Symbol {
        &self.state
    }

    pub fn targets(&self) -> &[(Symbol, f64)] {
        &self.targets
    }

    /// Sum of the row's probabilities.
    pub fn total(&self) -> f64 {
        self.targets.iter().map(|(_, p)| p).sum()
    }

    fn probability(&self, target: &str) -> f64 {
        self.targets
            .iter()
            .find(|(t, _)| t.as_str() == target)
            .map_or(0.0, |(_, p)| *p)
    }
}

/// A slice `(lower, upper]` of the unit interval mapped to a target.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Range {
    pub(crate) lower: f64,
    pub(crate) upper: f64,
    pub(crate) target: Symbol,
}

/// A validated discrete-time Markov chain.
///
/// Every row sums to 0.0 (the state is absorbing) or 1.0, and every target
/// is itself a state of the chain. Cumulative probability ranges are
/// compiled once here and shared by every execution.
///
/// # Example
///
/// ```rust
/// use behavior::markov::{MkChain, Row};
/// use stillwater::validation::Validation;
///
/// let chain = match MkChain::new(vec![
///     Row::new("a").to("b", 1.0),
///     Row::new("b").to("a", 0.5).to("b", 0.5),
/// ]) {
///     Validation::Success(chain) => chain,
///     Validation::Failure(_) => panic!("rows are valid"),
/// };
///
/// assert!(chain.reaches("a", "b"));
/// assert!(chain.communicates("a", "b"));
/// assert!(!chain.is_absorbing("a"));
/// ```
#[derive(Clone, Debug)]
pub struct MkChain {
    rows: Vec<Row>,
    index: HashMap<Symbol, usize>,
    ranges: HashMap<Symbol, Vec<Range>>,
}

impl MkChain {
    /// Validate `rows` and build a chain.
    ///
    /// Returns every problem found, not just the first one. An invalid
    /// definition is an ordinary outcome, so the caller is expected to
    /// inspect the result.
    pub fn new(rows: impl IntoIterator<Item = Row>) -> Validation<MkChain, NonEmptyVec<ChainError>> {
        let rows: Vec<Row> = rows.into_iter().collect();
        let mut checks: Vec<Validation<(), NonEmptyVec<ChainError>>> = Vec::new();

        let mut index = HashMap::new();
        for (position, row) in rows.iter().enumerate() {
            if index.insert(row.state.clone(), position).is_some() {
                checks.push(Validation::fail(ChainError::DuplicateRow {
                    state: row.state.clone(),
                }));
            }
        }

        for row in &rows {
            checks.extend(check_row(row, &index));
        }

        Validation::all_vec(checks).map(move |_| {
            let ranges = rows
                .iter()
                .map(|row| (row.state.clone(), compile_ranges(row)))
                .collect();
            tracing::debug!(states = rows.len(), "built markov chain");
            MkChain {
                rows,
                index,
                ranges,
            }
        })
    }

    /// Build the chain in which every state only loops back to itself.
    pub fn diagonal<I, S>(states: I) -> Validation<MkChain, NonEmptyVec<ChainError>>
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        MkChain::new(states.into_iter().map(|state| {
            let state = state.into();
            Row::new(state.clone()).to(state, 1.0)
        }))
    }

    /// States in definition order.
    pub fn states(&self) -> impl Iterator<Item = &Symbol> {
        self.rows.iter().map(|row| &row.state)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, state: &str) -> Option<&Row> {
        self.index.get(state).map(|&position| &self.rows[position])
    }

    pub fn contains(&self, state: &str) -> bool {
        self.index.contains_key(state)
    }

    /// Probability of moving from `from` to `to` in one step.
    pub fn probability(&self, from: &str, to: &str) -> f64 {
        self.row(from).map_or(0.0, |row| row.probability(to))
    }

    /// True if `to` can follow `from` in one step.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        self.probability(from, to) > 0.0
    }

    /// True if each state reaches the other.
    pub fn communicates(&self, first: &str, second: &str) -> bool {
        self.reaches(first, second) && self.reaches(second, first)
    }

    /// True if the chain can never leave `state` once it is entered.
    ///
    /// That is the case when the row has no outgoing mass at all, or when
    /// all of it is on the self-loop.
    pub fn is_absorbing(&self, state: &str) -> bool {
        match self.row(state) {
            Some(row) => {
                row.total().abs() <= PROBABILITY_TOLERANCE
                    || (row.probability(state) - 1.0).abs() <= PROBABILITY_TOLERANCE
            }
            None => false,
        }
    }

    /// Pick the successor of `state` for a uniform draw in `[0, 1)`.
    ///
    /// Ranges are scanned in insertion order and the first one with
    /// `lower < draw <= upper` wins. Zero-probability targets own an empty
    /// range and are never selected. A draw of exactly 0.0 goes to the first
    /// non-empty range, and a draw past the last bound (rounding) to the last.
    pub(crate) fn select(&self, state: &str, draw: f64) -> Option<&Symbol> {
        let ranges = self.ranges.get(state)?;
        let mut non_empty = ranges.iter().filter(|range| range.upper > range.lower);
        ranges
            .iter()
            .find(|range| range.lower < draw && draw <= range.upper)
            .or_else(|| {
                if draw <= 0.0 {
                    non_empty.next()
                } else {
                    non_empty.last()
                }
            })
            .map(|range| &range.target)
    }
}

fn check_row(
    row: &Row,
    index: &HashMap<Symbol, usize>,
) -> Vec<Validation<(), NonEmptyVec<ChainError>>> {
    let mut checks = Vec::new();
    let mut seen = HashSet::new();

    for (target, probability) in &row.targets {
        if !seen.insert(target) {
            checks.push(Validation::fail(ChainError::DuplicateTarget {
                from: row.state.clone(),
                to: target.clone(),
            }));
        }
        if !(0.0..=1.0).contains(probability) {
            checks.push(Validation::fail(ChainError::InvalidProbability {
                from: row.state.clone(),
                to: target.clone(),
                probability: *probability,
            }));
        }
        if !index.contains_key(target) {
            checks.push(Validation::fail(ChainError::UnknownTarget {
                from: row.state.clone(),
                to: target.clone(),
            }));
        }
    }

    let sum = row.total();
    let proper = (sum - 1.0).abs() <= PROBABILITY_TOLERANCE;
    let empty = sum.abs() <= PROBABILITY_TOLERANCE;
    if !(proper || empty) {
        checks.push(Validation::fail(ChainError::InvalidRowSum {
            state: row.state.clone(),
            sum,
        }));
    }

    checks
}

fn compile_ranges(row: &Row) -> Vec<Range> {
    let mut lower = 0.0;
    row.targets
        .iter()
        .map(|(target, probability)| {
            let upper = lower + probability;
            let range = Range {
                lower,
                upper,
                target: target.clone(),
            };
            lower = upper;
            range
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(rows: Vec<Row>) -> MkChain {
        match MkChain::new(rows) {
            Validation::Success(chain) => chain,
            Validation::Failure(errors) => {
                panic!("expected valid chain, got {:?}", errors.iter().collect::<Vec<_>>())
            }
        }
    }

    fn errors(rows: Vec<Row>) -> Vec<ChainError> {
        match MkChain::new(rows) {
            Validation::Success(_) => panic!("expected invalid chain"),
            Validation::Failure(errors) => errors.iter().cloned().collect(),
        }
    }

    #[test]
    fn accepts_proper_and_absorbing_rows() {
        let chain = valid(vec![
            Row::new("a").to("b", 0.25).to("c", 0.75),
            Row::new("b").to("c", 1.0),
            Row::new("c"),
        ]);

        assert_eq!(chain.states().count(), 3);
        assert_eq!(chain.probability("a", "c"), 0.75);
        assert_eq!(chain.probability("c", "a"), 0.0);
    }

    #[test]
    fn tolerates_rounding_in_row_sums() {
        let chain = valid(vec![
            Row::new("a").to("a", 0.1).to("b", 0.2).to("c", 0.7),
            Row::new("b"),
            Row::new("c"),
        ]);
        assert!(chain.contains("a"));
    }

    #[test]
    fn rejects_row_not_summing_to_zero_or_one() {
        let found = errors(vec![Row::new("a").to("a", 0.5)]);
        assert!(matches!(found.as_slice(), [ChainError::InvalidRowSum { .. }]));
    }

    #[test]
    fn rejects_unknown_target() {
        let found = errors(vec![Row::new("a").to("missing", 1.0)]);
        assert_eq!(
            found,
            vec![ChainError::UnknownTarget {
                from: "a".into(),
                to: "missing".into()
            }]
        );
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let found = errors(vec![Row::new("a").to("a", 1.5).to("b", -0.5), Row::new("b")]);
        let invalid = found
            .iter()
            .filter(|e| matches!(e, ChainError::InvalidProbability { .. }))
            .count();
        assert_eq!(invalid, 2);
    }

    #[test]
    fn accumulates_every_violation() {
        let found = errors(vec![
            Row::new("a").to("x", 1.0),
            Row::new("a"),
            Row::new("b").to("a", 0.3),
        ]);

        assert!(found.contains(&ChainError::DuplicateRow { state: "a".into() }));
        assert!(found.contains(&ChainError::UnknownTarget {
            from: "a".into(),
            to: "x".into()
        }));
        assert!(found
            .iter()
            .any(|e| matches!(e, ChainError::InvalidRowSum { state, .. } if state == "b")));
    }

    #[test]
    fn rejects_duplicate_targets() {
        let found = errors(vec![Row::new("a").to("a", 0.5).to("a", 0.5)]);
        assert!(found.contains(&ChainError::DuplicateTarget {
            from: "a".into(),
            to: "a".into()
        }));
    }

    #[test]
    fn diagonal_chain_is_all_absorbing() {
        let chain = match MkChain::diagonal(["x", "y", "z"]) {
            Validation::Success(chain) => chain,
            Validation::Failure(_) => panic!("diagonal chain is valid"),
        };

        for state in ["x", "y", "z"] {
            assert!(chain.is_absorbing(state));
            assert!(chain.reaches(state, state));
        }
        assert!(!chain.reaches("x", "y"));
    }

    #[test]
    fn absorbing_covers_empty_row_and_self_loop() {
        let chain = valid(vec![
            Row::new("loop").to("loop", 1.0),
            Row::new("sink"),
            Row::new("moving").to("loop", 0.5).to("sink", 0.5),
        ]);

        assert!(chain.is_absorbing("loop"));
        assert!(chain.is_absorbing("sink"));
        assert!(!chain.is_absorbing("moving"));
        assert!(!chain.is_absorbing("unknown"));
    }

    #[test]
    fn communicates_requires_both_directions() {
        let chain = valid(vec![
            Row::new("a").to("b", 1.0),
            Row::new("b").to("a", 0.5).to("c", 0.5),
            Row::new("c"),
        ]);

        assert!(chain.communicates("a", "b"));
        assert!(chain.communicates("b", "a"));
        assert!(!chain.communicates("b", "c"));
        assert!(!chain.communicates("c", "b"));
    }

    #[test]
    fn select_walks_ranges_in_insertion_order() {
        let chain = valid(vec![
            Row::new("s").to("a", 0.5).to("none", 0.0).to("b", 0.5),
            Row::new("a"),
            Row::new("b"),
            Row::new("none"),
        ]);

        assert_eq!(chain.select("s", 0.0).unwrap(), "a");
        assert_eq!(chain.select("s", 0.49).unwrap(), "a");
        assert_eq!(chain.select("s", 0.51).unwrap(), "b");
        assert_eq!(chain.select("s", 0.999).unwrap(), "b");
        assert!(chain.select("a", 0.3).is_none());
    }

    #[test]
    fn select_closes_ranges_at_their_upper_bound() {
        let chain = valid(vec![
            Row::new("s").to("a", 0.25).to("b", 0.75),
            Row::new("a"),
            Row::new("b"),
        ]);

        assert_eq!(chain.select("s", 0.25).unwrap(), "a");
        assert_eq!(chain.select("s", 0.250001).unwrap(), "b");
        assert_eq!(chain.select("s", 1.0).unwrap(), "b");
    }
}
