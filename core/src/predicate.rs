//! Predicate: boolean expressions over node `DataInputs`
//!
//! Predicates combine a [`DataInput`] and an [`InputMatcher`] into boolean
//! conditions that compose with AND/OR/NOT. A compiled rule is one predicate.

use crate::{DataInput, InputMatcher, MatchingData, PredicateTrace};
use std::fmt::Debug;

/// One rule atom: a value read off the node and the test applied to it.
///
/// # INV: None → false
///
/// If the `DataInput` returns [`MatchingData::Absent`], the predicate evaluates to
/// `false`. A rule like `[data-x^=a]` therefore never matches a node without
/// `data-x`, and `:not([data-x^=a])` always does.
pub struct SinglePredicate<N> {
    input: Box<dyn DataInput<N>>,
    matcher: Box<dyn InputMatcher>,
}

impl<N> SinglePredicate<N> {
    /// Test `input`'s value with `matcher`.
    #[must_use]
    pub fn new(input: Box<dyn DataInput<N>>, matcher: Box<dyn InputMatcher>) -> Self {
        Self { input, matcher }
    }

    /// Evaluate this predicate against the given node.
    pub fn evaluate(&self, node: &N) -> bool {
        let data = self.input.get(node);
        match data {
            MatchingData::Absent => false,
            _ => self.matcher.matches(&data),
        }
    }

    /// Evaluate with full trace for debugging.
    #[must_use]
    pub fn evaluate_with_trace(&self, node: &N) -> PredicateTrace {
        let data = self.input.get(node);
        PredicateTrace::Atom {
            matched: !data.is_absent() && self.matcher.matches(&data),
            input: format!("{:?}", self.input),
            value: data.as_str().map(str::to_string),
            matcher: format!("{:?}", self.matcher),
        }
    }
}

impl<N> Debug for SinglePredicate<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinglePredicate")
            .field("input", &self.input)
            .field("matcher", &self.matcher)
            .finish()
    }
}

/// Composite predicate with boolean logic.
///
/// Evaluation short-circuits. `And(vec![])` is vacuously true (the universal
/// rule `*`); `Or(vec![])` is false.
///
/// # Example
///
/// ```ignore
/// // div:not([role=heading])
/// let predicate = Predicate::And(vec![
///     Predicate::Single(tag_is_div),
///     Predicate::Not(Box::new(Predicate::Single(role_is_heading))),
/// ]);
/// ```
pub enum Predicate<N> {
    /// A single predicate.
    Single(SinglePredicate<N>),

    /// All predicates must match (logical AND).
    /// Short-circuits on the first `false`.
    And(Vec<Predicate<N>>),

    /// Any predicate must match (logical OR).
    /// Short-circuits on the first `true`.
    Or(Vec<Predicate<N>>),

    /// Inverts the result of the inner predicate (logical NOT).
    Not(Box<Predicate<N>>),
}

impl<N> Predicate<N> {
    /// Evaluate this predicate against the given node.
    ///
    /// Recursive; depth is bounded by [`MAX_DEPTH`](crate::MAX_DEPTH) at compile time.
    pub fn evaluate(&self, node: &N) -> bool {
        match self {
            Predicate::Single(p) => p.evaluate(node),
            Predicate::And(predicates) => predicates.iter().all(|p| p.evaluate(node)),
            Predicate::Or(predicates) => predicates.iter().any(|p| p.evaluate(node)),
            Predicate::Not(p) => !p.evaluate(node),
        }
    }

    /// Evaluate with full trace for debugging.
    ///
    /// Unlike [`evaluate()`](Self::evaluate), this does NOT short-circuit
    /// And/Or: all children are evaluated. The `matched` result is still correct.
    #[must_use]
    pub fn evaluate_with_trace(&self, node: &N) -> PredicateTrace {
        match self {
            Self::Single(p) => p.evaluate_with_trace(node),
            Self::And(predicates) => {
                let children: Vec<PredicateTrace> = predicates
                    .iter()
                    .map(|p| p.evaluate_with_trace(node))
                    .collect();
                let matched = children.iter().all(PredicateTrace::matched);
                PredicateTrace::All { matched, children }
            }
            Self::Or(predicates) => {
                let children: Vec<PredicateTrace> = predicates
                    .iter()
                    .map(|p| p.evaluate_with_trace(node))
                    .collect();
                let matched = children.iter().any(PredicateTrace::matched);
                PredicateTrace::Any { matched, children }
            }
            Self::Not(p) => {
                let inner = p.evaluate_with_trace(node);
                PredicateTrace::Not {
                    matched: !inner.matched(),
                    inner: Box::new(inner),
                }
            }
        }
    }

    /// A compound: every part must hold. One part stands alone; none is
    /// the universal `And(vec![])`.
    #[must_use]
    pub fn all_of(parts: Vec<Self>) -> Self {
        Self::collapse(parts, Self::And)
    }

    /// A selector list: some alternative must hold. One alternative stands
    /// alone; none is `Or(vec![])`, which never matches.
    #[must_use]
    pub fn any_of(alternatives: Vec<Self>) -> Self {
        Self::collapse(alternatives, Self::Or)
    }

    fn collapse(mut predicates: Vec<Self>, wrap: fn(Vec<Self>) -> Self) -> Self {
        if predicates.len() == 1 {
            if let Some(only) = predicates.pop() {
                return only;
            }
        }
        wrap(predicates)
    }
}

impl<N> Debug for Predicate<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Single(p) => f.debug_tuple("Single").field(p).finish(),
            Predicate::And(ps) => f.debug_tuple("And").field(ps).finish(),
            Predicate::Or(ps) => f.debug_tuple("Or").field(ps).finish(),
            Predicate::Not(p) => f.debug_tuple("Not").field(p).finish(),
        }
    }
}
