//! Evaluation trace for debugging rule behavior.
//!
//! [`PredicateTrace`] mirrors [`Predicate`](crate::Predicate) but records
//! outcomes: which sub-expressions held and what each atom read off the node.
//! `sift explain` prints one; fixture failures attach one.

use std::fmt;

/// Outcome of evaluating a predicate tree against one node.
///
/// Groups evaluate every child (no short-circuit), so the trace is complete
/// even where [`Predicate::evaluate`](crate::Predicate::evaluate) would stop
/// early. `matched` agrees with it either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateTrace {
    /// One node input tested by one matcher.
    Atom {
        matched: bool,
        /// The input, e.g. `AttributeInput { name: "role" }`.
        input: String,
        /// What the input read; `None` when the node has no such value.
        value: Option<String>,
        /// The matcher it was tested against.
        matcher: String,
    },
    /// Compound selector: every child must hold.
    All {
        matched: bool,
        children: Vec<PredicateTrace>,
    },
    /// Selector list: some child must hold.
    Any {
        matched: bool,
        children: Vec<PredicateTrace>,
    },
    /// `:not(...)`.
    Not {
        matched: bool,
        inner: Box<PredicateTrace>,
    },
}

impl PredicateTrace {
    /// Did this node of the tree hold?
    #[must_use]
    pub fn matched(&self) -> bool {
        match self {
            Self::Atom { matched, .. }
            | Self::All { matched, .. }
            | Self::Any { matched, .. }
            | Self::Not { matched, .. } => *matched,
        }
    }

    /// Atoms that did not hold, in evaluation order.
    #[must_use]
    pub fn failed_atoms(&self) -> Vec<&PredicateTrace> {
        let mut failed = Vec::new();
        self.collect_failed(&mut failed);
        failed
    }

    fn collect_failed<'a>(&'a self, into: &mut Vec<&'a PredicateTrace>) {
        match self {
            Self::Atom { matched: false, .. } => into.push(self),
            Self::Atom { .. } => {}
            Self::All { children, .. } | Self::Any { children, .. } => {
                children.iter().for_each(|child| child.collect_failed(into));
            }
            Self::Not { inner, .. } => inner.collect_failed(into),
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let mark = if self.matched() { "✓" } else { "✗" };
        let pad = "  ".repeat(indent);
        match self {
            Self::Atom {
                input,
                value,
                matcher,
                ..
            } => match value {
                Some(value) => writeln!(f, "{pad}{mark} {input} = {value:?} against {matcher}"),
                None => writeln!(f, "{pad}{mark} {input} is absent"),
            },
            Self::All { children, .. } | Self::Any { children, .. } => {
                let label = if matches!(self, Self::All { .. }) { "all of" } else { "any of" };
                writeln!(f, "{pad}{mark} {label}")?;
                children.iter().try_for_each(|child| child.render(f, indent + 1))
            }
            Self::Not { inner, .. } => {
                writeln!(f, "{pad}{mark} not")?;
                inner.render(f, indent + 1)
            }
        }
    }
}

impl fmt::Display for PredicateTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}
