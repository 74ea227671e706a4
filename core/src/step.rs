//! Steps and selectors: the authoring surface
//!
//! A [`Selector`] is an ordered list of [`Step`]s. It is plain data: nothing
//! is compiled or subscribed until it becomes a [`Pipeline`](crate::Pipeline).
//!
//! | Step | Per input event |
//! |------|-----------------|
//! | `Descend(rule)` | each current and future child matching `rule` |
//! | `Union(selectors)` | every selector, seeded with the event, merged |
//! | `Watch(spec)` | the node, once per false→true transition |
//! | `Filter(p)` | the event, if `p` holds when it arrives |
//! | `Map(f)` | `f(node)` with the same end signal, unless `f` yields nothing |
//! | `DebugTap(label)` | the event, logged |

use crate::BoxError;
use std::fmt;
use std::rc::Rc;

/// A fallible predicate over nodes.
pub type NodePredicate<N> = Rc<dyn Fn(&N) -> Result<bool, BoxError>>;

/// A fallible node transform; `Ok(None)` drops the event.
pub type NodeTransform<N> = Rc<dyn Fn(&N) -> Result<Option<N>, BoxError>>;

/// What a `Watch` step re-evaluates when attributes change.
#[derive(Clone)]
pub enum WatchSpec<N> {
    /// A rule; only its relevant attributes are observed.
    Rule(String),
    /// A named predicate. `attributes: None` observes every attribute.
    Predicate {
        /// Label for logs and diagnostics.
        name: String,
        /// The condition.
        predicate: NodePredicate<N>,
        /// Attribute filter.
        attributes: Option<Vec<String>>,
    },
}

/// One transformation of a lifetime-event stream.
#[derive(Clone)]
pub enum Step<N> {
    /// Children of each event's node that match the rule.
    Descend(String),
    /// Run each selector from the incoming event; merge the outputs.
    Union(Vec<Selector<N>>),
    /// Edge-triggered open/close events while a condition holds.
    Watch(WatchSpec<N>),
    /// One-time gate on arrival.
    Filter {
        /// Label for logs and diagnostics.
        name: String,
        /// The gate.
        predicate: NodePredicate<N>,
    },
    /// Swap the node, keep the end signal.
    Map {
        /// Label for logs and diagnostics.
        name: String,
        /// The transform.
        transform: NodeTransform<N>,
    },
    /// Log each event at `debug` and pass it through.
    DebugTap(String),
}

impl<N> Step<N> {
    /// Short kind name (`"Descend"`, `"Union"`, ...).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Descend(_) => "Descend",
            Self::Union(_) => "Union",
            Self::Watch(_) => "Watch",
            Self::Filter { .. } => "Filter",
            Self::Map { .. } => "Map",
            Self::DebugTap(_) => "DebugTap",
        }
    }

    /// Human-readable label, e.g. `Descend(.thread)` or `Filter(visible)`.
    #[must_use]
    pub fn describe(&self) -> String {
        let detail = match self {
            Self::Descend(rule) | Self::Watch(WatchSpec::Rule(rule)) => rule.clone(),
            Self::Union(alternatives) => format!("{} alternatives", alternatives.len()),
            Self::Watch(WatchSpec::Predicate { name, .. })
            | Self::Filter { name, .. }
            | Self::Map { name, .. }
            | Self::DebugTap(name) => name.clone(),
        };
        format!("{}({detail})", self.kind())
    }
}

impl<N> fmt::Debug for Step<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// An ordered list of steps.
///
/// # Example
///
/// ```
/// use sift::Selector;
/// # #[derive(Clone, Debug)] struct Node;
///
/// let selector: Selector<Node> = Selector::new()
///     .descend(".thread")
///     .union(vec![
///         Selector::new().descend(".header"),
///         Selector::new().descend(".body"),
///     ])
///     .watch_rule(".open")
///     .tap("open threads");
/// assert_eq!(selector.steps().len(), 4);
/// ```
#[derive(Clone)]
pub struct Selector<N> {
    steps: Vec<Step<N>>,
}

impl<N> Default for Selector<N> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<N> Selector<N> {
    /// An empty selector: emits the root event unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A selector from prepared steps.
    #[must_use]
    pub fn from_steps(steps: Vec<Step<N>>) -> Self {
        Self { steps }
    }

    /// The steps, in order.
    #[must_use]
    pub fn steps(&self) -> &[Step<N>] {
        &self.steps
    }

    /// Append any step.
    #[must_use]
    pub fn step(mut self, step: Step<N>) -> Self {
        self.steps.push(step);
        self
    }

    /// Append `Descend(rule)`.
    #[must_use]
    pub fn descend(self, rule: impl Into<String>) -> Self {
        self.step(Step::Descend(rule.into()))
    }

    /// Append `Union(alternatives)`.
    #[must_use]
    pub fn union(self, alternatives: Vec<Selector<N>>) -> Self {
        self.step(Step::Union(alternatives))
    }

    /// Append `Watch` over a rule.
    #[must_use]
    pub fn watch_rule(self, rule: impl Into<String>) -> Self {
        self.step(Step::Watch(WatchSpec::Rule(rule.into())))
    }

    /// Append `DebugTap(label)`.
    #[must_use]
    pub fn tap(self, label: impl Into<String>) -> Self {
        self.step(Step::DebugTap(label.into()))
    }
}

impl<N: 'static> Selector<N> {
    /// Append `Watch` over an infallible predicate.
    #[must_use]
    pub fn watch(
        self,
        name: impl Into<String>,
        attributes: Option<Vec<String>>,
        predicate: impl Fn(&N) -> bool + 'static,
    ) -> Self {
        self.try_watch(name, attributes, move |node| Ok(predicate(node)))
    }

    /// Append `Watch` over a fallible predicate.
    #[must_use]
    pub fn try_watch(
        self,
        name: impl Into<String>,
        attributes: Option<Vec<String>>,
        predicate: impl Fn(&N) -> Result<bool, BoxError> + 'static,
    ) -> Self {
        self.step(Step::Watch(WatchSpec::Predicate {
            name: name.into(),
            predicate: Rc::new(predicate),
            attributes,
        }))
    }

    /// Append `Filter` over an infallible predicate.
    #[must_use]
    pub fn filter(self, name: impl Into<String>, predicate: impl Fn(&N) -> bool + 'static) -> Self {
        self.try_filter(name, move |node| Ok(predicate(node)))
    }

    /// Append `Filter` over a fallible predicate.
    #[must_use]
    pub fn try_filter(
        self,
        name: impl Into<String>,
        predicate: impl Fn(&N) -> Result<bool, BoxError> + 'static,
    ) -> Self {
        self.step(Step::Filter {
            name: name.into(),
            predicate: Rc::new(predicate),
        })
    }

    /// Append `Map` over an infallible transform.
    #[must_use]
    pub fn map(self, name: impl Into<String>, transform: impl Fn(&N) -> Option<N> + 'static) -> Self {
        self.try_map(name, move |node| Ok(transform(node)))
    }

    /// Append `Map` over a fallible transform.
    #[must_use]
    pub fn try_map(
        self,
        name: impl Into<String>,
        transform: impl Fn(&N) -> Result<Option<N>, BoxError> + 'static,
    ) -> Self {
        self.step(Step::Map {
            name: name.into(),
            transform: Rc::new(transform),
        })
    }
}

impl<N> fmt::Debug for Selector<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.steps).finish()
    }
}
