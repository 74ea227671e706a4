//! sift - live selectors over a mutating tree
//!
//! A selector engine that finds nodes matching a structural-plus-attribute
//! pattern inside a tree it does not own, and keeps the caller informed of
//! when each match starts and when it ends.
//!
//! # Architecture
//!
//! - [`CompiledRule`]: one CSS-like rule compiled to a [`Predicate`] over nodes,
//!   plus the minimal attribute set that can change its result
//! - [`LifetimeEvent`]: a matched node paired with a [`OneShotSignal`] that fires
//!   when the match ends
//! - [`LifetimeStream`]: a push stream of lifetime events; every stream derived
//!   from an event is torn down when that event ends
//! - [`Step`] / [`Selector`]: the authoring surface (descend, union, watch,
//!   filter, map, tap)
//! - [`Pipeline`]: a compiled selector; run it against any number of roots
//! - [`Host`]: the tree collaborator (children, attributes, mutation delivery)
//!
//! # Key Design Insights
//!
//! 1. **Lifetimes, not values**: a match is a value with a start and an end.
//!    Everything derived from it stops no later than its end signal fires.
//!
//! 2. **Rules are boolean trees**: a rule compiles to `Single/And/Or/Not` over a
//!    [`DataInput`] (tag, attribute, class) and a domain-agnostic
//!    [`InputMatcher`]. An absent value never matches.
//!
//! 3. **Fail closed at compile time**: unsupported syntax is a [`SelectorError`]
//!    before any subscription exists. Runtime failures stay inside their branch
//!    and reach the [`DiagnosticSink`] exactly once.
//!
//! # Example
//!
//! ```ignore
//! use sift::prelude::*;
//!
//! let selector = Selector::new()
//!     .descend(".thread")
//!     .watch_rule(".open");
//! let pipeline = Pipeline::<MyHost>::compile(&selector)?;
//!
//! let runtime = Runtime::new(host);
//! let _subscription = pipeline.select(&runtime, root).subscribe(|emission| {
//!     if let Emission::Event(event) = emission {
//!         println!("opened {:?}", event.node);
//!     }
//! });
//! ```

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod data_input;
mod diagnostics;
mod host;
mod input_matcher;
mod lifetime;
mod matching_data;
mod parser;
mod pipeline;
mod predicate;
mod rule;
mod step;
mod stream;
mod string_match;
mod trace;

#[cfg(feature = "registry")]
mod config;
#[cfg(feature = "registry")]
mod registry;

#[cfg(test)]
mod test_support;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

// Rule compilation
pub use data_input::{AttributeInput, ClassInput, DataInput, TagNameInput};
pub use input_matcher::{ExactMatcher, InputMatcher, PatternMatcher, PresenceMatcher};
pub use matching_data::MatchingData;
pub use parser::{parse_rule, RuleNode};
pub use predicate::{Predicate, SinglePredicate};
pub use rule::CompiledRule;
pub use string_match::ValueMatchSpec;
pub use trace::PredicateTrace;

// Lifetimes and streams
pub use lifetime::{one_shot, LifetimeEvent, OneShotSignal, SignalTrigger, Subscription};
pub use stream::{Emission, LifetimeStream, Sink};

// Host collaborator
pub use host::{
    observe_children, AttributeCallback, AttributeChange, AttributeFilter, ChildListCallback,
    ChildListChange, Element, Host, HostError,
};

// Selectors and pipelines
pub use diagnostics::{BoxError, BranchError, DiagnosticSink, TracingSink};
pub use pipeline::{Pipeline, Runtime};
pub use step::{NodePredicate, NodeTransform, Selector, Step, WatchSpec};

// Config + registry (feature-gated)
#[cfg(feature = "registry")]
pub use config::{SelectorConfig, StepConfig, WatchConfig};
#[cfg(feature = "registry")]
pub use registry::{Registry, RegistryBuilder};

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════════════════════════════════════════

/// Prelude module for convenient imports.
///
/// ```
/// use sift::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Rules
        CompiledRule,
        DataInput,
        // Diagnostics
        DiagnosticSink,
        // Lifetimes
        Emission,
        // Host
        Element,
        Host,
        InputMatcher,
        LifetimeEvent,
        LifetimeStream,
        MatchingData,
        OneShotSignal,
        // Selectors
        Pipeline,
        Predicate,
        PredicateTrace,
        Runtime,
        Selector,
        // Errors
        SelectorError,
        Step,
        Subscription,
        WatchSpec,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum nesting depth of a rule (`:not(...)` inside `:not(...)`) or of a
/// selector (`Union` inside `Union`).
///
/// Compilation recurses; this bounds the stack. Checked at compile time.
pub const MAX_DEPTH: usize = 32;

/// Maximum number of alternatives in one rule, or simple selectors in one compound.
pub const MAX_PREDICATES_PER_COMPOUND: usize = 256;

/// Maximum length of one rule's text, in bytes.
pub const MAX_RULE_LENGTH: usize = 4096;

/// Maximum length of an attribute operand (`[name^=operand]`), in bytes.
pub const MAX_PATTERN_LENGTH: usize = 2048;

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration errors from rule and selector compilation.
///
/// These are raised before any subscription exists. A selector that fails to
/// compile never activates; fix the configuration and compile again.
#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    /// The rule text is not valid selector syntax.
    #[error("syntax error in rule \"{rule}\" at byte {position}: {message}")]
    Syntax {
        /// The offending rule text.
        rule: String,
        /// Byte offset of the error.
        position: usize,
        /// What the parser expected.
        message: String,
    },

    /// The rule parsed, but uses a construct the compiler does not support.
    #[error("unsupported {construct} in rule \"{rule}\"")]
    Unsupported {
        /// The offending rule text.
        rule: String,
        /// Description of the construct (e.g. ``pseudo-class `:hover` ``).
        construct: String,
    },

    /// An attribute operand could not be compiled into a pattern.
    #[error("invalid pattern \"{pattern}\": {reason}")]
    InvalidPattern {
        /// The operand that failed to compile.
        pattern: String,
        /// The underlying error message.
        reason: String,
    },

    /// A rule or operand is longer than allowed.
    #[error("{what} is {len} bytes, but maximum allowed is {max}")]
    TooLong {
        /// What was too long (`"rule"` or `"attribute operand"`).
        what: &'static str,
        /// Actual length.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Rule or selector nesting exceeds [`MAX_DEPTH`].
    #[error("nesting depth is {depth}, but maximum allowed is {max}")]
    DepthExceeded {
        /// Actual depth.
        depth: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Too many alternatives or compound parts.
    #[error("{what} has {count} entries, but maximum allowed is {max}")]
    TooManyPredicates {
        /// What overflowed (`"selector list"`, `"compound selector"`).
        what: &'static str,
        /// Actual count.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// A step descriptor is malformed (e.g. a union with no alternatives).
    #[error("invalid {step} step: {reason}")]
    InvalidStep {
        /// Kind of step (`"Union"`, `"Watch"`).
        step: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A step failed to compile; wraps the underlying error with its position.
    #[error("step {index} ({step}): {source}")]
    InStep {
        /// Zero-based index of the step within its selector.
        index: usize,
        /// Description of the step.
        step: String,
        /// The underlying error.
        #[source]
        source: Box<SelectorError>,
    },

    /// A selector config names a function that is not registered.
    #[error("unknown {kind} \"{name}\"{}", registered_hint(.available))]
    UnknownFunction {
        /// The unregistered name.
        name: String,
        /// Which table was searched (`"predicate"` or `"transform"`).
        kind: &'static str,
        /// Names that ARE registered (for self-correcting error messages).
        available: Vec<String>,
    },

    /// Selector config deserialization failed.
    #[error("invalid selector config: {reason}")]
    InvalidConfig {
        /// The underlying error message.
        reason: String,
    },
}

fn registered_hint(available: &[String]) -> String {
    if available.is_empty() {
        "; nothing is registered".to_string()
    } else {
        format!("; registered: {}", available.join(", "))
    }
}

impl SelectorError {
    /// Unwraps [`SelectorError::InStep`] layers down to the error that caused them.
    #[must_use]
    pub fn root_cause(&self) -> &SelectorError {
        match self {
            Self::InStep { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
