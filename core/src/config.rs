//! Data-shaped selectors.
//!
//! A selector config is a list of steps, written the way selectors are usually
//! stored next to the code that consumes them:
//!
//! | Config item | Step |
//! |-------------|------|
//! | `"rule"` | `Descend(rule)` |
//! | `{ "$or": [[...], [...]] }` | `Union` |
//! | `{ "$watch": "rule" }` | `Watch(Rule)` |
//! | `{ "$watch": { "fn": "name", "attribute_filter": [...] } }` | `Watch(Predicate)` |
//! | `{ "$filter": "name" }` | `Filter` |
//! | `{ "$map": "name" }` | `Map` |
//! | `{ "$log": "label" }` | `DebugTap` |
//!
//! Functions are referenced by name and resolved by
//! [`Registry::load_selector()`](crate::Registry::load_selector).

use crate::SelectorError;
use serde::Deserialize;

/// A list of steps.
///
/// ```json
/// [".thread", { "$watch": ".open" }, { "$map": "parent" }]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SelectorConfig {
    /// Steps in order.
    pub steps: Vec<StepConfig>,
}

impl SelectorConfig {
    /// Parse a selector from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::InvalidConfig`] if the text is not a valid
    /// selector config.
    pub fn from_json(text: &str) -> Result<Self, SelectorError> {
        serde_json::from_str(text).map_err(|e| SelectorError::InvalidConfig {
            reason: e.to_string(),
        })
    }
}

/// One selector item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged, deny_unknown_fields)]
pub enum StepConfig {
    /// A bare string descends into matching children.
    Rule(String),

    /// Run every alternative from the incoming event and merge.
    Union {
        /// Alternative selectors.
        #[serde(rename = "$or")]
        alternatives: Vec<SelectorConfig>,
    },

    /// Edge-triggered re-evaluation on attribute changes.
    Watch {
        /// The condition.
        #[serde(rename = "$watch")]
        watch: WatchConfig,
    },

    /// Gate each event through a registered predicate.
    Filter {
        /// Registered predicate name.
        #[serde(rename = "$filter")]
        predicate: String,
    },

    /// Swap each node through a registered transform.
    Map {
        /// Registered transform name.
        #[serde(rename = "$map")]
        transform: String,
    },

    /// Log each event at `debug`.
    Log {
        /// Label for the log line.
        #[serde(rename = "$log")]
        label: String,
    },
}

/// The condition of a `$watch` item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged, deny_unknown_fields)]
pub enum WatchConfig {
    /// A rule; its relevant attributes become the filter.
    Rule(String),

    /// A registered predicate.
    Function {
        /// Registered predicate name.
        #[serde(rename = "fn")]
        function: String,
        /// Attributes to observe; absent observes all.
        #[serde(default)]
        attribute_filter: Option<Vec<String>>,
    },
}
