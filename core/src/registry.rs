//! Registry: named caller functions for config-driven selectors
//!
//! Selector configs reference predicates and transforms by name. A
//! [`RegistryBuilder`] collects them; [`build()`](RegistryBuilder::build)
//! freezes the table, and [`Registry::load_selector()`] resolves a
//! [`SelectorConfig`] into a [`Selector`].
//!
//! ```ignore
//! let registry = RegistryBuilder::<MyNode>::new()
//!     .predicate("visible", |node| node.attribute("hidden").is_none())
//!     .transform("parent", |node| node.parent())
//!     .build();
//!
//! let config = SelectorConfig::from_json(r#"[".thread", { "$filter": "visible" }]"#)?;
//! let pipeline = registry.load_pipeline::<MyHost>(&config)?;
//! ```

use crate::{
    BoxError, Host, NodePredicate, NodeTransform, Pipeline, Selector, SelectorConfig,
    SelectorError, Step, StepConfig, WatchConfig, WatchSpec, MAX_DEPTH,
};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

// ═══════════════════════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════════════════════

/// Builder for a [`Registry`].
///
/// Registering a name twice keeps the last function.
pub struct RegistryBuilder<N> {
    predicates: HashMap<String, NodePredicate<N>>,
    transforms: HashMap<String, NodeTransform<N>>,
}

impl<N: 'static> RegistryBuilder<N> {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            predicates: HashMap::new(),
            transforms: HashMap::new(),
        }
    }

    /// Register an infallible predicate, usable by `$filter` and `$watch: { fn }`.
    #[must_use]
    pub fn predicate(self, name: &str, f: impl Fn(&N) -> bool + 'static) -> Self {
        self.try_predicate(name, move |node| Ok(f(node)))
    }

    /// Register a fallible predicate.
    #[must_use]
    pub fn try_predicate(
        mut self,
        name: &str,
        f: impl Fn(&N) -> Result<bool, BoxError> + 'static,
    ) -> Self {
        self.predicates.insert(name.to_owned(), Rc::new(f));
        self
    }

    /// Register an infallible transform, usable by `$map`.
    #[must_use]
    pub fn transform(self, name: &str, f: impl Fn(&N) -> Option<N> + 'static) -> Self {
        self.try_transform(name, move |node| Ok(f(node)))
    }

    /// Register a fallible transform.
    #[must_use]
    pub fn try_transform(
        mut self,
        name: &str,
        f: impl Fn(&N) -> Result<Option<N>, BoxError> + 'static,
    ) -> Self {
        self.transforms.insert(name.to_owned(), Rc::new(f));
        self
    }

    /// Freeze the registry. No further registration is possible.
    #[must_use]
    pub fn build(self) -> Registry<N> {
        Registry {
            predicates: self.predicates,
            transforms: self.transforms,
        }
    }
}

impl<N: 'static> Default for RegistryBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable table of named predicates and transforms.
pub struct Registry<N> {
    predicates: HashMap<String, NodePredicate<N>>,
    transforms: HashMap<String, NodeTransform<N>>,
}

impl<N: 'static> Registry<N> {
    /// Resolve a selector config.
    ///
    /// # Errors
    ///
    /// - [`SelectorError::UnknownFunction`]: a `$filter`, `$map` or
    ///   `$watch: { fn }` names nothing registered
    /// - [`SelectorError::DepthExceeded`]: `$or` nests deeper than [`MAX_DEPTH`]
    ///
    /// Both are wrapped in [`SelectorError::InStep`] naming the item. Rules are
    /// not compiled here; [`Pipeline::compile`] does that.
    pub fn load_selector(&self, config: &SelectorConfig) -> Result<Selector<N>, SelectorError> {
        self.load_at(config, 1)
    }

    /// Resolve and compile in one go.
    ///
    /// # Errors
    ///
    /// Anything [`load_selector()`](Self::load_selector) or
    /// [`Pipeline::compile`] returns.
    pub fn load_pipeline<H>(&self, config: &SelectorConfig) -> Result<Pipeline<H>, SelectorError>
    where
        H: Host<Node = N>,
    {
        Pipeline::compile(&self.load_selector(config)?)
    }

    fn load_at(&self, config: &SelectorConfig, depth: usize) -> Result<Selector<N>, SelectorError> {
        if depth > MAX_DEPTH {
            return Err(SelectorError::DepthExceeded {
                depth,
                max: MAX_DEPTH,
            });
        }
        let steps = config
            .steps
            .iter()
            .enumerate()
            .map(|(index, item)| {
                self.load_step(item, depth)
                    .map_err(|source| SelectorError::InStep {
                        index,
                        step: describe(item),
                        source: Box::new(source),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Selector::from_steps(steps))
    }

    fn load_step(&self, item: &StepConfig, depth: usize) -> Result<Step<N>, SelectorError> {
        match item {
            StepConfig::Rule(rule) => Ok(Step::Descend(rule.clone())),
            StepConfig::Union { alternatives } => {
                let selectors = alternatives
                    .iter()
                    .map(|alternative| self.load_at(alternative, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Step::Union(selectors))
            }
            StepConfig::Watch {
                watch: WatchConfig::Rule(rule),
            } => Ok(Step::Watch(WatchSpec::Rule(rule.clone()))),
            StepConfig::Watch {
                watch:
                    WatchConfig::Function {
                        function,
                        attribute_filter,
                    },
            } => Ok(Step::Watch(WatchSpec::Predicate {
                name: function.clone(),
                predicate: self.lookup_predicate(function)?,
                attributes: attribute_filter.clone(),
            })),
            StepConfig::Filter { predicate } => Ok(Step::Filter {
                name: predicate.clone(),
                predicate: self.lookup_predicate(predicate)?,
            }),
            StepConfig::Map { transform } => {
                let f = self
                    .transforms
                    .get(transform)
                    .ok_or_else(|| SelectorError::UnknownFunction {
                        name: transform.clone(),
                        kind: "transform",
                        available: sorted_names(&self.transforms),
                    })?;
                Ok(Step::Map {
                    name: transform.clone(),
                    transform: Rc::clone(f),
                })
            }
            StepConfig::Log { label } => Ok(Step::DebugTap(label.clone())),
        }
    }

    fn lookup_predicate(&self, name: &str) -> Result<NodePredicate<N>, SelectorError> {
        self.predicates
            .get(name)
            .map(Rc::clone)
            .ok_or_else(|| SelectorError::UnknownFunction {
                name: name.to_owned(),
                kind: "predicate",
                available: sorted_names(&self.predicates),
            })
    }

    /// Registered predicate names, sorted.
    #[must_use]
    pub fn predicate_names(&self) -> Vec<String> {
        sorted_names(&self.predicates)
    }

    /// Registered transform names, sorted.
    #[must_use]
    pub fn transform_names(&self) -> Vec<String> {
        sorted_names(&self.transforms)
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.transforms.is_empty()
    }
}

impl<N> fmt::Debug for Registry<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("predicates", &self.predicates.len())
            .field("transforms", &self.transforms.len())
            .finish()
    }
}

fn sorted_names<V>(table: &HashMap<String, V>) -> Vec<String> {
    let mut names: Vec<String> = table.keys().cloned().collect();
    names.sort();
    names
}

fn describe(item: &StepConfig) -> String {
    match item {
        StepConfig::Rule(rule) => format!("\"{rule}\""),
        StepConfig::Union { alternatives } => format!("$or ({} alternatives)", alternatives.len()),
        StepConfig::Watch {
            watch: WatchConfig::Rule(rule),
        } => format!("$watch \"{rule}\""),
        StepConfig::Watch {
            watch: WatchConfig::Function { function, .. },
        } => format!("$watch fn {function}"),
        StepConfig::Filter { predicate } => format!("$filter {predicate}"),
        StepConfig::Map { transform } => format!("$map {transform}"),
        StepConfig::Log { label } => format!("$log {label}"),
    }
}
