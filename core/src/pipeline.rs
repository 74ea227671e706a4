//! Pipeline: a compiled [`Selector`] and the [`Runtime`] it runs in
//!
//! Compilation checks every step up front (rules parse and compile, unions are
//! non-empty, nesting is bounded), so a pipeline that exists never fails at
//! configuration level. Running it folds the steps over a seed stream:
//!
//! ```text
//! once(root) ─▶ step[0] ─▶ step[1] ─▶ ... ─▶ report_errors(diagnostics)
//! ```

use crate::{
    one_shot, AttributeChange, AttributeFilter, BoxError, BranchError, CompiledRule,
    DiagnosticSink, Element, Emission, Host, LifetimeEvent, LifetimeStream, NodePredicate,
    NodeTransform, Selector, SelectorError, SignalTrigger, Step, Subscription, TracingSink,
    WatchSpec, MAX_DEPTH,
};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// The environment a pipeline runs in: the host tree and the diagnostic sink.
pub struct Runtime<H: Host> {
    host: Rc<H>,
    diagnostics: Rc<dyn DiagnosticSink>,
}

impl<H: Host> Clone for Runtime<H> {
    fn clone(&self) -> Self {
        Self {
            host: Rc::clone(&self.host),
            diagnostics: Rc::clone(&self.diagnostics),
        }
    }
}

impl<H: Host> Runtime<H> {
    /// A runtime over `host`, reporting failures through [`TracingSink`].
    pub fn new(host: Rc<H>) -> Self {
        Self {
            host,
            diagnostics: Rc::new(TracingSink),
        }
    }

    /// Replace the diagnostic sink.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Rc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// The host tree.
    #[must_use]
    pub fn host(&self) -> &Rc<H> {
        &self.host
    }
}

impl<H: Host> fmt::Debug for Runtime<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime").finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Compiled steps
// ═══════════════════════════════════════════════════════════════════════════════

struct CompiledWatch<N> {
    label: String,
    condition: WatchCondition<N>,
    filter: AttributeFilter,
}

enum WatchCondition<N> {
    Rule(CompiledRule<N>),
    Predicate(NodePredicate<N>),
}

impl<N: Element> CompiledWatch<N> {
    fn evaluate(&self, node: &N) -> Result<bool, BoxError> {
        match &self.condition {
            WatchCondition::Rule(rule) => Ok(rule.matches(node)),
            WatchCondition::Predicate(predicate) => predicate(node),
        }
    }
}

enum CompiledStep<H: Host> {
    Descend(Rc<CompiledRule<H::Node>>),
    Union(Rc<[Pipeline<H>]>),
    Watch(Rc<CompiledWatch<H::Node>>),
    Filter(Rc<str>, NodePredicate<H::Node>),
    Map(Rc<str>, NodeTransform<H::Node>),
    DebugTap(Rc<str>),
}

impl<H: Host> CompiledStep<H> {
    fn compile(step: &Step<H::Node>, depth: usize) -> Result<Self, SelectorError> {
        let label: Rc<str> = step.describe().into();
        match step {
            Step::Descend(rule) => Ok(Self::Descend(Rc::new(CompiledRule::compile(rule)?))),
            Step::Union(alternatives) => {
                if alternatives.is_empty() {
                    return Err(SelectorError::InvalidStep {
                        step: "Union",
                        reason: "a union needs at least one alternative".to_string(),
                    });
                }
                let pipelines = alternatives
                    .iter()
                    .map(|alternative| Pipeline::compile_at(alternative, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Union(pipelines.into()))
            }
            Step::Watch(WatchSpec::Rule(rule)) => {
                let rule = CompiledRule::compile(rule)?;
                let filter = AttributeFilter::Only(rule.relevant_attributes().to_vec());
                Ok(Self::Watch(Rc::new(CompiledWatch {
                    label: label.to_string(),
                    condition: WatchCondition::Rule(rule),
                    filter,
                })))
            }
            Step::Watch(WatchSpec::Predicate {
                predicate,
                attributes,
                ..
            }) => {
                let filter = match attributes {
                    None => AttributeFilter::All,
                    Some(names) if names.is_empty() => {
                        return Err(SelectorError::InvalidStep {
                            step: "Watch",
                            reason: "empty attribute filter; use None to observe every attribute"
                                .to_string(),
                        })
                    }
                    Some(names) => AttributeFilter::Only(names.clone()),
                };
                Ok(Self::Watch(Rc::new(CompiledWatch {
                    label: label.to_string(),
                    condition: WatchCondition::Predicate(Rc::clone(predicate)),
                    filter,
                })))
            }
            Step::Filter { predicate, .. } => Ok(Self::Filter(label, Rc::clone(predicate))),
            Step::Map { transform, .. } => Ok(Self::Map(label, Rc::clone(transform))),
            Step::DebugTap(tap) if tap.is_empty() => Err(SelectorError::InvalidStep {
                step: "DebugTap",
                reason: "empty label".to_string(),
            }),
            Step::DebugTap(tap) => Ok(Self::DebugTap(tap.as_str().into())),
        }
    }

    fn apply(&self, runtime: &Runtime<H>, input: LifetimeStream<H::Node>) -> LifetimeStream<H::Node> {
        match self {
            Self::Descend(rule) => {
                let host = Rc::clone(&runtime.host);
                let rule = Rc::clone(rule);
                input.flat_map(move |event| {
                    let rule = Rc::clone(&rule);
                    Rc::clone(&host)
                        .child_lifetimes(event.node)
                        .filter_map(move |child| Ok(rule.matches(&child.node).then_some(child)))
                })
            }
            Self::Union(alternatives) => {
                let alternatives = Rc::clone(alternatives);
                let runtime = runtime.clone();
                input.flat_map(move |event| {
                    LifetimeStream::merge(
                        alternatives
                            .iter()
                            .map(|pipeline| pipeline.stream_from(&runtime, event.clone()))
                            .collect(),
                    )
                })
            }
            Self::Watch(watch) => {
                let host = Rc::clone(&runtime.host);
                let watch = Rc::clone(watch);
                input.flat_map(move |event| watch_node(Rc::clone(&host), Rc::clone(&watch), event))
            }
            Self::Filter(label, predicate) => {
                let label = Rc::clone(label);
                let predicate = Rc::clone(predicate);
                input.filter_map(move |event| match predicate(&event.node) {
                    Ok(keep) => Ok(keep.then_some(event)),
                    Err(source) => Err(BranchError::Callback {
                        step: label.to_string(),
                        source,
                    }),
                })
            }
            Self::Map(label, transform) => {
                let label = Rc::clone(label);
                let transform = Rc::clone(transform);
                input.filter_map(move |event| match transform(&event.node) {
                    Ok(node) => Ok(node.map(|node| event.with_node(node))),
                    Err(source) => Err(BranchError::Callback {
                        step: label.to_string(),
                        source,
                    }),
                })
            }
            Self::DebugTap(label) => {
                let label = Rc::clone(label);
                input.inspect(move |event| {
                    tracing::debug!(tap = %label, node = ?event.node, "lifetime event");
                })
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Watch
// ═══════════════════════════════════════════════════════════════════════════════

/// Edge detector for one watched node.
#[derive(Default)]
struct WatchState {
    done: Cell<bool>,
    open: RefCell<Option<SignalTrigger>>,
    observation: RefCell<Option<Subscription>>,
    input_end: RefCell<Option<Subscription>>,
}

impl WatchState {
    fn recheck<H: Host>(
        &self,
        host: &H,
        watch: &CompiledWatch<H::Node>,
        node: &H::Node,
        sink: &dyn Fn(Emission<H::Node>),
    ) {
        if self.done.get() {
            return;
        }
        // A detached node is never a match.
        let outcome = if host.is_attached(node) {
            watch.evaluate(node)
        } else {
            Ok(false)
        };

        match outcome {
            Ok(true) => {
                if self.open.borrow().is_some() {
                    return;
                }
                let (trigger, end) = one_shot();
                *self.open.borrow_mut() = Some(trigger);
                tracing::trace!(watch = %watch.label, ?node, "condition became true");
                sink(Emission::Event(LifetimeEvent::new(node.clone(), end)));
            }
            Ok(false) => {
                let closing = self.open.borrow_mut().take();
                if let Some(trigger) = closing {
                    tracing::trace!(watch = %watch.label, ?node, "condition became false");
                    trigger.fire();
                }
            }
            Err(source) => {
                sink(Emission::Error(BranchError::Callback {
                    step: watch.label.clone(),
                    source,
                }));
                if self.finish() {
                    sink(Emission::End);
                }
            }
        }
    }

    /// Close any open event and release observers. Returns false if already done.
    fn finish(&self) -> bool {
        if self.done.replace(true) {
            return false;
        }
        let closing = self.open.borrow_mut().take();
        if let Some(trigger) = closing {
            trigger.fire();
        }
        let observation = self.observation.borrow_mut().take();
        drop(observation);
        let input_end = self.input_end.borrow_mut().take();
        drop(input_end);
        true
    }
}

fn watch_node<H: Host>(
    host: Rc<H>,
    watch: Rc<CompiledWatch<H::Node>>,
    event: LifetimeEvent<H::Node>,
) -> LifetimeStream<H::Node> {
    LifetimeStream::from_fn(move |sink| {
        let state = Rc::new(WatchState::default());

        let recheck: Rc<dyn Fn()> = {
            let state = Rc::downgrade(&state);
            let host = Rc::clone(&host);
            let watch = Rc::clone(&watch);
            let node = event.node.clone();
            let sink = Rc::clone(&sink);
            Rc::new(move || {
                if let Some(state) = state.upgrade() {
                    state.recheck(&*host, &watch, &node, &*sink);
                }
            })
        };

        let on_change = Rc::clone(&recheck);
        let observed = host.observe_attributes(
            &event.node,
            &watch.filter,
            Box::new(move |_: &[AttributeChange]| on_change()),
        );
        match observed {
            Ok(observation) => *state.observation.borrow_mut() = Some(observation),
            Err(source) => {
                sink(Emission::Error(BranchError::Host {
                    step: watch.label.clone(),
                    source,
                }));
                sink(Emission::End);
                return Subscription::empty();
            }
        }

        let weak = Rc::downgrade(&state);
        let end_sink = Rc::clone(&sink);
        let input_end = event.end.on_fire(move || {
            if let Some(state) = weak.upgrade() {
                if state.finish() {
                    end_sink(Emission::End);
                }
            }
        });
        if state.done.get() {
            drop(input_end);
        } else {
            *state.input_end.borrow_mut() = Some(input_end);
        }

        recheck();
        Subscription::new(move || {
            state.finish();
        })
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Pipeline
// ═══════════════════════════════════════════════════════════════════════════════

/// A compiled selector.
///
/// Cheap to clone; run it any number of times, against any roots.
pub struct Pipeline<H: Host> {
    steps: Rc<[CompiledStep<H>]>,
}

impl<H: Host> Clone for Pipeline<H> {
    fn clone(&self) -> Self {
        Self {
            steps: Rc::clone(&self.steps),
        }
    }
}

impl<H: Host> fmt::Debug for Pipeline<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.steps.len())
            .finish()
    }
}

impl<H: Host> Pipeline<H> {
    /// Compile every step of `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::InStep`] wrapping the first failing step's
    /// error (rule syntax, unsupported construct, malformed step), or
    /// [`SelectorError::DepthExceeded`] if unions nest deeper than [`MAX_DEPTH`].
    pub fn compile(selector: &Selector<H::Node>) -> Result<Self, SelectorError> {
        Self::compile_at(selector, 1)
    }

    fn compile_at(selector: &Selector<H::Node>, depth: usize) -> Result<Self, SelectorError> {
        if depth > MAX_DEPTH {
            return Err(SelectorError::DepthExceeded {
                depth,
                max: MAX_DEPTH,
            });
        }
        let steps = selector
            .steps()
            .iter()
            .enumerate()
            .map(|(index, step)| {
                CompiledStep::compile(step, depth).map_err(|source| SelectorError::InStep {
                    index,
                    step: step.describe(),
                    source: Box::new(source),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(steps = steps.len(), depth, "compiled selector");
        Ok(Self {
            steps: steps.into(),
        })
    }

    /// Number of top-level steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Does this pipeline pass the root through unchanged?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run from `root`, seeded with an event whose end signal never fires.
    ///
    /// Branch failures go to the runtime's diagnostic sink; the returned
    /// stream carries only events and `End`.
    ///
    /// `root` need not be attached, but every `Watch` evaluates to false
    /// while its node is detached ([`Host::is_attached`]). A `Watch` on a
    /// detached root, or on anything below it, opens only once that subtree
    /// joins the tree and a watched attribute changes.
    #[must_use]
    pub fn select(&self, runtime: &Runtime<H>, root: H::Node) -> LifetimeStream<H::Node> {
        self.select_from(runtime, LifetimeEvent::root(root))
    }

    /// Run from an existing lifetime event; everything emitted ends no later
    /// than `seed` does.
    #[must_use]
    pub fn select_from(
        &self,
        runtime: &Runtime<H>,
        seed: LifetimeEvent<H::Node>,
    ) -> LifetimeStream<H::Node> {
        self.stream_from(runtime, seed)
            .report_errors(Rc::clone(&runtime.diagnostics))
    }

    fn stream_from(&self, runtime: &Runtime<H>, seed: LifetimeEvent<H::Node>) -> LifetimeStream<H::Node> {
        self.steps
            .iter()
            .fold(LifetimeStream::once(seed), |stream, step| step.apply(runtime, stream))
    }
}
