//! Host: the tree the engine observes but does not own
//!
//! The host exposes node properties ([`Element`]), child enumeration,
//! attachment checks and batched mutation delivery ([`Host`]). Mutation
//! callbacks run synchronously, one batch at a time, in tree-mutation order.

use crate::{one_shot, BranchError, Emission, LifetimeEvent, LifetimeStream, SignalTrigger, Subscription};
use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

/// Read-only view of one node.
///
/// Handles are cheap to clone and compare by identity.
pub trait Element: Clone + Debug + 'static {
    /// The node's tag name.
    fn tag_name(&self) -> String;

    /// An attribute's value, or `None` when absent.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Is the attribute present (possibly empty)?
    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Does the `class` list contain `class`?
    fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|t| t == class))
    }

    /// Are both handles the same node?
    fn same_node(&self, other: &Self) -> bool;
}

/// Which attribute changes an observer wants to hear about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttributeFilter {
    /// Every attribute.
    #[default]
    All,
    /// Only these attribute names.
    Only(Vec<String>),
}

impl AttributeFilter {
    /// Does a change to `name` pass this filter?
    #[must_use]
    pub fn includes(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

/// One child-list mutation record.
#[derive(Debug, Clone)]
pub struct ChildListChange<N> {
    /// Children added, in insertion order.
    pub added: Vec<N>,
    /// Children removed.
    pub removed: Vec<N>,
}

/// One attribute mutation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    /// The attribute that changed.
    pub name: String,
    /// Its value before the change.
    pub old_value: Option<String>,
}

/// Receives batches of child-list records for one observed node.
pub type ChildListCallback<N> = Box<dyn FnMut(&[ChildListChange<N>])>;

/// Receives batches of attribute records for one observed node.
pub type AttributeCallback = Box<dyn FnMut(&[AttributeChange])>;

/// Failures reported by a host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The host refused or lost the observation.
    #[error("mutation observation failed: {reason}")]
    ObserveFailed {
        /// Why.
        reason: String,
    },
}

/// The tree collaborator.
///
/// # Example
///
/// ```ignore
/// impl Host for Document {
///     type Node = NodeRef;
///
///     fn children(&self, node: &NodeRef) -> Vec<NodeRef> { node.children() }
///     fn is_attached(&self, node: &NodeRef) -> bool { self.contains(node) }
///     fn observe_child_list(&self, node: &NodeRef, callback: ChildListCallback<NodeRef>)
///         -> Result<Subscription, HostError> { self.observers.child_list(node, callback) }
///     fn observe_attributes(&self, node: &NodeRef, filter: &AttributeFilter, callback: AttributeCallback)
///         -> Result<Subscription, HostError> { self.observers.attributes(node, filter, callback) }
/// }
/// ```
pub trait Host: 'static {
    /// Node handle type.
    type Node: Element;

    /// Current children of `node`, in document order.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Is `node` currently part of the tree?
    ///
    /// `Watch` steps consult this before every evaluation and treat a node
    /// answering `false` as not matching, so a root outside the tree never
    /// opens a `Watch` until it is attached.
    fn is_attached(&self, node: &Self::Node) -> bool;

    /// Deliver child-list mutation batches for `node` until the subscription drops.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the host cannot observe `node`.
    fn observe_child_list(
        &self,
        node: &Self::Node,
        callback: ChildListCallback<Self::Node>,
    ) -> Result<Subscription, HostError>;

    /// Deliver attribute mutation batches for `node` until the subscription drops.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the host cannot observe `node`.
    fn observe_attributes(
        &self,
        node: &Self::Node,
        filter: &AttributeFilter,
        callback: AttributeCallback,
    ) -> Result<Subscription, HostError>;

    /// The children of `parent`, each as a lifetime event that ends when the
    /// child is removed.
    ///
    /// Current children are emitted first, in document order; later additions
    /// follow as mutation batches arrive. The default implementation is
    /// [`observe_children`].
    fn child_lifetimes(self: Rc<Self>, parent: Self::Node) -> LifetimeStream<Self::Node>
    where
        Self: Sized,
    {
        observe_children(self, parent)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Child lifetimes
// ═══════════════════════════════════════════════════════════════════════════════

struct ChildWatch<N> {
    closed: Cell<bool>,
    live: RefCell<Vec<(N, SignalTrigger)>>,
    observation: RefCell<Option<Subscription>>,
}

impl<N: Element> ChildWatch<N> {
    fn open(&self, child: N, sink: &dyn Fn(Emission<N>)) {
        if self.closed.get() || self.live.borrow().iter().any(|(n, _)| n.same_node(&child)) {
            return;
        }
        let (trigger, end) = one_shot();
        self.live.borrow_mut().push((child.clone(), trigger));
        sink(Emission::Event(LifetimeEvent::new(child, end)));
    }

    fn close(&self, child: &N) {
        let released = {
            let mut live = self.live.borrow_mut();
            live.iter()
                .position(|(n, _)| n.same_node(child))
                .map(|index| live.remove(index))
        };
        if let Some((_, trigger)) = released {
            trigger.fire();
        }
    }

    fn teardown(&self) {
        if self.closed.replace(true) {
            return;
        }
        let observation = self.observation.borrow_mut().take();
        loop {
            let next = {
                let mut live = self.live.borrow_mut();
                (!live.is_empty()).then(|| live.remove(0))
            };
            match next {
                Some((_, trigger)) => trigger.fire(),
                None => break,
            }
        }
        drop(observation);
    }
}

/// Child lifetimes built from [`Host::children`] and [`Host::observe_child_list`].
///
/// The observation is registered before the current children are listed, so no
/// addition between the two is lost. Within a batch, records apply in order,
/// and within a record removals apply before additions. A failed observation
/// emits [`Emission::Error`] and ends the stream.
pub fn observe_children<H: Host>(host: Rc<H>, parent: H::Node) -> LifetimeStream<H::Node> {
    LifetimeStream::from_fn(move |sink| {
        let watch = Rc::new(ChildWatch {
            closed: Cell::new(false),
            live: RefCell::new(Vec::new()),
            observation: RefCell::new(None),
        });

        let weak = Rc::downgrade(&watch);
        let deliver = Rc::clone(&sink);
        let observed = host.observe_child_list(
            &parent,
            Box::new(move |changes: &[ChildListChange<H::Node>]| {
                let Some(watch) = weak.upgrade() else {
                    return;
                };
                for change in changes {
                    for removed in &change.removed {
                        watch.close(removed);
                    }
                    for added in &change.added {
                        watch.open(added.clone(), &*deliver);
                    }
                }
            }),
        );

        match observed {
            Ok(observation) => *watch.observation.borrow_mut() = Some(observation),
            Err(source) => {
                sink(Emission::Error(BranchError::Host {
                    step: format!("children of {parent:?}"),
                    source,
                }));
                sink(Emission::End);
                return Subscription::empty();
            }
        }

        for child in host.children(&parent) {
            watch.open(child, &*sink);
        }
        Subscription::new(move || watch.teardown())
    })
}
