//! Lifetimes: one-shot end signals, RAII subscriptions, lifetime events
//!
//! A [`LifetimeEvent`] is a node plus a [`OneShotSignal`] that fires exactly
//! once, when the match ends. Firing is synchronous: every listener runs before
//! [`SignalTrigger::fire`] returns, so anything derived from the event is torn
//! down before control returns to the caller.
//!
//! Everything here is single-threaded (`Rc`, `Cell`, `RefCell`). Listener
//! callbacks may freely subscribe, unsubscribe or fire other signals; no
//! `RefCell` borrow is held while user code runs.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

type Listener = Box<dyn FnOnce()>;

#[derive(Default)]
struct SignalState {
    fired: Cell<bool>,
    next_id: Cell<u64>,
    listeners: RefCell<VecDeque<(u64, Listener)>>,
}

impl SignalState {
    fn fire(&self) {
        if self.fired.replace(true) {
            return;
        }
        // One at a time: a listener may cancel a later one.
        loop {
            let next = self.listeners.borrow_mut().pop_front();
            match next {
                Some((_, listener)) => listener(),
                None => break,
            }
        }
    }

    fn remove(&self, id: u64) {
        let removed = {
            let mut listeners = self.listeners.borrow_mut();
            listeners
                .iter()
                .position(|(candidate, _)| *candidate == id)
                .and_then(|index| listeners.remove(index))
        };
        // Dropped outside the borrow; the closure may own subscriptions.
        drop(removed);
    }
}

/// Create a connected trigger/signal pair.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let (trigger, signal) = sift::one_shot();
/// let ran = Rc::new(Cell::new(0));
/// let counter = Rc::clone(&ran);
/// let _listener = signal.on_fire(move || counter.set(counter.get() + 1));
///
/// trigger.fire();
/// trigger.fire();
/// assert_eq!(ran.get(), 1);
/// assert!(signal.is_fired());
/// ```
#[must_use]
pub fn one_shot() -> (SignalTrigger, OneShotSignal) {
    let state = Rc::new(SignalState::default());
    (
        SignalTrigger {
            state: Rc::clone(&state),
        },
        OneShotSignal { state },
    )
}

/// The observing half of a one-shot end signal.
///
/// Cloning shares the same underlying signal.
#[derive(Clone)]
pub struct OneShotSignal {
    state: Rc<SignalState>,
}

impl OneShotSignal {
    /// A signal that never fires. Used for the root seed event.
    #[must_use]
    pub fn never() -> Self {
        Self {
            state: Rc::new(SignalState::default()),
        }
    }

    /// Has this signal fired?
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.state.fired.get()
    }

    /// Run `listener` when the signal fires.
    ///
    /// If the signal already fired, `listener` runs immediately. Dropping the
    /// returned [`Subscription`] unregisters the listener.
    pub fn on_fire(&self, listener: impl FnOnce() + 'static) -> Subscription {
        if self.is_fired() {
            listener();
            return Subscription::empty();
        }
        let id = self.state.next_id.get();
        self.state.next_id.set(id + 1);
        self.state
            .listeners
            .borrow_mut()
            .push_back((id, Box::new(listener)));

        let state: Weak<SignalState> = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.remove(id);
            }
        })
    }

    /// Do two handles observe the same signal?
    #[must_use]
    pub fn same_signal(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for OneShotSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShotSignal")
            .field("fired", &self.is_fired())
            .finish()
    }
}

/// The firing half of a one-shot end signal.
///
/// Only the producer of a [`LifetimeEvent`] holds this. Dropping it without
/// firing leaves the signal unfired forever.
pub struct SignalTrigger {
    state: Rc<SignalState>,
}

impl SignalTrigger {
    /// Fire the signal. Runs every listener synchronously; later calls are no-ops.
    pub fn fire(&self) {
        self.state.fire();
    }

    /// Has this signal fired?
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.state.fired.get()
    }
}

impl fmt::Debug for SignalTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalTrigger")
            .field("fired", &self.is_fired())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Subscription
// ═══════════════════════════════════════════════════════════════════════════════

/// Teardown handle for a stream subscription or signal listener.
///
/// Dropping it (or calling [`cancel`](Self::cancel)) runs the teardown exactly
/// once. Teardown of a stream fires the end signal of every event it still
/// has live.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wrap a teardown closure.
    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn empty() -> Self {
        Self { teardown: None }
    }

    /// Tear down several subscriptions together, in order.
    pub fn all(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || {
            for subscription in subscriptions {
                subscription.cancel();
            }
        })
    }

    /// Tear down now.
    pub fn cancel(mut self) {
        self.run();
    }

    /// Give up the handle without tearing down; the subscription lives as
    /// long as its source does.
    pub fn detach(mut self) {
        self.teardown = None;
    }

    fn run(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LifetimeEvent
// ═══════════════════════════════════════════════════════════════════════════════

/// A matched node and the signal that marks the end of the match.
#[derive(Clone, Debug)]
pub struct LifetimeEvent<N> {
    /// The matched node.
    pub node: N,
    /// Fires exactly once, when the match ends.
    pub end: OneShotSignal,
}

impl<N> LifetimeEvent<N> {
    /// Pair a node with an end signal.
    pub fn new(node: N, end: OneShotSignal) -> Self {
        Self { node, end }
    }

    /// The seed event for a pipeline: `node`, with an end signal that never fires.
    pub fn root(node: N) -> Self {
        Self {
            node,
            end: OneShotSignal::never(),
        }
    }

    /// Same end signal, different node.
    pub fn with_node<M>(&self, node: M) -> LifetimeEvent<M> {
        LifetimeEvent {
            node,
            end: self.end.clone(),
        }
    }
}
