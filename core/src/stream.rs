//! `LifetimeStream`: cold push streams of lifetime events
//!
//! A stream does nothing until subscribed. Each subscription runs the producer
//! afresh and returns a [`Subscription`]; dropping it tears the producer down
//! and fires the end signal of every event the producer still has live.
//!
//! # Containment
//!
//! [`flat_map`](LifetimeStream::flat_map) bounds every derived stream by the
//! event it was derived from: when the parent's end signal fires, the derived
//! subscription is torn down and each derived event's end signal fires, all
//! before the parent's `fire()` returns.
//!
//! # Emissions
//!
//! - `Event`: a new lifetime event
//! - `Error`: a branch failed; the stream keeps going (the failing branch
//!   already ended itself)
//! - `End`: no more events will be emitted; already-emitted events stay live
//!   until their own end signals fire

use crate::{one_shot, BranchError, DiagnosticSink, LifetimeEvent, OneShotSignal, SignalTrigger, Subscription};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// One item pushed to a subscriber.
#[derive(Debug)]
pub enum Emission<N> {
    /// A new lifetime event.
    Event(LifetimeEvent<N>),
    /// A branch of the stream failed.
    Error(BranchError),
    /// The producer finished emitting.
    End,
}

/// A subscriber callback.
pub type Sink<N> = Rc<dyn Fn(Emission<N>)>;

type Producer<N> = Rc<dyn Fn(Sink<N>) -> Subscription>;

/// A cold stream of [`LifetimeEvent`]s.
pub struct LifetimeStream<N> {
    producer: Producer<N>,
}

impl<N> Clone for LifetimeStream<N> {
    fn clone(&self) -> Self {
        Self {
            producer: Rc::clone(&self.producer),
        }
    }
}

impl<N> fmt::Debug for LifetimeStream<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LifetimeStream")
    }
}

impl<N: Clone + 'static> LifetimeStream<N> {
    /// A stream backed by a producer function, run once per subscription.
    pub fn from_fn(producer: impl Fn(Sink<N>) -> Subscription + 'static) -> Self {
        Self {
            producer: Rc::new(producer),
        }
    }

    /// Emits `event`, then ends.
    #[must_use]
    pub fn once(event: LifetimeEvent<N>) -> Self {
        Self::from_fn(move |sink| {
            sink(Emission::Event(event.clone()));
            sink(Emission::End);
            Subscription::empty()
        })
    }

    /// Ends immediately.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_fn(|sink| {
            sink(Emission::End);
            Subscription::empty()
        })
    }

    /// Start the producer, pushing every emission to `sink`.
    pub fn subscribe(&self, sink: impl Fn(Emission<N>) + 'static) -> Subscription {
        (self.producer)(Rc::new(sink))
    }

    fn subscribe_sink(&self, sink: Sink<N>) -> Subscription {
        (self.producer)(sink)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Per-event operators
    // ─────────────────────────────────────────────────────────────────────────

    /// Keep, rewrite or drop each event.
    ///
    /// `Ok(Some(e))` forwards `e`, `Ok(None)` drops the event, `Err` drops it and
    /// emits the error. Kept events should carry the input's end signal.
    #[must_use]
    pub fn filter_map<F>(self, f: F) -> Self
    where
        F: Fn(LifetimeEvent<N>) -> Result<Option<LifetimeEvent<N>>, BranchError> + 'static,
    {
        let f = Rc::new(f);
        self.lift(move |sink| {
            let f = Rc::clone(&f);
            Rc::new(move |emission: Emission<N>| match emission {
                Emission::Event(event) => match f(event) {
                    Ok(Some(kept)) => sink(Emission::Event(kept)),
                    Ok(None) => {}
                    Err(error) => sink(Emission::Error(error)),
                },
                other => sink(other),
            })
        })
    }

    /// Observe each event without changing the stream.
    #[must_use]
    pub fn inspect(self, f: impl Fn(&LifetimeEvent<N>) + 'static) -> Self {
        let f = Rc::new(f);
        self.lift(move |sink| {
            let f = Rc::clone(&f);
            Rc::new(move |emission: Emission<N>| {
                if let Emission::Event(event) = &emission {
                    f(event);
                }
                sink(emission);
            })
        })
    }

    /// Route `Error` emissions to `diagnostics` instead of downstream.
    #[must_use]
    pub fn report_errors(self, diagnostics: Rc<dyn DiagnosticSink>) -> Self {
        self.lift(move |sink| {
            let diagnostics = Rc::clone(&diagnostics);
            Rc::new(move |emission: Emission<N>| match emission {
                Emission::Error(error) => diagnostics.report(error),
                other => sink(other),
            })
        })
    }

    fn lift(self, wrap: impl Fn(Sink<N>) -> Sink<N> + 'static) -> Self {
        let source = self;
        Self::from_fn(move |sink| source.subscribe_sink(wrap(sink)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifetime operators
    // ─────────────────────────────────────────────────────────────────────────

    /// Bound the stream, and every event it emits, by `signal`.
    ///
    /// Each forwarded event gets a fresh end signal that fires when the source
    /// event ends, when `signal` fires, or when the subscription is dropped,
    /// whichever comes first. When `signal` fires the upstream is torn down and
    /// the stream ends.
    #[must_use]
    pub fn take_until_by(self, signal: OneShotSignal) -> Self {
        let source = self;
        Self::from_fn(move |sink| {
            if signal.is_fired() {
                sink(Emission::End);
                return Subscription::empty();
            }
            let bound = Rc::new(Bounded::default());

            let weak = Rc::downgrade(&bound);
            let stop_sink = Rc::clone(&sink);
            let stop = signal.on_fire(move || {
                if let Some(bound) = weak.upgrade() {
                    bound.close();
                    if !bound.finished.replace(true) {
                        stop_sink(Emission::End);
                    }
                }
            });
            *bound.stop.borrow_mut() = Some(stop);

            let weak = Rc::downgrade(&bound);
            let upstream = source.subscribe_sink(Rc::new(move |emission: Emission<N>| {
                let Some(bound) = weak.upgrade() else {
                    return;
                };
                if bound.closed.get() {
                    return;
                }
                match emission {
                    Emission::Event(event) => bound.forward(event, &*sink),
                    Emission::Error(error) => sink(Emission::Error(error)),
                    Emission::End => {
                        if !bound.finished.replace(true) {
                            sink(Emission::End);
                        }
                    }
                }
            }));
            if bound.closed.get() {
                drop(upstream);
            } else {
                *bound.upstream.borrow_mut() = Some(upstream);
            }

            Subscription::new(move || bound.close())
        })
    }

    /// Derive a stream from each event and merge the results.
    ///
    /// Each derived stream is bounded by its source event (see
    /// [`take_until_by`](Self::take_until_by)) and torn down when that event
    /// ends. The merged stream ends once the source and every derived stream
    /// still running have ended.
    #[must_use]
    pub fn flat_map(self, f: impl Fn(LifetimeEvent<N>) -> LifetimeStream<N> + 'static) -> Self {
        let source = self;
        let f = Rc::new(f);
        Self::from_fn(move |sink| {
            let state = Rc::new(Flattened::default());
            let weak = Rc::downgrade(&state);
            let f = Rc::clone(&f);
            let down = Rc::clone(&sink);

            let outer = source.subscribe_sink(Rc::new(move |emission: Emission<N>| {
                let Some(state) = weak.upgrade() else {
                    return;
                };
                if state.closed.get() {
                    return;
                }
                match emission {
                    Emission::Event(event) => Flattened::spawn(&state, event, &*f, &down),
                    Emission::Error(error) => down(Emission::Error(error)),
                    Emission::End => {
                        state.outer_done.set(true);
                        state.maybe_end(&*down);
                    }
                }
            }));
            if state.closed.get() {
                drop(outer);
            } else {
                *state.outer.borrow_mut() = Some(outer);
            }

            Subscription::new(move || state.close())
        })
    }

    /// Interleave several streams. Ends once all of them have ended.
    #[must_use]
    pub fn merge(streams: Vec<LifetimeStream<N>>) -> Self {
        Self::from_fn(move |sink| {
            let remaining = Rc::new(Cell::new(streams.len()));
            if streams.is_empty() {
                sink(Emission::End);
                return Subscription::empty();
            }
            let subscriptions = streams
                .iter()
                .map(|stream| {
                    let remaining = Rc::clone(&remaining);
                    let sink = Rc::clone(&sink);
                    stream.subscribe_sink(Rc::new(move |emission: Emission<N>| match emission {
                        Emission::End => {
                            remaining.set(remaining.get().saturating_sub(1));
                            if remaining.get() == 0 {
                                sink(Emission::End);
                            }
                        }
                        other => sink(other),
                    }))
                })
                .collect();
            Subscription::all(subscriptions)
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// take_until_by state
// ═══════════════════════════════════════════════════════════════════════════════

struct LiveEvent {
    id: u64,
    trigger: SignalTrigger,
    source_listener: Subscription,
}

#[derive(Default)]
struct Bounded {
    closed: Cell<bool>,
    finished: Cell<bool>,
    next_id: Cell<u64>,
    live: RefCell<Vec<LiveEvent>>,
    upstream: RefCell<Option<Subscription>>,
    stop: RefCell<Option<Subscription>>,
}

impl Bounded {
    fn forward<N: Clone + 'static>(self: &Rc<Self>, event: LifetimeEvent<N>, sink: &dyn Fn(Emission<N>)) {
        if event.end.is_fired() {
            return;
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let (trigger, end) = one_shot();

        let weak = Rc::downgrade(self);
        let source_listener = event.end.on_fire(move || {
            if let Some(bound) = weak.upgrade() {
                bound.release(id);
            }
        });
        self.live.borrow_mut().push(LiveEvent {
            id,
            trigger,
            source_listener,
        });
        sink(Emission::Event(LifetimeEvent::new(event.node, end)));
    }

    fn release(&self, id: u64) {
        let entry = {
            let mut live = self.live.borrow_mut();
            live.iter()
                .position(|e| e.id == id)
                .map(|index| live.remove(index))
        };
        if let Some(entry) = entry {
            entry.trigger.fire();
        }
    }

    fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        // Held until the live events have ended; they may own the subscriber.
        let upstream = self.upstream.borrow_mut().take();
        let stop = self.stop.borrow_mut().take();
        loop {
            let next = {
                let mut live = self.live.borrow_mut();
                (!live.is_empty()).then(|| live.remove(0))
            };
            let Some(entry) = next else {
                break;
            };
            drop(entry.source_listener);
            entry.trigger.fire();
        }
        drop(upstream);
        drop(stop);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// flat_map state
// ═══════════════════════════════════════════════════════════════════════════════

struct Inner {
    id: u64,
    ended: bool,
    subscription: Option<Subscription>,
    end_listener: Option<Subscription>,
}

#[derive(Default)]
struct Flattened {
    closed: Cell<bool>,
    outer_done: Cell<bool>,
    ended: Cell<bool>,
    next_id: Cell<u64>,
    inners: RefCell<Vec<Inner>>,
    outer: RefCell<Option<Subscription>>,
}

impl Flattened {
    fn spawn<N: Clone + 'static>(
        state: &Rc<Self>,
        event: LifetimeEvent<N>,
        f: &dyn Fn(LifetimeEvent<N>) -> LifetimeStream<N>,
        down: &Sink<N>,
    ) {
        if event.end.is_fired() {
            return;
        }
        let id = state.next_id.get();
        state.next_id.set(id + 1);
        state.inners.borrow_mut().push(Inner {
            id,
            ended: false,
            subscription: None,
            end_listener: None,
        });

        let end = event.end.clone();
        let derived = f(event).take_until_by(end.clone());
        let weak = Rc::downgrade(state);
        let inner_down = Rc::clone(down);
        let subscription = derived.subscribe_sink(Rc::new(move |emission: Emission<N>| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            if state.closed.get() {
                return;
            }
            match emission {
                Emission::End => {
                    if let Some(inner) = state.inners.borrow_mut().iter_mut().find(|i| i.id == id) {
                        inner.ended = true;
                    }
                    state.maybe_end(&*inner_down);
                }
                other => inner_down(other),
            }
        }));

        let weak = Rc::downgrade(state);
        let end_listener = end.on_fire(move || {
            if let Some(state) = weak.upgrade() {
                let removed = state.remove(id);
                drop(removed);
            }
        });

        let mut leftovers = (Some(subscription), Some(end_listener));
        if let Some(inner) = state.inners.borrow_mut().iter_mut().find(|i| i.id == id) {
            inner.subscription = leftovers.0.take();
            inner.end_listener = leftovers.1.take();
        }
        // Anything not stored belongs to an inner that is already gone.
        drop(leftovers);
    }

    fn remove(&self, id: u64) -> Option<Inner> {
        let mut inners = self.inners.borrow_mut();
        inners
            .iter()
            .position(|i| i.id == id)
            .map(|index| inners.remove(index))
    }

    fn maybe_end<N>(&self, down: &dyn Fn(Emission<N>)) {
        let running = self.inners.borrow().iter().any(|i| !i.ended);
        if self.outer_done.get() && !running && !self.ended.replace(true) {
            down(Emission::End);
        }
    }

    fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        let outer = self.outer.borrow_mut().take();
        loop {
            let next = {
                let mut inners = self.inners.borrow_mut();
                (!inners.is_empty()).then(|| inners.remove(0))
            };
            let Some(mut inner) = next else {
                break;
            };
            drop(inner.subscription.take());
            drop(inner.end_listener.take());
        }
        drop(outer);
    }
}
