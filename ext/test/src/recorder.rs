//! Observers for pipeline output: [`Recorder`] and [`RecordingSink`]

use sift::{BranchError, DiagnosticSink, Emission, LifetimeStream, Subscription};
use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

/// Subscribes to a stream and logs `open <node>` / `close <node>` lines.
///
/// Nodes are written with their `Debug` form (`div#t1` for a
/// [`TestNode`](crate::TestNode)). Dropping the recorder tears the
/// subscription down, which closes every event still live.
pub struct Recorder {
    subscription: Option<Subscription>,
    log: Rc<RefCell<Vec<String>>>,
    live: Rc<Cell<usize>>,
    ended: Rc<Cell<bool>>,
    listeners: Rc<RefCell<Vec<Subscription>>>,
}

impl Recorder {
    /// Subscribe to `stream` and start recording.
    pub fn record<N: Clone + Debug + 'static>(stream: &LifetimeStream<N>) -> Self {
        let log = Rc::new(RefCell::new(Vec::new()));
        let live: Rc<Cell<usize>> = Rc::new(Cell::new(0));
        let ended = Rc::new(Cell::new(false));
        let listeners = Rc::new(RefCell::new(Vec::new()));

        let subscription = {
            let log = Rc::clone(&log);
            let live = Rc::clone(&live);
            let ended = Rc::clone(&ended);
            let listeners = Rc::clone(&listeners);
            stream.subscribe(move |emission| match emission {
                Emission::Event(event) => {
                    let label = format!("{:?}", event.node);
                    log.borrow_mut().push(format!("open {label}"));
                    live.set(live.get() + 1);

                    let log = Rc::clone(&log);
                    let live = Rc::clone(&live);
                    let listener = event.end.on_fire(move || {
                        log.borrow_mut().push(format!("close {label}"));
                        live.set(live.get().saturating_sub(1));
                    });
                    listeners.borrow_mut().push(listener);
                }
                Emission::Error(error) => log.borrow_mut().push(format!("error {error}")),
                Emission::End => ended.set(true),
            })
        };

        Self {
            subscription: Some(subscription),
            log,
            live,
            ended,
            listeners,
        }
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    /// The log so far, without draining it.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    /// Events opened and not yet closed.
    #[must_use]
    pub fn live(&self) -> usize {
        self.live.get()
    }

    /// Has the stream emitted `End`?
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended.get()
    }

    /// Tear the subscription down now. Live events close and are logged.
    pub fn stop(&mut self) {
        let subscription = self.subscription.take();
        drop(subscription);
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop();
        self.listeners.borrow_mut().clear();
    }
}

/// A [`DiagnosticSink`] that keeps every report.
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: RefCell<Vec<(String, String)>>,
}

impl RecordingSink {
    /// A shared, empty sink.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// The failing step of each report, in order.
    #[must_use]
    pub fn steps(&self) -> Vec<String> {
        self.reports.borrow().iter().map(|(step, _)| step.clone()).collect()
    }

    /// The message of each report, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.reports
            .borrow()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Number of reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.borrow().len()
    }

    /// No reports yet?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.borrow().is_empty()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, error: BranchError) {
        self.reports
            .borrow_mut()
            .push((error.step().to_string(), error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift::{one_shot, LifetimeEvent};

    #[test]
    fn live_count_follows_end_signals() {
        let (trigger, end) = one_shot();
        let end = RefCell::new(Some(end));
        let stream = LifetimeStream::from_fn(move |sink| {
            if let Some(end) = end.borrow_mut().take() {
                sink(Emission::Event(LifetimeEvent::new("a", end)));
            }
            sink(Emission::End);
            Subscription::empty()
        });

        let recorder = Recorder::record(&stream);
        assert_eq!(recorder.take(), [r#"open "a""#]);
        assert_eq!(recorder.live(), 1);
        assert!(recorder.is_ended());

        trigger.fire();
        assert_eq!(recorder.take(), [r#"close "a""#]);
        assert_eq!(recorder.live(), 0);
    }

    #[test]
    fn sink_reads_back_through_a_shared_handle() {
        let sink = RecordingSink::new();
        let shared: Rc<dyn DiagnosticSink> = sink.clone();
        shared.report(BranchError::Callback {
            step: "Map(parent)".into(),
            source: "gone".into(),
        });
        assert_eq!(sink.steps(), ["Map(parent)"]);
        assert_eq!(sink.messages(), ["Map(parent) failed: gone"]);
        assert_eq!(sink.len(), 1);
    }
}
