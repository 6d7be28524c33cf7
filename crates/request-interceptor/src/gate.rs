//! One-way readiness gate: routes calls while pending, flushes the queue when opened.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::SystemTime;

use gate_core_types::{FetchRequest, RequestKind, SendRequest};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::hooks::{FetchFuture, FetchHook, SendHook};
use crate::metrics;
use crate::permission::{AllowReason, GatePolicy, Permission};
use crate::queue::{QueuedRequest, RequestQueue, SendReceipt};
use crate::{GateEvent, GateEventKind, RequestRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    /// Waiting for the readiness signal; non-exempt calls are queued.
    Pending,
    /// Signal received and queue flushed. Terminal for an installed gate.
    Ready,
    /// Uninstalled; calls still reaching the gate pass straight through.
    Detached,
}

/// The hooks that were current before the gate was installed.
pub(crate) struct Originals {
    pub(crate) send: Rc<dyn SendHook>,
    pub(crate) fetch: Rc<dyn FetchHook>,
}

pub(crate) struct ReadyGate {
    state: Cell<GateState>,
    policy: GatePolicy,
    queue: RefCell<RequestQueue>,
    originals: Originals,
    events: broadcast::Sender<GateEvent>,
}

impl ReadyGate {
    pub(crate) fn new(
        policy: GatePolicy,
        originals: Originals,
        events: broadcast::Sender<GateEvent>,
    ) -> Self {
        Self {
            state: Cell::new(GateState::Pending),
            policy,
            queue: RefCell::new(RequestQueue::default()),
            originals,
            events,
        }
    }

    pub(crate) fn state(&self) -> GateState {
        self.state.get()
    }

    pub(crate) fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    pub(crate) fn originals(&self) -> Originals {
        Originals {
            send: Rc::clone(&self.originals.send),
            fetch: Rc::clone(&self.originals.fetch),
        }
    }

    fn is_open(&self) -> bool {
        self.state.get() != GateState::Pending
    }

    pub(crate) fn submit_send(&self, request: SendRequest) -> SendReceipt {
        match self.policy.evaluate(&request.target, self.is_open()) {
            Permission::Allow(reason) => {
                self.record_dispatch(
                    record(RequestKind::Send, &request.id, &request.target),
                    reason,
                );
                self.originals.send.send(request);
                SendReceipt::dispatched()
            }
            Permission::Defer => {
                let record = record(RequestKind::Send, &request.id, &request.target);
                let receipt = self.queue.borrow_mut().enqueue_send(request);
                self.record_deferral(record);
                receipt
            }
        }
    }

    pub(crate) fn submit_fetch(&self, request: FetchRequest) -> FetchFuture {
        match self.policy.evaluate(&request.target, self.is_open()) {
            Permission::Allow(reason) => {
                self.record_dispatch(
                    record(RequestKind::Fetch, &request.id, &request.target),
                    reason,
                );
                self.originals.fetch.fetch(request)
            }
            Permission::Defer => {
                let record = record(RequestKind::Fetch, &request.id, &request.target);
                let future = self.queue.borrow_mut().enqueue_fetch(request);
                self.record_deferral(record);
                future
            }
        }
    }

    /// Pending → Ready, then flush. Any later call is a no-op.
    pub(crate) fn open(&self, signal: &str) {
        if self.state.get() != GateState::Pending {
            debug!(
                target: "request-interceptor",
                signal,
                state = ?self.state.get(),
                "readiness signal ignored"
            );
            return;
        }

        // Flip first: anything a transport dispatches while we flush goes straight through.
        self.state.set(GateState::Ready);
        let flushed = self.flush();
        metrics::record_flush();
        info!(target: "request-interceptor", signal, flushed, "gate ready");
        self.publish(GateEventKind::Ready { flushed }, None);
    }

    fn flush(&self) -> usize {
        let entries = self.queue.borrow_mut().take_all();
        let total = entries.len();
        for entry in entries {
            let record = record(entry.kind(), entry.id(), entry.target());
            match entry {
                QueuedRequest::Send { request, done } => {
                    self.originals.send.send(request);
                    // A dropped receipt only means nobody waits for the hand-off.
                    let _ = done.send(());
                }
                QueuedRequest::Fetch { request, done } => {
                    let dispatched = self.originals.fetch.fetch(request);
                    if done.send(dispatched).is_err() {
                        warn!(
                            target: "request-interceptor",
                            id = %record.id,
                            target_url = %record.target,
                            "caller dropped deferred fetch; outcome discarded"
                        );
                    }
                }
            }
            metrics::record_dispatched(record.kind);
            metrics::record_released();
            self.publish(GateEventKind::Released, Some(record));
        }
        total
    }

    /// Stop gating. Queued calls are dropped and their futures resolve as abandoned.
    pub(crate) fn detach(&self) -> usize {
        self.state.set(GateState::Detached);
        let abandoned = self.queue.borrow_mut().take_all().len();
        if abandoned > 0 {
            metrics::record_abandoned(abandoned);
            warn!(
                target: "request-interceptor",
                abandoned,
                "gate detached with deferred calls still queued"
            );
        }
        self.publish(GateEventKind::Detached { abandoned }, None);
        abandoned
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.events.subscribe()
    }

    fn record_dispatch(&self, record: RequestRecord, reason: AllowReason) {
        debug!(
            target: "request-interceptor",
            kind = %record.kind,
            target_url = %record.target,
            ?reason,
            "dispatching immediately"
        );
        metrics::record_dispatched(record.kind);
        self.publish(GateEventKind::Dispatched { reason }, Some(record));
    }

    fn record_deferral(&self, record: RequestRecord) {
        debug!(
            target: "request-interceptor",
            kind = %record.kind,
            target_url = %record.target,
            position = self.queue.borrow().len(),
            "deferring until ready"
        );
        metrics::record_deferred();
        self.publish(GateEventKind::Deferred, Some(record));
    }

    fn publish(&self, kind: GateEventKind, request: Option<RequestRecord>) {
        let event = GateEvent {
            kind,
            request,
            timestamp: SystemTime::now(),
        };
        // No receivers is normal; the stream is opt-in.
        let _ = self.events.send(event);
    }
}

fn record(kind: RequestKind, id: &gate_core_types::RequestId, target: &str) -> RequestRecord {
    RequestRecord {
        id: id.clone(),
        kind,
        target: target.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use gate_core_types::{FetchResponse, TransportError};

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
    }

    impl SendHook for Recorder {
        fn send(&self, request: SendRequest) {
            self.calls.borrow_mut().push(format!("send {}", request.target));
        }
    }

    impl FetchHook for Recorder {
        fn fetch(&self, request: FetchRequest) -> FetchFuture {
            self.calls.borrow_mut().push(format!("fetch {}", request.target));
            let outcome = if request.target.contains("down") {
                Err(TransportError::network("unreachable"))
            } else {
                Ok(FetchResponse::ok(&request, "ok"))
            };
            async move { outcome }.boxed_local()
        }
    }

    fn gate(whitelist: &[&str]) -> (ReadyGate, Rc<Recorder>) {
        let recorder = Rc::new(Recorder::default());
        let (events, _) = broadcast::channel(16);
        let policy = GatePolicy {
            whitelist: whitelist.iter().map(|entry| entry.to_string()).collect(),
            ..GatePolicy::default()
        };
        let originals = Originals {
            send: recorder.clone(),
            fetch: recorder.clone(),
        };
        (ReadyGate::new(policy, originals, events), recorder)
    }

    #[tokio::test]
    async fn flush_dispatches_in_enqueue_order() {
        let (gate, recorder) = gate(&[]);
        let first = gate.submit_fetch(FetchRequest::get("https://a.test"));
        let receipt = gate.submit_send(SendRequest::open("POST", "https://b.test"));
        let second = gate.submit_fetch(FetchRequest::get("https://c.test"));
        assert!(recorder.calls.borrow().is_empty());

        gate.open("DOMContentLoaded");

        assert_eq!(
            *recorder.calls.borrow(),
            vec![
                "fetch https://a.test".to_string(),
                "send https://b.test".to_string(),
                "fetch https://c.test".to_string(),
            ]
        );
        assert_eq!(gate.state(), GateState::Ready);
        assert!(gate.queue.borrow().is_empty());
        assert_eq!(first.await.unwrap().target, "https://a.test");
        assert_eq!(receipt.await, Ok(()));
        assert_eq!(second.await.unwrap().target, "https://c.test");
    }

    #[tokio::test]
    async fn failure_does_not_abort_flush() {
        let (gate, recorder) = gate(&[]);
        let failing = gate.submit_fetch(FetchRequest::get("https://down.test"));
        let healthy = gate.submit_fetch(FetchRequest::get("https://up.test"));

        gate.open("load");

        assert_eq!(recorder.calls.borrow().len(), 2);
        assert_eq!(
            failing.await.unwrap_err(),
            TransportError::network("unreachable")
        );
        assert!(healthy.await.unwrap().is_success());
    }

    #[test]
    fn dropped_caller_does_not_abort_flush() {
        let (gate, recorder) = gate(&[]);
        drop(gate.submit_fetch(FetchRequest::get("https://gone.test")));
        let _kept = gate.submit_fetch(FetchRequest::get("https://kept.test"));

        gate.open("load");

        assert_eq!(recorder.calls.borrow().len(), 2);
    }

    #[test]
    fn second_signal_is_a_no_op() {
        let (gate, recorder) = gate(&[]);
        let _pending = gate.submit_send(SendRequest::open("POST", "https://a.test"));
        let mut rx = gate.subscribe();

        gate.open("load");
        gate.open("load");

        assert_eq!(recorder.calls.borrow().len(), 1);
        let mut ready_events = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event.kind, GateEventKind::Ready { .. }) {
                ready_events += 1;
            }
        }
        assert_eq!(ready_events, 1);
    }

    #[test]
    fn calls_after_ready_are_never_queued() {
        let (gate, recorder) = gate(&[]);
        gate.open("load");

        let receipt = gate.submit_send(SendRequest::open("POST", "https://late.test"));

        assert!(!receipt.was_deferred());
        assert!(gate.queue.borrow().is_empty());
        assert_eq!(recorder.calls.borrow().len(), 1);
    }

    #[tokio::test]
    async fn detach_abandons_queued_calls() {
        let (gate, recorder) = gate(&[]);
        let future = gate.submit_fetch(FetchRequest::get("https://a.test"));

        assert_eq!(gate.detach(), 1);
        assert_eq!(future.await.unwrap_err(), TransportError::Abandoned);

        gate.open("load");
        assert_eq!(gate.state(), GateState::Detached);
        let receipt = gate.submit_send(SendRequest::open("POST", "https://b.test"));
        assert!(!receipt.was_deferred());
        assert_eq!(*recorder.calls.borrow(), vec!["send https://b.test".to_string()]);
    }
}
