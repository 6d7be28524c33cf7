//! FIFO buffer of deferred calls, each paired with the channel that settles its future.

use std::collections::VecDeque;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use gate_core_types::{FetchRequest, RequestId, RequestKind, SendRequest, TransportError};
use tokio::sync::oneshot;

use crate::hooks::FetchFuture;

/// A deferred call waiting for the gate to open.
pub(crate) enum QueuedRequest {
    Send {
        request: SendRequest,
        done: oneshot::Sender<()>,
    },
    /// The flush hands the dispatched future to the waiting caller, who drives it.
    Fetch {
        request: FetchRequest,
        done: oneshot::Sender<FetchFuture>,
    },
}

impl QueuedRequest {
    pub(crate) fn kind(&self) -> RequestKind {
        match self {
            QueuedRequest::Send { .. } => RequestKind::Send,
            QueuedRequest::Fetch { .. } => RequestKind::Fetch,
        }
    }

    pub(crate) fn id(&self) -> &RequestId {
        match self {
            QueuedRequest::Send { request, .. } => &request.id,
            QueuedRequest::Fetch { request, .. } => &request.id,
        }
    }

    pub(crate) fn target(&self) -> &str {
        match self {
            QueuedRequest::Send { request, .. } => &request.target,
            QueuedRequest::Fetch { request, .. } => &request.target,
        }
    }
}

#[derive(Default)]
pub(crate) struct RequestQueue {
    entries: VecDeque<QueuedRequest>,
}

impl RequestQueue {
    pub(crate) fn enqueue_send(&mut self, request: SendRequest) -> SendReceipt {
        let (done, rx) = oneshot::channel();
        self.entries.push_back(QueuedRequest::Send { request, done });
        SendReceipt::deferred(rx)
    }

    pub(crate) fn enqueue_fetch(&mut self, request: FetchRequest) -> FetchFuture {
        let (done, rx) = oneshot::channel::<FetchFuture>();
        self.entries.push_back(QueuedRequest::Fetch { request, done });
        async move {
            let dispatched = rx.await.map_err(|_| TransportError::Abandoned)?;
            dispatched.await
        }
        .boxed_local()
    }

    /// Hands back every entry in enqueue order, leaving the queue empty.
    pub(crate) fn take_all(&mut self) -> VecDeque<QueuedRequest> {
        mem::take(&mut self.entries)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves once a `send` call has actually been handed to the transport.
///
/// Carries no response: the transport reports completion through its own callbacks.
#[derive(Debug)]
#[must_use = "a receipt does nothing unless awaited"]
pub(crate) struct SendReceipt {
    pending: Option<oneshot::Receiver<()>>,
}

impl SendReceipt {
    pub(crate) fn dispatched() -> Self {
        Self { pending: None }
    }

    pub(crate) fn deferred(rx: oneshot::Receiver<()>) -> Self {
        Self { pending: Some(rx) }
    }

    #[cfg(test)]
    pub(crate) fn was_deferred(&self) -> bool {
        self.pending.is_some()
    }
}

impl Future for SendReceipt {
    type Output = Result<(), TransportError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.pending.as_mut() {
            None => Poll::Ready(Ok(())),
            Some(rx) => Pin::new(rx)
                .poll(cx)
                .map(|result| result.map_err(|_| TransportError::Abandoned)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_core_types::FetchResponse;

    #[test]
    fn entries_come_back_in_enqueue_order() {
        let mut queue = RequestQueue::default();
        let _a = queue.enqueue_send(SendRequest::open("POST", "https://one.test"));
        let _b = queue.enqueue_fetch(FetchRequest::get("https://two.test"));
        let _c = queue.enqueue_send(SendRequest::open("POST", "https://three.test"));
        assert_eq!(queue.len(), 3);

        let drained = queue.take_all();
        let targets: Vec<&str> = drained.iter().map(QueuedRequest::target).collect();
        assert_eq!(
            targets,
            vec!["https://one.test", "https://two.test", "https://three.test"]
        );
        let kinds: Vec<RequestKind> = drained.iter().map(QueuedRequest::kind).collect();
        assert_eq!(
            kinds,
            vec![RequestKind::Send, RequestKind::Fetch, RequestKind::Send]
        );
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn fetch_future_settles_with_dispatched_outcome() {
        let mut queue = RequestQueue::default();
        let request = FetchRequest::get("https://api.test/config");
        let future = queue.enqueue_fetch(request.clone());

        let mut drained = queue.take_all();
        let Some(QueuedRequest::Fetch { request, done }) = drained.pop_front() else {
            panic!("expected fetch entry");
        };
        let response = FetchResponse::ok(&request, "cfg");
        let dispatched: FetchFuture = async move { Ok(response) }.boxed_local();
        assert!(done.send(dispatched).is_ok());

        let settled = future.await.expect("response");
        assert_eq!(settled.body, "cfg");
        assert_eq!(settled.request, request.id);
    }

    #[tokio::test]
    async fn fetch_failure_is_propagated() {
        let mut queue = RequestQueue::default();
        let future = queue.enqueue_fetch(FetchRequest::get("https://down.test"));

        if let Some(QueuedRequest::Fetch { done, .. }) = queue.take_all().pop_front() {
            let failed: FetchFuture =
                async { Err(TransportError::network("connection reset")) }.boxed_local();
            assert!(done.send(failed).is_ok());
        }

        assert_eq!(
            future.await.unwrap_err(),
            TransportError::network("connection reset")
        );
    }

    #[tokio::test]
    async fn dropped_entries_abandon_their_futures() {
        let mut queue = RequestQueue::default();
        let receipt = queue.enqueue_send(SendRequest::open("POST", "https://one.test"));
        let future = queue.enqueue_fetch(FetchRequest::get("https://two.test"));
        assert!(receipt.was_deferred());

        drop(queue.take_all());

        assert_eq!(receipt.await, Err(TransportError::Abandoned));
        assert_eq!(future.await.unwrap_err(), TransportError::Abandoned);
    }

    #[tokio::test]
    async fn dispatched_receipt_is_ready_immediately() {
        let receipt = SendReceipt::dispatched();
        assert!(!receipt.was_deferred());
        assert_eq!(receipt.await, Ok(()));
    }
}
