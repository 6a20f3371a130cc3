use super::transactions::TransactionMonitor;
use crate::bridge::{BridgeFacade, CallId};
use crate::protocol::{MethodName, Payload, Response};
use futures::Stream;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Live handle on a streaming call (scan results, characteristic monitoring).
///
/// Yields one decoded [`Response`] per delivery and ends once the bridge
/// retires the call (final delivery, error payload, cancel, or shutdown).
/// Dropping the handle cancels the call locally.
pub struct Subscription {
    method: MethodName,
    call_id: CallId,
    receiver: mpsc::UnboundedReceiver<Payload>,
    facade: Weak<BridgeFacade>,
    transaction: Option<(String, Weak<TransactionMonitor>)>,
}

impl Subscription {
    pub(crate) fn new(
        method: MethodName,
        call_id: CallId,
        receiver: mpsc::UnboundedReceiver<Payload>,
        facade: Weak<BridgeFacade>,
    ) -> Self {
        Self {
            method,
            call_id,
            receiver,
            facade,
            transaction: None,
        }
    }

    pub(crate) fn with_transaction(
        mut self,
        transaction_id: String,
        monitor: Weak<TransactionMonitor>,
    ) -> Self {
        self.transaction = Some((transaction_id, monitor));
        self
    }

    pub fn method(&self) -> MethodName {
        self.method
    }

    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction.as_ref().map(|(id, _)| id.as_str())
    }

    /// Whether the bridge still routes deliveries to this subscription.
    pub fn is_active(&self) -> bool {
        self.facade
            .upgrade()
            .is_some_and(|facade| facade.is_pending(self.call_id.as_str()))
    }

    /// Wait for the next delivery. `None` once the call is retired and drained.
    pub async fn next_response(&mut self) -> Option<crate::Result<Response>> {
        let method = self.method;
        self.receiver
            .recv()
            .await
            .map(|payload| Response::parse(method, payload))
    }

    /// Non-blocking variant of [`Subscription::next_response`].
    pub fn try_next_response(&mut self) -> Option<crate::Result<Response>> {
        let method = self.method;
        self.receiver
            .try_recv()
            .ok()
            .map(|payload| Response::parse(method, payload))
    }
}

impl Stream for Subscription {
    type Item = crate::Result<Response>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let method = self.method;
        self.receiver
            .poll_recv(cx)
            .map(|delivery| delivery.map(|payload| Response::parse(method, payload)))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(facade) = self.facade.upgrade() {
            facade.cancel_callback(self.call_id.as_str());
        }
        if let Some((transaction_id, monitor)) = &self.transaction {
            if let Some(monitor) = monitor.upgrade() {
                monitor.clear_transaction(transaction_id, &self.call_id);
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("method", &self.method)
            .field("call_id", &self.call_id)
            .field("transaction", &self.transaction_id())
            .finish()
    }
}
