use super::call_id::CallId;
use super::registry::{CallbackRegistry, EntryKind};
use crate::protocol::{args, Payload, ReturnCall};
use std::sync::atomic::{AtomicU64, Ordering};

/// Delivery counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub registered: u64,
    pub delivered: u64,
    pub missed: u64,
    pub cancelled: u64,
    pub pending: u64,
}

/// The object the native layer holds.
///
/// Owns exactly one [`CallbackRegistry`] for its whole lifetime. Construct it
/// once per process (or per client) and share it through an `Arc`.
#[derive(Debug, Default)]
pub struct BridgeFacade {
    registry: CallbackRegistry,
    registered: AtomicU64,
    delivered: AtomicU64,
    missed: AtomicU64,
    cancelled: AtomicU64,
}

impl BridgeFacade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_callback<F>(&self, callback: F) -> CallId
    where
        F: FnOnce(Payload) + Send + 'static,
    {
        let id = self.registry.register(callback);
        self.registered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Callback added: {}", id);
        id
    }

    pub fn add_stream_callback<F>(&self, callback: F) -> CallId
    where
        F: Fn(Payload) + Send + Sync + 'static,
    {
        let id = self.registry.register_streaming(callback);
        self.registered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Stream callback added: {}", id);
        id
    }

    /// Deliver a result for `id`.
    ///
    /// Fire-and-forget from the completion site: an unknown id is logged and
    /// counted in [`BridgeStats::missed`], never raised.
    pub fn handle_return_call(&self, id: &str, args: Payload) {
        let found = self.registry.resolve(id, args);
        self.record(id, found);
    }

    /// Deliver a result for `id` and retire the entry, streaming or not.
    pub fn handle_final_call(&self, id: &str, args: Payload) {
        let found = self.registry.resolve_final(id, args);
        self.record(id, found);
    }

    /// Inbound entry point for envelopes coming back from the scripting side.
    ///
    /// A stream is retired when the envelope is marked final or when its
    /// payload carries an error; everything else is an ordinary delivery.
    pub fn handle_return_envelope(&self, envelope: ReturnCall) {
        let ReturnCall {
            callback_id,
            arguments,
            is_final,
        } = envelope;
        let args = arguments.unwrap_or_default();
        let retires = is_final
            || (self.registry.kind_of(callback_id.as_str()) == Some(EntryKind::Streaming)
                && carries_error(&args));

        if retires {
            self.handle_final_call(callback_id.as_str(), args);
        } else {
            self.handle_return_call(callback_id.as_str(), args);
        }
    }

    /// Forget a pending callback without invoking it.
    pub fn cancel_callback(&self, id: &str) -> bool {
        let removed = self.registry.cancel(id);
        if removed {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Callback cancelled: {}", id);
        }
        removed
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.registry.is_pending(id)
    }

    pub fn pending_count(&self) -> usize {
        self.registry.pending_count()
    }

    /// Drop every pending callback. Used when the client is destroyed.
    pub fn shutdown(&self) -> usize {
        let dropped = self.registry.clear();
        if dropped > 0 {
            self.cancelled.fetch_add(dropped as u64, Ordering::Relaxed);
            tracing::info!("Bridge shut down with {} pending callbacks dropped", dropped);
        }
        dropped
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            registered: self.registered.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            missed: self.missed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            pending: self.registry.pending_count() as u64,
        }
    }

    fn record(&self, id: &str, found: bool) {
        if found {
            self.delivered.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Delivered return call {}", id);
        } else {
            self.missed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Return call for unknown or retired callback {}", id);
        }
    }
}

fn carries_error(payload: &Payload) -> bool {
    payload
        .get(args::native::ERROR)
        .is_some_and(|value| !value.is_null())
}
