//! Pending-callback registry
//!
//! Owns the `CallId -> callback` map. Two kinds of entry exist:
//!
//! - **one-shot**: request/response operations (connect, read, write). The
//!   entry is removed under the lock before its callback runs, so two racing
//!   resolves for the same id can never both deliver.
//! - **streaming**: notification streams (characteristic monitoring, scan
//!   results). The entry survives ordinary deliveries and is retired only by
//!   a final delivery or an explicit cancel.
//!
//! Callbacks always run after the lock is released, so a callback may call
//! back into the registry (register a follow-up call, cancel itself).

use super::call_id::CallId;
use crate::protocol::Payload;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type OneShotCallback = Box<dyn FnOnce(Payload) + Send + 'static>;
pub type StreamCallback = Arc<dyn Fn(Payload) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    OneShot,
    Streaming,
}

enum Entry {
    OneShot(OneShotCallback),
    Streaming(StreamCallback),
}

impl Entry {
    fn kind(&self) -> EntryKind {
        match self {
            Entry::OneShot(_) => EntryKind::OneShot,
            Entry::Streaming(_) => EntryKind::Streaming,
        }
    }
}

/// A callback detached from the map, ready to run outside the lock.
enum Ready {
    Once(OneShotCallback),
    Stream(StreamCallback),
}

impl Ready {
    fn invoke(self, payload: Payload) {
        match self {
            Ready::Once(callback) => callback(payload),
            Ready::Stream(callback) => callback(payload),
        }
    }
}

#[derive(Default)]
pub struct CallbackRegistry {
    entries: Mutex<HashMap<CallId, Entry>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback that fires at most once.
    pub fn register<F>(&self, callback: F) -> CallId
    where
        F: FnOnce(Payload) + Send + 'static,
    {
        self.insert(Entry::OneShot(Box::new(callback)))
    }

    /// Register a callback that fires on every delivery until retired.
    pub fn register_streaming<F>(&self, callback: F) -> CallId
    where
        F: Fn(Payload) + Send + Sync + 'static,
    {
        self.insert(Entry::Streaming(Arc::new(callback)))
    }

    fn insert(&self, entry: Entry) -> CallId {
        let kind = entry.kind();
        let mut entries = self.entries.lock();
        // v4 collisions are not expected; the loop keeps the guarantee absolute.
        let id = loop {
            let candidate = CallId::generate();
            if !entries.contains_key(&candidate) {
                break candidate;
            }
        };
        entries.insert(id.clone(), entry);
        tracing::trace!("Registered {:?} callback {}", kind, id);
        id
    }

    /// Deliver `payload` to the callback registered under `id`.
    ///
    /// One-shot entries are removed before the callback runs; streaming
    /// entries stay registered. Returns `false` when `id` is unknown or
    /// already retired, which is an expected condition for late or
    /// duplicate platform completions.
    pub fn resolve(&self, id: &str, payload: Payload) -> bool {
        let ready = {
            let mut entries = self.entries.lock();
            match entries.remove_entry(id) {
                None => return false,
                Some((_, Entry::OneShot(callback))) => Ready::Once(callback),
                Some((key, Entry::Streaming(callback))) => {
                    entries.insert(key, Entry::Streaming(Arc::clone(&callback)));
                    Ready::Stream(callback)
                }
            }
        };
        ready.invoke(payload);
        true
    }

    /// Deliver `payload` and retire the entry whatever its kind.
    pub fn resolve_final(&self, id: &str, payload: Payload) -> bool {
        let ready = match self.entries.lock().remove(id) {
            None => return false,
            Some(Entry::OneShot(callback)) => Ready::Once(callback),
            Some(Entry::Streaming(callback)) => Ready::Stream(callback),
        };
        ready.invoke(payload);
        true
    }

    /// Remove the entry without invoking it.
    ///
    /// A streaming delivery that was already running on another thread when
    /// `cancel` returned may still complete; no delivery starts afterward.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = self.entries.lock().remove(id);
        removed.is_some()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    pub fn kind_of(&self, id: &str) -> Option<EntryKind> {
        self.entries.lock().get(id).map(Entry::kind)
    }

    pub fn pending_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Drop every pending entry without invoking it. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let drained = std::mem::take(&mut *self.entries.lock());
        drained.len()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("pending", &self.pending_count())
            .finish()
    }
}
