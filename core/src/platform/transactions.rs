// Transaction tracking
//
// The scripting side names long-running operations with a caller-chosen
// transaction id so they can be cancelled later. Only one operation may own
// a transaction id at a time: registering the id again supersedes the older
// operation.

use crate::bridge::CallId;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TransactionMonitor {
    live: Mutex<HashMap<String, CallId>>,
}

impl TransactionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `transaction_id` to `call_id`, returning the call it superseded.
    pub fn register(&self, transaction_id: &str, call_id: CallId) -> Option<CallId> {
        self.live.lock().insert(transaction_id.to_string(), call_id)
    }

    /// Unbind `transaction_id` and return the call it pointed at.
    pub fn take(&self, transaction_id: &str) -> Option<CallId> {
        self.live.lock().remove(transaction_id)
    }

    /// Unbind `transaction_id` only if it still belongs to `call_id`.
    ///
    /// A finished operation must not clear a newer operation that reused
    /// its transaction id.
    pub fn clear_transaction(&self, transaction_id: &str, call_id: &CallId) -> bool {
        let mut live = self.live.lock();
        if live.get(transaction_id) == Some(call_id) {
            live.remove(transaction_id);
            true
        } else {
            false
        }
    }

    pub fn lookup(&self, transaction_id: &str) -> Option<CallId> {
        self.live.lock().get(transaction_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }

    /// Forget every transaction, returning the calls that were bound.
    pub fn clear(&self) -> Vec<CallId> {
        self.live.lock().drain().map(|(_, id)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_supersedes() {
        let monitor = TransactionMonitor::new();
        assert_eq!(monitor.register("tx", CallId::from("a")), None);
        assert_eq!(monitor.register("tx", CallId::from("b")), Some(CallId::from("a")));
        assert_eq!(monitor.lookup("tx"), Some(CallId::from("b")));
    }

    #[test]
    fn test_stale_clear_is_ignored() {
        let monitor = TransactionMonitor::new();
        monitor.register("tx", CallId::from("a"));
        monitor.register("tx", CallId::from("b"));

        assert!(!monitor.clear_transaction("tx", &CallId::from("a")));
        assert_eq!(monitor.len(), 1);
        assert!(monitor.clear_transaction("tx", &CallId::from("b")));
        assert!(monitor.is_empty());
    }

    #[test]
    fn test_take_and_clear() {
        let monitor = TransactionMonitor::new();
        monitor.register("one", CallId::from("a"));
        monitor.register("two", CallId::from("b"));

        assert_eq!(monitor.take("one"), Some(CallId::from("a")));
        assert_eq!(monitor.take("one"), None);
        assert_eq!(monitor.clear(), vec![CallId::from("b")]);
    }
}
