//! Change listeners
//!
//! One [`StateEventHandler`] per watched key. Handles are ids that never
//! get reused, so removing one listener leaves every other handle valid.

use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Callback invoked with the new value (`null` on removal) and the handler
/// it is registered on.
pub type ChangeEvent = Arc<dyn Fn(&Value, &StateEventHandler) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

#[derive(Clone)]
pub struct StateEventHandler {
    key: String,
    next_id: u64,
    // Ids are issued in increasing order, so iteration is registration order
    listeners: BTreeMap<ListenerId, ChangeEvent>,
}

impl StateEventHandler {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            next_id: 0,
            listeners: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn add(&mut self, listener: ChangeEvent) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.insert(id, listener);
        id
    }

    /// Returns whether a listener was registered under `id`.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Run every listener in registration order. A panicking listener is
    /// logged and skipped; the rest still run.
    pub fn call(&self, value: &Value) {
        for (id, callback) in &self.listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(value, self)));
            if outcome.is_err() {
                tracing::warn!(
                    key = %self.key,
                    listener = id.0,
                    "Change listener panicked; continuing dispatch"
                );
            }
        }
    }
}

impl std::fmt::Debug for StateEventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateEventHandler")
            .field("key", &self.key)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> ChangeEvent {
        let log = Arc::clone(log);
        Arc::new(move |value: &Value, handler: &StateEventHandler| {
            log.lock().push(format!("{}:{}:{}", handler.key(), tag, value));
        })
    }

    #[test]
    fn test_call_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut handler = StateEventHandler::new("theme");
        handler.add(recorder(&log, "a"));
        handler.add(recorder(&log, "b"));

        handler.call(&json!("dark"));
        assert_eq!(
            *log.lock(),
            vec!["theme:a:\"dark\"".to_string(), "theme:b:\"dark\"".to_string()]
        );
    }

    #[test]
    fn test_handles_stay_valid_after_removal() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut handler = StateEventHandler::new("k");
        let first = handler.add(recorder(&log, "first"));
        let second = handler.add(recorder(&log, "second"));
        let third = handler.add(recorder(&log, "third"));

        assert!(handler.remove(first));
        // The third handle still names the third listener
        assert!(handler.remove(third));
        assert!(!handler.remove(third));

        handler.call(&json!(1));
        assert_eq!(*log.lock(), vec!["k:second:1".to_string()]);
        assert_eq!(handler.len(), 1);
        assert!(handler.remove(second));
        assert!(handler.is_empty());
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut handler = StateEventHandler::new("k");
        handler.add(Arc::new(|_: &Value, _: &StateEventHandler| panic!("listener bug")));
        handler.add(recorder(&log, "after"));

        handler.call(&json!(true));
        assert_eq!(*log.lock(), vec!["k:after:true".to_string()]);
    }
}
