//! Session identities
//!
//! An identity is `"<prefix>:<millis>"`, the prefix telling a persistent
//! session (`sess`) from an expiring tier (`sess-temp`) and the millis
//! recording when it was issued. Identities are replaced, never edited.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::clock::Clock;

pub const PERSISTENT_PREFIX: &str = "sess";
pub const EPHEMERAL_PREFIX: &str = "sess-temp";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(prefix: &str, millis: i64) -> Self {
        Self(format!("{}:{}", prefix, millis))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn prefix(&self) -> &str {
        self.0
            .rsplit_once(':')
            .map(|(prefix, _)| prefix)
            .unwrap_or(&self.0)
    }

    /// Issue time in epoch millis, if the identity is well formed.
    pub fn timestamp(&self) -> Option<i64> {
        self.0.rsplit_once(':')?.1.parse().ok()
    }

    pub fn is_persistent(&self) -> bool {
        self.prefix() == PERSISTENT_PREFIX
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Identity> for Value {
    fn from(id: Identity) -> Self {
        Value::String(id.0)
    }
}

impl From<String> for Identity {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Issues identities whose timestamps strictly increase, even when the
/// clock has not moved since the previous one.
pub struct IdentityGenerator {
    clock: Arc<dyn Clock>,
    last: Mutex<i64>,
}

impl IdentityGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last: Mutex::new(i64::MIN),
        }
    }

    pub fn next(&self, prefix: &str) -> Identity {
        let now = self.clock.now_millis();
        let mut last = self.last.lock();
        let millis = if now > *last { now } else { *last + 1 };
        *last = millis;
        Identity::new(prefix, millis)
    }

    /// Raise the floor so the next identity sorts after `id`, which may have
    /// been issued by another session on the same storage.
    pub fn observe(&self, id: &Identity) {
        if let Some(millis) = id.timestamp() {
            let mut last = self.last.lock();
            *last = (*last).max(millis);
        }
    }

    /// Like [`IdentityGenerator::observe`], for a raw stored `session-id` value.
    pub fn observe_value(&self, value: Option<&Value>) {
        if let Some(Value::String(raw)) = value {
            self.observe(&Identity::from(raw.clone()));
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_identity_parts() {
        let id = Identity::new(PERSISTENT_PREFIX, 1_700_000_000_000);
        assert_eq!(id.as_str(), "sess:1700000000000");
        assert_eq!(id.prefix(), "sess");
        assert_eq!(id.timestamp(), Some(1_700_000_000_000));
        assert!(id.is_persistent());

        let temp = Identity::new(EPHEMERAL_PREFIX, 42);
        assert_eq!(temp.prefix(), "sess-temp");
        assert!(!temp.is_persistent());

        let junk = Identity::from("garbage".to_string());
        assert_eq!(junk.timestamp(), None);
    }

    #[test]
    fn test_generator_is_strictly_increasing_on_a_frozen_clock() {
        let clock = ManualClock::new(1_000);
        let ids = IdentityGenerator::new(Arc::new(clock.clone()));

        let first = ids.next(PERSISTENT_PREFIX);
        let second = ids.next(PERSISTENT_PREFIX);
        assert_eq!(first.timestamp(), Some(1_000));
        assert_eq!(second.timestamp(), Some(1_001));
        assert_ne!(first, second);

        clock.advance_millis(10_000);
        assert_eq!(ids.next(EPHEMERAL_PREFIX).timestamp(), Some(11_000));
    }

    #[test]
    fn test_observe_raises_floor() {
        let clock = ManualClock::new(1_000);
        let ids = IdentityGenerator::new(Arc::new(clock));

        ids.observe(&Identity::new(PERSISTENT_PREFIX, 5_000));
        assert_eq!(ids.next(PERSISTENT_PREFIX).timestamp(), Some(5_001));

        // Older or malformed identities never lower it
        ids.observe(&Identity::new(PERSISTENT_PREFIX, 10));
        ids.observe_value(Some(&Value::String("garbage".into())));
        ids.observe_value(None);
        assert_eq!(ids.next(PERSISTENT_PREFIX).timestamp(), Some(5_002));
    }
}
