//! Non-persisting tier
//!
//! A plain bag kept in the tab-scoped store rather than the durable one,
//! so it disappears with the tab. No identity, no expiry.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use satchel_storage::{Codec, StateBag, StateStorage};

use crate::Result;

pub struct NonPersistingSession {
    key: String,
    storage: Arc<dyn StateStorage>,
    codec: Arc<dyn Codec>,
}

impl NonPersistingSession {
    /// The bag is stored under `non-persisting-<store_key>`.
    pub fn new(storage: Arc<dyn StateStorage>, codec: Arc<dyn Codec>, store_key: &str) -> Self {
        Self {
            key: format!("non-persisting-{}", store_key),
            storage,
            codec,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn get_all(&self) -> StateBag {
        let raw = match self.storage.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return StateBag::new(),
            Err(e) => {
                tracing::warn!(store_key = %self.key, error = %e, "Failed to read tab state");
                return StateBag::new();
            }
        };
        self.codec.decode(&raw).unwrap_or_default()
    }

    fn set_all(&self, bag: &StateBag) -> Result<&Self> {
        let raw = self.codec.encode(bag)?;
        self.storage.set_item(&self.key, &raw)?;
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_all().remove(key)
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<&Self> {
        let mut bag = self.get_all();
        bag.insert(key.to_string(), serde_json::to_value(value)?);
        self.set_all(&bag)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get_all().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Result<&Self> {
        let mut bag = self.get_all();
        bag.remove(key);
        self.set_all(&bag)
    }

    pub fn clear(&self) -> Result<&Self> {
        self.set_all(&StateBag::new())
    }
}

impl std::fmt::Debug for NonPersistingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonPersistingSession")
            .field("key", &self.key)
            .finish()
    }
}
