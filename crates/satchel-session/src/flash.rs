//! Flash tier
//!
//! Read-once values: the first `get` returns the value and deletes it.
//! The bag is nested in the root bag under [`FLASH_SESSION_KEY`].

use serde::Serialize;
use serde_json::Value;

use satchel_storage::StateBag;

use crate::session::Session;
use crate::Result;

pub const FLASH_SESSION_KEY: &str = "satchel-flash-session-key";

#[derive(Debug)]
pub struct FlashSession<'a> {
    parent: &'a Session,
}

impl<'a> FlashSession<'a> {
    pub(crate) fn new(parent: &'a Session) -> Self {
        Self { parent }
    }

    fn get_all(&self) -> StateBag {
        match self.parent.get(FLASH_SESSION_KEY) {
            Some(Value::Object(bag)) => bag,
            _ => StateBag::new(),
        }
    }

    fn set_all(&self, bag: StateBag) -> Result<&Self> {
        self.parent.set_value(FLASH_SESSION_KEY, Value::Object(bag))?;
        Ok(self)
    }

    /// Take the value under `key`; it is gone afterwards.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut bag = self.get_all();
        let value = bag.remove(key);
        if value.is_some() {
            self.set_all(bag)?;
        }
        Ok(value)
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<&Self> {
        let mut bag = self.get_all();
        bag.insert(key.to_string(), serde_json::to_value(value)?);
        self.set_all(bag)
    }

    /// Does not consume the value.
    pub fn has(&self, key: &str) -> bool {
        self.get_all().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Result<&Self> {
        let mut bag = self.get_all();
        if bag.remove(key).is_some() {
            self.set_all(bag)?;
        }
        Ok(self)
    }

    pub fn clear(&self) -> Result<&Self> {
        self.set_all(StateBag::new())
    }
}
