//! Storage capability
//!
//! The minimal item API a session needs from its backing store. Anything
//! that can hold string values under string keys can back a session.

use crate::Result;

pub trait StateStorage: Send + Sync {
    /// Read the item stored under `key`, `None` when nothing is stored.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous item.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the item under `key`. Removing a missing item is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Remove every item in the store.
    fn clear(&self) -> Result<()>;
}
