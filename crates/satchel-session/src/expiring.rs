//! Expiring tier
//!
//! Values that stop existing N minutes after they were set. Expiry is lazy:
//! nothing sweeps in the background, `get` and `has` drop an expired entry
//! when they find one. The tier's bag is nested in the root bag under
//! [`EXPIRING_SESSION_KEY`] and carries its own `sess-temp` identity.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use satchel_storage::StateBag;

use crate::error::SessionError;
use crate::identity::{Identity, EPHEMERAL_PREFIX};
use crate::session::{is_reserved, Session, SESSION_ID_KEY};
use crate::Result;

pub const EXPIRING_SESSION_KEY: &str = "satchel-expiring-session-key";

const MILLIS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiryEntry {
    pub value: Value,
    /// Epoch millis after which the entry is gone
    pub expiry: i64,
}

impl ExpiryEntry {
    /// Still valid at exactly `expiry`.
    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis > self.expiry
    }
}

#[derive(Debug)]
pub struct ExpiringSession<'a> {
    parent: &'a Session,
}

impl<'a> ExpiringSession<'a> {
    pub(crate) fn new(parent: &'a Session) -> Self {
        Self { parent }
    }

    fn get_all(&self) -> StateBag {
        match self.parent.get(EXPIRING_SESSION_KEY) {
            Some(Value::Object(bag)) => bag,
            _ => StateBag::new(),
        }
    }

    fn set_all(&self, bag: StateBag) -> Result<()> {
        self.parent
            .set_value(EXPIRING_SESSION_KEY, Value::Object(bag))?;
        Ok(())
    }

    fn next_identity(&self, bag: &StateBag) -> Identity {
        let ids = self.parent.identities();
        ids.observe_value(bag.get(SESSION_ID_KEY));
        ids.next(EPHEMERAL_PREFIX)
    }

    /// The tier bag, with its identity written first if it has none.
    fn ensure_initialized(&self) -> Result<StateBag> {
        let mut bag = self.get_all();
        if !bag.contains_key(SESSION_ID_KEY) {
            let id = self.next_identity(&bag);
            tracing::debug!(session_id = %id, "Initialized expiring session");
            bag.insert(SESSION_ID_KEY.to_string(), id.into());
            self.set_all(bag.clone())?;
        }
        Ok(bag)
    }

    pub fn id(&self) -> Result<String> {
        let bag = self.ensure_initialized()?;
        Ok(bag
            .get(SESSION_ID_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Store `value` for `minutes`. Fractions are fine; zero or negative
    /// minutes store an entry that is already expired.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, minutes: f64) -> Result<&Self> {
        if !minutes.is_finite() {
            return Err(SessionError::InvalidMinutes(minutes));
        }
        if is_reserved(key) {
            return Ok(self);
        }

        let now = self.parent.identities().clock().now_millis();
        let entry = ExpiryEntry {
            value: serde_json::to_value(value)?,
            // Floor so any negative offset lands before `now`
            expiry: now.saturating_add((minutes * MILLIS_PER_MINUTE).floor() as i64),
        };

        let mut bag = self.ensure_initialized()?;
        bag.insert(key.to_string(), serde_json::to_value(entry)?);
        self.set_all(bag)?;
        Ok(self)
    }

    /// The live entry for `key`, evicting it first if it has expired.
    fn live_entry(&self, key: &str) -> Result<Option<ExpiryEntry>> {
        if is_reserved(key) {
            return Ok(None);
        }

        let Some(raw) = self.get_all().remove(key) else {
            return Ok(None);
        };
        let Ok(entry) = serde_json::from_value::<ExpiryEntry>(raw) else {
            tracing::debug!(key = %key, "Ignoring malformed expiring entry");
            return Ok(None);
        };

        let now = self.parent.identities().clock().now_millis();
        if entry.is_expired(now) {
            tracing::debug!(key = %key, expiry = entry.expiry, "Evicting expired entry");
            self.remove(key)?;
            return Ok(None);
        }
        Ok(Some(entry))
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.live_entry(key)?.map(|entry| entry.value))
    }

    pub fn has(&self, key: &str) -> Result<bool> {
        Ok(self.live_entry(key)?.is_some())
    }

    pub fn remove(&self, key: &str) -> Result<&Self> {
        if is_reserved(key) {
            return Ok(self);
        }

        let mut bag = self.get_all();
        if bag.remove(key).is_some() {
            self.set_all(bag)?;
        }
        Ok(self)
    }

    pub fn clear(&self) -> Result<&Self> {
        self.renew(true)
    }

    /// Replace the tier identity. With `clear` every entry goes too.
    pub fn renew(&self, clear: bool) -> Result<&Self> {
        let current = self.get_all();
        let id = self.next_identity(&current);
        let mut bag = if clear { StateBag::new() } else { current };
        bag.insert(SESSION_ID_KEY.to_string(), id.into());
        self.set_all(bag)?;
        Ok(self)
    }
}
