//! Root session
//!
//! The whole session is one state bag, encoded by the codec and stored as a
//! single item under the session key. Every mutation reads the bag, changes
//! it in memory and writes it back; there is no locking against other
//! writers of the same storage, the last write wins.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use satchel_storage::{Codec, JsonCodec, MemoryStorage, StateBag, StateStorage};

use crate::clock::{Clock, SystemClock};
use crate::events::{ListenerId, StateEventHandler};
use crate::expiring::ExpiringSession;
use crate::flash::FlashSession;
use crate::identity::{Identity, IdentityGenerator, PERSISTENT_PREFIX};
use crate::non_persisting::NonPersistingSession;
use crate::Result;

pub const DEFAULT_SESSION_KEY: &str = "satchel-session-key";
pub const DEFAULT_TOKEN_KEY: &str = "satchel-token-key";
pub const USER_SESSION_KEY: &str = "user-session";
pub const SESSION_ID_KEY: &str = "session-id";

/// Keys that `set` refuses to write.
pub const RESERVED_KEYS: [&str; 2] = [SESSION_ID_KEY, "key"];

pub(crate) fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Construction options for a [`Session`]
pub struct SessionOptions {
    /// Storage key the root bag is saved under
    pub store_key: String,
    /// Key the auth token is saved under
    pub token_key: String,
    /// Durable store for the root bag and the nested tiers
    pub storage: Arc<dyn StateStorage>,
    /// Short-lived store for the non-persisting tier
    pub tab_storage: Arc<dyn StateStorage>,
    pub codec: Arc<dyn Codec>,
    pub clock: Arc<dyn Clock>,
}

impl SessionOptions {
    pub fn with_store_key(mut self, key: impl Into<String>) -> Self {
        self.store_key = key.into();
        self
    }

    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn StateStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_tab_storage(mut self, storage: Arc<dyn StateStorage>) -> Self {
        self.tab_storage = storage;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            store_key: DEFAULT_SESSION_KEY.to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            storage: Arc::new(MemoryStorage::new()),
            tab_storage: Arc::new(MemoryStorage::new()),
            codec: Arc::new(JsonCodec),
            clock: Arc::new(SystemClock),
        }
    }
}

pub struct Session {
    key: String,
    token_key: String,
    storage: RwLock<Arc<dyn StateStorage>>,
    codec: Arc<dyn Codec>,
    ids: IdentityGenerator,
    /// Last bag read at construction or written since
    state: RwLock<StateBag>,
    listeners: RwLock<HashMap<String, StateEventHandler>>,
    nonpersisting: NonPersistingSession,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        let nonpersisting = NonPersistingSession::new(
            Arc::clone(&options.tab_storage),
            Arc::clone(&options.codec),
            &options.store_key,
        );

        let session = Self {
            key: options.store_key,
            token_key: options.token_key,
            storage: RwLock::new(options.storage),
            codec: options.codec,
            ids: IdentityGenerator::new(options.clock),
            state: RwLock::new(StateBag::new()),
            listeners: RwLock::new(HashMap::new()),
            nonpersisting,
        };
        *session.state.write() = session.get_all();
        session
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token_key(&self) -> &str {
        &self.token_key
    }

    /// Swap the durable store. With `clear` the new store starts over with
    /// a fresh identity, otherwise the mirror is reloaded from it.
    pub fn use_storage(&self, storage: Arc<dyn StateStorage>, clear: bool) -> Result<&Self> {
        *self.storage.write() = storage;
        tracing::info!(store_key = %self.key, clear, "Switched session storage");

        if clear {
            return self.clear();
        }
        let bag = self.get_all();
        self.ids.observe_value(bag.get(SESSION_ID_KEY));
        *self.state.write() = bag;
        Ok(self)
    }

    /// Register a callback for changes to `key`.
    pub fn listen<F>(&self, key: &str, callback: F) -> ListenerId
    where
        F: Fn(&Value, &StateEventHandler) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .entry(key.to_string())
            .or_insert_with(|| StateEventHandler::new(key))
            .add(Arc::new(callback))
    }

    pub fn unlisten(&self, key: &str, id: ListenerId) -> &Self {
        if let Some(handler) = self.listeners.write().get_mut(key) {
            handler.remove(id);
        }
        self
    }

    /// Listeners run without any session lock held, so they may call back in.
    fn dispatch(&self, key: &str, value: &Value) {
        let handler = self.listeners.read().get(key).cloned();
        if let Some(handler) = handler {
            handler.call(value);
        }
    }

    /// Start a persistent session: give the current bag a fresh identity.
    pub fn start(&self) -> Result<&Self> {
        let mut bag = self.get_all();
        let id = self.next_identity(&bag);
        tracing::info!(session_id = %id, store_key = %self.key, "Started session");
        bag.insert(SESSION_ID_KEY.to_string(), id.into());
        self.set_all(bag)?;
        Ok(self)
    }

    /// A fresh identity that sorts after whatever `bag` currently holds,
    /// even if another session on this storage issued it.
    fn next_identity(&self, bag: &StateBag) -> Identity {
        self.ids.observe_value(bag.get(SESSION_ID_KEY));
        self.ids.next(PERSISTENT_PREFIX)
    }

    /// Whether `key` is in the stored bag.
    pub fn has(&self, key: &str) -> bool {
        self.get_all().contains_key(key)
    }

    /// The stored value for `key`. A missing key is `None`, never an error.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_all().remove(key)
    }

    /// Like [`Session::get`], deserialized into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store `data` under `key`.
    ///
    /// `"session-id"` and `"key"` are reserved; writing them is silently
    /// ignored. The first write to a session without an identity starts it.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> Result<&Self> {
        if is_reserved(key) {
            tracing::debug!(key = %key, "Ignoring write to reserved session key");
            return Ok(self);
        }
        self.set_value(key, serde_json::to_value(data)?)
    }

    /// Write path shared with the nested tiers. Callers filter reserved keys.
    pub(crate) fn set_value(&self, key: &str, value: Value) -> Result<&Self> {
        if !self.has(SESSION_ID_KEY) {
            self.start()?;
        }

        // Read after dispatch so writes made by listeners are kept
        self.dispatch(key, &value);
        let mut bag = self.get_all();
        bag.insert(key.to_string(), value);
        self.set_all(bag)?;
        Ok(self)
    }

    /// Replace the session identity. With `clear` all data is wiped too.
    pub fn renew(&self, clear: bool) -> Result<&Self> {
        if clear {
            return self.clear();
        }

        let mut bag = self.get_all();
        let id = self.next_identity(&bag);
        tracing::info!(session_id = %id, store_key = %self.key, "Renewed session");
        bag.insert(SESSION_ID_KEY.to_string(), id.into());
        self.set_all(bag)?;
        Ok(self)
    }

    /// Read the stored bag. Missing or undecodable data reads as empty.
    fn get_all(&self) -> StateBag {
        let storage = Arc::clone(&*self.storage.read());
        let raw = match storage.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return StateBag::new(),
            Err(e) => {
                tracing::warn!(store_key = %self.key, error = %e, "Failed to read session");
                return StateBag::new();
            }
        };

        self.codec.decode(&raw).unwrap_or_else(|e| {
            tracing::debug!(store_key = %self.key, error = %e, "Discarding undecodable session");
            StateBag::new()
        })
    }

    /// Overwrite the stored bag. Prefer `set`.
    fn set_all(&self, bag: StateBag) -> Result<()> {
        let raw = self.codec.encode(&bag)?;
        let storage = Arc::clone(&*self.storage.read());
        storage.set_item(&self.key, &raw)?;
        *self.state.write() = bag;
        Ok(())
    }

    /// Current identity; it records when the session was started.
    pub fn id(&self) -> Option<String> {
        match self.get(SESSION_ID_KEY) {
            Some(Value::String(id)) => Some(id),
            _ => None,
        }
    }

    /// Current identity, parsed.
    pub fn identity(&self) -> Option<Identity> {
        self.id().map(Identity::from)
    }

    /// Wipe all data and start over with a new identity.
    pub fn clear(&self) -> Result<&Self> {
        self.ids.observe_value(self.get_all().get(SESSION_ID_KEY));
        self.set_all(StateBag::new())?;
        self.start()
    }

    /// Clear the session and every tier, including the non-persisting one.
    pub fn clear_all(&self) -> Result<&Self> {
        self.clear()?;
        self.flash().clear()?;
        self.expiring().clear()?;
        self.nonpersisting.clear()?;
        tracing::info!(store_key = %self.key, "Cleared session and all tiers");
        Ok(self)
    }

    /// Remove `key` if present. Reserved keys are left alone.
    pub fn remove(&self, key: &str) -> Result<&Self> {
        if is_reserved(key) {
            return Ok(self);
        }

        if self.has(key) {
            self.dispatch(key, &Value::Null);
            let mut bag = self.get_all();
            bag.remove(key);
            self.set_all(bag)?;
        }
        Ok(self)
    }

    /// The saved token, from the persistent bag first, then the tab store.
    pub fn token(&self) -> Option<String> {
        let value = if self.has(&self.token_key) {
            self.get(&self.token_key)
        } else {
            self.nonpersisting.get(&self.token_key)
        };

        match value {
            Some(Value::String(token)) => Some(token),
            _ => None,
        }
    }

    /// Save a token. Without `remember` it only lives as long as the tab store.
    pub fn set_token(&self, token: &str, remember: bool) -> Result<&Self> {
        if remember {
            return self.set(&self.token_key, token);
        }
        self.nonpersisting.set(&self.token_key, token)?;
        Ok(self)
    }

    pub fn revoke_token(&self) -> Result<&Self> {
        if self.has(&self.token_key) {
            return self.remove(&self.token_key);
        }
        if self.nonpersisting.has(&self.token_key) {
            self.nonpersisting.remove(&self.token_key)?;
        }
        Ok(self)
    }

    /// Agrees with [`Session::token`]: a non-string value under the token
    /// key does not count as a token.
    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    /// The saved user, from the persistent bag first, then the tab store.
    pub fn user(&self) -> Option<Value> {
        if self.has(USER_SESSION_KEY) {
            return self.get(USER_SESSION_KEY);
        }
        self.nonpersisting.get(USER_SESSION_KEY)
    }

    pub fn set_user<T: Serialize + ?Sized>(&self, user: &T, remember: bool) -> Result<&Self> {
        if remember {
            return self.set(USER_SESSION_KEY, user);
        }
        self.nonpersisting.set(USER_SESSION_KEY, user)?;
        Ok(self)
    }

    /// Remove the saved user. The token is not touched; see [`Session::revoke_token`].
    pub fn remove_user(&self) -> Result<&Self> {
        if self.has(USER_SESSION_KEY) {
            return self.remove(USER_SESSION_KEY);
        }
        if self.nonpersisting.has(USER_SESSION_KEY) {
            self.nonpersisting.remove(USER_SESSION_KEY)?;
        }
        Ok(self)
    }

    pub fn has_user(&self) -> bool {
        self.has(USER_SESSION_KEY) || self.nonpersisting.has(USER_SESSION_KEY)
    }

    pub fn expiring(&self) -> ExpiringSession<'_> {
        ExpiringSession::new(self)
    }

    pub fn flash(&self) -> FlashSession<'_> {
        FlashSession::new(self)
    }

    pub fn non_persisting(&self) -> &NonPersistingSession {
        &self.nonpersisting
    }

    pub(crate) fn identities(&self) -> &IdentityGenerator {
        &self.ids
    }

    /// The last known bag, without re-reading storage.
    pub fn to_object(&self) -> StateBag {
        self.state.read().clone()
    }

    /// The last known bag, encoded with the session codec.
    pub fn to_json(&self) -> Result<String> {
        Ok(self.codec.encode(&self.state.read())?)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("token_key", &self.token_key)
            .field("state", &*self.state.read())
            .finish()
    }
}
