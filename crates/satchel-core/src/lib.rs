//! Satchel Core
//!
//! Builds a ready-to-use [`Session`] from a [`Config`]: durable state in
//! SQLite, tab-scoped state in memory for the life of the process.

mod config;
mod error;

pub use config::Config;
pub use error::CoreError;

pub use satchel_session::{
    ChangeEvent, Clock, ExpiringSession, ExpiryEntry, FlashSession, Identity, ListenerId,
    ManualClock, NonPersistingSession, Session, SessionError, SessionOptions, StateBag,
    StateEventHandler, SystemClock,
};
pub use satchel_storage::{
    Codec, JsonCodec, MemoryStorage, SqliteStorage, StateStorage, StorageError,
};

use std::sync::Arc;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Open a session backed by the database at `config.database_path`.
pub fn open(config: &Config) -> Result<Session> {
    config.validate()?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            CoreError::Config(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }
    let storage = SqliteStorage::open(&config.database_path)?;

    tracing::info!(
        database = %config.database_path.display(),
        store_key = %config.store_key,
        "Opened session store"
    );

    Ok(build(config, Arc::new(storage)))
}

/// Open a session on an in-memory database; nothing outlives the process.
pub fn open_in_memory(config: &Config) -> Result<Session> {
    config.validate()?;
    let storage = SqliteStorage::open_in_memory()?;
    Ok(build(config, Arc::new(storage)))
}

fn build(config: &Config, storage: Arc<dyn StateStorage>) -> Session {
    Session::new(
        SessionOptions::default()
            .with_store_key(config.store_key.clone())
            .with_token_key(config.token_key.clone())
            .with_storage(storage)
            .with_tab_storage(Arc::new(MemoryStorage::new())),
    )
}

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
