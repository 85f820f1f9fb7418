//! Satchel Storage Layer
//!
//! String-keyed item storage that session state is persisted into, plus the
//! codec that turns a state bag into the stored string and back.
//! Two providers ship here: a process-local in-memory store (tab lifetime)
//! and a durable SQLite store.

mod codec;
mod database;
mod error;
mod memory;
mod migrations;
mod storage;

pub use codec::{Codec, JsonCodec, StateBag};
pub use database::SqliteStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;
pub use storage::StateStorage;

pub type Result<T> = std::result::Result<T, StorageError>;
