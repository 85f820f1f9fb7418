//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] satchel_storage::StorageError),

    #[error("Session error: {0}")]
    Session(#[from] satchel_session::SessionError),

    #[error("Configuration error: {0}")]
    Config(String),
}
