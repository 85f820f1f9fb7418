//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(#[from] satchel_storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expiry must be a finite number of minutes, got {0}")]
    InvalidMinutes(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_minutes_display() {
        let err = SessionError::InvalidMinutes(f64::INFINITY);
        assert!(err.to_string().contains("finite"));
        assert!(err.to_string().contains("inf"));
    }

    #[test]
    fn test_storage_error_conversion() {
        let storage_err = satchel_storage::StorageError::Codec("bad".into());
        let err: SessionError = storage_err.into();
        assert!(matches!(err, SessionError::Storage(_)));
        assert!(err.to_string().contains("Storage error"));
    }
}
