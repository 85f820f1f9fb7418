//! Session configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use satchel_session::{DEFAULT_SESSION_KEY, DEFAULT_TOKEN_KEY, RESERVED_KEYS};

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the durable store
    pub database_path: PathBuf,
    /// Key the session bag is stored under
    pub store_key: String,
    /// Key the auth token is stored under
    pub token_key: String,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("satchel.db"),
            store_key: DEFAULT_SESSION_KEY.to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("satchel"))
            .unwrap_or_else(|| PathBuf::from(".satchel"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.store_key.trim().is_empty() {
            return Err(CoreError::Config("store_key cannot be empty".into()));
        }
        if self.token_key.trim().is_empty() {
            return Err(CoreError::Config("token_key cannot be empty".into()));
        }
        // A reserved token key would make every persistent token write a no-op
        if RESERVED_KEYS.contains(&self.token_key.as_str()) {
            return Err(CoreError::Config(format!(
                "token_key '{}' is reserved",
                self.token_key
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new(PathBuf::from("/tmp/satchel-test"));
        assert_eq!(config.database_path, PathBuf::from("/tmp/satchel-test/satchel.db"));
        assert_eq!(config.store_key, "satchel-session-key");
        assert_eq!(config.token_key, "satchel-token-key");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{"store_key": "my-app"}"#).unwrap();
        assert_eq!(config.store_key, "my-app");
        assert_eq!(config.token_key, "satchel-token-key");
    }

    #[test]
    fn test_validate_rejects_bad_keys() {
        let mut config = Config::new(PathBuf::from("."));
        config.token_key = "session-id".into();
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        config.token_key = "ok".into();
        config.store_key = "  ".into();
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }
}
