//! Runtime configuration, read from `SCHOOLERP_*` environment variables.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use schoolerp_observability::LogFormat;

use crate::sqlite::{SqliteStorage, default_storage_path};
use crate::storage::{MemoryStorage, SessionStorage};

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("could not resolve a default storage path: {0}")]
    NoStoragePath(String),
}

/// Where session data is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Lost on exit (tests, kiosks).
    Memory,
    Sqlite(PathBuf),
}

impl StorageBackend {
    pub async fn open(&self) -> anyhow::Result<Arc<dyn SessionStorage>> {
        match self {
            StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
            StorageBackend::Sqlite(path) => Ok(Arc::new(SqliteStorage::open(path).await?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Backend origin, without a trailing slash.
    pub api_url: String,
    pub http_timeout: Duration,
    pub storage: StorageBackend,
    pub log_format: LogFormat,
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup. Unset and blank variables
    /// take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_url = get("SCHOOLERP_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "SCHOOLERP_API_URL",
                reason: format!("expected an http(s) URL, got '{api_url}'"),
            });
        }

        let timeout_secs = match get("SCHOOLERP_HTTP_TIMEOUT_SECS") {
            None => DEFAULT_TIMEOUT_SECS,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "SCHOOLERP_HTTP_TIMEOUT_SECS",
                        reason: format!("expected a positive number of seconds, got '{raw}'"),
                    });
                }
            },
        };

        let storage = match get("SCHOOLERP_STORAGE").as_deref() {
            Some("memory") => StorageBackend::Memory,
            None | Some("sqlite") => {
                let path = match get("SCHOOLERP_STORAGE_PATH") {
                    Some(path) => PathBuf::from(path),
                    None => default_storage_path().map_err(|e| ConfigError::NoStoragePath(e.to_string()))?,
                };
                StorageBackend::Sqlite(path)
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "SCHOOLERP_STORAGE",
                    reason: format!("expected 'memory' or 'sqlite', got '{other}'"),
                });
            }
        };

        let log_format = match get("SCHOOLERP_LOG_FORMAT") {
            None => LogFormat::default(),
            Some(raw) => raw.parse::<LogFormat>().map_err(|e| {
                ConfigError::Invalid {
                    var: "SCHOOLERP_LOG_FORMAT",
                    reason: e.to_string(),
                }
            })?,
        };

        Ok(Self {
            api_url,
            http_timeout: Duration::from_secs(timeout_secs),
            storage,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<SessionConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SessionConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[("SCHOOLERP_STORAGE_PATH", "/tmp/s.db")]).unwrap();
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.http_timeout, Duration::from_secs(30));
        assert_eq!(cfg.storage, StorageBackend::Sqlite(PathBuf::from("/tmp/s.db")));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn explicit_values_are_used() {
        let cfg = config(&[
            ("SCHOOLERP_API_URL", "https://api.school.test/"),
            ("SCHOOLERP_HTTP_TIMEOUT_SECS", "5"),
            ("SCHOOLERP_STORAGE", "memory"),
            ("SCHOOLERP_LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(cfg.api_url, "https://api.school.test");
        assert_eq!(cfg.http_timeout, Duration::from_secs(5));
        assert_eq!(cfg.storage, StorageBackend::Memory);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config(&[("SCHOOLERP_API_URL", "  "), ("SCHOOLERP_STORAGE", "memory")]).unwrap();
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let zero = config(&[("SCHOOLERP_HTTP_TIMEOUT_SECS", "0"), ("SCHOOLERP_STORAGE", "memory")]);
        assert!(matches!(
            zero,
            Err(ConfigError::Invalid { var: "SCHOOLERP_HTTP_TIMEOUT_SECS", .. })
        ));

        let backend = config(&[("SCHOOLERP_STORAGE", "redis")]);
        assert!(matches!(backend, Err(ConfigError::Invalid { var: "SCHOOLERP_STORAGE", .. })));

        let url = config(&[("SCHOOLERP_API_URL", "localhost:5000"), ("SCHOOLERP_STORAGE", "memory")]);
        assert!(matches!(url, Err(ConfigError::Invalid { var: "SCHOOLERP_API_URL", .. })));

        let format = config(&[("SCHOOLERP_LOG_FORMAT", "xml"), ("SCHOOLERP_STORAGE", "memory")]);
        assert!(matches!(format, Err(ConfigError::Invalid { var: "SCHOOLERP_LOG_FORMAT", .. })));
    }

    #[tokio::test]
    async fn memory_backend_opens() {
        let storage = StorageBackend::Memory.open().await.unwrap();
        assert_eq!(storage.get(crate::storage::StorageKey::Token).await.unwrap(), None);
    }
}
