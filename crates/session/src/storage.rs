//! Persistence of session data across restarts.
//!
//! The store talks to a small key-value interface so that the backing medium
//! (SQLite on desktop, memory in tests) can be swapped freely.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;

use schoolerp_auth::{SchoolSummary, SessionUser};

/// Fixed keys under which session data is persisted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Token,
    User,
    SelectedSchool,
}

impl StorageKey {
    pub const ALL: [StorageKey; 3] = [StorageKey::Token, StorageKey::User, StorageKey::SelectedSchool];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Token => "token",
            StorageKey::User => "user",
            StorageKey::SelectedSchool => "selectedSchool",
        }
    }
}

/// Key-value persistence for session data.
///
/// Writes must be durable by the time the returned future completes.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get(&self, key: StorageKey) -> anyhow::Result<Option<String>>;

    async fn set(&self, key: StorageKey, value: &str) -> anyhow::Result<()>;

    async fn remove(&self, key: StorageKey) -> anyhow::Result<()>;

    /// Remove every session key.
    async fn clear(&self) -> anyhow::Result<()> {
        for key in StorageKey::ALL {
            self.remove(key).await?;
        }
        Ok(())
    }
}

/// In-memory storage for tests/dev.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn get(&self, key: StorageKey) -> anyhow::Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))?;
        Ok(entries.get(&key).cloned())
    }

    async fn set(&self, key: StorageKey, value: &str) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))?;
        entries.insert(key, value.to_string());
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))?;
        entries.remove(&key);
        Ok(())
    }
}

/// Typed view of everything persisted for a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedSession {
    pub token: Option<String>,
    pub user: Option<SessionUser>,
    pub selected_school: Option<SchoolSummary>,
}

impl PersistedSession {
    /// Read persisted session data.
    ///
    /// Unreadable or corrupt entries are logged and treated as absent, so a
    /// damaged store degrades to "logged out" rather than failing startup.
    pub async fn load(storage: &dyn SessionStorage) -> Self {
        let token = read_raw(storage, StorageKey::Token)
            .await
            .filter(|t| !t.trim().is_empty());
        let user = read_json(storage, StorageKey::User).await;
        let selected_school = read_json(storage, StorageKey::SelectedSchool).await;

        Self {
            token,
            user,
            selected_school,
        }
    }
}

async fn read_raw(storage: &dyn SessionStorage, key: StorageKey) -> Option<String> {
    match storage.get(key).await {
        Ok(value) => value,
        Err(err) => {
            tracing::error!("failed to read '{}' from session storage: {err:?}", key.as_str());
            None
        }
    }
}

async fn read_json<T>(storage: &dyn SessionStorage, key: StorageKey) -> Option<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw = read_raw(storage, key).await?;
    match serde_json::from_str(&raw).with_context(|| format!("corrupt '{}' entry", key.as_str())) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("ignoring persisted session data: {err:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schoolerp_auth::Role;
    use schoolerp_core::{SchoolId, UserId};

    #[tokio::test]
    async fn memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get(StorageKey::Token).await.unwrap(), None);

        storage.set(StorageKey::Token, "abc").await.unwrap();
        assert_eq!(storage.get(StorageKey::Token).await.unwrap().as_deref(), Some("abc"));

        storage.remove(StorageKey::Token).await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn clear_removes_all_session_keys() {
        let storage = MemoryStorage::new();
        for key in StorageKey::ALL {
            storage.set(key, "{}").await.unwrap();
        }
        assert_eq!(storage.len(), 3);
        storage.clear().await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn load_decodes_typed_entries() {
        let storage = MemoryStorage::new();
        let user = SessionUser::new(UserId::parse("u-1").unwrap(), Role::SuperAdmin, "root@school.com");
        let school = SchoolSummary::new(SchoolId::parse("s-1").unwrap(), "North");
        storage.set(StorageKey::Token, "tok").await.unwrap();
        storage
            .set(StorageKey::User, &serde_json::to_string(&user).unwrap())
            .await
            .unwrap();
        storage
            .set(StorageKey::SelectedSchool, &serde_json::to_string(&school).unwrap())
            .await
            .unwrap();

        let loaded = PersistedSession::load(&storage).await;
        assert_eq!(
            loaded,
            PersistedSession {
                token: Some("tok".into()),
                user: Some(user),
                selected_school: Some(school),
            }
        );
    }

    #[tokio::test]
    async fn corrupt_entries_are_treated_as_absent() {
        let storage = MemoryStorage::new();
        storage.set(StorageKey::Token, "  ").await.unwrap();
        storage.set(StorageKey::User, "{not json").await.unwrap();

        let loaded = PersistedSession::load(&storage).await;
        assert_eq!(loaded, PersistedSession::default());
    }

    #[test]
    fn keys_are_stable() {
        let names: Vec<_> = StorageKey::ALL.iter().map(StorageKey::as_str).collect();
        assert_eq!(names, ["token", "user", "selectedSchool"]);
    }
}
