use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{PortalError, Result};

/// Cached signed-in identity (serialized `UserIdentity`)
pub const USER_KEY: &str = "medrunnerUser";

/// Cached logistician display name for the staff console
pub const STAFF_NAME_KEY: &str = "staffDiscordUsername";

/// Per-browser key/value storage that survives page reloads and restarts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientStorage {
    /// Schema version for migrations
    pub version: u32,

    /// Map of session token to that browser's stored values
    pub sessions: HashMap<String, HashMap<String, String>>,

    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for ClientStorage {
    fn default() -> Self {
        Self {
            version: 1,
            sessions: HashMap::new(),
            path: None,
        }
    }
}

impl ClientStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file, or create empty storage if it does not exist
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut storage = match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                serde_json::from_str::<Self>(&content).map_err(|e| PortalError::StateParse {
                    path: path.display().to_string(),
                    source: e,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::new(),
            Err(e) => {
                return Err(PortalError::StateLoad {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };
        storage.path = Some(path.to_path_buf());
        Ok(storage)
    }

    /// Save to the file it was loaded from, atomically
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(self)?;

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| PortalError::StateSave {
                path: path.display().to_string(),
                source: e,
            })?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| PortalError::StateSave {
                path: path.display().to_string(),
                source: e,
            })?;

        Ok(())
    }

    pub fn get(&self, session: &str, key: &str) -> Option<&str> {
        self.sessions.get(session)?.get(key).map(String::as_str)
    }

    pub fn set(&mut self, session: &str, key: &str, value: impl Into<String>) {
        self.sessions
            .entry(session.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Remove a single key, returning its previous value
    pub fn remove(&mut self, session: &str, key: &str) -> Option<String> {
        let values = self.sessions.get_mut(session)?;
        let removed = values.remove(key);
        if values.is_empty() {
            self.sessions.remove(session);
        }
        removed
    }

    /// Deserialize a stored JSON value; corrupt entries read as absent
    pub fn get_json<T: serde::de::DeserializeOwned>(&self, session: &str, key: &str) -> Option<T> {
        let raw = self.get(session, key)?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring unreadable '{}' for session: {}", key, e);
                None
            }
        }
    }

    pub fn set_json<T: Serialize>(&mut self, session: &str, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(session, key, raw);
        Ok(())
    }
}

/// Thread-safe wrapper for client storage
pub type SharedClientStorage = Arc<RwLock<ClientStorage>>;

pub fn create_shared_client_storage(storage: ClientStorage) -> SharedClientStorage {
    Arc::new(RwLock::new(storage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let mut storage = ClientStorage::new();
        storage.set("s1", STAFF_NAME_KEY, "Kestrel");
        assert_eq!(storage.get("s1", STAFF_NAME_KEY), Some("Kestrel"));
        assert_eq!(storage.get("s2", STAFF_NAME_KEY), None);

        assert_eq!(storage.remove("s1", STAFF_NAME_KEY), Some("Kestrel".to_string()));
        assert!(storage.sessions.is_empty());
    }

    #[test]
    fn test_remove_leaves_other_sessions() {
        let mut storage = ClientStorage::new();
        storage.set("s1", USER_KEY, "{}");
        storage.set("s2", USER_KEY, "{}");
        storage.remove("s1", USER_KEY);
        assert!(storage.get("s1", USER_KEY).is_none());
        assert!(storage.get("s2", USER_KEY).is_some());
    }

    #[test]
    fn test_corrupt_json_reads_as_absent() {
        let mut storage = ClientStorage::new();
        storage.set("s1", USER_KEY, "not json");
        assert!(storage.get_json::<serde_json::Value>("s1", USER_KEY).is_none());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = std::env::temp_dir().join(format!("medrunner-storage-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("client_storage.json");

        let mut storage = ClientStorage::load(&path).await.unwrap();
        assert!(storage.sessions.is_empty());
        storage.set("s1", STAFF_NAME_KEY, "Kestrel");
        storage.save().await.unwrap();

        let reloaded = ClientStorage::load(&path).await.unwrap();
        assert_eq!(reloaded.get("s1", STAFF_NAME_KEY), Some("Kestrel"));

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
