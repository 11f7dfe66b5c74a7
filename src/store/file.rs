//! JSON file store backend.
//!
//! The whole mapping lives in one JSON object. Writes go to a sibling
//! temporary file that is renamed over the original, so a reader never
//! sees a half-written file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

use super::{StorageMap, Store};

// ============================================================================
// JsonFileStore
// ============================================================================

/// Store persisted to a JSON object file.
///
/// A missing file is an empty store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Creates a store at `path`. The file is created on first `set`.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::store(format!(
                "{} does not hold a JSON object (found {})",
                self.path.display(),
                type_name(&other)
            ))),
        }
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<StorageMap> {
        let mut all = self.read_all().await?;
        Ok(keys
            .iter()
            .filter_map(|key| all.remove(*key).map(|v| ((*key).to_string(), v)))
            .collect())
    }

    async fn set(&self, items: StorageMap) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut all = self.read_all().await?;
        all.extend(items);

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&Value::Object(all))?).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), "Store file written");
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = JsonFileStore::new(dir.path().join("storage.json"));

        let data = store.get(&["rules"]).await.unwrap();
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_set_then_get_persists_across_instances() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("storage.json");

        let mut items = StorageMap::default();
        items.insert("globalEnabled".into(), json!(false));
        JsonFileStore::new(&path).set(items).await?;

        let mut more = StorageMap::default();
        more.insert("rules".into(), json!([{ "from": "a", "to": "b", "active": true }]));
        JsonFileStore::new(&path).set(more).await?;

        let data = JsonFileStore::new(&path)
            .get(&["rules", "globalEnabled"])
            .await?;
        assert_eq!(data.get("globalEnabled"), Some(&json!(false)));
        assert_eq!(data["rules"][0]["from"], json!("a"));
        Ok(())
    }

    #[tokio::test]
    async fn test_non_object_file_is_store_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        let err = JsonFileStore::new(&path).get(&["rules"]).await.unwrap_err();
        assert!(matches!(err, Error::Store { .. }));
    }

    #[tokio::test]
    async fn test_malformed_file_is_json_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonFileStore::new(&path).get(&["rules"]).await.unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.is_store_error());
    }
}
