/// Remote document store seam.
///
/// The remote tier is an opaque store of JSON documents addressed by an
/// identity-scoped path. Writes are whole-document replace-or-create.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::{DocumentPath, StorageError};

/// Field stamped onto every written document by the store.
/// Informational only, never used to order writes.
pub const UPDATED_AT_FIELD: &str = "_updatedAt";

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read one document. `Ok(None)` when it does not exist.
    async fn read(&self, path: &DocumentPath) -> Result<Option<Value>, StorageError>;

    /// Replace (or create) one document with `doc`.
    async fn write(&self, path: &DocumentPath, doc: Value) -> Result<(), StorageError>;
}

/// In-process document store.
#[derive(Debug)]
pub struct MemoryRemoteStore {
    docs: Mutex<HashMap<DocumentPath, Value>>,
    online: AtomicBool,
    writes: AtomicUsize,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
        }
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every read and write fails with `Unavailable`.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn document(&self, path: &DocumentPath) -> Option<Value> {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Put a document in place without stamping or counting it.
    pub fn insert_document(&self, path: DocumentPath, doc: Value) {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, doc);
    }

    fn check_online(&self, path: &DocumentPath) -> Result<(), StorageError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable(format!("remote offline ({})", path)))
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn read(&self, path: &DocumentPath) -> Result<Option<Value>, StorageError> {
        self.check_online(path)?;
        Ok(self.document(path))
    }

    async fn write(&self, path: &DocumentPath, doc: Value) -> Result<(), StorageError> {
        self.check_online(path)?;
        let Value::Object(mut fields) = doc else {
            return Err(StorageError::Malformed {
                location: path.to_string(),
                reason: "document must be a JSON object".to_string(),
            });
        };
        fields.insert(
            UPDATED_AT_FIELD.to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone(), Value::Object(fields));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_replaces_and_stamps() {
        let store = MemoryRemoteStore::new();
        let path = DocumentPath::new("users/u1/boards/default");

        store.write(&path, json!({ "desks": [], "extra": 1 })).await.unwrap();
        store.write(&path, json!({ "desks": [] })).await.unwrap();

        let doc = store.read(&path).await.unwrap().unwrap();
        assert!(doc.get("extra").is_none(), "write must replace, not merge");
        assert!(doc.get(UPDATED_AT_FIELD).is_some());
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_offline_fails() {
        let store = MemoryRemoteStore::new();
        let path = DocumentPath::new("users/u1/boards/default");
        store.set_online(false);

        assert!(matches!(
            store.read(&path).await,
            Err(StorageError::Unavailable(_))
        ));
        assert!(store.write(&path, json!({ "desks": [] })).await.is_err());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_rejects_non_object() {
        let store = MemoryRemoteStore::new();
        let path = DocumentPath::new("users/u1/boards/default");
        assert!(matches!(
            store.write(&path, json!([1, 2])).await,
            Err(StorageError::Malformed { .. })
        ));
    }
}
