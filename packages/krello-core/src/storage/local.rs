/// Device-scoped key/value stores for the local tier.
///
/// Values are the serialized documents (JSON text). Writes are synchronous
/// and complete before the calling mutation returns.
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::StorageError;

/// String-keyed, string-valued durable store.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory local store, for tests and hosts without a disk.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(feature = "file-store")]
pub use file::FileLocalStore;

#[cfg(feature = "file-store")]
mod file {
    use std::fs;
    use std::io::{ErrorKind, Write};
    use std::path::{Path, PathBuf};

    use sha2::{Digest, Sha256};

    use super::LocalStore;
    use crate::config::{default_data_dir, KrelloConfig};
    use crate::storage::StorageError;

    /// One file per key inside a directory.
    /// Writes go to a `.tmp` sibling first and are renamed into place.
    #[derive(Debug, Clone)]
    pub struct FileLocalStore {
        dir: PathBuf,
    }

    impl FileLocalStore {
        pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
            let dir = dir.into();
            fs::create_dir_all(&dir)?;
            Ok(Self { dir })
        }

        /// Store under `config.data_dir`, or the platform data directory.
        pub fn from_config(config: &KrelloConfig) -> Result<Self, StorageError> {
            let dir = config.data_dir.clone().unwrap_or_else(default_data_dir);
            log::info!("[krello.storage.local] Using data directory {}", dir.display());
            Self::new(dir)
        }

        pub fn dir(&self) -> &Path {
            &self.dir
        }

        /// File name for a key: readable prefix plus a short hash so that keys
        /// differing only in punctuation never share a file.
        pub fn path_for_key(&self, key: &str) -> PathBuf {
            let readable: String = key
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
                .collect();
            let mut hasher = Sha256::new();
            hasher.update(key.as_bytes());
            let digest = hasher.finalize();
            self.dir
                .join(format!("{}-{}.json", readable, hex::encode(&digest[..4])))
        }

        fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
            let tmp_path = path.with_extension("json.tmp");
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, path)?;

            if let Some(dir) = path.parent() {
                if let Ok(d) = fs::File::open(dir) {
                    let _ = d.sync_all();
                }
            }
            Ok(())
        }
    }

    impl LocalStore for FileLocalStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            match fs::read_to_string(self.path_for_key(key)) {
                Ok(content) => Ok(Some(content)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            Self::atomic_write(&self.path_for_key(key), value)?;
            Ok(())
        }
    }
}
