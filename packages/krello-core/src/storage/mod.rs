pub mod gateway;
pub mod local;
pub mod remote;

use std::fmt;

pub use gateway::{PersistenceGateway, DEFAULT_DEBOUNCE};
pub use local::{LocalStore, MemoryLocalStore};
#[cfg(feature = "file-store")]
pub use local::FileLocalStore;
pub use remote::{MemoryRemoteStore, RemoteStore};

use crate::types::UserIdentity;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed document at {location}: {reason}")]
    Malformed { location: String, reason: String },
}

/// The two documents the gateway persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Board,
    Favorites,
}

impl DocumentKind {
    fn local_prefix(self) -> &'static str {
        match self {
            DocumentKind::Board => "krello_board_data",
            DocumentKind::Favorites => "krello_favorites_v2",
        }
    }

    fn remote_name(self) -> &'static str {
        match self {
            DocumentKind::Board => "default",
            DocumentKind::Favorites => "favorites",
        }
    }
}

/// Identity-scoped address of a remote document, e.g. `users/{uid}/boards/default`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath(String);

impl DocumentPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage scope derived from the signed-in identity.
/// Anonymous scope uses unsuffixed local keys and has no remote documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    uid: Option<String>,
}

impl Scope {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_identity(identity: Option<&UserIdentity>) -> Self {
        Self {
            uid: identity
                .map(|i| i.uid.trim().to_string())
                .filter(|uid| !uid.is_empty()),
        }
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    pub fn local_key(&self, kind: DocumentKind) -> String {
        match &self.uid {
            Some(uid) => format!("{}:{}", kind.local_prefix(), uid),
            None => kind.local_prefix().to_string(),
        }
    }

    pub fn remote_path(&self, kind: DocumentKind) -> Option<DocumentPath> {
        self.uid
            .as_ref()
            .map(|uid| DocumentPath(format!("users/{}/boards/{}", uid, kind.remote_name())))
    }
}
