/// Dual-target persistence: local first, remote debounced.
///
/// Save path:
/// - serialize and write to the local store synchronously (errors logged)
/// - schedule a remote write after the debounce window; a newer schedule for
///   the same document supersedes it, so a burst sends only the last state
///
/// Load path: remote document if well formed, else local, else None.
///
/// Remote writes for one document path run one at a time, in sequence order.
/// A write that finds a newer sequence already started is dropped, so a slow
/// stale write can never land on top of a newer one.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::local::{LocalStore, MemoryLocalStore};
use super::remote::RemoteStore;
use super::{DocumentKind, DocumentPath, Scope, StorageError};
use crate::config::KrelloConfig;
use crate::favorites::FavoriteKey;
use crate::types::{RootState, UserIdentity};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(600);

const FAVORITES_FIELD: &str = "favorites";

/// Sequencing state for one remote document.
#[derive(Default)]
struct RemoteChannel {
    /// Sequence of the most recently scheduled write.
    scheduled: AtomicU64,
    /// Sequence of the most recently started write.
    started: AtomicU64,
    write_lock: tokio::sync::Mutex<()>,
}

pub struct PersistenceGateway {
    local: Arc<dyn LocalStore>,
    remote: Option<Arc<dyn RemoteStore>>,
    scope: Mutex<Scope>,
    debounce: Duration,
    channels: Mutex<HashMap<DocumentPath, Arc<RemoteChannel>>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl PersistenceGateway {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Option<Arc<dyn RemoteStore>>,
        debounce: Duration,
    ) -> Self {
        Self {
            local,
            remote,
            scope: Mutex::new(Scope::anonymous()),
            debounce,
            channels: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn with_config(
        config: &KrelloConfig,
        local: Arc<dyn LocalStore>,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> Self {
        Self::new(local, remote, config.debounce())
    }

    /// Local-only gateway backed by memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryLocalStore::new()), None, DEFAULT_DEBOUNCE)
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn scope(&self) -> Scope {
        self.scope.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Re-target subsequent reads and writes to the given identity.
    /// Writes already scheduled keep the scope they were scheduled under.
    pub fn set_identity(&self, identity: Option<&UserIdentity>) {
        let next = Scope::for_identity(identity);
        let mut scope = self.scope.lock().unwrap_or_else(PoisonError::into_inner);
        if *scope != next {
            log::info!(
                "[krello.storage.scope] Re-scoped storage to {}",
                next.uid().unwrap_or("<anonymous>")
            );
            *scope = next;
        }
    }

    // ── save ─────────────────────────────────────────────────────────────

    pub fn save_board(&self, state: &RootState) {
        let doc = match encode(state) {
            Ok(doc) => doc,
            Err(e) => {
                log::error!("[krello.storage.save] Failed to save board: {}", e);
                return;
            }
        };
        let text = doc.to_string();
        self.save_document(DocumentKind::Board, &text, doc);
    }

    pub fn save_favorites(&self, keys: &[FavoriteKey]) {
        let list = match encode(keys) {
            Ok(list) => list,
            Err(e) => {
                log::error!("[krello.storage.save] Failed to save favorites: {}", e);
                return;
            }
        };
        let text = list.to_string();
        let mut doc = serde_json::Map::new();
        doc.insert(FAVORITES_FIELD.to_string(), list);
        self.save_document(DocumentKind::Favorites, &text, Value::Object(doc));
    }

    fn save_document(&self, kind: DocumentKind, local_text: &str, remote_doc: Value) {
        let scope = self.scope();

        let key = scope.local_key(kind);
        if let Err(e) = self.local.set(&key, local_text) {
            log::warn!("[krello.storage.local] Failed to save {}: {}", key, e);
        }

        if let (Some(remote), Some(path)) = (&self.remote, scope.remote_path(kind)) {
            self.schedule_remote_write(remote.clone(), path, remote_doc);
        }
    }

    fn channel(&self, path: &DocumentPath) -> Arc<RemoteChannel> {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.clone())
            .or_default()
            .clone()
    }

    fn schedule_remote_write(&self, remote: Arc<dyn RemoteStore>, path: DocumentPath, doc: Value) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!(
                "[krello.storage.remote] No async runtime, skipping remote save of {}",
                path
            );
            return;
        };

        let channel = self.channel(&path);
        let seq = channel.scheduled.fetch_add(1, Ordering::SeqCst) + 1;
        let debounce = self.debounce;

        let handle = runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            if channel.scheduled.load(Ordering::SeqCst) != seq {
                log::debug!("[krello.storage.remote] Save #{} of {} superseded", seq, path);
                return;
            }

            let _guard = channel.write_lock.lock().await;
            if channel.started.load(Ordering::SeqCst) > seq {
                log::debug!("[krello.storage.remote] Dropping stale save #{} of {}", seq, path);
                return;
            }
            channel.started.store(seq, Ordering::SeqCst);

            match remote.write(&path, doc).await {
                Ok(()) => log::debug!("[krello.storage.remote] Saved #{} to {}", seq, path),
                Err(e) => log::warn!("[krello.storage.remote] Remote save of {} failed: {}", path, e),
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait for every scheduled remote write to finish (or be superseded).
    pub async fn flush(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
                pending.drain(..).collect()
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    log::warn!("[krello.storage.remote] Remote save task failed: {}", e);
                }
            }
        }
    }

    // ── load ─────────────────────────────────────────────────────────────

    pub async fn load_board(&self) -> Option<RootState> {
        self.load_document(
            DocumentKind::Board,
            RootState::from_document,
            RootState::from_json_str,
        )
        .await
    }

    pub async fn load_favorites(&self) -> Option<Vec<FavoriteKey>> {
        self.load_document(
            DocumentKind::Favorites,
            |doc| doc.get(FAVORITES_FIELD).and_then(parse_favorites),
            |raw| {
                serde_json::from_str::<Value>(raw)
                    .map_err(|e| log::warn!("[krello.storage.local] Corrupt favorites text: {}", e))
                    .ok()
                    .as_ref()
                    .and_then(parse_favorites)
            },
        )
        .await
    }

    async fn load_document<T>(
        &self,
        kind: DocumentKind,
        from_remote: impl Fn(&Value) -> Option<T>,
        from_local: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        let scope = self.scope();

        if let (Some(remote), Some(path)) = (&self.remote, scope.remote_path(kind)) {
            match remote.read(&path).await {
                Ok(Some(doc)) => match from_remote(&doc) {
                    Some(value) => {
                        log::info!("[krello.storage.remote] Loaded {}", path);
                        return Some(value);
                    }
                    None => log::warn!("[krello.storage.remote] Ignoring malformed document {}", path),
                },
                Ok(None) => log::info!("[krello.storage.remote] No document at {}", path),
                Err(e) => log::warn!("[krello.storage.remote] Remote load of {} failed: {}", path, e),
            }
        }

        let key = scope.local_key(kind);
        match self.local.get(&key) {
            Ok(Some(raw)) => {
                let value = from_local(&raw);
                if value.is_none() {
                    log::warn!("[krello.storage.local] Ignoring malformed data under {}", key);
                }
                value
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("[krello.storage.local] Failed to read {}: {}", key, e);
                None
            }
        }
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Value, StorageError> {
    Ok(serde_json::to_value(value)?)
}

fn parse_favorites(list: &Value) -> Option<Vec<FavoriteKey>> {
    if !list.is_array() {
        return None;
    }
    serde_json::from_value(list.clone())
        .map_err(|e| log::warn!("[krello.storage] Invalid favorites list: {}", e))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favorites::{FavoriteScope, ScopeKind};
    use crate::storage::remote::MemoryRemoteStore;
    use crate::types::{Card, Column, Desk};
    use async_trait::async_trait;
    use serde_json::json;

    fn sample_state(content: &str) -> RootState {
        RootState {
            desks: vec![Desk {
                id: "desk_1".to_string(),
                title: "Main".to_string(),
                columns: vec![Column {
                    id: "col_1".to_string(),
                    title: "Todo".to_string(),
                    cards: vec![Card {
                        id: "card_1".to_string(),
                        content: content.to_string(),
                        img: String::new(),
                        done: false,
                    }],
                }],
            }],
            active_desk_id: Some("desk_1".to_string()),
        }
    }

    fn signed_in(gateway: &PersistenceGateway, uid: &str) {
        gateway.set_identity(Some(&UserIdentity::new(uid)));
    }

    struct FailingLocalStore;

    impl LocalStore for FailingLocalStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
    }

    /// Remote whose writes of an empty board are slow, everything else fast.
    struct SlowEmptyBoardRemote {
        inner: MemoryRemoteStore,
        completed: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl RemoteStore for SlowEmptyBoardRemote {
        async fn read(&self, path: &DocumentPath) -> Result<Option<Value>, StorageError> {
            self.inner.read(path).await
        }

        async fn write(&self, path: &DocumentPath, doc: Value) -> Result<(), StorageError> {
            let desks = doc["desks"].as_array().map(Vec::len).unwrap_or(0);
            if desks == 0 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            self.inner.write(path, doc).await?;
            self.completed.lock().unwrap().push(desks);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_local_roundtrip() {
        let gateway = PersistenceGateway::in_memory();
        let state = sample_state("Buy milk");

        gateway.save_board(&state);
        assert_eq!(gateway.load_board().await, Some(state));
    }

    #[tokio::test]
    async fn test_load_empty_is_none() {
        let gateway = PersistenceGateway::in_memory();
        assert_eq!(gateway.load_board().await, None);
        assert_eq!(gateway.load_favorites().await, None);
    }

    #[tokio::test]
    async fn test_corrupt_local_is_none() {
        let local = Arc::new(MemoryLocalStore::new());
        local.set("krello_board_data", "{ definitely not json").unwrap();
        local.set("krello_favorites_v2", r#"{"not":"a list"}"#).unwrap();
        let gateway = PersistenceGateway::new(local, None, DEFAULT_DEBOUNCE);

        assert_eq!(gateway.load_board().await, None);
        assert_eq!(gateway.load_favorites().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_to_one_remote_write() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let gateway = PersistenceGateway::new(
            Arc::new(MemoryLocalStore::new()),
            Some(remote.clone()),
            DEFAULT_DEBOUNCE,
        );
        signed_in(&gateway, "u1");

        for i in 0..5 {
            gateway.save_board(&sample_state(&format!("edit {}", i)));
        }
        gateway.flush().await;

        assert_eq!(remote.write_count(), 1);
        let doc = remote
            .document(&DocumentPath::new("users/u1/boards/default"))
            .unwrap();
        assert_eq!(doc["desks"][0]["columns"][0]["cards"][0]["content"], "edit 4");
        assert!(doc.get("_updatedAt").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_write_is_immediate() {
        let local = Arc::new(MemoryLocalStore::new());
        let remote = Arc::new(MemoryRemoteStore::new());
        let gateway = PersistenceGateway::new(local.clone(), Some(remote.clone()), DEFAULT_DEBOUNCE);
        signed_in(&gateway, "u1");

        gateway.save_board(&sample_state("a"));
        assert!(local.get("krello_board_data:u1").unwrap().is_some());
        assert_eq!(remote.write_count(), 0);

        gateway.flush().await;
        assert_eq!(remote.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_after_quiet_period_are_separate() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let gateway = PersistenceGateway::new(
            Arc::new(MemoryLocalStore::new()),
            Some(remote.clone()),
            DEFAULT_DEBOUNCE,
        );
        signed_in(&gateway, "u1");

        gateway.save_board(&sample_state("first"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        gateway.save_board(&sample_state("second"));
        gateway.flush().await;

        assert_eq!(remote.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_failure_does_not_block_remote() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let gateway = PersistenceGateway::new(
            Arc::new(FailingLocalStore),
            Some(remote.clone()),
            DEFAULT_DEBOUNCE,
        );
        signed_in(&gateway, "u1");

        gateway.save_board(&sample_state("a"));
        gateway.flush().await;
        assert_eq!(remote.write_count(), 1);

        // Local read failure is absorbed too; remote still answers.
        assert!(gateway.load_board().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_is_swallowed() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.set_online(false);
        let gateway = PersistenceGateway::new(
            Arc::new(MemoryLocalStore::new()),
            Some(remote.clone()),
            DEFAULT_DEBOUNCE,
        );
        signed_in(&gateway, "u1");

        gateway.save_board(&sample_state("offline edit"));
        gateway.flush().await;
        assert_eq!(remote.write_count(), 0);

        let loaded = gateway.load_board().await.unwrap();
        assert_eq!(loaded, sample_state("offline edit"));
    }

    #[tokio::test]
    async fn test_remote_preferred_over_local() {
        let local = Arc::new(MemoryLocalStore::new());
        let remote = Arc::new(MemoryRemoteStore::new());
        let gateway = PersistenceGateway::new(local.clone(), Some(remote.clone()), DEFAULT_DEBOUNCE);
        signed_in(&gateway, "u1");

        local
            .set("krello_board_data:u1", &serde_json::to_string(&sample_state("local")).unwrap())
            .unwrap();
        remote.insert_document(
            DocumentPath::new("users/u1/boards/default"),
            serde_json::to_value(sample_state("remote")).unwrap(),
        );

        assert_eq!(gateway.load_board().await, Some(sample_state("remote")));
    }

    #[tokio::test]
    async fn test_malformed_remote_falls_back_to_local() {
        let local = Arc::new(MemoryLocalStore::new());
        let remote = Arc::new(MemoryRemoteStore::new());
        let gateway = PersistenceGateway::new(local.clone(), Some(remote.clone()), DEFAULT_DEBOUNCE);
        signed_in(&gateway, "u1");

        local
            .set("krello_board_data:u1", &serde_json::to_string(&sample_state("local")).unwrap())
            .unwrap();
        remote.insert_document(
            DocumentPath::new("users/u1/boards/default"),
            json!({ "desks": "not a list" }),
        );

        assert_eq!(gateway.load_board().await, Some(sample_state("local")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_write_keeps_its_identity() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let local = Arc::new(MemoryLocalStore::new());
        let gateway = PersistenceGateway::new(local.clone(), Some(remote.clone()), DEFAULT_DEBOUNCE);

        signed_in(&gateway, "alice");
        gateway.save_board(&sample_state("alice's"));
        signed_in(&gateway, "bob");
        gateway.save_board(&sample_state("bob's"));
        gateway.flush().await;

        let alice = remote
            .document(&DocumentPath::new("users/alice/boards/default"))
            .unwrap();
        let bob = remote
            .document(&DocumentPath::new("users/bob/boards/default"))
            .unwrap();
        assert_eq!(alice["desks"][0]["columns"][0]["cards"][0]["content"], "alice's");
        assert_eq!(bob["desks"][0]["columns"][0]["cards"][0]["content"], "bob's");
        assert_eq!(
            local.keys(),
            vec!["krello_board_data:alice".to_string(), "krello_board_data:bob".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_anonymous_scope_never_touches_remote() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let gateway = PersistenceGateway::new(
            Arc::new(MemoryLocalStore::new()),
            Some(remote.clone()),
            DEFAULT_DEBOUNCE,
        );

        gateway.save_board(&sample_state("a"));
        gateway.flush().await;
        assert_eq!(remote.write_count(), 0);
        assert!(gateway.load_board().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_older_write_never_lands_after_newer() {
        let remote = Arc::new(SlowEmptyBoardRemote {
            inner: MemoryRemoteStore::new(),
            completed: Mutex::new(Vec::new()),
        });
        let gateway = PersistenceGateway::new(
            Arc::new(MemoryLocalStore::new()),
            Some(remote.clone()),
            DEFAULT_DEBOUNCE,
        );
        signed_in(&gateway, "u1");

        // Empty board write starts and stalls on the network...
        gateway.save_board(&RootState::default());
        tokio::time::sleep(Duration::from_secs(1)).await;
        // ...while a newer, fast write is scheduled behind it.
        gateway.save_board(&sample_state("newest"));
        gateway.flush().await;

        assert_eq!(*remote.completed.lock().unwrap(), vec![0, 1]);
        let doc = remote
            .inner
            .document(&DocumentPath::new("users/u1/boards/default"))
            .unwrap();
        assert_eq!(doc["desks"][0]["columns"][0]["cards"][0]["content"], "newest");
    }

    #[tokio::test(start_paused = true)]
    async fn test_favorites_roundtrip_local_and_remote() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let gateway = PersistenceGateway::new(
            Arc::new(MemoryLocalStore::new()),
            Some(remote.clone()),
            DEFAULT_DEBOUNCE,
        );
        signed_in(&gateway, "u1");

        let keys = vec![FavoriteKey::new(
            FavoriteScope::new(ScopeKind::Desk, "desk_1"),
            "card_1",
        )];
        gateway.save_favorites(&keys);
        gateway.flush().await;

        let doc = remote
            .document(&DocumentPath::new("users/u1/boards/favorites"))
            .unwrap();
        assert!(doc["favorites"].is_array());
        assert_eq!(gateway.load_favorites().await, Some(keys.clone()));

        remote.set_online(false);
        assert_eq!(gateway.load_favorites().await, Some(keys));
    }

    #[test]
    fn test_save_without_runtime_still_writes_locally() {
        let local = Arc::new(MemoryLocalStore::new());
        let remote = Arc::new(MemoryRemoteStore::new());
        let gateway = PersistenceGateway::new(local.clone(), Some(remote.clone()), DEFAULT_DEBOUNCE);
        signed_in(&gateway, "u1");

        gateway.save_board(&sample_state("a"));
        assert!(local.get("krello_board_data:u1").unwrap().is_some());
        assert_eq!(remote.write_count(), 0);
    }

    #[test]
    fn test_encode_reports_serialization_error() {
        let mut bad = HashMap::new();
        bad.insert((1, 2), "non-string key");
        assert!(matches!(encode(&bad), Err(StorageError::Serialization(_))));
        assert_eq!(encode(&[1, 2]).unwrap(), json!([1, 2]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_debounce_applies() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let config = KrelloConfig {
            debounce_ms: 700,
            ..KrelloConfig::default()
        };
        let gateway = PersistenceGateway::with_config(
            &config,
            Arc::new(MemoryLocalStore::new()),
            Some(remote.clone()),
        );
        assert_eq!(gateway.debounce(), Duration::from_millis(700));
        signed_in(&gateway, "u1");

        gateway.save_board(&sample_state("a"));
        tokio::time::sleep(Duration::from_millis(650)).await;
        assert_eq!(remote.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(remote.write_count(), 1);
    }
}
