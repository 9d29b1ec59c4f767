/// App session: one board, one favorites index, one identity.
///
/// `boot` loads the board (remote first, then local), falls back to seeding a
/// default desk, then loads favorites. Switching identity re-scopes storage
/// and boots again from scratch, so nothing from the previous user's state
/// is written into the new user's documents.
use std::sync::Arc;

use crate::board::BoardStore;
use crate::config::KrelloConfig;
use crate::favorites::FavoritesIndex;
use crate::storage::{LocalStore, PersistenceGateway, RemoteStore};
use crate::types::UserIdentity;

pub struct Session {
    gateway: Arc<PersistenceGateway>,
    config: KrelloConfig,
    board: BoardStore,
    favorites: FavoritesIndex,
    identity: Option<UserIdentity>,
}

impl Session {
    pub fn new(gateway: Arc<PersistenceGateway>) -> Self {
        Self::with_config(gateway, KrelloConfig::default())
    }

    /// Build the gateway from `config` as well, so its debounce applies.
    pub fn open(
        config: KrelloConfig,
        local: Arc<dyn LocalStore>,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> Self {
        let gateway = Arc::new(PersistenceGateway::with_config(&config, local, remote));
        Self::with_config(gateway, config)
    }

    /// Use an existing gateway. The gateway keeps its own debounce; only the
    /// board settings of `config` apply.
    pub fn with_config(gateway: Arc<PersistenceGateway>, config: KrelloConfig) -> Self {
        if gateway.debounce() != config.debounce() {
            log::debug!(
                "[krello.session] Gateway debounce {:?} overrides configured {:?}",
                gateway.debounce(),
                config.debounce()
            );
        }
        Self {
            board: BoardStore::with_config(gateway.clone(), &config),
            favorites: FavoritesIndex::new(gateway.clone()),
            gateway,
            config,
            identity: None,
        }
    }

    /// Load persisted state for the current identity. Seeds a default desk
    /// when nothing usable was stored.
    pub async fn boot(&mut self) {
        let mut board = BoardStore::with_config(self.gateway.clone(), &self.config);
        match self.gateway.load_board().await {
            Some(state) => {
                log::info!(
                    "[krello.session] Loaded board with {} desks, {} cards",
                    state.desks.len(),
                    state.card_count()
                );
                board.replace_state(state);
            }
            None => log::info!("[krello.session] No stored board"),
        }
        board.seed_if_empty();
        self.board = board;

        let mut favorites = FavoritesIndex::new(self.gateway.clone());
        if let Some(keys) = self.gateway.load_favorites().await {
            favorites.replace_keys(keys);
        }
        self.favorites = favorites;
    }

    /// Sign in (`Some`) or out (`None`), then reload under the new scope.
    pub async fn set_identity(&mut self, identity: Option<UserIdentity>) {
        self.gateway.set_identity(identity.as_ref());
        self.identity = identity;
        self.boot().await;
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        self.identity.as_ref()
    }

    pub fn gateway(&self) -> &Arc<PersistenceGateway> {
        &self.gateway
    }

    pub fn board(&self) -> &BoardStore {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut BoardStore {
        &mut self.board
    }

    pub fn favorites(&self) -> &FavoritesIndex {
        &self.favorites
    }

    pub fn favorites_mut(&mut self) -> &mut FavoritesIndex {
        &mut self.favorites
    }

    /// Split borrow for views that read the board while toggling favorites.
    pub fn parts_mut(&mut self) -> (&mut BoardStore, &mut FavoritesIndex) {
        (&mut self.board, &mut self.favorites)
    }
}
