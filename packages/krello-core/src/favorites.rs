/// Favorites: a flat, independently persisted set of card references.
///
/// Keys are typed (scope kind + scope id + card id) instead of `"scope:card"`
/// strings, so ids containing the delimiter cannot collide. Keys are
/// referential only: a key whose card, column or desk is gone is skipped when
/// resolving, never reported.
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::PersistenceGateway;
use crate::types::{Card, RootState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// Card lives anywhere on the desk.
    Desk,
    /// Card lives in one specific column.
    Column,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FavoriteScope {
    pub kind: ScopeKind,
    pub id: String,
}

impl FavoriteScope {
    pub fn new(kind: ScopeKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn desk(desk_id: impl Into<String>) -> Self {
        Self::new(ScopeKind::Desk, desk_id)
    }

    pub fn column(col_id: impl Into<String>) -> Self {
        Self::new(ScopeKind::Column, col_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteKey {
    pub scope: FavoriteScope,
    pub card_id: String,
}

impl FavoriteKey {
    pub fn new(scope: FavoriteScope, card_id: impl Into<String>) -> Self {
        Self {
            scope,
            card_id: card_id.into(),
        }
    }
}

impl fmt::Display for FavoriteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.scope.kind {
            ScopeKind::Desk => "desk",
            ScopeKind::Column => "column",
        };
        write!(f, "{}/{}/{}", kind, self.scope.id, self.card_id)
    }
}

/// A favorite resolved against the current board, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFavorite {
    pub key: FavoriteKey,
    pub desk_id: String,
    pub desk_title: String,
    pub column_id: String,
    pub column_title: String,
    pub card: Card,
}

pub struct FavoritesIndex {
    keys: Vec<FavoriteKey>,
    gateway: Arc<PersistenceGateway>,
}

impl FavoritesIndex {
    pub fn new(gateway: Arc<PersistenceGateway>) -> Self {
        Self {
            keys: Vec::new(),
            gateway,
        }
    }

    /// Flip membership. Returns whether the card is a favorite afterwards.
    pub fn toggle(&mut self, scope: FavoriteScope, card_id: &str) -> bool {
        let key = FavoriteKey::new(scope, card_id);
        let now_favorite = match self.keys.iter().position(|k| *k == key) {
            Some(pos) => {
                self.keys.remove(pos);
                false
            }
            None => {
                self.keys.push(key);
                true
            }
        };
        self.gateway.save_favorites(&self.keys);
        now_favorite
    }

    pub fn is_favorite(&self, scope: &FavoriteScope, card_id: &str) -> bool {
        self.keys
            .iter()
            .any(|k| k.scope == *scope && k.card_id == card_id)
    }

    pub fn keys(&self) -> &[FavoriteKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Install loaded keys without saving. Duplicates are dropped, first wins.
    pub fn replace_keys(&mut self, keys: Vec<FavoriteKey>) {
        let mut unique: Vec<FavoriteKey> = Vec::with_capacity(keys.len());
        for key in keys {
            if !unique.contains(&key) {
                unique.push(key);
            }
        }
        self.keys = unique;
    }

    /// Read-only favorites view, in the order the favorites were added.
    pub fn resolve(&self, state: &RootState) -> Vec<ResolvedFavorite> {
        self.keys
            .iter()
            .filter_map(|key| {
                let resolved = resolve_key(state, key);
                if resolved.is_none() {
                    log::debug!("[krello.favorites] Skipping dangling favorite {}", key);
                }
                resolved
            })
            .collect()
    }
}

fn resolve_key(state: &RootState, key: &FavoriteKey) -> Option<ResolvedFavorite> {
    let (desk, column) = match key.scope.kind {
        ScopeKind::Desk => {
            let desk = state.desk(&key.scope.id)?;
            let column = desk
                .columns
                .iter()
                .find(|c| c.cards.iter().any(|card| card.id == key.card_id))?;
            (desk, column)
        }
        ScopeKind::Column => state.desks.iter().find_map(|desk| {
            desk.column(&key.scope.id).map(|column| (desk, column))
        })?,
    };
    let card = column.cards.iter().find(|c| c.id == key.card_id)?;

    Some(ResolvedFavorite {
        key: key.clone(),
        desk_id: desk.id.clone(),
        desk_title: desk.title.clone(),
        column_id: column.id.clone(),
        column_title: column.title.clone(),
        card: card.clone(),
    })
}
