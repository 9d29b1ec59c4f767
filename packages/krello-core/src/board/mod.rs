/// Board store: the owned desk → column → card tree and its mutations.
///
/// Every mutation resolves its ids first and silently does nothing when one
/// is stale (returns `None`/`false`). An applied mutation hands a fresh
/// snapshot to the persistence gateway before returning, so the local write
/// is ordered with the mutation. Callers only ever get owned copies back.
mod arena;

use std::sync::Arc;

use crate::config::{KrelloConfig, DEFAULT_COLUMN_TITLE, DEFAULT_DESK_TITLE};
use crate::id::{new_id, IdKind};
use crate::search::CardFilter;
use crate::storage::PersistenceGateway;
use crate::types::{Card, Column, Desk, RootState};

use arena::BoardArena;

const COPY_SUFFIX: &str = " (copy)";

pub struct BoardStore {
    arena: BoardArena,
    gateway: Arc<PersistenceGateway>,
    default_desk_title: String,
    default_column_title: String,
    seed_starter_board: bool,
}

fn non_blank(title: &str) -> Option<&str> {
    let trimmed = title.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

impl BoardStore {
    pub fn new(gateway: Arc<PersistenceGateway>) -> Self {
        Self {
            arena: BoardArena::default(),
            gateway,
            default_desk_title: DEFAULT_DESK_TITLE.to_string(),
            default_column_title: DEFAULT_COLUMN_TITLE.to_string(),
            seed_starter_board: true,
        }
    }

    pub fn with_config(gateway: Arc<PersistenceGateway>, config: &KrelloConfig) -> Self {
        Self {
            default_desk_title: non_blank(&config.default_desk_title)
                .unwrap_or(DEFAULT_DESK_TITLE)
                .to_string(),
            default_column_title: non_blank(&config.default_column_title)
                .unwrap_or(DEFAULT_COLUMN_TITLE)
                .to_string(),
            seed_starter_board: config.seed_starter_board,
            ..Self::new(gateway)
        }
    }

    pub fn gateway(&self) -> &Arc<PersistenceGateway> {
        &self.gateway
    }

    fn commit(&self) {
        self.gateway.save_board(&self.arena.to_state());
    }

    // ── reads ────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> RootState {
        self.arena.to_state()
    }

    pub fn active_desk_id(&self) -> Option<String> {
        self.arena.active_desk_id().map(str::to_string)
    }

    pub fn active_desk(&self) -> Option<Desk> {
        self.arena.active_desk().and_then(|k| self.arena.build_desk(k))
    }

    pub fn desk_count(&self) -> usize {
        self.arena.desk_count()
    }

    pub fn desk(&self, desk_id: &str) -> Option<Desk> {
        self.arena
            .find_desk(desk_id)
            .and_then(|k| self.arena.build_desk(k))
    }

    pub fn column(&self, desk_id: &str, col_id: &str) -> Option<Column> {
        self.arena
            .resolve_column(desk_id, col_id)
            .and_then(|k| self.arena.build_column(k))
    }

    pub fn card(&self, desk_id: &str, col_id: &str, card_id: &str) -> Option<Card> {
        let column = self.arena.resolve_column(desk_id, col_id)?;
        let card = self.arena.find_card(column, card_id)?;
        self.arena.card(card).cloned()
    }

    /// Search-box view of the active desk: only cards whose content contains
    /// `query`, and only columns that keep at least one card.
    pub fn filter_cards(&self, query: &str) -> Vec<Column> {
        self.active_desk()
            .map(|desk| CardFilter::compile(query).apply(&desk))
            .unwrap_or_default()
    }

    // ── loading ──────────────────────────────────────────────────────────

    /// Install a loaded document. Does not save.
    pub fn replace_state(&mut self, state: RootState) {
        self.arena = BoardArena::from_state(state);
        self.arena.ensure_active();
    }

    /// Seed a first board when there are no desks. Returns whether it seeded.
    pub fn seed_if_empty(&mut self) -> bool {
        if self.arena.desk_count() > 0 {
            return false;
        }
        let desk = if self.seed_starter_board {
            starter_desk(&self.default_desk_title)
        } else {
            empty_desk(&self.default_desk_title)
        };
        log::info!("[krello.board] Seeding default desk {}", desk.id);
        let key = self.arena.insert_desk(desk);
        self.arena.set_active(Some(key));
        self.commit();
        true
    }

    // ── desks ────────────────────────────────────────────────────────────

    pub fn create_desk(&mut self, title: &str) -> Desk {
        let desk = empty_desk(non_blank(title).unwrap_or(&self.default_desk_title));
        let key = self.arena.insert_desk(desk.clone());
        self.arena.set_active(Some(key));
        self.commit();
        desk
    }

    pub fn rename_desk(&mut self, desk_id: &str, title: &str) -> bool {
        let Some(title) = non_blank(title) else {
            return false;
        };
        let Some(desk) = self.arena.find_desk(desk_id) else {
            log::debug!("[krello.board] rename_desk: unknown desk {}", desk_id);
            return false;
        };
        self.arena.set_desk_title(desk, title);
        self.commit();
        true
    }

    pub fn delete_desk(&mut self, desk_id: &str) -> bool {
        let Some(desk) = self.arena.find_desk(desk_id) else {
            log::debug!("[krello.board] delete_desk: unknown desk {}", desk_id);
            return false;
        };
        let was_active = self.arena.active_desk() == Some(desk);
        self.arena.remove_desk(desk);

        if self.arena.desk_count() == 0 {
            let fresh = self.arena.insert_desk(empty_desk(&self.default_desk_title));
            self.arena.set_active(Some(fresh));
        } else if was_active {
            self.arena.set_active(self.arena.first_desk());
        }
        self.commit();
        true
    }

    pub fn set_active_desk(&mut self, desk_id: &str) -> bool {
        let Some(desk) = self.arena.find_desk(desk_id) else {
            log::debug!("[krello.board] set_active_desk: unknown desk {}", desk_id);
            return false;
        };
        self.arena.set_active(Some(desk));
        self.commit();
        true
    }

    // ── columns ──────────────────────────────────────────────────────────

    /// Append a column to the active desk.
    pub fn add_column(&mut self, title: &str) -> Option<Column> {
        let desk = self.arena.active_desk()?;
        let column = Column {
            id: new_id(IdKind::Column),
            title: non_blank(title)
                .unwrap_or(&self.default_column_title)
                .to_string(),
            cards: Vec::new(),
        };
        self.arena.insert_column(desk, column.clone(), None)?;
        self.commit();
        Some(column)
    }

    pub fn rename_column(&mut self, desk_id: &str, col_id: &str, title: &str) -> bool {
        let Some(title) = non_blank(title) else {
            return false;
        };
        let Some(column) = self.arena.resolve_column(desk_id, col_id) else {
            return false;
        };
        self.arena.set_column_title(column, title);
        self.commit();
        true
    }

    pub fn delete_column(&mut self, desk_id: &str, col_id: &str) -> bool {
        let Some(desk) = self.arena.find_desk(desk_id) else {
            return false;
        };
        let Some(column) = self.arena.find_column(desk, col_id) else {
            return false;
        };
        self.arena.remove_column(desk, column);
        self.commit();
        true
    }

    /// Move a column within its desk. `insert_index` counts positions after
    /// the column has been taken out; out of range appends.
    pub fn move_column(&mut self, desk_id: &str, col_id: &str, insert_index: Option<usize>) -> bool {
        let Some(desk) = self.arena.find_desk(desk_id) else {
            return false;
        };
        let Some(column) = self.arena.find_column(desk, col_id) else {
            return false;
        };
        if self.arena.move_column(desk, column, insert_index).is_none() {
            return false;
        }
        self.commit();
        true
    }

    /// Copy a column (fresh ids throughout) right after the source column.
    pub fn duplicate_column(&mut self, desk_id: &str, col_id: &str) -> Option<Column> {
        let desk = self.arena.find_desk(desk_id)?;
        let source_key = self.arena.find_column(desk, col_id)?;
        let source = self.arena.build_column(source_key)?;
        let position = self.arena.column_position(desk, source_key)?;

        let copy = Column {
            id: new_id(IdKind::Column),
            title: format!("{}{}", source.title, COPY_SUFFIX),
            cards: source
                .cards
                .into_iter()
                .map(|card| Card {
                    id: new_id(IdKind::Card),
                    ..card
                })
                .collect(),
        };
        self.arena.insert_column(desk, copy.clone(), Some(position + 1))?;
        self.commit();
        Some(copy)
    }

    /// Remove every card from a column, keeping the column.
    pub fn clear_column(&mut self, desk_id: &str, col_id: &str) -> bool {
        let Some(column) = self.arena.resolve_column(desk_id, col_id) else {
            return false;
        };
        self.arena.clear_cards(column);
        self.commit();
        true
    }

    // ── cards ────────────────────────────────────────────────────────────

    pub fn add_card(&mut self, desk_id: &str, col_id: &str, content: &str, img: &str) -> Option<Card> {
        let column = self.arena.resolve_column(desk_id, col_id)?;
        let card = Card {
            id: new_id(IdKind::Card),
            content: content.to_string(),
            img: img.to_string(),
            done: false,
        };
        self.arena.push_card(column, card.clone())?;
        self.commit();
        Some(card)
    }

    /// Replace content and image of an existing card.
    pub fn update_card(&mut self, desk_id: &str, col_id: &str, card_id: &str, content: &str, img: &str) -> bool {
        let Some(card) = self.resolve_card_mut(desk_id, col_id, card_id) else {
            return false;
        };
        card.content = content.to_string();
        card.img = img.to_string();
        self.commit();
        true
    }

    pub fn delete_card(&mut self, desk_id: &str, col_id: &str, card_id: &str) -> bool {
        let Some(column) = self.arena.resolve_column(desk_id, col_id) else {
            return false;
        };
        if self.arena.remove_card(column, card_id).is_none() {
            return false;
        }
        self.commit();
        true
    }

    pub fn toggle_card_done(&mut self, desk_id: &str, col_id: &str, card_id: &str, done: bool) -> bool {
        let Some(card) = self.resolve_card_mut(desk_id, col_id, card_id) else {
            return false;
        };
        card.done = done;
        self.commit();
        true
    }

    /// Take a card out of its column and insert it into the destination at
    /// `insert_index` (0..=len), or append when the index is absent or out
    /// of range. Source and destination may be the same column or sit on
    /// different desks. This is the only way drag-and-drop results land.
    pub fn move_card(
        &mut self,
        from_desk_id: &str,
        from_col_id: &str,
        card_id: &str,
        to_desk_id: &str,
        to_col_id: &str,
        insert_index: Option<usize>,
    ) -> bool {
        let (Some(from), Some(to)) = (
            self.arena.resolve_column(from_desk_id, from_col_id),
            self.arena.resolve_column(to_desk_id, to_col_id),
        ) else {
            log::debug!(
                "[krello.board] move_card: unresolvable column {}/{} -> {}/{}",
                from_desk_id,
                from_col_id,
                to_desk_id,
                to_col_id
            );
            return false;
        };
        if self.arena.move_card(from, card_id, to, insert_index).is_none() {
            return false;
        }
        self.commit();
        true
    }

    fn resolve_card_mut(&mut self, desk_id: &str, col_id: &str, card_id: &str) -> Option<&mut Card> {
        let column = self.arena.resolve_column(desk_id, col_id)?;
        let card = self.arena.find_card(column, card_id)?;
        self.arena.card_mut(card)
    }
}

fn empty_desk(title: &str) -> Desk {
    Desk {
        id: new_id(IdKind::Desk),
        title: title.to_string(),
        columns: Vec::new(),
    }
}

fn seed_column(title: &str, cards: &[(&str, &str)]) -> Column {
    Column {
        id: new_id(IdKind::Column),
        title: title.to_string(),
        cards: cards
            .iter()
            .map(|(content, img)| Card {
                id: new_id(IdKind::Card),
                content: content.to_string(),
                img: img.to_string(),
                done: false,
            })
            .collect(),
    }
}

/// First-run board with a short guide.
fn starter_desk(title: &str) -> Desk {
    Desk {
        columns: vec![
            seed_column(
                "Krello Starter Guide",
                &[
                    ("New to Krello? Start here", "images/card-image-1.png"),
                    ("Capture from email, Slack, and...", "images/card-image-2.png"),
                ],
            ),
            seed_column("Today", &[("Start using Krello", "")]),
            seed_column("This Week", &[]),
            seed_column("Later", &[]),
        ],
        ..empty_desk(title)
    }
}
