/// Flat arena behind the board store.
///
/// Desks, columns and cards live in separate maps under stable integer keys;
/// ordering lives in the parent's key list. Moves and deletes touch only the
/// affected key lists, and `to_state` materializes an owned `RootState`.
///
/// Lookups by string id always go through the owning parent (desk → column →
/// card), so two entities sharing an id in different parents never alias.
use std::collections::HashMap;

use crate::types::{Card, Column, Desk, RootState};

pub(crate) type NodeKey = u64;

#[derive(Debug, Clone)]
struct DeskNode {
    id: String,
    title: String,
    columns: Vec<NodeKey>,
}

#[derive(Debug, Clone)]
struct ColumnNode {
    id: String,
    title: String,
    cards: Vec<NodeKey>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct BoardArena {
    desk_order: Vec<NodeKey>,
    desks: HashMap<NodeKey, DeskNode>,
    columns: HashMap<NodeKey, ColumnNode>,
    cards: HashMap<NodeKey, Card>,
    active_desk: Option<NodeKey>,
    next_key: NodeKey,
}

/// Insert at `index` when it is a valid position (0..=len), else append.
fn insert_at<T>(list: &mut Vec<T>, index: Option<usize>, item: T) {
    match index {
        Some(i) if i <= list.len() => list.insert(i, item),
        _ => list.push(item),
    }
}

impl BoardArena {
    pub fn from_state(state: RootState) -> Self {
        let mut arena = Self::default();
        let active_id = state.active_desk_id;
        for desk in state.desks {
            let key = arena.insert_desk(desk);
            if arena.active_desk.is_none()
                && active_id.as_deref() == arena.desks.get(&key).map(|d| d.id.as_str())
            {
                arena.active_desk = Some(key);
            }
        }
        arena
    }

    pub fn to_state(&self) -> RootState {
        RootState {
            desks: self
                .desk_order
                .iter()
                .filter_map(|k| self.build_desk(*k))
                .collect(),
            active_desk_id: self.active_desk_id().map(str::to_string),
        }
    }

    fn alloc(&mut self) -> NodeKey {
        self.next_key += 1;
        self.next_key
    }

    // ── materialize ──────────────────────────────────────────────────────

    pub fn build_desk(&self, key: NodeKey) -> Option<Desk> {
        let node = self.desks.get(&key)?;
        Some(Desk {
            id: node.id.clone(),
            title: node.title.clone(),
            columns: node
                .columns
                .iter()
                .filter_map(|k| self.build_column(*k))
                .collect(),
        })
    }

    pub fn build_column(&self, key: NodeKey) -> Option<Column> {
        let node = self.columns.get(&key)?;
        Some(Column {
            id: node.id.clone(),
            title: node.title.clone(),
            cards: node
                .cards
                .iter()
                .filter_map(|k| self.cards.get(k).cloned())
                .collect(),
        })
    }

    pub fn card(&self, key: NodeKey) -> Option<&Card> {
        self.cards.get(&key)
    }

    // ── lookup ───────────────────────────────────────────────────────────

    pub fn desk_count(&self) -> usize {
        self.desk_order.len()
    }

    pub fn first_desk(&self) -> Option<NodeKey> {
        self.desk_order.first().copied()
    }

    pub fn active_desk(&self) -> Option<NodeKey> {
        self.active_desk
    }

    pub fn active_desk_id(&self) -> Option<&str> {
        self.active_desk
            .and_then(|k| self.desks.get(&k))
            .map(|d| d.id.as_str())
    }

    pub fn find_desk(&self, desk_id: &str) -> Option<NodeKey> {
        self.desk_order
            .iter()
            .copied()
            .find(|k| self.desks.get(k).is_some_and(|d| d.id == desk_id))
    }

    pub fn find_column(&self, desk: NodeKey, col_id: &str) -> Option<NodeKey> {
        self.desks
            .get(&desk)?
            .columns
            .iter()
            .copied()
            .find(|k| self.columns.get(k).is_some_and(|c| c.id == col_id))
    }

    pub fn resolve_column(&self, desk_id: &str, col_id: &str) -> Option<NodeKey> {
        let desk = self.find_desk(desk_id)?;
        self.find_column(desk, col_id)
    }

    fn card_position(&self, column: NodeKey, card_id: &str) -> Option<usize> {
        self.columns
            .get(&column)?
            .cards
            .iter()
            .position(|k| self.cards.get(k).is_some_and(|c| c.id == card_id))
    }

    pub fn find_card(&self, column: NodeKey, card_id: &str) -> Option<NodeKey> {
        let pos = self.card_position(column, card_id)?;
        self.columns.get(&column)?.cards.get(pos).copied()
    }

    // ── insert ───────────────────────────────────────────────────────────

    pub fn insert_desk(&mut self, desk: Desk) -> NodeKey {
        let columns = desk
            .columns
            .into_iter()
            .map(|c| self.alloc_column(c))
            .collect();
        let key = self.alloc();
        self.desks.insert(
            key,
            DeskNode {
                id: desk.id,
                title: desk.title,
                columns,
            },
        );
        self.desk_order.push(key);
        key
    }

    fn alloc_column(&mut self, column: Column) -> NodeKey {
        let cards = column
            .cards
            .into_iter()
            .map(|card| {
                let key = self.alloc();
                self.cards.insert(key, card);
                key
            })
            .collect();
        let key = self.alloc();
        self.columns.insert(
            key,
            ColumnNode {
                id: column.id,
                title: column.title,
                cards,
            },
        );
        key
    }

    /// Insert a column into a desk at `index` (append when out of range).
    pub fn insert_column(&mut self, desk: NodeKey, column: Column, index: Option<usize>) -> Option<NodeKey> {
        if !self.desks.contains_key(&desk) {
            return None;
        }
        let key = self.alloc_column(column);
        let node = self.desks.get_mut(&desk)?;
        insert_at(&mut node.columns, index, key);
        Some(key)
    }

    pub fn push_card(&mut self, column: NodeKey, card: Card) -> Option<NodeKey> {
        if !self.columns.contains_key(&column) {
            return None;
        }
        let key = self.alloc();
        self.cards.insert(key, card);
        self.columns.get_mut(&column)?.cards.push(key);
        Some(key)
    }

    // ── mutate ───────────────────────────────────────────────────────────

    pub fn set_active(&mut self, desk: Option<NodeKey>) {
        self.active_desk = desk;
    }

    /// Point the active desk at the first desk if it is unset or dangling.
    pub fn ensure_active(&mut self) {
        let valid = self.active_desk.is_some_and(|k| self.desks.contains_key(&k));
        if !valid {
            self.active_desk = self.first_desk();
        }
    }

    pub fn set_desk_title(&mut self, desk: NodeKey, title: &str) -> Option<()> {
        self.desks.get_mut(&desk)?.title = title.to_string();
        Some(())
    }

    pub fn set_column_title(&mut self, column: NodeKey, title: &str) -> Option<()> {
        self.columns.get_mut(&column)?.title = title.to_string();
        Some(())
    }

    pub fn card_mut(&mut self, card: NodeKey) -> Option<&mut Card> {
        self.cards.get_mut(&card)
    }

    /// Remove a desk and everything under it.
    pub fn remove_desk(&mut self, desk: NodeKey) -> Option<()> {
        let node = self.desks.remove(&desk)?;
        self.desk_order.retain(|k| *k != desk);
        for column in node.columns {
            self.drop_column_node(column);
        }
        if self.active_desk == Some(desk) {
            self.active_desk = None;
        }
        Some(())
    }

    /// Remove a column (and its cards) from a desk.
    pub fn remove_column(&mut self, desk: NodeKey, column: NodeKey) -> Option<()> {
        let node = self.desks.get_mut(&desk)?;
        let pos = node.columns.iter().position(|k| *k == column)?;
        node.columns.remove(pos);
        self.drop_column_node(column);
        Some(())
    }

    fn drop_column_node(&mut self, column: NodeKey) {
        if let Some(node) = self.columns.remove(&column) {
            for card in node.cards {
                self.cards.remove(&card);
            }
        }
    }

    pub fn remove_card(&mut self, column: NodeKey, card_id: &str) -> Option<Card> {
        let pos = self.card_position(column, card_id)?;
        let key = self.columns.get_mut(&column)?.cards.remove(pos);
        self.cards.remove(&key)
    }

    pub fn clear_cards(&mut self, column: NodeKey) -> Option<usize> {
        let keys = std::mem::take(&mut self.columns.get_mut(&column)?.cards);
        for key in &keys {
            self.cards.remove(key);
        }
        Some(keys.len())
    }

    /// Detach a card from `from` and insert it into `to` at `index`
    /// (append when out of range). `from` and `to` may be the same column.
    pub fn move_card(&mut self, from: NodeKey, card_id: &str, to: NodeKey, index: Option<usize>) -> Option<()> {
        if !self.columns.contains_key(&to) {
            return None;
        }
        let pos = self.card_position(from, card_id)?;
        let key = self.columns.get_mut(&from)?.cards.remove(pos);
        let dest = self.columns.get_mut(&to)?;
        insert_at(&mut dest.cards, index, key);
        Some(())
    }

    pub fn move_column(&mut self, desk: NodeKey, column: NodeKey, index: Option<usize>) -> Option<()> {
        let node = self.desks.get_mut(&desk)?;
        let pos = node.columns.iter().position(|k| *k == column)?;
        let key = node.columns.remove(pos);
        insert_at(&mut node.columns, index, key);
        Some(())
    }

    pub fn column_position(&self, desk: NodeKey, column: NodeKey) -> Option<usize> {
        self.desks.get(&desk)?.columns.iter().position(|k| *k == column)
    }
}
