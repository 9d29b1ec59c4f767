/// Drag-and-drop reorder engine.
///
/// The math is "insert before the closest sibling whose midpoint is still
/// ahead of the pointer": for each sibling (dragged item excluded),
/// `offset = pointer - midpoint`; among negative offsets the one closest to
/// zero wins and the dragged item goes right before it. No negative offset
/// means append.
///
/// The UI owns geometry and visual feedback. This module only turns sibling
/// bounds plus a pointer position into an index, and commits through the
/// board store exactly once per drop.
use crate::board::BoardStore;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DndError {
    #[error("A drag gesture is already in progress")]
    AlreadyDragging,

    #[error("No drag gesture in progress")]
    NotDragging,
}

/// Extent of one sibling along the drag axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemBounds {
    pub start: f64,
    pub size: f64,
}

impl ItemBounds {
    pub fn new(start: f64, size: f64) -> Self {
        Self { start, size }
    }

    pub fn midpoint(&self) -> f64 {
        self.start + self.size / 2.0
    }
}

/// Index of the sibling to insert before, or `None` to append.
pub fn insert_before(siblings: &[ItemBounds], pointer: f64) -> Option<usize> {
    let mut closest: Option<(usize, f64)> = None;
    for (index, bounds) in siblings.iter().enumerate() {
        let offset = pointer - bounds.midpoint();
        if offset < 0.0 && closest.map_or(true, |(_, best)| offset > best) {
            closest = Some((index, offset));
        }
    }
    closest.map(|(index, _)| index)
}

/// Insertion index among `siblings` (which exclude the dragged item).
pub fn insertion_index(siblings: &[ItemBounds], pointer: f64) -> usize {
    insert_before(siblings, pointer).unwrap_or(siblings.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Cards stack top to bottom.
    Vertical,
    /// Columns run left to right.
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Axis {
    pub fn coordinate(self, point: Point) -> f64 {
        match self {
            Axis::Vertical => point.y,
            Axis::Horizontal => point.x,
        }
    }
}

/// A rendered sibling in the list under the pointer, in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct SiblingItem {
    pub id: String,
    pub bounds: ItemBounds,
}

impl SiblingItem {
    pub fn new(id: impl Into<String>, start: f64, size: f64) -> Self {
        Self {
            id: id.into(),
            bounds: ItemBounds::new(start, size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragSubject {
    Card {
        desk_id: String,
        col_id: String,
        card_id: String,
    },
    Column {
        desk_id: String,
        col_id: String,
    },
}

impl DragSubject {
    pub fn axis(&self) -> Axis {
        match self {
            DragSubject::Card { .. } => Axis::Vertical,
            DragSubject::Column { .. } => Axis::Horizontal,
        }
    }

    fn item_id(&self) -> &str {
        match self {
            DragSubject::Card { card_id, .. } => card_id,
            DragSubject::Column { col_id, .. } => col_id,
        }
    }
}

/// The list the pointer is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// The card list of one column.
    Cards { desk_id: String, col_id: String },
    /// The column strip of one desk.
    Columns { desk_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// Dropped on a valid list; `committed` tells whether the store applied
    /// the move (false when ids went stale mid-drag).
    Dropped { index: usize, committed: bool },
    /// Dropped outside any valid list or aborted; the store is untouched.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        subject: DragSubject,
        /// Last hover result: target list and insertion index.
        preview: Option<(DropTarget, usize)>,
    },
}

/// One drag gesture at a time: `Idle -> Dragging -> Dropped | Cancelled`.
#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn subject(&self) -> Option<&DragSubject> {
        match &self.state {
            DragState::Dragging { subject, .. } => Some(subject),
            DragState::Idle => None,
        }
    }

    pub fn preview(&self) -> Option<&(DropTarget, usize)> {
        match &self.state {
            DragState::Dragging { preview, .. } => preview.as_ref(),
            DragState::Idle => None,
        }
    }

    /// Start a gesture. Rejected while another one is active.
    pub fn begin(&mut self, subject: DragSubject) -> Result<(), DndError> {
        if self.is_dragging() {
            log::debug!("[krello.dnd] Ignoring drag start of {:?}, gesture active", subject);
            return Err(DndError::AlreadyDragging);
        }
        self.state = DragState::Dragging {
            subject,
            preview: None,
        };
        Ok(())
    }

    /// Pointer moved over `target`. Returns the preview insertion index, or
    /// None when idle or when the list cannot accept the dragged item.
    pub fn hover(&mut self, target: &DropTarget, siblings: &[SiblingItem], pointer: Point) -> Option<usize> {
        let DragState::Dragging { subject, preview } = &mut self.state else {
            return None;
        };
        if !accepts(subject, target) {
            *preview = None;
            return None;
        }
        let index = index_for(subject, siblings, pointer);
        *preview = Some((target.clone(), index));
        Some(index)
    }

    /// Finish the gesture over `target`, re-deriving the index from the final
    /// sibling layout and committing through the store once.
    pub fn drop_on(
        &mut self,
        store: &mut BoardStore,
        target: &DropTarget,
        siblings: &[SiblingItem],
        pointer: Point,
    ) -> Result<DragOutcome, DndError> {
        let DragState::Dragging { subject, .. } = std::mem::take(&mut self.state) else {
            return Err(DndError::NotDragging);
        };
        if !accepts(&subject, target) {
            log::debug!("[krello.dnd] Drop outside a valid list, cancelling");
            return Ok(DragOutcome::Cancelled);
        }

        let index = index_for(&subject, siblings, pointer);
        let committed = match (&subject, target) {
            (
                DragSubject::Card {
                    desk_id,
                    col_id,
                    card_id,
                },
                DropTarget::Cards {
                    desk_id: to_desk,
                    col_id: to_col,
                },
            ) => store.move_card(desk_id, col_id, card_id, to_desk, to_col, Some(index)),
            (DragSubject::Column { desk_id, col_id }, DropTarget::Columns { .. }) => {
                store.move_column(desk_id, col_id, Some(index))
            }
            _ => false,
        };
        Ok(DragOutcome::Dropped { index, committed })
    }

    /// Abort the gesture. The store is never touched.
    pub fn cancel(&mut self) -> Result<DragOutcome, DndError> {
        match std::mem::take(&mut self.state) {
            DragState::Idle => Err(DndError::NotDragging),
            DragState::Dragging { .. } => Ok(DragOutcome::Cancelled),
        }
    }
}

fn accepts(subject: &DragSubject, target: &DropTarget) -> bool {
    match (subject, target) {
        (DragSubject::Card { .. }, DropTarget::Cards { .. }) => true,
        // Columns only reorder within their own desk.
        (DragSubject::Column { desk_id, .. }, DropTarget::Columns { desk_id: target_desk }) => {
            desk_id == target_desk
        }
        _ => false,
    }
}

fn index_for(subject: &DragSubject, siblings: &[SiblingItem], pointer: Point) -> usize {
    let bounds: Vec<ItemBounds> = siblings
        .iter()
        .filter(|s| s.id != subject.item_id())
        .map(|s| s.bounds)
        .collect();
    insertion_index(&bounds, subject.axis().coordinate(pointer))
}
