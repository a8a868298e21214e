use crate::domain::{CardId, ColumnId};

/// Drag gesture state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    /// A card is being dragged. `origin` is the column the card occupied when
    /// the gesture began and does not follow speculative moves.
    DraggingCard { origin: ColumnId, card: CardId },
    /// A whole column is being dragged within the board
    DraggingColumn { column: ColumnId },
}

impl DragState {
    pub fn is_dragging(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    pub fn dragged_card(&self) -> Option<CardId> {
        match self {
            Self::DraggingCard { card, .. } => Some(*card),
            _ => None,
        }
    }

    pub fn origin_column(&self) -> Option<ColumnId> {
        match self {
            Self::DraggingCard { origin, .. } => Some(*origin),
            _ => None,
        }
    }
}

/// Whether a card stayed in the column it started from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    Reorder,
    Transfer,
}

/// Where a dropped item was placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Card {
        card: CardId,
        column: ColumnId,
        position: i64,
        kind: MoveKind,
    },
    Column {
        column: ColumnId,
        position: i64,
    },
}

impl Placement {
    pub fn position(&self) -> i64 {
        match self {
            Self::Card { position, .. } | Self::Column { position, .. } => *position,
        }
    }
}

/// Result of ending a drag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Nothing resolvable was dropped; the pre-drag board is shown again
    Ignored,
    /// The item ended where it started; nothing was persisted
    Unchanged,
    /// The store accepted the move. `renumbered` counts the siblings that got
    /// fresh positions because their neighbours had run out of room.
    Committed {
        placement: Placement,
        renumbered: usize,
    },
    /// The store rejected the move and the board was reloaded
    RolledBack { placement: Placement, error: String },
}

impl DropOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    pub fn placement(&self) -> Option<Placement> {
        match self {
            Self::Committed { placement, .. } | Self::RolledBack { placement, .. } => {
                Some(*placement)
            }
            _ => None,
        }
    }
}
