use crate::domain::board::{Board, Card, CardId, Column, ColumnId, Priority};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A column together with its cards in display order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnWithCards {
    pub column: Column,
    pub cards: Vec<Card>,
}

impl ColumnWithCards {
    pub fn card_index(&self, card: CardId) -> Option<usize> {
        self.cards.iter().position(|c| c.id == card)
    }

    pub fn card_ids(&self) -> Vec<CardId> {
        self.cards.iter().map(|c| c.id).collect()
    }
}

/// What a hovered identifier names in the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// A column itself; drops land after its last card
    Column { column: ColumnId, index: usize },
    /// A card; drops land at that card's index in its column
    Card {
        column: ColumnId,
        card: CardId,
        index: usize,
    },
    Unresolved,
}

impl DropTarget {
    pub fn column(&self) -> Option<ColumnId> {
        match self {
            Self::Column { column, .. } | Self::Card { column, .. } => Some(*column),
            Self::Unresolved => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Column { index, .. } | Self::Card { index, .. } => Some(*index),
            Self::Unresolved => None,
        }
    }
}

/// One board with all of its columns and cards, both sorted by position.
///
/// This is a local cache of the store's data. During a drag it is mutated
/// optimistically; it is replaced wholesale whenever the board is reloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub board: Board,
    pub columns: Vec<ColumnWithCards>,
}

impl BoardSnapshot {
    /// Groups cards under their columns and sorts both levels by position.
    /// Cards whose column is not part of the board are dropped.
    pub fn assemble(board: Board, columns: Vec<Column>, cards: Vec<Card>) -> Self {
        let mut columns: Vec<ColumnWithCards> = columns
            .into_iter()
            .map(|column| ColumnWithCards {
                column,
                cards: Vec::new(),
            })
            .collect();

        for card in cards {
            if let Some(col) = columns.iter_mut().find(|c| c.column.id == card.column_id) {
                col.cards.push(card);
            }
        }

        let mut snapshot = Self { board, columns };
        snapshot.sort();
        snapshot
    }

    /// Restores ascending position order; equal positions keep their
    /// relative order
    pub fn sort(&mut self) {
        self.columns.sort_by_key(|c| c.column.position);
        for col in &mut self.columns {
            col.cards.sort_by_key(|c| c.position);
        }
    }

    pub fn column(&self, id: ColumnId) -> Option<&ColumnWithCards> {
        self.columns.iter().find(|c| c.column.id == id)
    }

    pub fn column_index(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.column.id == id)
    }

    pub fn column_ids(&self) -> Vec<ColumnId> {
        self.columns.iter().map(|c| c.column.id).collect()
    }

    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.columns
            .iter()
            .flat_map(|c| c.cards.iter())
            .find(|c| c.id == id)
    }

    /// Column currently holding the card
    pub fn column_of_card(&self, id: CardId) -> Option<ColumnId> {
        self.locate_card(id).map(|(col, _)| self.columns[col].column.id)
    }

    /// (column index, card index) of a card
    fn locate_card(&self, id: CardId) -> Option<(usize, usize)> {
        self.columns
            .iter()
            .enumerate()
            .find_map(|(ci, col)| col.card_index(id).map(|i| (ci, i)))
    }

    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }

    /// Decides whether a hovered identifier is a column or a card
    pub fn resolve_target(&self, hovered: Uuid) -> DropTarget {
        let column_id = ColumnId::from(hovered);
        if let Some(col) = self.column(column_id) {
            return DropTarget::Column {
                column: column_id,
                index: col.cards.len(),
            };
        }

        let card_id = CardId::from(hovered);
        match self.locate_card(card_id) {
            Some((ci, index)) => DropTarget::Card {
                column: self.columns[ci].column.id,
                card: card_id,
                index,
            },
            None => DropTarget::Unresolved,
        }
    }

    /// Column a hovered identifier belongs to: the column itself, or the
    /// column holding the hovered card
    pub fn resolve_column(&self, hovered: Uuid) -> Option<ColumnId> {
        self.resolve_target(hovered).column()
    }

    /// Moves a card out of its current column into `target` at `index`,
    /// retagging its column. The index is clamped to the target's length.
    /// Returns false when the card or column does not exist.
    pub fn relocate_card(&mut self, card: CardId, target: ColumnId, index: usize) -> bool {
        let Some(target_idx) = self.column_index(target) else {
            return false;
        };
        let Some((source_idx, card_idx)) = self.locate_card(card) else {
            return false;
        };

        let mut moving = self.columns[source_idx].cards.remove(card_idx);
        moving.column_id = target;

        let cards = &mut self.columns[target_idx].cards;
        let index = index.min(cards.len());
        cards.insert(index, moving);
        true
    }

    /// Moves a card from one index to another within a column
    pub fn reorder_cards(&mut self, column: ColumnId, from: usize, to: usize) -> bool {
        match self.columns.iter_mut().find(|c| c.column.id == column) {
            Some(col) => array_move(&mut col.cards, from, to),
            None => false,
        }
    }

    /// Moves a column from one index to another within the board
    pub fn reorder_columns(&mut self, from: usize, to: usize) -> bool {
        array_move(&mut self.columns, from, to)
    }

    /// Sets the position of a card in place without reordering
    pub fn set_card_position(&mut self, card: CardId, position: i64) {
        if let Some((ci, i)) = self.locate_card(card) {
            self.columns[ci].cards[i].position = position;
        }
    }

    pub fn set_column_position(&mut self, column: ColumnId, position: i64) {
        if let Some(ci) = self.column_index(column) {
            self.columns[ci].column.position = position;
        }
    }

    /// Copy of the snapshot keeping only cards of the given priority
    pub fn filtered_by_priority(&self, priority: Priority) -> Self {
        let mut filtered = self.clone();
        for col in &mut filtered.columns {
            col.cards.retain(|c| c.priority == priority);
        }
        filtered
    }

    /// Cards whose title or description contains `query`, ignoring case
    pub fn search(&self, query: &str) -> Vec<&Card> {
        let mut found: Vec<&Card> = self
            .columns
            .iter()
            .flat_map(|c| c.cards.iter())
            .filter(|c| c.matches(query))
            .collect();
        found.sort_by_key(|c| c.position);
        found
    }
}

/// Moves the element at `from` to `to`, shifting the ones in between
pub fn array_move<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}
