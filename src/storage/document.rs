//! Store-agnostic board documents.
//!
//! A [`BoardDocument`] holds one board with its columns and cards as flat
//! lists. The in-memory and file stores keep their data in this shape and
//! share the mutation rules defined here.

use crate::{
    domain::{
        board::validate_title, Board, BoardId, BoardSnapshot, Card, CardId, CardUpdate, Column,
        ColumnId, PositionAllocator,
    },
    error::{KanbanError, Result},
};
use serde::{Deserialize, Serialize};

/// Titles of the columns every new board starts with
pub const DEFAULT_COLUMNS: [&str; 3] = ["To Do", "In Progress", "Done"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardDocument {
    pub board: Board,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl BoardDocument {
    /// Creates a board with the default columns
    pub fn create(title: &str, allocator: &PositionAllocator) -> Result<Self> {
        let board = Board::new(validate_title("board", title)?);
        let columns = DEFAULT_COLUMNS
            .iter()
            .zip(allocator.renumber(DEFAULT_COLUMNS.len()))
            .map(|(title, position)| Column::new(board.id, title.to_string(), position))
            .collect();

        Ok(Self {
            board,
            columns,
            cards: Vec::new(),
        })
    }

    pub fn id(&self) -> BoardId {
        self.board.id
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot::assemble(self.board.clone(), self.columns.clone(), self.cards.clone())
    }

    pub fn has_column(&self, id: ColumnId) -> bool {
        self.columns.iter().any(|c| c.id == id)
    }

    pub fn has_card(&self, id: CardId) -> bool {
        self.cards.iter().any(|c| c.id == id)
    }

    fn column_mut(&mut self, id: ColumnId) -> Result<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| KanbanError::ColumnNotFound(id.to_string()))
    }

    fn card_mut(&mut self, id: CardId) -> Result<&mut Card> {
        self.cards
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| KanbanError::CardNotFound(id.to_string()))
    }

    fn card_positions(&self, column: ColumnId) -> impl Iterator<Item = i64> + '_ {
        self.cards
            .iter()
            .filter(move |c| c.column_id == column)
            .map(|c| c.position)
    }

    pub fn rename(&mut self, title: &str) -> Result<Board> {
        self.board.set_title(validate_title("board", title)?);
        Ok(self.board.clone())
    }

    pub fn create_column(&mut self, title: &str, allocator: &PositionAllocator) -> Result<Column> {
        let title = validate_title("column", title)?;
        let position = allocator.append(self.columns.iter().map(|c| c.position));
        let column = Column::new(self.board.id, title, position);
        self.columns.push(column.clone());
        Ok(column)
    }

    pub fn rename_column(&mut self, id: ColumnId, title: &str) -> Result<Column> {
        let title = validate_title("column", title)?;
        let column = self.column_mut(id)?;
        column.title = title;
        Ok(column.clone())
    }

    /// Removes a column and its cards, or hands the cards to `move_cards_to`
    /// first. The last column of a board cannot be removed.
    pub fn delete_column(
        &mut self,
        id: ColumnId,
        move_cards_to: Option<ColumnId>,
        allocator: &PositionAllocator,
    ) -> Result<()> {
        if !self.has_column(id) {
            return Err(KanbanError::ColumnNotFound(id.to_string()));
        }
        if self.columns.len() <= 1 {
            return Err(KanbanError::LastColumn);
        }

        match move_cards_to {
            Some(target) if target != id => {
                if !self.has_column(target) {
                    return Err(KanbanError::ColumnNotFound(target.to_string()));
                }

                let mut next = allocator.append(self.card_positions(target));
                let mut moving: Vec<&mut Card> =
                    self.cards.iter_mut().filter(|c| c.column_id == id).collect();
                moving.sort_by_key(|c| c.position);
                for card in moving {
                    card.move_to(target, next);
                    next = next.saturating_add(allocator.step());
                }
            }
            _ => self.cards.retain(|c| c.column_id != id),
        }

        self.columns.retain(|c| c.id != id);
        Ok(())
    }

    pub fn move_column(&mut self, id: ColumnId, position: i64) -> Result<()> {
        self.column_mut(id)?.position = position;
        Ok(())
    }

    pub fn create_card(
        &mut self,
        column: ColumnId,
        title: &str,
        allocator: &PositionAllocator,
    ) -> Result<Card> {
        let title = validate_title("card", title)?;
        if !self.has_column(column) {
            return Err(KanbanError::ColumnNotFound(column.to_string()));
        }

        let position = allocator.append(self.card_positions(column));
        let card = Card::new(column, title, position);
        self.cards.push(card.clone());
        Ok(card)
    }

    pub fn update_card(&mut self, id: CardId, update: &CardUpdate) -> Result<Card> {
        let card = self.card_mut(id)?;
        card.apply(update)?;
        Ok(card.clone())
    }

    pub fn delete_card(&mut self, id: CardId) -> Result<()> {
        if !self.has_card(id) {
            return Err(KanbanError::CardNotFound(id.to_string()));
        }
        self.cards.retain(|c| c.id != id);
        Ok(())
    }

    /// Reassigns a card's column and position in one step
    pub fn move_card(&mut self, id: CardId, target: ColumnId, position: i64) -> Result<()> {
        if !self.has_column(target) {
            return Err(KanbanError::ColumnNotFound(target.to_string()));
        }
        self.card_mut(id)?.move_to(target, position);
        Ok(())
    }

    /// Moves every listed card into `column`. Nothing changes unless the
    /// column and all cards belong to this board.
    pub fn set_card_positions(
        &mut self,
        column: ColumnId,
        positions: &[(CardId, i64)],
    ) -> Result<()> {
        if !self.has_column(column) {
            return Err(KanbanError::ColumnNotFound(column.to_string()));
        }
        if let Some((missing, _)) = positions.iter().find(|(id, _)| !self.has_card(*id)) {
            return Err(KanbanError::CardNotFound(missing.to_string()));
        }

        for &(id, position) in positions {
            self.card_mut(id)?.move_to(column, position);
        }
        Ok(())
    }

    /// Sets several column positions; nothing changes unless every column
    /// belongs to this board
    pub fn set_column_positions(&mut self, positions: &[(ColumnId, i64)]) -> Result<()> {
        if let Some((missing, _)) = positions.iter().find(|(id, _)| !self.has_column(*id)) {
            return Err(KanbanError::ColumnNotFound(missing.to_string()));
        }

        for &(id, position) in positions {
            self.column_mut(id)?.position = position;
        }
        Ok(())
    }

    /// Cards matching `query` in title or description, ordered by position
    pub fn search(&self, query: &str) -> Vec<Card> {
        let mut found: Vec<Card> = self
            .cards
            .iter()
            .filter(|c| c.matches(query))
            .cloned()
            .collect();
        found.sort_by_key(|c| c.position);
        found
    }
}
