use crate::{
    domain::{
        Board, BoardId, BoardSnapshot, Card, CardId, CardUpdate, Column, ColumnId, Priority,
    },
    error::Result,
};
use async_trait::async_trait;

pub mod document;
pub mod memory_storage;

#[cfg(feature = "file-storage")]
pub mod file_storage;

#[cfg(feature = "sqlite-storage")]
pub mod sqlite_storage;

pub use document::{BoardDocument, DEFAULT_COLUMNS};
pub use memory_storage::MemoryStorage;

/// Authoritative store for boards, columns and cards.
///
/// Every call either applies completely or fails; the reorder engine relies
/// on that when it reconciles after a failed move.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Lists all boards, oldest first
    async fn list_boards(&self) -> Result<Vec<Board>>;

    /// Loads a board with all of its columns and cards in display order
    async fn get_board_with_data(&self, id: BoardId) -> Result<BoardSnapshot>;

    /// Creates a board with the default columns
    async fn create_board(&self, title: &str) -> Result<Board>;

    async fn update_board(&self, id: BoardId, title: &str) -> Result<Board>;

    /// Deletes a board together with its columns and cards
    async fn delete_board(&self, id: BoardId) -> Result<()>;

    /// Appends a column after the board's last column
    async fn create_column(&self, board: BoardId, title: &str) -> Result<Column>;

    async fn rename_column(&self, id: ColumnId, title: &str) -> Result<Column>;

    /// Deletes a column. Its cards are deleted too unless `move_cards_to`
    /// names another column of the same board.
    async fn delete_column(&self, id: ColumnId, move_cards_to: Option<ColumnId>) -> Result<()>;

    /// Sets a column's position within its board
    async fn move_column(&self, id: ColumnId, position: i64) -> Result<()>;

    /// Appends a card after the column's last card
    async fn create_card(&self, column: ColumnId, title: &str) -> Result<Card>;

    async fn update_card(&self, id: CardId, update: &CardUpdate) -> Result<Card>;

    async fn delete_card(&self, id: CardId) -> Result<()>;

    /// Reassigns a card's column and position
    async fn move_card(&self, id: CardId, target_column: ColumnId, position: i64) -> Result<()>;

    /// Places several cards in `column` at the given positions. Either every
    /// card is written or none is.
    async fn set_card_positions(
        &self,
        column: ColumnId,
        positions: &[(CardId, i64)],
    ) -> Result<()>;

    /// Sets several column positions within one board, all or nothing
    async fn set_column_positions(&self, positions: &[(ColumnId, i64)]) -> Result<()>;

    /// Searches a board's cards by title or description (case-insensitive)
    async fn search_cards(&self, board: BoardId, query: &str) -> Result<Vec<Card>>;

    /// Loads a board keeping only cards of the given priority
    async fn filter_cards(&self, board: BoardId, priority: Priority) -> Result<BoardSnapshot> {
        let snapshot = self.get_board_with_data(board).await?;
        Ok(snapshot.filtered_by_priority(priority))
    }

    /// Creates a sample board when the store holds no boards yet
    async fn seed_if_empty(&self) -> Result<Option<BoardId>> {
        if !self.list_boards().await?.is_empty() {
            return Ok(None);
        }

        let board = self.create_board("My Board").await?;
        let snapshot = self.get_board_with_data(board.id).await?;
        let column_ids = snapshot.column_ids();
        let (Some(&todo), Some(&doing)) = (column_ids.first(), column_ids.get(1)) else {
            return Ok(Some(board.id));
        };

        let welcome = self.create_card(todo, "Welcome to your board!").await?;
        self.update_card(
            welcome.id,
            &CardUpdate {
                description: Some("Drag this card to another column".to_string()),
                ..CardUpdate::default()
            },
        )
        .await?;

        let try_it = self.create_card(todo, "Try creating a new card").await?;
        self.update_card(try_it.id, &CardUpdate::priority(Priority::Low))
            .await?;

        let explore = self.create_card(doing, "Explore the board").await?;
        self.update_card(explore.id, &CardUpdate::priority(Priority::High))
            .await?;

        log::info!("seeded sample board {}", board.id);
        Ok(Some(board.id))
    }
}
