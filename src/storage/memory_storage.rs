use crate::{
    config::ReorderConfig,
    domain::{
        Board, BoardId, BoardSnapshot, Card, CardId, CardUpdate, Column, ColumnId,
        PositionAllocator,
    },
    error::{KanbanError, Result},
    storage::{BoardDocument, BoardStore},
};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Volatile storage keeping every board in process memory
pub struct MemoryStorage {
    boards: Mutex<Vec<BoardDocument>>,
    allocator: PositionAllocator,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            boards: Mutex::new(Vec::new()),
            allocator: PositionAllocator::default(),
        }
    }

    pub fn with_config(config: &ReorderConfig) -> Result<Self> {
        Ok(Self {
            boards: Mutex::new(Vec::new()),
            allocator: PositionAllocator::new(config)?,
        })
    }

    /// Runs `f` against the document owning the matching board, column or card
    async fn with_document<T>(
        &self,
        select: impl Fn(&BoardDocument) -> bool,
        not_found: impl FnOnce() -> KanbanError,
        f: impl FnOnce(&mut BoardDocument, &PositionAllocator) -> Result<T>,
    ) -> Result<T> {
        let mut boards = self.boards.lock().await;
        let doc = boards.iter_mut().find(|d| select(d)).ok_or_else(not_found)?;
        f(doc, &self.allocator)
    }
}

#[async_trait]
impl BoardStore for MemoryStorage {
    async fn list_boards(&self) -> Result<Vec<Board>> {
        let boards = self.boards.lock().await;
        Ok(boards.iter().map(|d| d.board.clone()).collect())
    }

    async fn get_board_with_data(&self, id: BoardId) -> Result<BoardSnapshot> {
        self.with_document(
            |d| d.id() == id,
            || KanbanError::BoardNotFound(id.to_string()),
            |doc, _| Ok(doc.snapshot()),
        )
        .await
    }

    async fn create_board(&self, title: &str) -> Result<Board> {
        let doc = BoardDocument::create(title, &self.allocator)?;
        let board = doc.board.clone();
        self.boards.lock().await.push(doc);
        log::debug!("created board {}", board.id);
        Ok(board)
    }

    async fn update_board(&self, id: BoardId, title: &str) -> Result<Board> {
        self.with_document(
            |d| d.id() == id,
            || KanbanError::BoardNotFound(id.to_string()),
            |doc, _| doc.rename(title),
        )
        .await
    }

    async fn delete_board(&self, id: BoardId) -> Result<()> {
        let mut boards = self.boards.lock().await;
        let before = boards.len();
        boards.retain(|d| d.id() != id);
        if boards.len() == before {
            return Err(KanbanError::BoardNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn create_column(&self, board: BoardId, title: &str) -> Result<Column> {
        self.with_document(
            |d| d.id() == board,
            || KanbanError::BoardNotFound(board.to_string()),
            |doc, allocator| doc.create_column(title, allocator),
        )
        .await
    }

    async fn rename_column(&self, id: ColumnId, title: &str) -> Result<Column> {
        self.with_document(
            |d| d.has_column(id),
            || KanbanError::ColumnNotFound(id.to_string()),
            |doc, _| doc.rename_column(id, title),
        )
        .await
    }

    async fn delete_column(&self, id: ColumnId, move_cards_to: Option<ColumnId>) -> Result<()> {
        self.with_document(
            |d| d.has_column(id),
            || KanbanError::ColumnNotFound(id.to_string()),
            |doc, allocator| doc.delete_column(id, move_cards_to, allocator),
        )
        .await
    }

    async fn move_column(&self, id: ColumnId, position: i64) -> Result<()> {
        self.with_document(
            |d| d.has_column(id),
            || KanbanError::ColumnNotFound(id.to_string()),
            |doc, _| doc.move_column(id, position),
        )
        .await
    }

    async fn create_card(&self, column: ColumnId, title: &str) -> Result<Card> {
        self.with_document(
            |d| d.has_column(column),
            || KanbanError::ColumnNotFound(column.to_string()),
            |doc, allocator| doc.create_card(column, title, allocator),
        )
        .await
    }

    async fn update_card(&self, id: CardId, update: &CardUpdate) -> Result<Card> {
        self.with_document(
            |d| d.has_card(id),
            || KanbanError::CardNotFound(id.to_string()),
            |doc, _| doc.update_card(id, update),
        )
        .await
    }

    async fn delete_card(&self, id: CardId) -> Result<()> {
        self.with_document(
            |d| d.has_card(id),
            || KanbanError::CardNotFound(id.to_string()),
            |doc, _| doc.delete_card(id),
        )
        .await
    }

    async fn move_card(&self, id: CardId, target_column: ColumnId, position: i64) -> Result<()> {
        self.with_document(
            |d| d.has_card(id),
            || KanbanError::CardNotFound(id.to_string()),
            |doc, _| doc.move_card(id, target_column, position),
        )
        .await
    }

    async fn set_card_positions(
        &self,
        column: ColumnId,
        positions: &[(CardId, i64)],
    ) -> Result<()> {
        self.with_document(
            |d| d.has_column(column),
            || KanbanError::ColumnNotFound(column.to_string()),
            |doc, _| doc.set_card_positions(column, positions),
        )
        .await
    }

    async fn set_column_positions(&self, positions: &[(ColumnId, i64)]) -> Result<()> {
        let Some(&(first, _)) = positions.first() else {
            return Ok(());
        };
        self.with_document(
            |d| d.has_column(first),
            || KanbanError::ColumnNotFound(first.to_string()),
            |doc, _| doc.set_column_positions(positions),
        )
        .await
    }

    async fn search_cards(&self, board: BoardId, query: &str) -> Result<Vec<Card>> {
        self.with_document(
            |d| d.id() == board,
            || KanbanError::BoardNotFound(board.to_string()),
            |doc, _| Ok(doc.search(query)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;

    #[tokio::test]
    async fn test_board_lifecycle() {
        let storage = MemoryStorage::new();
        let board = storage.create_board("Sprint").await.unwrap();

        let renamed = storage.update_board(board.id, "Sprint 2").await.unwrap();
        assert_eq!(renamed.title, "Sprint 2");
        assert_eq!(storage.list_boards().await.unwrap().len(), 1);

        storage.delete_board(board.id).await.unwrap();
        assert!(storage.list_boards().await.unwrap().is_empty());
        assert!(matches!(
            storage.get_board_with_data(board.id).await,
            Err(KanbanError::BoardNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_move_card_across_columns() {
        let storage = MemoryStorage::new();
        let board = storage.create_board("Sprint").await.unwrap();
        let columns = storage
            .get_board_with_data(board.id)
            .await
            .unwrap()
            .column_ids();

        let card = storage.create_card(columns[0], "Ship it").await.unwrap();
        storage.move_card(card.id, columns[2], 500).await.unwrap();

        let snapshot = storage.get_board_with_data(board.id).await.unwrap();
        assert!(snapshot.column(columns[0]).unwrap().cards.is_empty());
        let done = &snapshot.column(columns[2]).unwrap().cards;
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].position, 500);
    }

    #[tokio::test]
    async fn test_unknown_card_is_reported() {
        let storage = MemoryStorage::new();
        let result = storage.move_card(CardId::new(), ColumnId::new(), 0).await;
        assert!(matches!(result, Err(KanbanError::CardNotFound(_))));
    }

    #[tokio::test]
    async fn test_filter_cards_by_priority() {
        let storage = MemoryStorage::new();
        let board = storage.create_board("Sprint").await.unwrap();
        let column = storage
            .get_board_with_data(board.id)
            .await
            .unwrap()
            .column_ids()[0];

        let urgent = storage.create_card(column, "urgent").await.unwrap();
        storage.create_card(column, "later").await.unwrap();
        storage
            .update_card(urgent.id, &CardUpdate::priority(Priority::High))
            .await
            .unwrap();

        let filtered = storage.filter_cards(board.id, Priority::High).await.unwrap();
        assert_eq!(filtered.card_count(), 1);
        assert_eq!(filtered.columns.len(), 3);
    }

    #[tokio::test]
    async fn test_seed_if_empty_runs_once() {
        let storage = MemoryStorage::new();
        let seeded = storage.seed_if_empty().await.unwrap();
        assert!(seeded.is_some());
        assert_eq!(storage.seed_if_empty().await.unwrap(), None);

        let snapshot = storage.get_board_with_data(seeded.unwrap()).await.unwrap();
        assert_eq!(snapshot.card_count(), 3);
        assert_eq!(snapshot.columns[0].cards.len(), 2);
        assert_eq!(snapshot.columns[1].cards[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn test_batch_positions_apply_together() {
        let storage = MemoryStorage::new();
        let board = storage.create_board("Sprint").await.unwrap();
        let columns = storage
            .get_board_with_data(board.id)
            .await
            .unwrap()
            .column_ids();

        let first = storage.create_card(columns[0], "first").await.unwrap();
        let second = storage.create_card(columns[0], "second").await.unwrap();
        let result = storage
            .set_card_positions(columns[0], &[(second.id, 500), (CardId::new(), 600)])
            .await;
        assert!(matches!(result, Err(KanbanError::CardNotFound(_))));

        storage
            .set_column_positions(&[(columns[2], 500), (columns[0], 4000)])
            .await
            .unwrap();
        let snapshot = storage.get_board_with_data(board.id).await.unwrap();
        assert_eq!(snapshot.column_ids(), vec![columns[2], columns[1], columns[0]]);
        assert_eq!(snapshot.columns[2].card_ids(), vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_with_config_validates() {
        let config = ReorderConfig {
            position_step: 1,
            default_position: 1000,
        };
        assert!(matches!(
            MemoryStorage::with_config(&config),
            Err(KanbanError::ConfigError(_))
        ));
    }
}
