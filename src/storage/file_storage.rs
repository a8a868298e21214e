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
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};
use tokio::fs;

/// File-based storage keeping one JSON document per board
pub struct FileStorage {
    root_path: PathBuf,
    allocator: PositionAllocator,
}

impl FileStorage {
    const KANBAN_DIR: &'static str = ".kanban";
    const BOARDS_DIR: &'static str = "boards";

    /// Creates a new FileStorage instance for the given project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::KANBAN_DIR),
            allocator: PositionAllocator::default(),
        }
    }

    pub fn with_config(project_root: impl AsRef<Path>, config: &ReorderConfig) -> Result<Self> {
        Ok(Self {
            root_path: project_root.as_ref().join(Self::KANBAN_DIR),
            allocator: PositionAllocator::new(config)?,
        })
    }

    fn boards_dir(&self) -> PathBuf {
        self.root_path.join(Self::BOARDS_DIR)
    }

    fn board_file(&self, id: BoardId) -> PathBuf {
        self.boards_dir().join(format!("{}.json", id))
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    /// Creates the storage directory layout
    pub async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.boards_dir()).await
    }

    pub async fn is_initialized(&self) -> bool {
        self.boards_dir().exists()
    }

    async fn load_document(&self, id: BoardId) -> Result<BoardDocument> {
        let file_path = self.board_file(id);

        if !file_path.exists() {
            return Err(KanbanError::BoardNotFound(id.to_string()));
        }

        let contents = fs::read_to_string(&file_path).await?;
        let doc: BoardDocument = serde_json::from_str(&contents)?;

        Ok(doc)
    }

    async fn save_document(&self, doc: &BoardDocument) -> Result<()> {
        self.ensure_directory_exists(&self.boards_dir()).await?;

        let json = serde_json::to_string_pretty(doc)?;
        fs::write(self.board_file(doc.id()), json).await?;
        log::debug!("saved board {}", doc.id());
        Ok(())
    }

    async fn list_board_ids(&self) -> Result<Vec<BoardId>> {
        let boards_dir = self.boards_dir();

        if !boards_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&boards_dir).await?;
        let mut ids: Vec<BoardId> = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if let Ok(id) = BoardId::from_str(stem) {
                        ids.push(id);
                    }
                }
            }
        }

        Ok(ids)
    }

    async fn load_all(&self) -> Result<Vec<BoardDocument>> {
        let mut docs = Vec::new();
        for id in self.list_board_ids().await? {
            docs.push(self.load_document(id).await?);
        }
        Ok(docs)
    }

    /// Loads the document owning the matching column or card, applies `f`
    /// and writes the document back if `f` succeeded
    async fn update_document<T>(
        &self,
        select: impl Fn(&BoardDocument) -> bool,
        not_found: impl FnOnce() -> KanbanError,
        f: impl FnOnce(&mut BoardDocument, &PositionAllocator) -> Result<T>,
    ) -> Result<T> {
        let mut doc = self
            .load_all()
            .await?
            .into_iter()
            .find(|d| select(d))
            .ok_or_else(not_found)?;

        let value = f(&mut doc, &self.allocator)?;
        self.save_document(&doc).await?;
        Ok(value)
    }

    async fn update_board_document<T>(
        &self,
        id: BoardId,
        f: impl FnOnce(&mut BoardDocument, &PositionAllocator) -> Result<T>,
    ) -> Result<T> {
        let mut doc = self.load_document(id).await?;
        let value = f(&mut doc, &self.allocator)?;
        self.save_document(&doc).await?;
        Ok(value)
    }
}

#[async_trait]
impl BoardStore for FileStorage {
    async fn list_boards(&self) -> Result<Vec<Board>> {
        let mut boards: Vec<Board> = self
            .load_all()
            .await?
            .into_iter()
            .map(|d| d.board)
            .collect();
        boards.sort_by_key(|b| b.created_at);
        Ok(boards)
    }

    async fn get_board_with_data(&self, id: BoardId) -> Result<BoardSnapshot> {
        Ok(self.load_document(id).await?.snapshot())
    }

    async fn create_board(&self, title: &str) -> Result<Board> {
        let doc = BoardDocument::create(title, &self.allocator)?;
        self.save_document(&doc).await?;
        Ok(doc.board)
    }

    async fn update_board(&self, id: BoardId, title: &str) -> Result<Board> {
        self.update_board_document(id, |doc, _| doc.rename(title))
            .await
    }

    async fn delete_board(&self, id: BoardId) -> Result<()> {
        let file_path = self.board_file(id);

        if !file_path.exists() {
            return Err(KanbanError::BoardNotFound(id.to_string()));
        }

        fs::remove_file(file_path).await?;
        Ok(())
    }

    async fn create_column(&self, board: BoardId, title: &str) -> Result<Column> {
        self.update_board_document(board, |doc, allocator| doc.create_column(title, allocator))
            .await
    }

    async fn rename_column(&self, id: ColumnId, title: &str) -> Result<Column> {
        self.update_document(
            |d| d.has_column(id),
            || KanbanError::ColumnNotFound(id.to_string()),
            |doc, _| doc.rename_column(id, title),
        )
        .await
    }

    async fn delete_column(&self, id: ColumnId, move_cards_to: Option<ColumnId>) -> Result<()> {
        self.update_document(
            |d| d.has_column(id),
            || KanbanError::ColumnNotFound(id.to_string()),
            |doc, allocator| doc.delete_column(id, move_cards_to, allocator),
        )
        .await
    }

    async fn move_column(&self, id: ColumnId, position: i64) -> Result<()> {
        self.update_document(
            |d| d.has_column(id),
            || KanbanError::ColumnNotFound(id.to_string()),
            |doc, _| doc.move_column(id, position),
        )
        .await
    }

    async fn create_card(&self, column: ColumnId, title: &str) -> Result<Card> {
        self.update_document(
            |d| d.has_column(column),
            || KanbanError::ColumnNotFound(column.to_string()),
            |doc, allocator| doc.create_card(column, title, allocator),
        )
        .await
    }

    async fn update_card(&self, id: CardId, update: &CardUpdate) -> Result<Card> {
        self.update_document(
            |d| d.has_card(id),
            || KanbanError::CardNotFound(id.to_string()),
            |doc, _| doc.update_card(id, update),
        )
        .await
    }

    async fn delete_card(&self, id: CardId) -> Result<()> {
        self.update_document(
            |d| d.has_card(id),
            || KanbanError::CardNotFound(id.to_string()),
            |doc, _| doc.delete_card(id),
        )
        .await
    }

    async fn move_card(&self, id: CardId, target_column: ColumnId, position: i64) -> Result<()> {
        self.update_document(
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
        self.update_document(
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
        self.update_document(
            |d| d.has_column(first),
            || KanbanError::ColumnNotFound(first.to_string()),
            |doc, _| doc.set_column_positions(positions),
        )
        .await
    }

    async fn search_cards(&self, board: BoardId, query: &str) -> Result<Vec<Card>> {
        Ok(self.load_document(board).await?.search(query))
    }
}
