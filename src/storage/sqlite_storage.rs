use crate::{
    config::ReorderConfig,
    domain::{
        board::validate_title, Board, BoardId, BoardSnapshot, Card, CardId, CardUpdate, Column,
        ColumnId, PositionAllocator, Priority,
    },
    error::{KanbanError, Result},
    storage::{BoardStore, DEFAULT_COLUMNS},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::{path::Path, str::FromStr, sync::Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS boards (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS columns (
    id TEXT PRIMARY KEY,
    board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    position INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cards (
    id TEXT PRIMARY KEY,
    column_id TEXT NOT NULL REFERENCES columns(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    priority TEXT NOT NULL DEFAULT 'medium' CHECK(priority IN ('low', 'medium', 'high')),
    due_date TEXT,
    position INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_columns_board_id ON columns(board_id);
CREATE INDEX IF NOT EXISTS idx_cards_column_id ON cards(column_id);
";

const CARD_COLUMNS: &str =
    "c.id, c.column_id, c.title, c.description, c.priority, c.due_date, c.position, c.created_at, c.updated_at";

/// SQLite-based storage backend for boards, columns and cards
pub struct SqliteStorage {
    connection: Mutex<Connection>,
    allocator: PositionAllocator,
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339()
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| KanbanError::StorageError(format!("invalid timestamp '{}': {}", value, e)))
}

struct BoardRow {
    id: String,
    title: String,
    created_at: String,
    updated_at: String,
}

impl BoardRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }

    fn into_board(self) -> Result<Board> {
        Ok(Board {
            id: BoardId::from_str(&self.id)?,
            title: self.title,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

struct ColumnRow {
    id: String,
    board_id: String,
    title: String,
    position: i64,
    created_at: String,
}

impl ColumnRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            board_id: row.get(1)?,
            title: row.get(2)?,
            position: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_column(self) -> Result<Column> {
        Ok(Column {
            id: ColumnId::from_str(&self.id)?,
            board_id: BoardId::from_str(&self.board_id)?,
            title: self.title,
            position: self.position,
            created_at: parse_time(&self.created_at)?,
        })
    }
}

struct CardRow {
    id: String,
    column_id: String,
    title: String,
    description: String,
    priority: String,
    due_date: Option<String>,
    position: i64,
    created_at: String,
    updated_at: String,
}

impl CardRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            column_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            priority: row.get(4)?,
            due_date: row.get(5)?,
            position: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_card(self) -> Result<Card> {
        Ok(Card {
            id: CardId::from_str(&self.id)?,
            column_id: ColumnId::from_str(&self.column_id)?,
            title: self.title,
            description: self.description,
            priority: Priority::from_str(&self.priority)?,
            due_date: self.due_date.as_deref().map(parse_time).transpose()?,
            position: self.position,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

impl SqliteStorage {
    /// Opens (or creates) a database file
    pub fn open(database_path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(database_path)?, &ReorderConfig::default())
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, &ReorderConfig::default())
    }

    pub fn from_connection(connection: Connection, config: &ReorderConfig) -> Result<Self> {
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        connection.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: Mutex::new(connection),
            allocator: PositionAllocator::new(config)?,
        })
    }

    fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut connection = self
            .connection
            .lock()
            .map_err(|_| KanbanError::StorageError("connection lock poisoned".to_string()))?;
        f(&mut connection)
    }

    fn load_board(conn: &Connection, id: BoardId) -> Result<Board> {
        conn.query_row(
            "SELECT id, title, created_at, updated_at FROM boards WHERE id = ?1",
            params![id.to_string()],
            BoardRow::from_row,
        )
        .optional()?
        .ok_or_else(|| KanbanError::BoardNotFound(id.to_string()))?
        .into_board()
    }

    fn load_column(conn: &Connection, id: ColumnId) -> Result<Column> {
        conn.query_row(
            "SELECT id, board_id, title, position, created_at FROM columns WHERE id = ?1",
            params![id.to_string()],
            ColumnRow::from_row,
        )
        .optional()?
        .ok_or_else(|| KanbanError::ColumnNotFound(id.to_string()))?
        .into_column()
    }

    fn load_card(conn: &Connection, id: CardId) -> Result<Card> {
        conn.query_row(
            &format!("SELECT {} FROM cards c WHERE c.id = ?1", CARD_COLUMNS),
            params![id.to_string()],
            CardRow::from_row,
        )
        .optional()?
        .ok_or_else(|| KanbanError::CardNotFound(id.to_string()))?
        .into_card()
    }

    fn max_card_position(conn: &Connection, column: ColumnId) -> Result<Option<i64>> {
        Ok(conn.query_row(
            "SELECT MAX(position) FROM cards WHERE column_id = ?1",
            params![column.to_string()],
            |row| row.get(0),
        )?)
    }

    fn board_cards(conn: &Connection, board: BoardId, query: Option<&str>) -> Result<Vec<Card>> {
        let sql = format!(
            "SELECT {} FROM cards c JOIN columns col ON c.column_id = col.id
             WHERE col.board_id = ?1 AND (?2 IS NULL OR c.title LIKE ?2 OR c.description LIKE ?2)
             ORDER BY c.position ASC",
            CARD_COLUMNS
        );
        let pattern = query.map(|q| format!("%{}%", q));
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![board.to_string(), pattern], CardRow::from_row)?;

        let mut cards = Vec::new();
        for row in rows {
            cards.push(row?.into_card()?);
        }
        Ok(cards)
    }

    fn insert_card(conn: &Connection, card: &Card) -> Result<()> {
        conn.execute(
            "INSERT INTO cards (id, column_id, title, description, priority, due_date, position, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                card.id.to_string(),
                card.column_id.to_string(),
                card.title,
                card.description,
                card.priority.as_str(),
                card.due_date.as_ref().map(format_time),
                card.position,
                format_time(&card.created_at),
                format_time(&card.updated_at),
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl BoardStore for SqliteStorage {
    async fn list_boards(&self) -> Result<Vec<Board>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, created_at, updated_at FROM boards ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map([], BoardRow::from_row)?;
            let mut boards = Vec::new();
            for row in rows {
                boards.push(row?.into_board()?);
            }
            Ok(boards)
        })
    }

    async fn get_board_with_data(&self, id: BoardId) -> Result<BoardSnapshot> {
        self.with_connection(|conn| {
            let board = Self::load_board(conn, id)?;

            let mut stmt = conn.prepare(
                "SELECT id, board_id, title, position, created_at FROM columns
                 WHERE board_id = ?1 ORDER BY position ASC",
            )?;
            let rows = stmt.query_map(params![id.to_string()], ColumnRow::from_row)?;
            let mut columns = Vec::new();
            for row in rows {
                columns.push(row?.into_column()?);
            }

            let cards = Self::board_cards(conn, id, None)?;
            Ok(BoardSnapshot::assemble(board, columns, cards))
        })
    }

    async fn create_board(&self, title: &str) -> Result<Board> {
        let board = Board::new(validate_title("board", title)?);
        let positions = self.allocator.renumber(DEFAULT_COLUMNS.len());

        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO boards (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    board.id.to_string(),
                    board.title,
                    format_time(&board.created_at),
                    format_time(&board.updated_at),
                ],
            )?;
            for (title, position) in DEFAULT_COLUMNS.iter().zip(positions) {
                let column = Column::new(board.id, title.to_string(), position);
                tx.execute(
                    "INSERT INTO columns (id, board_id, title, position, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        column.id.to_string(),
                        board.id.to_string(),
                        column.title,
                        column.position,
                        format_time(&column.created_at),
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })?;

        log::debug!("created board {}", board.id);
        Ok(board)
    }

    async fn update_board(&self, id: BoardId, title: &str) -> Result<Board> {
        let title = validate_title("board", title)?;
        self.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE boards SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title, format_time(&Utc::now()), id.to_string()],
            )?;
            if updated == 0 {
                return Err(KanbanError::BoardNotFound(id.to_string()));
            }
            Self::load_board(conn, id)
        })
    }

    async fn delete_board(&self, id: BoardId) -> Result<()> {
        self.with_connection(|conn| {
            let deleted = conn.execute("DELETE FROM boards WHERE id = ?1", params![id.to_string()])?;
            if deleted == 0 {
                return Err(KanbanError::BoardNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    async fn create_column(&self, board: BoardId, title: &str) -> Result<Column> {
        let title = validate_title("column", title)?;
        let allocator = self.allocator;
        self.with_connection(|conn| {
            Self::load_board(conn, board)?;
            let max: Option<i64> = conn.query_row(
                "SELECT MAX(position) FROM columns WHERE board_id = ?1",
                params![board.to_string()],
                |row| row.get(0),
            )?;

            let column = Column::new(board, title, allocator.append(max));
            conn.execute(
                "INSERT INTO columns (id, board_id, title, position, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    column.id.to_string(),
                    board.to_string(),
                    column.title,
                    column.position,
                    format_time(&column.created_at),
                ],
            )?;
            Ok(column)
        })
    }

    async fn rename_column(&self, id: ColumnId, title: &str) -> Result<Column> {
        let title = validate_title("column", title)?;
        self.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE columns SET title = ?1 WHERE id = ?2",
                params![title, id.to_string()],
            )?;
            if updated == 0 {
                return Err(KanbanError::ColumnNotFound(id.to_string()));
            }
            Self::load_column(conn, id)
        })
    }

    async fn delete_column(&self, id: ColumnId, move_cards_to: Option<ColumnId>) -> Result<()> {
        let allocator = self.allocator;
        self.with_connection(|conn| {
            let column = Self::load_column(conn, id)?;
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM columns WHERE board_id = ?1",
                params![column.board_id.to_string()],
                |row| row.get(0),
            )?;
            if count <= 1 {
                return Err(KanbanError::LastColumn);
            }

            let tx = conn.transaction()?;
            if let Some(target) = move_cards_to.filter(|t| *t != id) {
                let target_column = Self::load_column(&tx, target)?;
                if target_column.board_id != column.board_id {
                    return Err(KanbanError::ColumnNotFound(target.to_string()));
                }

                let mut next = allocator.append(Self::max_card_position(&tx, target)?);
                let ids: Vec<String> = {
                    let mut stmt = tx.prepare(
                        "SELECT id FROM cards WHERE column_id = ?1 ORDER BY position ASC",
                    )?;
                    let rows = stmt.query_map(params![id.to_string()], |row| row.get(0))?;
                    let ids = rows.collect::<rusqlite::Result<Vec<String>>>()?;
                    ids
                };
                let now = format_time(&Utc::now());
                for card_id in ids {
                    tx.execute(
                        "UPDATE cards SET column_id = ?1, position = ?2, updated_at = ?3 WHERE id = ?4",
                        params![target.to_string(), next, now, card_id],
                    )?;
                    next = next.saturating_add(allocator.step());
                }
            }
            tx.execute("DELETE FROM columns WHERE id = ?1", params![id.to_string()])?;
            tx.commit()?;
            Ok(())
        })
    }

    async fn move_column(&self, id: ColumnId, position: i64) -> Result<()> {
        self.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE columns SET position = ?1 WHERE id = ?2",
                params![position, id.to_string()],
            )?;
            if updated == 0 {
                return Err(KanbanError::ColumnNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    async fn create_card(&self, column: ColumnId, title: &str) -> Result<Card> {
        let title = validate_title("card", title)?;
        let allocator = self.allocator;
        self.with_connection(|conn| {
            Self::load_column(conn, column)?;
            let position = allocator.append(Self::max_card_position(conn, column)?);
            let card = Card::new(column, title, position);
            Self::insert_card(conn, &card)?;
            Ok(card)
        })
    }

    async fn update_card(&self, id: CardId, update: &CardUpdate) -> Result<Card> {
        self.with_connection(|conn| {
            let mut card = Self::load_card(conn, id)?;
            card.apply(update)?;
            conn.execute(
                "UPDATE cards SET title = ?1, description = ?2, priority = ?3, due_date = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    card.title,
                    card.description,
                    card.priority.as_str(),
                    card.due_date.as_ref().map(format_time),
                    format_time(&card.updated_at),
                    id.to_string(),
                ],
            )?;
            Ok(card)
        })
    }

    async fn delete_card(&self, id: CardId) -> Result<()> {
        self.with_connection(|conn| {
            let deleted = conn.execute("DELETE FROM cards WHERE id = ?1", params![id.to_string()])?;
            if deleted == 0 {
                return Err(KanbanError::CardNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    async fn move_card(&self, id: CardId, target_column: ColumnId, position: i64) -> Result<()> {
        self.with_connection(|conn| {
            Self::load_column(conn, target_column)?;
            let updated = conn.execute(
                "UPDATE cards SET column_id = ?1, position = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    target_column.to_string(),
                    position,
                    format_time(&Utc::now()),
                    id.to_string(),
                ],
            )?;
            if updated == 0 {
                return Err(KanbanError::CardNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    async fn set_card_positions(
        &self,
        column: ColumnId,
        positions: &[(CardId, i64)],
    ) -> Result<()> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let target = Self::load_column(&tx, column)?;
            let now = format_time(&Utc::now());
            for &(id, position) in positions {
                let updated = tx.execute(
                    "UPDATE cards SET column_id = ?1, position = ?2, updated_at = ?3
                     WHERE id = ?4 AND column_id IN (SELECT id FROM columns WHERE board_id = ?5)",
                    params![
                        column.to_string(),
                        position,
                        now,
                        id.to_string(),
                        target.board_id.to_string(),
                    ],
                )?;
                if updated == 0 {
                    return Err(KanbanError::CardNotFound(id.to_string()));
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    async fn set_column_positions(&self, positions: &[(ColumnId, i64)]) -> Result<()> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            for &(id, position) in positions {
                let updated = tx.execute(
                    "UPDATE columns SET position = ?1 WHERE id = ?2",
                    params![position, id.to_string()],
                )?;
                if updated == 0 {
                    return Err(KanbanError::ColumnNotFound(id.to_string()));
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    async fn search_cards(&self, board: BoardId, query: &str) -> Result<Vec<Card>> {
        self.with_connection(|conn| {
            Self::load_board(conn, board)?;
            Self::board_cards(conn, board, Some(query))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (SqliteStorage, BoardId, Vec<ColumnId>) {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let board = storage.create_board("Backlog").await.unwrap();
        let columns = storage
            .get_board_with_data(board.id)
            .await
            .unwrap()
            .column_ids();
        (storage, board.id, columns)
    }

    #[tokio::test]
    async fn test_create_board_with_default_columns() {
        let (storage, board, columns) = setup().await;
        assert_eq!(columns.len(), 3);

        let snapshot = storage.get_board_with_data(board).await.unwrap();
        let titles: Vec<&str> = snapshot
            .columns
            .iter()
            .map(|c| c.column.title.as_str())
            .collect();
        assert_eq!(titles, DEFAULT_COLUMNS);
    }

    #[tokio::test]
    async fn test_card_round_trip_and_move() {
        let (storage, board, columns) = setup().await;
        let card = storage.create_card(columns[0], "Import data").await.unwrap();
        assert_eq!(card.position, 1000);

        storage
            .update_card(card.id, &CardUpdate::priority(Priority::Low))
            .await
            .unwrap();
        storage.move_card(card.id, columns[1], 1500).await.unwrap();

        let snapshot = storage.get_board_with_data(board).await.unwrap();
        let moved = &snapshot.column(columns[1]).unwrap().cards[0];
        assert_eq!(moved.id, card.id);
        assert_eq!(moved.position, 1500);
        assert_eq!(moved.priority, Priority::Low);
    }

    #[tokio::test]
    async fn test_delete_column_moves_cards() {
        let (storage, board, columns) = setup().await;
        storage.create_card(columns[1], "stays").await.unwrap();
        storage.create_card(columns[0], "moves").await.unwrap();

        storage
            .delete_column(columns[0], Some(columns[1]))
            .await
            .unwrap();

        let snapshot = storage.get_board_with_data(board).await.unwrap();
        assert_eq!(snapshot.columns.len(), 2);
        let titles: Vec<&str> = snapshot
            .column(columns[1])
            .unwrap()
            .cards
            .iter()
            .map(|c| c.title.as_str())
            .collect();
        assert_eq!(titles, vec!["stays", "moves"]);
    }

    #[tokio::test]
    async fn test_delete_board_cascades() {
        let (storage, board, columns) = setup().await;
        let card = storage.create_card(columns[0], "gone").await.unwrap();

        storage.delete_board(board).await.unwrap();

        assert!(matches!(
            storage.delete_card(card.id).await,
            Err(KanbanError::CardNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_cards() {
        let (storage, board, columns) = setup().await;
        storage.create_card(columns[0], "Review PR").await.unwrap();
        storage.create_card(columns[0], "Deploy").await.unwrap();

        let results = storage.search_cards(board, "review").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Review PR");
    }

    #[tokio::test]
    async fn test_set_card_positions_rolls_back_on_unknown_card() {
        let (storage, board, columns) = setup().await;
        let first = storage.create_card(columns[0], "first").await.unwrap();
        let second = storage.create_card(columns[0], "second").await.unwrap();

        let result = storage
            .set_card_positions(columns[1], &[(second.id, 1000), (CardId::new(), 2000)])
            .await;
        assert!(matches!(result, Err(KanbanError::CardNotFound(_))));

        let snapshot = storage.get_board_with_data(board).await.unwrap();
        assert_eq!(snapshot.columns[0].card_ids(), vec![first.id, second.id]);
        assert!(snapshot.columns[1].cards.is_empty());

        storage
            .set_card_positions(columns[1], &[(second.id, 1000), (first.id, 2000)])
            .await
            .unwrap();
        let snapshot = storage.get_board_with_data(board).await.unwrap();
        assert_eq!(snapshot.columns[1].card_ids(), vec![second.id, first.id]);
    }
}
