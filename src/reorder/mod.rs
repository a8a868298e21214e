//! Drag-and-drop reordering of cards and columns.
//!
//! A gesture runs `start -> over* -> end | cancel`. The [`ReorderEngine`]
//! tracks it as a [`DragState`], mutates its board snapshot optimistically
//! while the pointer moves, and reports how the drop was settled through a
//! [`DropOutcome`].

mod engine;
mod events;
mod state;

pub use engine::ReorderEngine;
pub use events::DragEvent;
pub use state::{DragState, DropOutcome, MoveKind, Placement};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{
        domain::{
            Board, BoardId, BoardSnapshot, Card, CardId, CardUpdate, Column, ColumnId,
        },
        error::{KanbanError, Result},
        reorder::ReorderEngine,
        storage::{BoardStore, MemoryStorage},
    };
    use async_trait::async_trait;
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    /// Memory store whose moves and loads can be made to fail or hang
    #[derive(Default)]
    pub struct FlakyStore {
        inner: MemoryStorage,
        fail_moves: AtomicBool,
        hang_moves: AtomicBool,
        fail_loads: AtomicBool,
        move_calls: AtomicUsize,
        column_move_calls: AtomicUsize,
        batch_calls: AtomicUsize,
        load_calls: AtomicUsize,
    }

    impl FlakyStore {
        pub fn inner(&self) -> &MemoryStorage {
            &self.inner
        }

        pub fn fail_moves(&self, on: bool) {
            self.fail_moves.store(on, Ordering::SeqCst);
        }

        pub fn hang_moves(&self, on: bool) {
            self.hang_moves.store(on, Ordering::SeqCst);
        }

        pub fn fail_loads(&self, on: bool) {
            self.fail_loads.store(on, Ordering::SeqCst);
        }

        pub fn move_calls(&self) -> usize {
            self.move_calls.load(Ordering::SeqCst)
        }

        pub fn column_move_calls(&self) -> usize {
            self.column_move_calls.load(Ordering::SeqCst)
        }

        pub fn batch_calls(&self) -> usize {
            self.batch_calls.load(Ordering::SeqCst)
        }

        pub fn load_calls(&self) -> usize {
            self.load_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BoardStore for FlakyStore {
        async fn list_boards(&self) -> Result<Vec<Board>> {
            self.inner.list_boards().await
        }

        async fn get_board_with_data(&self, id: BoardId) -> Result<BoardSnapshot> {
            self.load_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_loads.load(Ordering::SeqCst) {
                return Err(KanbanError::StorageError("load refused".to_string()));
            }
            self.inner.get_board_with_data(id).await
        }

        async fn create_board(&self, title: &str) -> Result<Board> {
            self.inner.create_board(title).await
        }

        async fn update_board(&self, id: BoardId, title: &str) -> Result<Board> {
            self.inner.update_board(id, title).await
        }

        async fn delete_board(&self, id: BoardId) -> Result<()> {
            self.inner.delete_board(id).await
        }

        async fn create_column(&self, board: BoardId, title: &str) -> Result<Column> {
            self.inner.create_column(board, title).await
        }

        async fn rename_column(&self, id: ColumnId, title: &str) -> Result<Column> {
            self.inner.rename_column(id, title).await
        }

        async fn delete_column(&self, id: ColumnId, move_cards_to: Option<ColumnId>) -> Result<()> {
            self.inner.delete_column(id, move_cards_to).await
        }

        async fn move_column(&self, id: ColumnId, position: i64) -> Result<()> {
            self.column_move_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.move_column(id, position).await
        }

        async fn create_card(&self, column: ColumnId, title: &str) -> Result<Card> {
            self.inner.create_card(column, title).await
        }

        async fn update_card(&self, id: CardId, update: &CardUpdate) -> Result<Card> {
            self.inner.update_card(id, update).await
        }

        async fn delete_card(&self, id: CardId) -> Result<()> {
            self.inner.delete_card(id).await
        }

        async fn move_card(&self, id: CardId, target_column: ColumnId, position: i64) -> Result<()> {
            self.move_calls.fetch_add(1, Ordering::SeqCst);
            if self.hang_moves.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.fail_moves.load(Ordering::SeqCst) {
                return Err(KanbanError::StorageError("move refused".to_string()));
            }
            self.inner.move_card(id, target_column, position).await
        }

        async fn set_card_positions(
            &self,
            column: ColumnId,
            positions: &[(CardId, i64)],
        ) -> Result<()> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_moves.load(Ordering::SeqCst) {
                return Err(KanbanError::StorageError("batch refused".to_string()));
            }
            self.inner.set_card_positions(column, positions).await
        }

        async fn set_column_positions(&self, positions: &[(ColumnId, i64)]) -> Result<()> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_moves.load(Ordering::SeqCst) {
                return Err(KanbanError::StorageError("batch refused".to_string()));
            }
            self.inner.set_column_positions(positions).await
        }

        async fn search_cards(&self, board: BoardId, query: &str) -> Result<Vec<Card>> {
            self.inner.search_cards(board, query).await
        }
    }

    /// Board with columns A, B and C. A holds c1, c2 and c3 at 1000, 2000
    /// and 3000; B holds b1 at 1000; C is empty.
    pub struct Fixture {
        pub store: Arc<FlakyStore>,
        pub board: BoardId,
        pub a: ColumnId,
        pub b: ColumnId,
        pub c: ColumnId,
        pub c1: CardId,
        pub c2: CardId,
        pub c3: CardId,
        pub b1: CardId,
    }

    impl Fixture {
        pub async fn new() -> Self {
            let store = Arc::new(FlakyStore::default());
            let inner = store.inner();

            let board = inner.create_board("Board").await.unwrap().id;
            let columns = inner.get_board_with_data(board).await.unwrap().column_ids();
            let (a, b, c) = (columns[0], columns[1], columns[2]);

            let c1 = inner.create_card(a, "c1").await.unwrap().id;
            let c2 = inner.create_card(a, "c2").await.unwrap().id;
            let c3 = inner.create_card(a, "c3").await.unwrap().id;
            let b1 = inner.create_card(b, "b1").await.unwrap().id;

            Self {
                store,
                board,
                a,
                b,
                c,
                c1,
                c2,
                c3,
                b1,
            }
        }

        pub async fn engine(&self) -> ReorderEngine<FlakyStore> {
            let mut engine = ReorderEngine::new(Arc::clone(&self.store));
            engine.load_board(self.board).await.unwrap();
            engine
        }
    }
}
