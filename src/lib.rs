//! # Kanban Core
//!
//! Core logic for a kanban board editor: boards hold ordered columns, columns
//! hold ordered cards, and both are reordered by drag-and-drop.
//!
//! The centre of the crate is the [`ReorderEngine`], a small state machine
//! that keeps an optimistic [`BoardSnapshot`] while a drag is in progress,
//! assigns the moved item a sparse integer position through the
//! [`PositionAllocator`], and reconciles with a [`BoardStore`] once the drag
//! ends.

pub mod config;
pub mod domain;
pub mod error;
pub mod reorder;
pub mod storage;

// Re-export commonly used types
pub use config::ReorderConfig;
pub use domain::{
    board::{Board, BoardId, Card, CardId, CardUpdate, Column, ColumnId, Priority},
    position::{allocate, PositionAllocator, PositionError},
    snapshot::{BoardSnapshot, ColumnWithCards, DropTarget},
};
pub use error::{KanbanError, Result};
pub use reorder::{DragEvent, DragState, DropOutcome, ReorderEngine};
pub use storage::{BoardStore, MemoryStorage};

#[cfg(feature = "file-storage")]
pub use storage::file_storage::FileStorage;

#[cfg(feature = "sqlite-storage")]
pub use storage::sqlite_storage::SqliteStorage;
