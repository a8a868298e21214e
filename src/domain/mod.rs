pub mod board;
pub mod position;
pub mod snapshot;

pub use board::{Board, BoardId, Card, CardId, CardUpdate, Column, ColumnId, Priority};
pub use position::{allocate, PositionAllocator, PositionError};
pub use snapshot::{BoardSnapshot, ColumnWithCards, DropTarget};
