use crate::{
    config::ReorderConfig,
    domain::{
        Board, BoardId, BoardSnapshot, Card, CardId, CardUpdate, Column, ColumnId, ColumnWithCards,
        DropTarget, PositionAllocator, Priority,
    },
    error::{KanbanError, Result},
    reorder::state::{DragState, DropOutcome, MoveKind, Placement},
    storage::BoardStore,
};
use std::{fmt, sync::Arc};
use uuid::Uuid;

/// Position writes a drop sends to the store
#[derive(Debug)]
enum Writes {
    Cards {
        column: ColumnId,
        positions: Vec<(CardId, i64)>,
    },
    Columns(Vec<(ColumnId, i64)>),
}

impl Writes {
    fn len(&self) -> usize {
        match self {
            Self::Cards { positions, .. } => positions.len(),
            Self::Columns(positions) => positions.len(),
        }
    }
}

struct DropPlan {
    placement: Placement,
    writes: Writes,
    pristine: BoardSnapshot,
}

enum Plan {
    Ignored,
    Unchanged,
    Commit(DropPlan),
}

/// Position for the item at `index` of `order`, where `order` lists every
/// item of the destination (moved item included) with its current position.
///
/// Returns the moved item's position and all writes needed. Normally that is
/// a single write; when the neighbours leave no room, the whole list is
/// renumbered and only items whose position changed are written.
fn place<T>(
    allocator: &PositionAllocator,
    order: &[(T, i64)],
    index: usize,
) -> Option<(i64, Vec<(T, i64)>)>
where
    T: Copy + PartialEq + fmt::Display,
{
    let &(moved, _) = order.get(index)?;
    let siblings: Vec<i64> = order
        .iter()
        .filter(|(id, _)| *id != moved)
        .map(|&(_, position)| position)
        .collect();

    match allocator.try_allocate(&siblings, index) {
        Ok(position) => Some((position, vec![(moved, position)])),
        Err(err) => {
            log::warn!("placing {}: {}; renumbering {} items", moved, err, order.len());
            let fresh = allocator.renumber(order.len());
            let position = *fresh.get(index)?;
            let mut writes: Vec<(T, i64)> = order
                .iter()
                .zip(&fresh)
                .filter(|((id, old), new)| *id != moved && old != *new)
                .map(|(&(id, _), &new)| (id, new))
                .collect();
            writes.push((moved, position));
            Some((position, writes))
        }
    }
}

/// Drag-and-drop state machine over an optimistic board snapshot.
///
/// `start_drag`, `drag_over` and `cancel_drag` are synchronous and only touch
/// the local snapshot. `end_drag` computes the final position, persists it
/// and replaces the snapshot with a fresh load from the store, whether the
/// store accepted the move or not.
pub struct ReorderEngine<S: BoardStore + ?Sized> {
    store: Arc<S>,
    allocator: PositionAllocator,
    active_board: Option<BoardId>,
    snapshot: Option<BoardSnapshot>,
    state: DragState,
    /// Snapshot as it was when the current gesture started
    pristine: Option<BoardSnapshot>,
    /// Set while a drop is being persisted; cleared by a completed reload
    stale: bool,
}

impl<S: BoardStore + ?Sized> ReorderEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_allocator(store, PositionAllocator::default())
    }

    /// Fails with [`KanbanError::ConfigError`] when the config does not
    /// validate
    pub fn with_config(store: Arc<S>, config: &ReorderConfig) -> Result<Self> {
        Ok(Self::with_allocator(store, PositionAllocator::new(config)?))
    }

    fn with_allocator(store: Arc<S>, allocator: PositionAllocator) -> Self {
        Self {
            store,
            allocator,
            active_board: None,
            snapshot: None,
            state: DragState::Idle,
            pristine: None,
            stale: false,
        }
    }

    /// The live snapshot to render
    pub fn snapshot(&self) -> Option<&BoardSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn active_board(&self) -> Option<BoardId> {
        self.active_board
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    /// True when a drop was interrupted before the board could be reloaded,
    /// so the snapshot may still show an unconfirmed move
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// The card currently being dragged, for drag overlays
    pub fn active_card(&self) -> Option<&Card> {
        let card = self.state.dragged_card()?;
        self.snapshot.as_ref()?.card(card)
    }

    /// Loads a board and makes it the active one. Any gesture in progress is
    /// dropped along with the old snapshot.
    pub async fn load_board(&mut self, id: BoardId) -> Result<&BoardSnapshot> {
        let fresh = self.store.get_board_with_data(id).await?;

        if self.state.is_dragging() {
            log::debug!("board {} loaded mid-drag; dropping gesture", id);
        }
        self.state = DragState::Idle;
        self.pristine = None;
        self.stale = false;
        self.active_board = Some(id);
        Ok(self.snapshot.insert(fresh))
    }

    /// Replaces the snapshot with the store's copy of the active board
    pub async fn reconcile(&mut self) -> Result<()> {
        let id = self.active_board.ok_or(KanbanError::NoActiveBoard)?;
        self.load_board(id).await?;
        Ok(())
    }

    /// Forgets the active board entirely
    pub fn close_board(&mut self) {
        self.active_board = None;
        self.snapshot = None;
        self.state = DragState::Idle;
        self.pristine = None;
        self.stale = false;
    }

    fn restore(&mut self, pristine: Option<BoardSnapshot>) {
        if let Some(pristine) = pristine {
            self.snapshot = Some(pristine);
        }
    }

    /// Begins dragging a card. A gesture already in progress is cancelled
    /// first. Returns false if the card is not on the board.
    pub fn start_drag(&mut self, card: CardId) -> bool {
        if self.state.is_dragging() {
            log::debug!("drag started during another drag; cancelling the previous one");
            self.cancel_drag();
        }

        let Some(snapshot) = self.snapshot.as_ref() else {
            return false;
        };
        let Some(origin) = snapshot.column_of_card(card) else {
            return false;
        };

        log::debug!("drag start: card {} from column {}", card, origin);
        self.pristine = Some(snapshot.clone());
        self.state = DragState::DraggingCard { origin, card };
        true
    }

    /// Shows the dragged card in the hovered column. Only crossing into a
    /// different column mutates the snapshot; reordering inside a column
    /// waits for the drop. Returns true if the snapshot changed.
    pub fn drag_over(&mut self, card: CardId, hovered: Uuid) -> bool {
        if self.state.dragged_card() != Some(card) {
            return false;
        }
        let Some(snapshot) = self.snapshot.as_mut() else {
            return false;
        };
        let Some(source) = snapshot.column_of_card(card) else {
            return false;
        };

        match snapshot.resolve_target(hovered) {
            DropTarget::Column { column, index } | DropTarget::Card { column, index, .. }
                if column != source =>
            {
                snapshot.relocate_card(card, column, index)
            }
            _ => false,
        }
    }

    /// Abandons the gesture and shows the board as it was before it started
    pub fn cancel_drag(&mut self) -> bool {
        let was_dragging = self.state.is_dragging();
        self.state = DragState::Idle;
        let pristine = self.pristine.take();
        self.restore(pristine);
        was_dragging
    }

    /// Drops a card on the hovered column or card and persists the result.
    ///
    /// Persistence failures are not returned as errors: the board is reloaded
    /// and the outcome is [`DropOutcome::RolledBack`]. An error means the
    /// reload itself failed; the pre-drag snapshot is shown and
    /// [`is_stale`](Self::is_stale) stays set.
    pub async fn end_drag(&mut self, card: CardId, hovered: Option<Uuid>) -> Result<DropOutcome> {
        let state = std::mem::take(&mut self.state);
        let pristine = self.pristine.take();
        log::debug!("drag end: card {} over {:?}", card, hovered);

        let origin = match state {
            DragState::DraggingCard { origin, card: dragged } if dragged == card => origin,
            _ => {
                self.restore(pristine);
                return Ok(DropOutcome::Ignored);
            }
        };
        let Some(hovered) = hovered else {
            self.restore(pristine);
            return Ok(DropOutcome::Ignored);
        };

        match self.plan_card_drop(card, hovered, origin, pristine) {
            Plan::Ignored => Ok(DropOutcome::Ignored),
            Plan::Unchanged => Ok(DropOutcome::Unchanged),
            Plan::Commit(plan) => self.commit(plan).await,
        }
    }

    fn plan_card_drop(
        &mut self,
        card: CardId,
        hovered: Uuid,
        origin: ColumnId,
        pristine: Option<BoardSnapshot>,
    ) -> Plan {
        let allocator = self.allocator;
        let Some(snapshot) = self.snapshot.as_mut() else {
            return Plan::Ignored;
        };
        let pristine = pristine.unwrap_or_else(|| snapshot.clone());

        let Some(current) = snapshot.column_of_card(card) else {
            *snapshot = pristine;
            return Plan::Ignored;
        };
        let target = snapshot.resolve_target(hovered);
        let (Some(target_column), Some(target_index)) = (target.column(), target.index()) else {
            *snapshot = pristine;
            return Plan::Ignored;
        };

        if origin == target_column && current == target_column {
            let Some(old) = snapshot.column(current).and_then(|c| c.card_index(card)) else {
                *snapshot = pristine;
                return Plan::Ignored;
            };
            // Dropping on the column itself lands after its last card.
            let new = match target {
                DropTarget::Card { .. } => target_index,
                _ => target_index.saturating_sub(1),
            };
            snapshot.reorder_cards(current, old, new);
        } else if current != target_column {
            snapshot.relocate_card(card, target_column, target_index);
        }
        // Otherwise an over already placed the card in the target column and
        // it stays at the index shown there.

        let kind = if origin == target_column {
            MoveKind::Reorder
        } else {
            MoveKind::Transfer
        };

        let Some(column) = snapshot.column(target_column) else {
            *snapshot = pristine;
            return Plan::Ignored;
        };
        if kind == MoveKind::Reorder
            && pristine.column(origin).map(ColumnWithCards::card_ids) == Some(column.card_ids())
        {
            log::debug!("drop: card {} back at its starting index", card);
            *snapshot = pristine;
            return Plan::Unchanged;
        }

        let order: Vec<(CardId, i64)> = column.cards.iter().map(|c| (c.id, c.position)).collect();
        let placed = column
            .card_index(card)
            .and_then(|index| place(&allocator, &order, index));
        let Some((position, positions)) = placed else {
            *snapshot = pristine;
            return Plan::Ignored;
        };

        for &(id, p) in &positions {
            snapshot.set_card_position(id, p);
        }

        Plan::Commit(DropPlan {
            placement: Placement::Card {
                card,
                column: target_column,
                position,
                kind,
            },
            writes: Writes::Cards {
                column: target_column,
                positions,
            },
            pristine,
        })
    }

    /// Begins dragging a whole column
    pub fn start_column_drag(&mut self, column: ColumnId) -> bool {
        if self.state.is_dragging() {
            self.cancel_drag();
        }

        let Some(snapshot) = self.snapshot.as_ref() else {
            return false;
        };
        if snapshot.column(column).is_none() {
            return false;
        }

        log::debug!("drag start: column {}", column);
        self.pristine = Some(snapshot.clone());
        self.state = DragState::DraggingColumn { column };
        true
    }

    /// Drops a column on the hovered column (or on any card inside it)
    pub async fn end_column_drag(
        &mut self,
        column: ColumnId,
        hovered: Option<Uuid>,
    ) -> Result<DropOutcome> {
        let state = std::mem::take(&mut self.state);
        let pristine = self.pristine.take();
        log::debug!("drag end: column {} over {:?}", column, hovered);

        let dragging_this = state == DragState::DraggingColumn { column };
        let Some(hovered) = hovered.filter(|_| dragging_this) else {
            self.restore(pristine);
            return Ok(DropOutcome::Ignored);
        };

        match self.plan_column_drop(column, hovered, pristine) {
            Plan::Ignored => Ok(DropOutcome::Ignored),
            Plan::Unchanged => Ok(DropOutcome::Unchanged),
            Plan::Commit(plan) => self.commit(plan).await,
        }
    }

    fn plan_column_drop(
        &mut self,
        column: ColumnId,
        hovered: Uuid,
        pristine: Option<BoardSnapshot>,
    ) -> Plan {
        let allocator = self.allocator;
        let Some(snapshot) = self.snapshot.as_mut() else {
            return Plan::Ignored;
        };
        let pristine = pristine.unwrap_or_else(|| snapshot.clone());

        let old = snapshot.column_index(column);
        let new = snapshot
            .resolve_column(hovered)
            .and_then(|target| snapshot.column_index(target));
        let (Some(old), Some(new)) = (old, new) else {
            *snapshot = pristine;
            return Plan::Ignored;
        };
        if old == new {
            *snapshot = pristine;
            return Plan::Unchanged;
        }

        snapshot.reorder_columns(old, new);
        let order: Vec<(ColumnId, i64)> = snapshot
            .columns
            .iter()
            .map(|c| (c.column.id, c.column.position))
            .collect();
        let Some((position, positions)) = place(&allocator, &order, new) else {
            *snapshot = pristine;
            return Plan::Ignored;
        };

        for &(id, p) in &positions {
            snapshot.set_column_position(id, p);
        }

        Plan::Commit(DropPlan {
            placement: Placement::Column { column, position },
            writes: Writes::Columns(positions),
            pristine,
        })
    }

    /// A single write goes through `move_card`/`move_column`. A renumbered
    /// list is written as one all-or-nothing batch.
    async fn persist(&self, writes: &Writes) -> Result<()> {
        match writes {
            Writes::Cards { column, positions } => match positions.as_slice() {
                [(card, position)] => self.store.move_card(*card, *column, *position).await,
                _ => self.store.set_card_positions(*column, positions).await,
            },
            Writes::Columns(positions) => match positions.as_slice() {
                [(column, position)] => self.store.move_column(*column, *position).await,
                _ => self.store.set_column_positions(positions).await,
            },
        }
    }

    async fn commit(&mut self, plan: DropPlan) -> Result<DropOutcome> {
        let DropPlan {
            placement,
            writes,
            pristine,
        } = plan;
        let Some(board) = self.active_board else {
            self.snapshot = Some(pristine);
            return Ok(DropOutcome::Ignored);
        };

        self.stale = true;
        let persisted = self.persist(&writes).await;

        match self.store.get_board_with_data(board).await {
            Ok(fresh) => {
                self.snapshot = Some(fresh);
                self.stale = false;
            }
            Err(err) => {
                log::error!("reload of board {} after drop failed: {}", board, err);
                self.snapshot = Some(pristine);
                return Err(err);
            }
        }

        match persisted {
            Ok(()) => {
                log::info!("drop committed: {:?}", placement);
                Ok(DropOutcome::Committed {
                    placement,
                    renumbered: writes.len().saturating_sub(1),
                })
            }
            Err(err) => {
                log::warn!("drop rejected by store, board reloaded: {}", err);
                Ok(DropOutcome::RolledBack {
                    placement,
                    error: err.to_string(),
                })
            }
        }
    }

    pub async fn list_boards(&self) -> Result<Vec<Board>> {
        self.store.list_boards().await
    }

    pub async fn create_board(&mut self, title: &str) -> Result<Board> {
        self.store.create_board(title).await
    }

    pub async fn rename_board(&mut self, id: BoardId, title: &str) -> Result<Board> {
        let board = self.store.update_board(id, title).await?;
        if self.active_board == Some(id) {
            self.reconcile().await?;
        }
        Ok(board)
    }

    /// Deletes a board. If it was the active one, the first remaining board
    /// becomes active, or nothing is shown when none remain.
    pub async fn delete_board(&mut self, id: BoardId) -> Result<()> {
        self.store.delete_board(id).await?;
        if self.active_board != Some(id) {
            return Ok(());
        }

        match self.store.list_boards().await?.first() {
            Some(next) => {
                self.load_board(next.id).await?;
            }
            None => self.close_board(),
        }
        Ok(())
    }

    pub async fn create_column(&mut self, title: &str) -> Result<Column> {
        let board = self.active_board.ok_or(KanbanError::NoActiveBoard)?;
        let column = self.store.create_column(board, title).await?;
        self.reconcile().await?;
        Ok(column)
    }

    pub async fn rename_column(&mut self, id: ColumnId, title: &str) -> Result<Column> {
        let column = self.store.rename_column(id, title).await?;
        self.reconcile().await?;
        Ok(column)
    }

    pub async fn delete_column(
        &mut self,
        id: ColumnId,
        move_cards_to: Option<ColumnId>,
    ) -> Result<()> {
        self.store.delete_column(id, move_cards_to).await?;
        self.reconcile().await
    }

    pub async fn create_card(&mut self, column: ColumnId, title: &str) -> Result<Card> {
        let card = self.store.create_card(column, title).await?;
        self.reconcile().await?;
        Ok(card)
    }

    pub async fn update_card(&mut self, id: CardId, update: &CardUpdate) -> Result<Card> {
        let card = self.store.update_card(id, update).await?;
        self.reconcile().await?;
        Ok(card)
    }

    pub async fn delete_card(&mut self, id: CardId) -> Result<()> {
        self.store.delete_card(id).await?;
        self.reconcile().await
    }

    pub async fn search_cards(&self, query: &str) -> Result<Vec<Card>> {
        let board = self.active_board.ok_or(KanbanError::NoActiveBoard)?;
        self.store.search_cards(board, query).await
    }

    /// The active board with only cards of one priority. The live snapshot
    /// is left untouched.
    pub async fn filter_cards(&self, priority: Priority) -> Result<BoardSnapshot> {
        let board = self.active_board.ok_or(KanbanError::NoActiveBoard)?;
        self.store.filter_cards(board, priority).await
    }
}
