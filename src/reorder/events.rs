use crate::{
    domain::{CardId, ColumnId},
    error::Result,
    reorder::{
        engine::ReorderEngine,
        state::{DragState, DropOutcome},
    },
    storage::BoardStore,
};
use uuid::Uuid;

/// Raw pointer events as a view reports them. Ids are untyped; the engine
/// works out whether they name a card or a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEvent {
    Start { active: Uuid },
    Over { active: Uuid, over: Option<Uuid> },
    End { active: Uuid, over: Option<Uuid> },
    Cancel,
}

impl<S: BoardStore + ?Sized> ReorderEngine<S> {
    /// Feeds one view event to the engine.
    ///
    /// Returns the drop outcome for `End` and `Cancel`, `None` otherwise.
    pub async fn handle(&mut self, event: DragEvent) -> Result<Option<DropOutcome>> {
        match event {
            DragEvent::Start { active } => {
                let column = ColumnId::from(active);
                let is_column = self
                    .snapshot()
                    .is_some_and(|snapshot| snapshot.column(column).is_some());
                if is_column {
                    self.start_column_drag(column);
                } else {
                    self.start_drag(CardId::from(active));
                }
                Ok(None)
            }
            DragEvent::Over { active, over } => {
                if let Some(over) = over {
                    self.drag_over(CardId::from(active), over);
                }
                Ok(None)
            }
            DragEvent::End { active, over } => {
                let outcome = match self.state() {
                    DragState::DraggingColumn { column } if column.as_uuid() == active => {
                        self.end_column_drag(column, over).await?
                    }
                    DragState::DraggingCard { card, .. } if card.as_uuid() == active => {
                        self.end_drag(card, over).await?
                    }
                    _ => {
                        self.cancel_drag();
                        DropOutcome::Ignored
                    }
                };
                Ok(Some(outcome))
            }
            DragEvent::Cancel => {
                self.cancel_drag();
                Ok(Some(DropOutcome::Ignored))
            }
        }
    }
}
