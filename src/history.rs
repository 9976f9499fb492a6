use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::HISTORY_MAX_LENGTH;
use crate::diagram::Diagram;
use crate::session::DiagramStore;

type Replay = Box<dyn Fn(&mut dyn DiagramStore)>;

/// One completed, reversible diagram mutation.
pub struct HistoryOperation {
    pub diagram_id: String,
    pub description: String,
    undo: Replay,
    redo: Replay,
}

impl HistoryOperation {
    pub fn new(
        diagram_id: impl Into<String>,
        description: impl Into<String>,
        undo: impl Fn(&mut dyn DiagramStore) + 'static,
        redo: impl Fn(&mut dyn DiagramStore) + 'static,
    ) -> Self {
        Self {
            diagram_id: diagram_id.into(),
            description: description.into(),
            undo: Box::new(undo),
            redo: Box::new(redo),
        }
    }

    /// Operation that swaps whole diagram revisions stored under `diagram_id`.
    pub fn snapshot(
        diagram_id: impl Into<String>,
        description: impl Into<String>,
        before: Arc<Diagram>,
        after: Arc<Diagram>,
    ) -> Self {
        let diagram_id = diagram_id.into();
        let undo_id = diagram_id.clone();
        let redo_id = diagram_id.clone();
        Self::new(
            diagram_id,
            description,
            move |store| store.set(&undo_id, Arc::clone(&before)),
            move |store| store.set(&redo_id, Arc::clone(&after)),
        )
    }

    pub fn undo(&self, store: &mut dyn DiagramStore) {
        (self.undo)(store)
    }

    pub fn redo(&self, store: &mut dyn DiagramStore) {
        (self.redo)(store)
    }
}

impl fmt::Debug for HistoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryOperation")
            .field("diagram_id", &self.diagram_id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Undo/redo stacks shared by every diagram of a session. Each operation is tagged
/// with its diagram, so undo in one diagram skips entries of the others.
#[derive(Debug)]
pub struct History {
    past: VecDeque<HistoryOperation>,
    future: VecDeque<HistoryOperation>,
    max_length: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_MAX_LENGTH)
    }
}

impl History {
    pub fn new(max_length: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: VecDeque::new(),
            max_length,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Records a new operation. Any redo entries are discarded.
    pub fn add(&mut self, operation: HistoryOperation) {
        debug!(
            diagram = %operation.diagram_id,
            description = %operation.description,
            "history entry added"
        );
        self.past.push_back(operation);
        self.truncate_past();
        self.future.clear();
    }

    fn truncate_past(&mut self) {
        while self.past.len() > self.max_length {
            self.past.pop_front();
        }
    }

    /// Undoes the most recent operation of `diagram_id`. Returns `false` if there is none.
    pub fn undo(&mut self, diagram_id: &str, store: &mut dyn DiagramStore) -> bool {
        let Some(index) = self.past.iter().rposition(|op| op.diagram_id == diagram_id) else {
            return false;
        };
        let Some(operation) = self.past.remove(index) else {
            return false;
        };
        debug!(diagram = %diagram_id, description = %operation.description, "undo");
        operation.undo(store);
        self.future.push_front(operation);
        true
    }

    /// Redoes the next undone operation of `diagram_id`. Returns `false` if there is none.
    pub fn redo(&mut self, diagram_id: &str, store: &mut dyn DiagramStore) -> bool {
        let Some(index) = self.future.iter().position(|op| op.diagram_id == diagram_id) else {
            return false;
        };
        let Some(operation) = self.future.remove(index) else {
            return false;
        };
        debug!(diagram = %diagram_id, description = %operation.description, "redo");
        operation.redo(store);
        self.past.push_back(operation);
        self.truncate_past();
        true
    }

    pub fn can_undo(&self, diagram_id: &str) -> bool {
        self.past.iter().any(|op| op.diagram_id == diagram_id)
    }

    pub fn can_redo(&self, diagram_id: &str) -> bool {
        self.future.iter().any(|op| op.diagram_id == diagram_id)
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    /// Descriptions of the undoable operations, oldest first.
    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.past.iter().map(|op| op.description.as_str())
    }

    /// Drops every entry of a diagram that is no longer open.
    pub fn forget(&mut self, diagram_id: &str) {
        self.past.retain(|op| op.diagram_id != diagram_id);
        self.future.retain(|op| op.diagram_id != diagram_id);
    }
}
