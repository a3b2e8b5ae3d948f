//! Undo/redo history for document edits.
//!
//! Two entry flavors share one pair of stacks. A `Snapshot` captures the
//! whole persisted document (plus the overlay sidecar when the overlay was
//! not committed first) and is used for structural or committing operations.
//! A `Granular` entry describes a single reversible overlay action and never
//! touches the document bytes.
//!
//! Recording a new entry clears the redo stack. Undoing moves an entry to
//! the redo stack; redoing moves it back. The undo stack is capped, dropping
//! the oldest entry once the cap is reached.

use crate::annotation::{Annotation, AnnotationArena};

/// Maximum number of undoable steps kept in memory. Snapshots carry full
/// document bytes, so this also bounds peak memory for large files.
pub const MAX_HISTORY: usize = 50;

/// Full capture of the persisted document at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub pdf_bytes: Vec<u8>,
    /// Serialized overlay annotations, present only when the snapshot was
    /// taken without committing the overlay first.
    pub sidecar: Option<String>,
}

/// Before/after record for an in-place change to a single annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub before: Annotation,
    pub after: Annotation,
}

/// One reversible overlay action, carrying everything needed to undo and
/// redo it without consulting the document bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum GranularAction {
    Add(Annotation),
    Delete(Annotation),
    Move(StateChange),
    Resize(StateChange),
    Modify(StateChange),
}

impl GranularAction {
    pub fn label(&self) -> &'static str {
        match self {
            GranularAction::Add(_) => "add",
            GranularAction::Delete(_) => "delete",
            GranularAction::Move(_) => "move",
            GranularAction::Resize(_) => "resize",
            GranularAction::Modify(_) => "modify",
        }
    }

    /// Undo this action against the arena.
    pub fn revert(&self, arena: &mut AnnotationArena) {
        match self {
            GranularAction::Add(annotation) => {
                arena.remove(annotation.id);
            }
            GranularAction::Delete(annotation) => {
                arena.put(annotation.clone());
            }
            GranularAction::Move(change)
            | GranularAction::Resize(change)
            | GranularAction::Modify(change) => {
                arena.put(change.before.clone());
            }
        }
    }

    /// Redo this action against the arena.
    pub fn apply(&self, arena: &mut AnnotationArena) {
        match self {
            GranularAction::Add(annotation) => {
                arena.put(annotation.clone());
            }
            GranularAction::Delete(annotation) => {
                arena.remove(annotation.id);
            }
            GranularAction::Move(change)
            | GranularAction::Resize(change)
            | GranularAction::Modify(change) => {
                arena.put(change.after.clone());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    Snapshot(Snapshot),
    Granular(GranularAction),
}

impl HistoryEntry {
    pub fn label(&self) -> &'static str {
        match self {
            HistoryEntry::Snapshot(_) => "snapshot",
            HistoryEntry::Granular(action) => action.label(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct History {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    max: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_limit(MAX_HISTORY)
    }

    pub fn with_limit(max: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            max,
        }
    }

    /// Records a new entry. Any previously undone entries become
    /// unreachable, and the oldest entry is dropped once the cap is hit.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        self.undo.push(entry);
        if self.undo.len() > self.max {
            self.undo.remove(0);
        }
    }

    /// Takes the most recent undoable entry. The caller applies it and then
    /// pushes the matching redo entry via [`History::push_redo`].
    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo.pop()
    }

    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo.pop()
    }

    /// Returns an entry to the undo stack during redo. Does not clear the
    /// redo stack; only [`History::record`] does that.
    pub fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
    }

    pub fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationKind;
    use crate::geometry::WrapperBox;
    use pretty_assertions::assert_eq;

    fn redact(id: u64, x: f64) -> Annotation {
        Annotation {
            id,
            page_index: 0,
            rect: WrapperBox::new(x, 10.0, 50.0, 30.0),
            kind: AnnotationKind::Redact,
        }
    }

    fn snapshot_entry(byte: u8) -> HistoryEntry {
        HistoryEntry::Snapshot(Snapshot {
            pdf_bytes: vec![byte],
            sidecar: None,
        })
    }

    #[test]
    fn record_clears_redo() {
        let mut history = History::new();
        history.record(snapshot_entry(1));
        history.record(snapshot_entry(2));

        let entry = history.pop_undo().unwrap();
        history.push_redo(entry);
        assert!(history.can_redo());

        history.record(snapshot_entry(3));
        assert!(!history.can_redo());
        assert_eq!(history.undo_depth(), 2);
    }

    #[test]
    fn cap_drops_oldest_entry() {
        let mut history = History::with_limit(3);
        for byte in 1..=4u8 {
            history.record(snapshot_entry(byte));
        }
        assert_eq!(history.undo_depth(), 3);

        let mut bytes = Vec::new();
        while let Some(HistoryEntry::Snapshot(snapshot)) = history.pop_undo() {
            bytes.push(snapshot.pdf_bytes[0]);
        }
        assert_eq!(bytes, vec![4, 3, 2]);
    }

    #[test]
    fn entries_move_between_stacks_unchanged() {
        let mut history = History::new();
        let action = GranularAction::Add(redact(1, 0.0));
        history.record(HistoryEntry::Granular(action.clone()));

        let popped = history.pop_undo().unwrap();
        assert_eq!(popped, HistoryEntry::Granular(action.clone()));
        history.push_redo(popped);

        let back = history.pop_redo().unwrap();
        assert_eq!(back, HistoryEntry::Granular(action));
        history.push_undo(back);
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.redo_depth(), 0);
    }

    #[test]
    fn add_reverts_by_removing() {
        let mut arena = AnnotationArena::new();
        let id = arena.insert(0, WrapperBox::new(0.0, 10.0, 50.0, 30.0), AnnotationKind::Redact);
        let action = GranularAction::Add(arena.get(id).unwrap().clone());

        action.revert(&mut arena);
        assert!(arena.get(id).is_none());

        action.apply(&mut arena);
        assert!(arena.get(id).is_some());
    }

    #[test]
    fn delete_reverts_by_reinserting() {
        let mut arena = AnnotationArena::new();
        let id = arena.insert(0, WrapperBox::new(0.0, 10.0, 50.0, 30.0), AnnotationKind::Redact);
        let removed = arena.remove(id).unwrap();
        let action = GranularAction::Delete(removed.clone());

        action.revert(&mut arena);
        assert_eq!(arena.get(id), Some(&removed));

        action.apply(&mut arena);
        assert!(arena.get(id).is_none());
    }

    #[test]
    fn move_restores_before_and_after_states() {
        let mut arena = AnnotationArena::new();
        let before = redact(1, 0.0);
        let after = redact(1, 40.0);
        arena.put(after.clone());

        let action = GranularAction::Move(StateChange {
            before: before.clone(),
            after: after.clone(),
        });

        action.revert(&mut arena);
        assert_eq!(arena.get(1), Some(&before));

        action.apply(&mut arena);
        assert_eq!(arena.get(1), Some(&after));
    }

    #[test]
    fn undo_redo_round_trip_restores_arena() {
        let mut arena = AnnotationArena::new();
        let id = arena.insert(0, WrapperBox::new(5.0, 5.0, 20.0, 20.0), AnnotationKind::Extract);
        let original = arena.capture();

        let mut moved = arena.get(id).unwrap().clone();
        let before = moved.clone();
        moved.rect.x += 100.0;
        arena.put(moved.clone());

        let action = GranularAction::Move(StateChange {
            before,
            after: moved,
        });
        let changed = arena.capture();

        action.revert(&mut arena);
        assert_eq!(arena.capture(), original);
        action.apply(&mut arena);
        assert_eq!(arena.capture(), changed);
    }
}
