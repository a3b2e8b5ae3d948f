//! One open document and everything editable about it.
//!
//! `EditorSession` is the explicit context the rest of an application talks
//! to. It owns the PDF bytes, the overlay arena, tool settings, the history
//! stacks, and the single active-gesture slot. Overlay edits are cheap
//! granular history entries; committing and structural page operations push
//! full snapshots, so undo restores document bytes and overlay together.

use crate::annotation::{
    Annotation, AnnotationArena, AnnotationId, AnnotationKind, Background, FormFieldKind,
    LineEnds, ShapeKind, ShapeStyle, TextStyle,
};
use crate::commit::commit_annotations;
use crate::error::EditError;
use crate::geometry::{Handle, Point, WrapperBox, MIN_WRAPPER_SIZE};
use crate::history::{GranularAction, History, HistoryEntry, Snapshot, StateChange};
use crate::image;
use crate::interaction::{
    ActiveGesture, GestureEnd, GestureState, Modifiers, MoveGesture, ResizeGesture, RotateGesture,
};
use crate::modes::{Mode, ToolState};
use crate::pages;

/// Pointer drags smaller than this in both axes are stray clicks and
/// produce no annotation.
const MIN_DRAG: f64 = 2.0;

const DEFAULT_TEXT_SIZE: (f64, f64) = (200.0, 30.0);
const DEFAULT_NOTE_SIZE: (f64, f64) = (200.0, 150.0);

pub struct EditorSession {
    doc_bytes: Vec<u8>,
    arena: AnnotationArena,
    mode: Mode,
    pub tools: ToolState,
    history: History,
    gesture: Option<GestureState>,
    dirty: bool,
}

impl EditorSession {
    /// Opens a session over raw PDF bytes, validating them up front.
    pub fn open(pdf_bytes: Vec<u8>) -> Result<Self, EditError> {
        pages::page_count(&pdf_bytes)?;
        Ok(Self {
            doc_bytes: pdf_bytes,
            arena: AnnotationArena::new(),
            mode: Mode::default(),
            tools: ToolState::default(),
            history: History::new(),
            gesture: None,
            dirty: false,
        })
    }

    pub fn pdf_bytes(&self) -> &[u8] {
        &self.doc_bytes
    }

    pub fn page_count(&self) -> Result<usize, EditError> {
        pages::page_count(&self.doc_bytes)
    }

    pub fn page_size(&self, page_index: usize) -> Result<(f64, f64), EditError> {
        pages::page_size(&self.doc_bytes, page_index)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Selecting the active mode a second time toggles back to select.
    pub fn set_mode(&mut self, requested: Mode) {
        self.mode = self.mode.toggle(requested);
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.arena.iter()
    }

    pub fn annotations_on_page(&self, page_index: usize) -> impl Iterator<Item = &Annotation> {
        self.arena.for_page(page_index)
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.arena.get(id)
    }

    /// Topmost annotation under the pointer, honoring wrapper rotation.
    pub fn annotation_at(&self, page_index: usize, point: Point) -> Option<&Annotation> {
        self.arena.annotation_at(page_index, point)
    }

    /// True once anything changed since the last [`EditorSession::mark_saved`].
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn record_entry(&mut self, entry: HistoryEntry) {
        self.history.record(entry);
        self.dirty = true;
    }

    /// Records a caller-composed reversible action.
    pub fn record_action(&mut self, action: GranularAction) {
        self.record_entry(HistoryEntry::Granular(action));
    }

    /// Pushes an undo snapshot of the current state, optionally committing
    /// the overlay into the document bytes first. Nothing is pushed when
    /// serialization or the commit fails, so the stacks stay consistent.
    pub fn save_state(&mut self, commit: bool) -> Result<(), EditError> {
        let records = self.arena.capture();
        let sidecar =
            serde_json::to_string(&records).map_err(|e| EditError::Save(e.to_string()))?;
        let snapshot = Snapshot {
            pdf_bytes: self.doc_bytes.clone(),
            sidecar: Some(sidecar),
        };
        if commit {
            tracing::debug!(annotations = records.len(), "committing overlay before snapshot");
            self.doc_bytes = commit_annotations(&self.doc_bytes, &records)?;
            self.arena.remove_committable();
        }
        self.record_entry(HistoryEntry::Snapshot(snapshot));
        Ok(())
    }

    /// Reverses the most recent history entry. Returns `Ok(false)` when
    /// there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, EditError> {
        let Some(entry) = self.history.pop_undo() else {
            return Ok(false);
        };
        match entry {
            HistoryEntry::Granular(action) => {
                action.revert(&mut self.arena);
                self.history.push_redo(HistoryEntry::Granular(action));
            }
            HistoryEntry::Snapshot(snapshot) => match self.swap_snapshot(snapshot) {
                Ok(previous) => self.history.push_redo(HistoryEntry::Snapshot(previous)),
                Err((snapshot, e)) => {
                    self.history.push_undo(HistoryEntry::Snapshot(snapshot));
                    return Err(e);
                }
            },
        }
        self.dirty = true;
        Ok(true)
    }

    /// Re-applies the most recently undone entry. Returns `Ok(false)` when
    /// there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool, EditError> {
        let Some(entry) = self.history.pop_redo() else {
            return Ok(false);
        };
        match entry {
            HistoryEntry::Granular(action) => {
                action.apply(&mut self.arena);
                self.history.push_undo(HistoryEntry::Granular(action));
            }
            HistoryEntry::Snapshot(snapshot) => match self.swap_snapshot(snapshot) {
                Ok(previous) => self.history.push_undo(HistoryEntry::Snapshot(previous)),
                Err((snapshot, e)) => {
                    self.history.push_redo(HistoryEntry::Snapshot(snapshot));
                    return Err(e);
                }
            },
        }
        self.dirty = true;
        Ok(true)
    }

    /// Installs `snapshot` as the live state and returns a snapshot of what
    /// it replaced. On failure the session is untouched and the input is
    /// handed back so the caller can reinstate it.
    fn swap_snapshot(&mut self, snapshot: Snapshot) -> Result<Snapshot, (Snapshot, EditError)> {
        let current_sidecar = match serde_json::to_string(&self.arena.capture()) {
            Ok(json) => json,
            Err(e) => return Err((snapshot, EditError::Save(e.to_string()))),
        };
        let restored: Vec<Annotation> = match &snapshot.sidecar {
            Some(json) => match serde_json::from_str(json) {
                Ok(records) => records,
                Err(e) => return Err((snapshot, EditError::Parse(e.to_string()))),
            },
            None => Vec::new(),
        };
        let previous = Snapshot {
            pdf_bytes: std::mem::replace(&mut self.doc_bytes, snapshot.pdf_bytes),
            sidecar: Some(current_sidecar),
        };
        self.arena.restore(restored);
        Ok(previous)
    }

    /// All live annotations ordered by id: the exact sidecar shape drafts
    /// and snapshots store.
    pub fn capture_annotation_state(&self) -> Vec<Annotation> {
        self.arena.capture()
    }

    /// Replaces the overlay with previously captured records.
    pub fn restore_annotation_state(&mut self, records: Vec<Annotation>) {
        self.arena.restore(records);
    }

    fn insert_recorded(
        &mut self,
        page_index: usize,
        rect: WrapperBox,
        kind: AnnotationKind,
    ) -> AnnotationId {
        let id = self.arena.insert(page_index, rect, kind);
        if let Some(annotation) = self.arena.get(id) {
            let action = GranularAction::Add(annotation.clone());
            self.record_entry(HistoryEntry::Granular(action));
        }
        id
    }

    /// Places a text box with the session's current text settings.
    pub fn add_text(&mut self, page_index: usize, at: Point, text: &str) -> AnnotationId {
        let rect = WrapperBox::new(at.x, at.y, DEFAULT_TEXT_SIZE.0, DEFAULT_TEXT_SIZE.1);
        let kind = AnnotationKind::Text {
            text: text.to_string(),
            style: self.tools.text.clone(),
            background: self.tools.text_background.clone(),
        };
        self.insert_recorded(page_index, rect, kind)
    }

    /// Places a sticky note anchored by page fractions (0..1), converted to
    /// page pixels so the arena keeps a single coordinate space.
    pub fn add_note(
        &mut self,
        page_index: usize,
        anchor: Point,
        text: &str,
    ) -> Result<AnnotationId, EditError> {
        let (page_width, page_height) = self.page_size(page_index)?;
        let rect = WrapperBox::new(
            anchor.x * page_width,
            anchor.y * page_height,
            DEFAULT_NOTE_SIZE.0,
            DEFAULT_NOTE_SIZE.1,
        );
        let kind = AnnotationKind::Note {
            text: text.to_string(),
            style: self.tools.note.clone(),
            collapsed: false,
        };
        Ok(self.insert_recorded(page_index, rect, kind))
    }

    /// Drops an image centered on `at`, scaled down to the standard width
    /// cap when the source is wider.
    pub fn add_image(
        &mut self,
        page_index: usize,
        at: Point,
        bytes: Vec<u8>,
    ) -> Result<AnnotationId, EditError> {
        self.place_image(page_index, at, bytes, image::MAX_IMAGE_WIDTH)
    }

    /// Signature stamps share the image pipeline with a tighter cap.
    pub fn add_signature_image(
        &mut self,
        page_index: usize,
        at: Point,
        bytes: Vec<u8>,
    ) -> Result<AnnotationId, EditError> {
        self.place_image(page_index, at, bytes, image::MAX_SIGNATURE_WIDTH)
    }

    fn place_image(
        &mut self,
        page_index: usize,
        at: Point,
        bytes: Vec<u8>,
        max_width: f64,
    ) -> Result<AnnotationId, EditError> {
        let (width, height) = image::dimensions(&bytes)?;
        let (w, h) = image::placement_size(width, height, max_width);
        let rect = WrapperBox::new(at.x - w / 2.0, at.y - h / 2.0, w, h);
        Ok(self.insert_recorded(page_index, rect, AnnotationKind::Image { bytes }))
    }

    /// Normalizes a drag into a shape wrapper. Degenerate clicks produce
    /// nothing; line and arrow endpoints stay wrapper-local.
    pub fn add_shape(
        &mut self,
        page_index: usize,
        shape: ShapeKind,
        from: Point,
        to: Point,
    ) -> Option<AnnotationId> {
        let dx = (to.x - from.x).abs();
        let dy = (to.y - from.y).abs();
        if dx < MIN_DRAG && dy < MIN_DRAG {
            return None;
        }

        let x = from.x.min(to.x);
        let y = from.y.min(to.y);
        let rect = WrapperBox::new(x, y, dx.max(MIN_WRAPPER_SIZE), dy.max(MIN_WRAPPER_SIZE));
        let ends = shape.has_endpoints().then(|| LineEnds {
            start: Point::new(from.x - x, from.y - y),
            end: Point::new(to.x - x, to.y - y),
        });
        let kind = AnnotationKind::Shape {
            shape,
            style: self.tools.shape.clone(),
            ends,
        };
        Some(self.insert_recorded(page_index, rect, kind))
    }

    /// Freehand highlight stroke; needs at least two points.
    pub fn add_highlight(&mut self, page_index: usize, points: Vec<Point>) -> Option<AnnotationId> {
        if points.len() < 2 {
            return None;
        }
        let mut min = points[0];
        let mut max = points[0];
        for p in &points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        let rect = WrapperBox::new(
            min.x,
            min.y,
            (max.x - min.x).max(1.0),
            (max.y - min.y).max(1.0),
        );
        let kind = AnnotationKind::Highlight {
            points,
            style: self.tools.highlight.clone(),
        };
        Some(self.insert_recorded(page_index, rect, kind))
    }

    /// Marks an area for white-out at commit time.
    pub fn add_redact_area(
        &mut self,
        page_index: usize,
        from: Point,
        to: Point,
    ) -> Option<AnnotationId> {
        self.add_marked_area(page_index, from, to, AnnotationKind::Redact)
    }

    /// Marks an area with a translucent extraction overlay.
    pub fn add_extract_area(
        &mut self,
        page_index: usize,
        from: Point,
        to: Point,
    ) -> Option<AnnotationId> {
        self.add_marked_area(page_index, from, to, AnnotationKind::Extract)
    }

    fn add_marked_area(
        &mut self,
        page_index: usize,
        from: Point,
        to: Point,
        kind: AnnotationKind,
    ) -> Option<AnnotationId> {
        let dx = (to.x - from.x).abs();
        let dy = (to.y - from.y).abs();
        if dx < MIN_DRAG && dy < MIN_DRAG {
            return None;
        }
        let rect = WrapperBox::new(from.x.min(to.x), from.y.min(to.y), dx, dy);
        Some(self.insert_recorded(page_index, rect, kind))
    }

    /// Places a form-field box sized for its kind.
    pub fn add_form_field(
        &mut self,
        page_index: usize,
        field: FormFieldKind,
        at: Point,
    ) -> AnnotationId {
        let (w, h) = match field {
            FormFieldKind::TextField => (200.0, 30.0),
            FormFieldKind::Checkbox | FormFieldKind::Radio => (20.0, 20.0),
            FormFieldKind::Dropdown => (150.0, 30.0),
            FormFieldKind::Signature => (200.0, 60.0),
        };
        let kind = AnnotationKind::FormField {
            field,
            style: self.tools.form.clone(),
        };
        self.insert_recorded(page_index, WrapperBox::new(at.x, at.y, w, h), kind)
    }

    /// Applies a watermark to one page, replacing any existing one there.
    pub fn add_watermark(
        &mut self,
        page_index: usize,
        text: &str,
    ) -> Result<AnnotationId, EditError> {
        let (page_width, page_height) = self.page_size(page_index)?;
        let existing: Vec<AnnotationId> = self
            .arena
            .for_page(page_index)
            .filter(|a| matches!(a.kind, AnnotationKind::Watermark { .. }))
            .map(|a| a.id)
            .collect();
        for id in existing {
            self.delete_annotation(id)?;
        }
        let rect = WrapperBox::new(0.0, 0.0, page_width, page_height);
        let kind = AnnotationKind::Watermark {
            text: text.to_string(),
            style: self.tools.watermark.clone(),
        };
        Ok(self.insert_recorded(page_index, rect, kind))
    }

    pub fn delete_annotation(&mut self, id: AnnotationId) -> Result<(), EditError> {
        let removed = self
            .arena
            .remove(id)
            .ok_or(EditError::AnnotationNotFound(id))?;
        self.record_entry(HistoryEntry::Granular(GranularAction::Delete(removed)));
        Ok(())
    }

    /// Applies an in-place change and records it, skipping the record when
    /// nothing changed. `mutate` returns false when the annotation is not
    /// the kind the caller expected.
    fn modify_annotation<F>(&mut self, id: AnnotationId, mutate: F) -> Result<(), EditError>
    where
        F: FnOnce(&mut Annotation) -> bool,
    {
        let before = self
            .arena
            .get(id)
            .cloned()
            .ok_or(EditError::AnnotationNotFound(id))?;
        let mut after = before.clone();
        if !mutate(&mut after) {
            return Err(EditError::AnnotationNotFound(id));
        }
        if after == before {
            return Ok(());
        }
        self.arena.put(after.clone());
        self.record_entry(HistoryEntry::Granular(GranularAction::Modify(StateChange {
            before,
            after,
        })));
        Ok(())
    }

    pub fn update_text_content(&mut self, id: AnnotationId, text: &str) -> Result<(), EditError> {
        self.modify_annotation(id, |a| match &mut a.kind {
            AnnotationKind::Text { text: existing, .. } => {
                *existing = text.to_string();
                true
            }
            _ => false,
        })
    }

    /// Restyles a text box. Alpha zero forces the transparent flag on;
    /// picking a different color or raising alpha back from zero clears it.
    pub fn update_text_style(
        &mut self,
        id: AnnotationId,
        style: TextStyle,
        background: Background,
    ) -> Result<(), EditError> {
        self.modify_annotation(id, |a| match &mut a.kind {
            AnnotationKind::Text {
                style: existing,
                background: existing_bg,
                ..
            } => {
                let mut background = background;
                if background.alpha <= 0.0 {
                    background.transparent = true;
                } else if background.color != existing_bg.color || existing_bg.alpha <= 0.0 {
                    background.transparent = false;
                }
                *existing = style;
                *existing_bg = background;
                true
            }
            _ => false,
        })
    }

    pub fn update_note_text(&mut self, id: AnnotationId, text: &str) -> Result<(), EditError> {
        self.modify_annotation(id, |a| match &mut a.kind {
            AnnotationKind::Note { text: existing, .. } => {
                *existing = text.to_string();
                true
            }
            _ => false,
        })
    }

    pub fn set_note_collapsed(&mut self, id: AnnotationId, collapsed: bool) -> Result<(), EditError> {
        self.modify_annotation(id, |a| match &mut a.kind {
            AnnotationKind::Note {
                collapsed: existing,
                ..
            } => {
                *existing = collapsed;
                true
            }
            _ => false,
        })
    }

    /// Restyles a shape in place, recording the change for undo.
    pub fn update_shape_style(
        &mut self,
        id: AnnotationId,
        style: ShapeStyle,
    ) -> Result<(), EditError> {
        self.modify_annotation(id, |a| match &mut a.kind {
            AnnotationKind::Shape {
                style: existing, ..
            } => {
                *existing = style;
                true
            }
            _ => false,
        })
    }

    /// Starts dragging a wrapper from the pointer's grab position.
    pub fn begin_move(&mut self, id: AnnotationId, pointer: Point) -> Result<(), EditError> {
        let before = self.gesture_target(id)?;
        let gesture = ActiveGesture::Move(MoveGesture::begin(before.rect, pointer));
        self.gesture = Some(GestureState::new(before, gesture));
        Ok(())
    }

    pub fn begin_resize(&mut self, id: AnnotationId, handle: Handle) -> Result<(), EditError> {
        let before = self.gesture_target(id)?;
        let gesture = ActiveGesture::Resize(ResizeGesture::begin(before.rect, handle));
        self.gesture = Some(GestureState::new(before, gesture));
        Ok(())
    }

    pub fn begin_rotate(&mut self, id: AnnotationId, pointer: Point) -> Result<(), EditError> {
        let before = self.gesture_target(id)?;
        let gesture = ActiveGesture::Rotate(RotateGesture::begin(before.rect, pointer));
        self.gesture = Some(GestureState::new(before, gesture));
        Ok(())
    }

    /// Only one wrapper operation may be active at a time.
    fn gesture_target(&self, id: AnnotationId) -> Result<Annotation, EditError> {
        if self.gesture.is_some() {
            return Err(EditError::GestureInProgress);
        }
        self.arena
            .get(id)
            .cloned()
            .ok_or(EditError::AnnotationNotFound(id))
    }

    pub fn gesture_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// Recomputes the wrapper from the gesture's start state. Stray calls
    /// with no active gesture are ignored.
    pub fn update_gesture(&mut self, pointer: Point, modifiers: Modifiers) {
        let Some(state) = &self.gesture else {
            return;
        };
        let rect = state.gesture.update(pointer, modifiers);
        if let Some(annotation) = self.arena.get_mut(state.id) {
            annotation.rect = rect;
            if matches!(state.gesture, ActiveGesture::Resize(_)) {
                rescale_shape_ends(&state.before, annotation);
            }
        }
    }

    /// Finishes the active gesture and records it per the end policy.
    /// Unchanged geometry records nothing under any policy.
    pub fn end_gesture(&mut self, end: GestureEnd) -> Result<(), EditError> {
        let Some(state) = self.gesture.take() else {
            return Ok(());
        };
        let Some(current) = self.arena.get(state.id).cloned() else {
            return Ok(());
        };
        if current == state.before {
            return Ok(());
        }
        match end {
            GestureEnd::Discard => {}
            GestureEnd::Granular => {
                let change = StateChange {
                    before: state.before,
                    after: current,
                };
                let action = match state.gesture {
                    ActiveGesture::Move(_) => GranularAction::Move(change),
                    ActiveGesture::Resize(_) => GranularAction::Resize(change),
                    ActiveGesture::Rotate(_) => GranularAction::Modify(change),
                };
                self.record_entry(HistoryEntry::Granular(action));
            }
            GestureEnd::Snapshot => {
                // The snapshot must describe the overlay as it stood when
                // the gesture began; only this wrapper changed since.
                let mut records = self.arena.capture();
                if let Some(record) = records.iter_mut().find(|a| a.id == state.id) {
                    *record = state.before.clone();
                }
                let sidecar =
                    serde_json::to_string(&records).map_err(|e| EditError::Save(e.to_string()))?;
                self.record_entry(HistoryEntry::Snapshot(Snapshot {
                    pdf_bytes: self.doc_bytes.clone(),
                    sidecar: Some(sidecar),
                }));
            }
        }
        Ok(())
    }

    fn ensure_page(&self, page_index: usize) -> Result<(), EditError> {
        let count = self.page_count()?;
        if page_index >= count {
            return Err(EditError::PageOutOfBounds {
                index: page_index,
                count,
            });
        }
        Ok(())
    }

    /// Rotates a page a quarter turn clockwise. Commits the overlay first
    /// so annotations are baked before the document is restructured.
    pub fn rotate_page(&mut self, page_index: usize) -> Result<(), EditError> {
        self.ensure_page(page_index)?;
        self.save_state(true)?;
        self.doc_bytes = pages::rotate_page(&self.doc_bytes, page_index)?;
        Ok(())
    }

    pub fn delete_page(&mut self, page_index: usize) -> Result<(), EditError> {
        self.ensure_page(page_index)?;
        if self.page_count()? <= 1 {
            return Err(EditError::LastPage);
        }
        self.save_state(true)?;
        self.doc_bytes = pages::delete_page(&self.doc_bytes, page_index)?;
        self.arena.remove_page(page_index);
        Ok(())
    }

    pub fn move_page_up(&mut self, page_index: usize) -> Result<(), EditError> {
        self.ensure_page(page_index)?;
        if page_index == 0 {
            return Ok(());
        }
        self.save_state(true)?;
        self.doc_bytes = pages::reorder_page(&self.doc_bytes, page_index, page_index - 1)?;
        self.swap_annotation_pages(page_index, page_index - 1);
        Ok(())
    }

    pub fn move_page_down(&mut self, page_index: usize) -> Result<(), EditError> {
        let count = self.page_count()?;
        if page_index >= count {
            return Err(EditError::PageOutOfBounds {
                index: page_index,
                count,
            });
        }
        if page_index + 1 == count {
            return Ok(());
        }
        self.save_state(true)?;
        self.doc_bytes = pages::reorder_page(&self.doc_bytes, page_index, page_index + 1)?;
        self.swap_annotation_pages(page_index, page_index + 1);
        Ok(())
    }

    /// Applies a full page permutation; `order[i]` names the current index
    /// of the page that ends up at position `i`.
    pub fn reorder_pages(&mut self, order: &[usize]) -> Result<(), EditError> {
        let count = self.page_count()?;
        let mut seen = vec![false; count];
        for &index in order {
            if index >= count {
                return Err(EditError::PageOutOfBounds { index, count });
            }
            seen[index] = true;
        }
        if order.len() != count || seen.iter().any(|used| !used) {
            return Err(EditError::Commit(
                "page order must name every page exactly once".into(),
            ));
        }

        self.save_state(true)?;
        self.doc_bytes = pages::reorder_pages(&self.doc_bytes, order)?;

        // Overlay records follow their page to its new position.
        let mut new_index_of = vec![0usize; count];
        for (position, &old_index) in order.iter().enumerate() {
            new_index_of[old_index] = position;
        }
        let ids: Vec<AnnotationId> = self.arena.iter().map(|a| a.id).collect();
        for id in ids {
            if let Some(annotation) = self.arena.get_mut(id) {
                if annotation.page_index < count {
                    annotation.page_index = new_index_of[annotation.page_index];
                }
            }
        }
        Ok(())
    }

    fn swap_annotation_pages(&mut self, a: usize, b: usize) {
        let ids: Vec<AnnotationId> = self.arena.iter().map(|ann| ann.id).collect();
        for id in ids {
            if let Some(annotation) = self.arena.get_mut(id) {
                if annotation.page_index == a {
                    annotation.page_index = b;
                } else if annotation.page_index == b {
                    annotation.page_index = a;
                }
            }
        }
    }

    /// Sets crop boxes on the given pages from top-left page rects.
    pub fn crop_pages(&mut self, regions: &[(usize, WrapperBox)]) -> Result<(), EditError> {
        for (page_index, _) in regions {
            self.ensure_page(*page_index)?;
        }
        self.save_state(true)?;
        self.doc_bytes = pages::crop_pages(&self.doc_bytes, regions)?;
        Ok(())
    }

    /// Builds a standalone single-page document with the overlay committed.
    /// The session itself is left untouched.
    pub fn extract_page(&self, page_index: usize) -> Result<Vec<u8>, EditError> {
        let committed = commit_annotations(&self.doc_bytes, &self.arena.capture())?;
        pages::extract_page(&committed, page_index)
    }

    /// Current document with the overlay committed, ready for download.
    /// Does not change the session.
    pub fn export(&self) -> Result<Vec<u8>, EditError> {
        commit_annotations(&self.doc_bytes, &self.arena.capture())
    }
}

/// Keeps line and arrow endpoints proportional to the wrapper during a
/// resize, so the shape scales with its box instead of drifting inside it.
fn rescale_shape_ends(before: &Annotation, current: &mut Annotation) {
    let AnnotationKind::Shape {
        ends: Some(before_ends),
        ..
    } = &before.kind
    else {
        return;
    };
    let sx = current.rect.width / before.rect.width;
    let sy = current.rect.height / before.rect.height;
    if let AnnotationKind::Shape {
        ends: Some(ends), ..
    } = &mut current.kind
    {
        ends.start = Point::new(before_ends.start.x * sx, before_ends.start.y * sy);
        ends.end = Point::new(before_ends.end.x * sx, before_ends.end.y * sy);
    }
}
