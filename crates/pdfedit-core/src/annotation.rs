//! Overlay annotation model and the arena that owns it.
//!
//! Annotations live purely in memory until the commit engine bakes them into
//! the document bytes. Coordinates follow the overlay convention: top-left
//! origin, y growing downward, sizes in page pixels at 100% zoom.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, WrapperBox};

pub type AnnotationId = u64;

/// Text styling shared by the text tool settings and committed text boxes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextStyle {
    pub font_size: f64,
    pub color: String,
    /// Font family name. Mapped to a PDF standard font at commit time.
    pub font_family: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            color: "#000000".to_string(),
            font_family: "Helvetica".to_string(),
            bold: false,
            italic: false,
        }
    }
}

/// Fill behind a text box. `transparent` wins over `color`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Background {
    pub color: String,
    pub alpha: f64,
    #[serde(default)]
    pub transparent: bool,
}

impl Default for Background {
    fn default() -> Self {
        Self {
            color: "#ffffff".to_string(),
            alpha: 1.0,
            transparent: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteStyle {
    pub color: String,
    pub text_color: String,
    pub font_size: f64,
}

impl Default for NoteStyle {
    fn default() -> Self {
        Self {
            color: "#feff9c".to_string(),
            text_color: "#333333".to_string(),
            font_size: 12.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShapeStyle {
    pub stroke_color: String,
    pub stroke_width: f64,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke_color: "#ff0000".to_string(),
            stroke_width: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighlightStyle {
    pub color: String,
    pub width: f64,
    pub opacity: f64,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: "#ffeb3b".to_string(),
            width: 20.0,
            opacity: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatermarkStyle {
    pub color: String,
    pub opacity: f64,
    pub font_size: f64,
    /// Counter-clockwise rotation in degrees.
    pub rotation: f64,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            color: "#cccccc".to_string(),
            opacity: 0.3,
            font_size: 48.0,
            rotation: 45.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Appearance settings for interactive form fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormFieldStyle {
    pub font_size: f64,
    pub text_color: String,
    pub background_color: String,
    pub background_alpha: f64,
    pub border_color: String,
    pub border_width: f64,
    #[serde(default)]
    pub text_align: TextAlign,
}

impl Default for FormFieldStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            text_color: "#000000".to_string(),
            background_color: "#ffffff".to_string(),
            background_alpha: 1.0,
            border_color: "#000000".to_string(),
            border_width: 1.0,
            text_align: TextAlign::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rect,
    Ellipse,
    Line,
    Arrow,
}

impl ShapeKind {
    /// Lines and arrows carry endpoints; rects and ellipses are drawn from
    /// the wrapper box alone.
    pub fn has_endpoints(self) -> bool {
        matches!(self, ShapeKind::Line | ShapeKind::Arrow)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FormFieldKind {
    TextField,
    Checkbox,
    Radio,
    Dropdown,
    Signature,
}

/// Line/arrow endpoints, in pixels relative to the wrapper's top-left corner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LineEnds {
    pub start: Point,
    pub end: Point,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum AnnotationKind {
    Text {
        text: String,
        style: TextStyle,
        background: Background,
    },
    Note {
        text: String,
        style: NoteStyle,
        #[serde(default)]
        collapsed: bool,
    },
    Image {
        /// Base64-encoded image bytes (PNG or JPEG).
        #[serde(with = "b64")]
        bytes: Vec<u8>,
    },
    Highlight {
        /// Freehand path in page coordinates, top-left origin.
        points: Vec<Point>,
        style: HighlightStyle,
    },
    Shape {
        shape: ShapeKind,
        style: ShapeStyle,
        /// Present for lines and arrows only.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ends: Option<LineEnds>,
    },
    Redact,
    Extract,
    FormField {
        field: FormFieldKind,
        style: FormFieldStyle,
    },
    Watermark {
        text: String,
        style: WatermarkStyle,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub page_index: usize,
    pub rect: WrapperBox,
    pub kind: AnnotationKind,
}

impl Annotation {
    /// Notes stay interactive after a commit; everything else is baked into
    /// the page and removed from the overlay.
    pub fn is_committable(&self) -> bool {
        !matches!(self.kind, AnnotationKind::Note { .. })
    }
}

/// Owns every live overlay annotation for the open document.
///
/// Ids are handed out once and never reused within a session, so a granular
/// history entry can re-insert a deleted annotation under its original id.
/// Iteration order (ascending id) doubles as stacking order: later additions
/// render, and hit-test, on top.
#[derive(Debug, Clone, Default)]
pub struct AnnotationArena {
    annotations: BTreeMap<AnnotationId, Annotation>,
    next_id: AnnotationId,
}

impl AnnotationArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new annotation and returns its freshly assigned id.
    pub fn insert(
        &mut self,
        page_index: usize,
        rect: WrapperBox,
        kind: AnnotationKind,
    ) -> AnnotationId {
        self.next_id += 1;
        let id = self.next_id;
        self.annotations.insert(
            id,
            Annotation {
                id,
                page_index,
                rect,
                kind,
            },
        );
        id
    }

    /// Re-inserts an annotation under its existing id, replacing any current
    /// entry. Used when history replays an add or reverts a delete.
    pub fn put(&mut self, annotation: Annotation) {
        self.next_id = self.next_id.max(annotation.id);
        self.annotations.insert(annotation.id, annotation);
    }

    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        self.annotations.remove(&id)
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    pub fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.annotations.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }

    pub fn for_page(&self, page_index: usize) -> impl Iterator<Item = &Annotation> {
        self.annotations
            .values()
            .filter(move |a| a.page_index == page_index)
    }

    /// Topmost annotation under a point on the given page, if any.
    pub fn annotation_at(&self, page_index: usize, point: Point) -> Option<&Annotation> {
        self.annotations
            .values()
            .rev()
            .find(|a| a.page_index == page_index && a.rect.contains(point))
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Snapshot of every annotation, in stacking order.
    pub fn capture(&self) -> Vec<Annotation> {
        self.annotations.values().cloned().collect()
    }

    /// Replaces the arena contents with a previously captured snapshot.
    pub fn restore(&mut self, annotations: Vec<Annotation>) {
        self.annotations.clear();
        for annotation in annotations {
            self.put(annotation);
        }
    }

    /// Removes everything a commit bakes into the page, leaving notes in
    /// place. Returns the removed annotations in stacking order.
    pub fn remove_committable(&mut self) -> Vec<Annotation> {
        let ids: Vec<AnnotationId> = self
            .annotations
            .values()
            .filter(|a| a.is_committable())
            .map(|a| a.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.annotations.remove(&id))
            .collect()
    }

    /// Drops annotations on the given page and shifts page indices above it
    /// down by one. Called after a page is deleted from the document.
    pub fn remove_page(&mut self, page_index: usize) {
        self.annotations.retain(|_, a| a.page_index != page_index);
        for annotation in self.annotations.values_mut() {
            if annotation.page_index > page_index {
                annotation.page_index -= 1;
            }
        }
    }
}

pub(crate) mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_kind(text: &str) -> AnnotationKind {
        AnnotationKind::Text {
            text: text.to_string(),
            style: TextStyle::default(),
            background: Background::default(),
        }
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let mut arena = AnnotationArena::new();
        let a = arena.insert(0, WrapperBox::new(0.0, 0.0, 10.0, 10.0), text_kind("a"));
        let b = arena.insert(0, WrapperBox::new(5.0, 5.0, 10.0, 10.0), text_kind("b"));
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn put_preserves_id_and_prevents_reuse() {
        let mut arena = AnnotationArena::new();
        let id = arena.insert(0, WrapperBox::new(0.0, 0.0, 10.0, 10.0), text_kind("a"));
        let removed = arena.remove(id).unwrap();

        let mut fresh = AnnotationArena::new();
        fresh.put(removed.clone());
        assert_eq!(fresh.get(id), Some(&removed));

        let next = fresh.insert(0, WrapperBox::new(1.0, 1.0, 5.0, 5.0), text_kind("b"));
        assert_eq!(next, id + 1);
    }

    #[test]
    fn annotation_at_returns_topmost() {
        let mut arena = AnnotationArena::new();
        let below = arena.insert(0, WrapperBox::new(0.0, 0.0, 100.0, 100.0), text_kind("a"));
        let above = arena.insert(0, WrapperBox::new(50.0, 50.0, 100.0, 100.0), text_kind("b"));

        let hit = arena.annotation_at(0, Point { x: 60.0, y: 60.0 }).unwrap();
        assert_eq!(hit.id, above);

        let only_below = arena.annotation_at(0, Point { x: 10.0, y: 10.0 }).unwrap();
        assert_eq!(only_below.id, below);

        assert!(arena.annotation_at(1, Point { x: 60.0, y: 60.0 }).is_none());
    }

    #[test]
    fn remove_committable_keeps_notes() {
        let mut arena = AnnotationArena::new();
        arena.insert(0, WrapperBox::new(0.0, 0.0, 10.0, 10.0), text_kind("a"));
        let note = arena.insert(
            0,
            WrapperBox::new(20.0, 20.0, 200.0, 150.0),
            AnnotationKind::Note {
                text: "remember".to_string(),
                style: NoteStyle::default(),
                collapsed: false,
            },
        );
        arena.insert(1, WrapperBox::new(0.0, 0.0, 10.0, 10.0), AnnotationKind::Redact);

        let removed = arena.remove_committable();
        assert_eq!(removed.len(), 2);
        assert_eq!(arena.len(), 1);
        assert!(arena.get(note).is_some());
    }

    #[test]
    fn remove_page_shifts_later_indices() {
        let mut arena = AnnotationArena::new();
        let first = arena.insert(0, WrapperBox::new(0.0, 0.0, 10.0, 10.0), text_kind("a"));
        let second = arena.insert(1, WrapperBox::new(0.0, 0.0, 10.0, 10.0), text_kind("b"));
        let third = arena.insert(2, WrapperBox::new(0.0, 0.0, 10.0, 10.0), text_kind("c"));

        arena.remove_page(1);
        assert!(arena.get(second).is_none());
        assert_eq!(arena.get(first).unwrap().page_index, 0);
        assert_eq!(arena.get(third).unwrap().page_index, 1);
    }

    #[test]
    fn capture_restore_round_trip() {
        let mut arena = AnnotationArena::new();
        arena.insert(0, WrapperBox::new(0.0, 0.0, 10.0, 10.0), text_kind("a"));
        arena.insert(3, WrapperBox::new(5.0, 5.0, 20.0, 20.0), AnnotationKind::Extract);
        let snapshot = arena.capture();

        let mut restored = AnnotationArena::new();
        restored.restore(snapshot.clone());
        assert_eq!(restored.capture(), snapshot);

        let next = restored.insert(0, WrapperBox::new(0.0, 0.0, 1.0, 1.0), text_kind("b"));
        assert_eq!(next, 3);
    }

    #[test]
    fn kind_serializes_with_type_tag() {
        let annotation = Annotation {
            id: 7,
            page_index: 2,
            rect: WrapperBox::new(10.0, 20.0, 30.0, 40.0),
            kind: AnnotationKind::Shape {
                shape: ShapeKind::Arrow,
                style: ShapeStyle::default(),
                ends: Some(LineEnds {
                    start: Point { x: 0.0, y: 20.0 },
                    end: Point { x: 30.0, y: 20.0 },
                }),
            },
        };

        let json = serde_json::to_string(&annotation).unwrap();
        assert!(json.contains("\"type\":\"Shape\""));
        assert!(json.contains("\"shape\":\"arrow\""));

        let back: Annotation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, annotation);
    }

    #[test]
    fn image_bytes_round_trip_as_base64() {
        let annotation = Annotation {
            id: 1,
            page_index: 0,
            rect: WrapperBox::new(0.0, 0.0, 100.0, 80.0),
            kind: AnnotationKind::Image {
                bytes: vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a],
            },
        };

        let json = serde_json::to_string(&annotation).unwrap();
        assert!(json.contains("iVBORw0KGgo"));

        let back: Annotation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, annotation);
    }

    #[test]
    fn redact_serializes_as_bare_tag() {
        let json = serde_json::to_string(&AnnotationKind::Redact).unwrap();
        assert_eq!(json, "{\"type\":\"Redact\"}");
    }
}
