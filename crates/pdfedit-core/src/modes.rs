//! Exclusive editing modes and the per-tool settings they draw from.

use crate::annotation::{
    Background, FormFieldKind, FormFieldStyle, HighlightStyle, NoteStyle, ShapeKind, ShapeStyle,
    TextStyle, WatermarkStyle,
};

/// The editor is always in exactly one mode. Activating a tool leaves the
/// previous one; activating the current tool again falls back to `Select`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Select,
    Hand,
    Text,
    Redact,
    Highlight,
    Extract,
    Note,
    ZoomIn,
    ZoomOut,
    Crop,
    Shape(ShapeKind),
    FormField(FormFieldKind),
}

impl Mode {
    /// Resolves a tool activation against the current mode.
    pub fn toggle(self, requested: Mode) -> Mode {
        if self == requested {
            Mode::Select
        } else {
            requested
        }
    }

    /// Modes that place a new annotation on click or drag.
    pub fn places_annotation(self) -> bool {
        matches!(
            self,
            Mode::Text
                | Mode::Redact
                | Mode::Highlight
                | Mode::Extract
                | Mode::Note
                | Mode::Shape(_)
                | Mode::FormField(_)
        )
    }
}

/// Live settings for each tool. New annotations copy the relevant bundle at
/// creation time, so later setting changes never touch existing elements
/// (except through an explicit styled update, which records history).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolState {
    pub text: TextStyle,
    pub text_background: Background,
    pub shape: ShapeStyle,
    pub highlight: HighlightStyle,
    pub note: NoteStyle,
    pub form: FormFieldStyle,
    pub watermark: WatermarkStyle,
}
