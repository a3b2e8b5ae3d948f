//! PDF annotation and editing engine
//!
//! This crate is the document-editing core of a PDF editor: an overlay of
//! annotations positioned in screen coordinates (top-left origin, like the
//! rendered page), an undo/redo history mixing whole-document snapshots
//! with granular overlay actions, and a commit pass that bakes the overlay
//! into real PDF content using lopdf.
//!
//! [`EditorSession`] ties everything together; the modules underneath are
//! usable on their own:
//! - [`annotation`]: overlay records and the id arena
//! - [`history`]: the two-stack undo/redo engine
//! - [`interaction`]: move/resize/rotate gesture math
//! - [`commit`]: overlay to content-stream translation
//! - [`pages`]: structural page operations (rotate, delete, reorder, crop)
//! - [`draft`]: autosave drafts and the debounce timer

pub mod annotation;
pub mod commit;
pub mod draft;
pub mod error;
pub mod fonts;
pub mod geometry;
pub mod history;
pub mod image;
pub mod interaction;
pub mod modes;
pub mod pages;
pub mod session;

pub use annotation::{Annotation, AnnotationArena, AnnotationId, AnnotationKind};
pub use commit::commit_annotations;
pub use draft::{AutosaveTimer, DirDraftStore, Draft, DraftStore, MemoryDraftStore};
pub use error::EditError;
pub use geometry::{Handle, Point, WrapperBox};
pub use history::{GranularAction, History, HistoryEntry, Snapshot, MAX_HISTORY};
pub use interaction::{GestureEnd, Modifiers};
pub use modes::{Mode, ToolState};
pub use pages::{page_count, page_size};
pub use session::EditorSession;
