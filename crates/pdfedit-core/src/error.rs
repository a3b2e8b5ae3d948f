use crate::annotation::AnnotationId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Failed to save PDF: {0}")]
    Save(String),

    #[error("Commit failed: {0}")]
    Commit(String),

    #[error("Page {index} out of bounds (document has {count} pages)")]
    PageOutOfBounds { index: usize, count: usize },

    #[error("Cannot delete the last remaining page")]
    LastPage,

    #[error("No annotation with id {0}")]
    AnnotationNotFound(AnnotationId),

    #[error("Another wrapper operation is already active")]
    GestureInProgress,

    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("Draft store error: {0}")]
    Draft(String),
}
