//! Autosave drafts.
//!
//! A draft is a point-in-time copy of the open document plus its uncommitted
//! overlay, stored as JSON with the PDF bytes base64-encoded. The
//! [`AutosaveTimer`] debounces saves so continuous editing does not thrash
//! the store: every change pushes the deadline out by the full interval.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::annotation::{b64, Annotation};
use crate::error::EditError;
use crate::session::EditorSession;

/// Quiet period between the last change and the autosave it triggers.
pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Draft {
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "b64")]
    pub pdf_bytes: Vec<u8>,
    pub annotations: Vec<Annotation>,
}

impl Draft {
    /// Captures the session state under `filename`.
    pub fn capture(session: &EditorSession, filename: &str) -> Self {
        Draft {
            filename: filename.to_string(),
            timestamp: Utc::now(),
            pdf_bytes: session.pdf_bytes().to_vec(),
            annotations: session.capture_annotation_state(),
        }
    }

    /// Reopens the draft as a fresh session with the overlay restored.
    pub fn resume(self) -> Result<EditorSession, EditError> {
        let mut session = EditorSession::open(self.pdf_bytes)?;
        session.restore_annotation_state(self.annotations);
        Ok(session)
    }
}

pub trait DraftStore {
    fn save(&mut self, draft: &Draft) -> Result<(), EditError>;
    /// `Ok(None)` when no draft exists under that name.
    fn load(&self, filename: &str) -> Result<Option<Draft>, EditError>;
    fn list(&self) -> Result<Vec<String>, EditError>;
    /// Deleting a missing draft is not an error.
    fn delete(&mut self, filename: &str) -> Result<(), EditError>;
}

/// Keeps drafts in memory. Suits tests and single-session embedders.
#[derive(Debug, Clone, Default)]
pub struct MemoryDraftStore {
    drafts: BTreeMap<String, Draft>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn save(&mut self, draft: &Draft) -> Result<(), EditError> {
        self.drafts.insert(draft.filename.clone(), draft.clone());
        Ok(())
    }

    fn load(&self, filename: &str) -> Result<Option<Draft>, EditError> {
        Ok(self.drafts.get(filename).cloned())
    }

    fn list(&self) -> Result<Vec<String>, EditError> {
        Ok(self.drafts.keys().cloned().collect())
    }

    fn delete(&mut self, filename: &str) -> Result<(), EditError> {
        self.drafts.remove(filename);
        Ok(())
    }
}

/// Writes each draft as `<name>.draft.json` under one directory.
#[derive(Debug, Clone)]
pub struct DirDraftStore {
    root: PathBuf,
}

const DRAFT_SUFFIX: &str = ".draft.json";

impl DirDraftStore {
    /// Creates the backing directory if it does not exist yet.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, EditError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| EditError::Draft(e.to_string()))?;
        Ok(Self { root })
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        // A draft name must not escape the store directory.
        let safe: String = filename
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        self.root.join(format!("{safe}{DRAFT_SUFFIX}"))
    }
}

impl DraftStore for DirDraftStore {
    fn save(&mut self, draft: &Draft) -> Result<(), EditError> {
        let json =
            serde_json::to_vec_pretty(draft).map_err(|e| EditError::Draft(e.to_string()))?;
        tracing::debug!(filename = %draft.filename, bytes = json.len(), "writing draft");
        fs::write(self.path_for(&draft.filename), json)
            .map_err(|e| EditError::Draft(e.to_string()))
    }

    fn load(&self, filename: &str) -> Result<Option<Draft>, EditError> {
        let bytes = match fs::read(self.path_for(filename)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EditError::Draft(e.to_string())),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| EditError::Draft(e.to_string()))
    }

    fn list(&self) -> Result<Vec<String>, EditError> {
        let mut names = Vec::new();
        let entries = fs::read_dir(&self.root).map_err(|e| EditError::Draft(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| EditError::Draft(e.to_string()))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(stem) = name.strip_suffix(DRAFT_SUFFIX) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&mut self, filename: &str) -> Result<(), EditError> {
        match fs::remove_file(self.path_for(filename)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EditError::Draft(e.to_string())),
        }
    }
}

/// Debounce for autosave driven by explicit instants, so schedulers and
/// tests control time the same way.
#[derive(Debug, Clone)]
pub struct AutosaveTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl AutosaveTimer {
    pub fn new() -> Self {
        Self::with_interval(AUTOSAVE_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Arms the timer, or pushes an armed deadline out to a full interval
    /// from `now`.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    /// Fires at most once per quiet period; disarms itself on firing.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

impl Default for AutosaveTimer {
    fn default() -> Self {
        Self::new()
    }
}
