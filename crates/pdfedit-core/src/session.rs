//! Editor session: the single owner of the active document and its history.
//!
//! Front ends hold an `EditorSession` and route every edit through
//! [`EditorSession::dispatch`]; nothing else mutates the document.

use crate::config::EditorConfig;
use crate::coords::{snap_to_grid, Point};
use crate::error::EditorError;
use crate::history::History;
use crate::model::Document;
use crate::operations::{apply, EditOperation};

#[derive(Debug)]
pub struct EditorSession {
    document: Option<Document>,
    history: History,
    config: EditorConfig,
}

impl EditorSession {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            document: None,
            history: History::new(config.max_history),
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Make `doc` the active document. History restarts empty; the first
    /// [`commit`](Self::commit) sets the undo floor.
    pub fn load(&mut self, doc: Document) {
        tracing::info!(
            name = doc.name(),
            pages = doc.page_count(),
            fields = doc.form_fields().len(),
            "document loaded"
        );
        self.history.clear();
        self.document = Some(doc);
    }

    pub fn close(&mut self) -> Option<Document> {
        self.history.clear();
        self.document.take()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    /// Apply an edit to the active document.
    ///
    /// Returns `Ok(false)` when no document is loaded. The edit is not
    /// recorded; call [`commit`](Self::commit) once a logical edit is done.
    pub fn dispatch(&mut self, op: &EditOperation) -> Result<bool, EditorError> {
        let Some(current) = self.document.as_ref() else {
            tracing::debug!(op = op.name(), "no active document, ignoring edit");
            return Ok(false);
        };
        tracing::debug!(op = op.name(), page = ?op.page(), "dispatching edit");
        let next = apply(current, op)?;
        self.document = Some(next);
        Ok(true)
    }

    /// Record the active document as a history snapshot.
    pub fn commit(&mut self) -> bool {
        match &self.document {
            Some(doc) => {
                self.history.record(doc.clone());
                true
            }
            None => false,
        }
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.document = Some(snapshot.clone());
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.document = Some(snapshot.clone());
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Snap a document-space point to the configured grid.
    pub fn snap(&self, point: Point) -> Point {
        snap_to_grid(point, self.config.grid_size)
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}
