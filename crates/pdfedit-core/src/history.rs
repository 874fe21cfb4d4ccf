//! Linear undo/redo over full document snapshots.
//!
//! Snapshots share their source bytes through an `Arc`, so keeping a few
//! dozen of them costs little more than the overlay data itself.

use crate::model::Document;

pub const DEFAULT_MAX_HISTORY: usize = 50;

#[derive(Debug, Clone)]
pub struct History {
    snapshots: Vec<Document>,
    /// Index of the current snapshot, `None` before the first record.
    cursor: Option<usize>,
    max_depth: usize,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: None,
            max_depth: max_depth.max(1),
        }
    }

    /// Push `doc` as the newest snapshot, discarding any redo branch and the
    /// oldest snapshot when over depth.
    pub fn record(&mut self, doc: Document) {
        if let Some(cursor) = self.cursor {
            self.snapshots.truncate(cursor + 1);
        } else {
            self.snapshots.clear();
        }
        self.snapshots.push(doc);

        if self.snapshots.len() > self.max_depth {
            let excess = self.snapshots.len() - self.max_depth;
            self.snapshots.drain(..excess);
            tracing::debug!(dropped = excess, "history over depth, dropping oldest");
        }

        self.cursor = Some(self.snapshots.len() - 1);
    }

    /// Step back one snapshot. `None` at the floor.
    pub fn undo(&mut self) -> Option<&Document> {
        let cursor = self.cursor.filter(|&c| c > 0)?;
        self.cursor = Some(cursor - 1);
        self.snapshots.get(cursor - 1)
    }

    /// Step forward one snapshot. `None` at the head.
    pub fn redo(&mut self) -> Option<&Document> {
        let cursor = self.cursor?;
        if cursor + 1 >= self.snapshots.len() {
            return None;
        }
        self.cursor = Some(cursor + 1);
        self.snapshots.get(cursor + 1)
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.snapshots.len())
    }

    pub fn current(&self) -> Option<&Document> {
        self.cursor.and_then(|c| self.snapshots.get(c))
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = None;
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Page;
    use crate::operations::rotate_page;
    use crate::model::Rotation;

    fn doc(name: &str) -> Document {
        Document::new(name, Vec::new(), vec![Page::letter()], vec![])
    }

    fn names(history: &History) -> Vec<String> {
        history.snapshots.iter().map(|d| d.name().to_string()).collect()
    }

    #[test]
    fn test_empty_history() {
        let mut history = History::new(5);
        assert!(history.is_empty());
        assert_eq!(history.cursor(), None);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert!(history.current().is_none());
    }

    #[test]
    fn test_first_record_is_the_floor() {
        let mut history = History::new(5);
        history.record(doc("a"));
        assert_eq!(history.cursor(), Some(0));
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_undo_redo_walks_snapshots() {
        let mut history = History::new(5);
        history.record(doc("a"));
        history.record(doc("b"));
        history.record(doc("c"));
        assert!(history.can_undo());

        assert_eq!(history.undo().map(|d| d.name().to_string()), Some("b".into()));
        assert!(history.can_redo());
        assert_eq!(history.undo().map(|d| d.name().to_string()), Some("a".into()));
        assert!(history.undo().is_none(), "undo at floor is a no-op");
        assert_eq!(history.cursor(), Some(0));

        assert_eq!(history.redo().map(|d| d.name().to_string()), Some("b".into()));
        assert_eq!(history.redo().map(|d| d.name().to_string()), Some("c".into()));
        assert!(history.redo().is_none(), "redo at head is a no-op");
        assert_eq!(history.cursor(), Some(2));
    }

    #[test]
    fn test_record_after_undo_discards_redo_branch() {
        let mut history = History::new(5);
        history.record(doc("a"));
        history.record(doc("b"));
        history.record(doc("c"));
        history.undo();
        history.undo();

        history.record(doc("d"));
        assert_eq!(names(&history), vec!["a", "d"]);
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_depth_is_capped_keeping_most_recent() {
        let mut history = History::new(3);
        for name in ["a", "b", "c", "d", "e"] {
            history.record(doc(name));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(names(&history), vec!["c", "d", "e"]);
        assert_eq!(history.cursor(), Some(2));
        assert_eq!(history.current().map(|d| d.name()), Some("e"));
    }

    #[test]
    fn test_snapshots_are_independent_of_later_edits() {
        let mut history = History::default();
        let first = doc("a");
        history.record(first.clone());
        let rotated = rotate_page(&first, 0, Rotation::Deg90);
        history.record(rotated);

        let back = history.undo().cloned().unwrap();
        assert_eq!(back.page(0).unwrap().rotation, Rotation::Deg0);
        assert_eq!(back, first);
    }

    #[test]
    fn test_clear_resets_to_initial_state() {
        let mut history = History::new(2);
        history.record(doc("a"));
        history.record(doc("b"));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.cursor(), None);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_zero_depth_keeps_one_snapshot() {
        let mut history = History::new(0);
        history.record(doc("a"));
        history.record(doc("b"));
        assert_eq!(history.max_depth(), 1);
        assert_eq!(names(&history), vec!["b"]);
    }
}
