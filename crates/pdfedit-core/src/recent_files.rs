//! Recently opened documents
//!
//! A bounded most-recently-used list persisted as JSON under a single key in
//! a [`KeyValueStore`]. Storage failures never interrupt editing: a list that
//! cannot be read starts empty and a list that cannot be written is logged.

use crate::error::EditorError;
use crate::model::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub name: String,
    /// Size of the source bytes
    pub size: u64,
    pub last_opened: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl FileInfo {
    pub fn for_document(doc: &Document) -> Self {
        Self {
            id: doc.id().to_string(),
            name: doc.name().to_string(),
            size: doc.source_bytes().len() as u64,
            last_opened: Utc::now(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// String key-value persistence, shaped after browser local storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, EditorError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), EditorError>;
}

/// In-memory store, for tests and sessions without a state directory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, EditorError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), EditorError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, EditorError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| EditorError::StorageError(format!("{}: {}", path.display(), e)))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), EditorError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| EditorError::StorageError(format!("{}: {}", self.dir.display(), e)))?;
        let path = self.path_for(key);
        fs::write(&path, value)
            .map_err(|e| EditorError::StorageError(format!("{}: {}", path.display(), e)))
    }
}

pub struct RecentFiles<S: KeyValueStore> {
    store: S,
    key: String,
    max: usize,
    files: Vec<FileInfo>,
}

impl<S: KeyValueStore> RecentFiles<S> {
    /// Read the list stored under `key`. Missing or unreadable entries give
    /// an empty list.
    pub fn load(store: S, key: impl Into<String>, max: usize) -> Self {
        let key = key.into();
        let files = match store.get(&key) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<FileInfo>>(&json) {
                Ok(mut files) => {
                    files.truncate(max);
                    files
                }
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "recent files list is corrupt, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "could not read recent files");
                Vec::new()
            }
        };

        Self {
            store,
            key,
            max,
            files,
        }
    }

    /// Move `info` to the front, dropping any older entry with the same id.
    pub fn add(&mut self, info: FileInfo) {
        self.files.retain(|f| f.id != info.id);
        self.files.insert(0, info);
        self.files.truncate(self.max);
        self.persist();
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.persist();
    }

    pub fn list(&self) -> &[FileInfo] {
        &self.files
    }

    pub fn get(&self, id: &str) -> Option<&FileInfo> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn persist(&mut self) {
        let result = serde_json::to_string_pretty(&self.files)
            .map_err(EditorError::from)
            .and_then(|json| self.store.set(&self.key, &json));
        if let Err(e) = result {
            tracing::warn!(error = %e, "could not save recent files");
        }
    }
}
