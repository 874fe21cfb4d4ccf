//! Hand saved bytes to a destination chosen by the user.

use crate::error::CodecError;
use std::fs;
use std::path::{Path, PathBuf};

/// Where saved bytes should go. Implementations usually ask the user, who
/// may cancel.
pub trait SaveDestination {
    /// Pick a path for a file suggested as `suggested_name`, or `None` when
    /// the user cancelled.
    fn choose(&mut self, suggested_name: &str) -> Result<Option<PathBuf>, CodecError>;
}

/// Always writes to the same path. A directory receives the suggested name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPath(pub PathBuf);

impl SaveDestination for FixedPath {
    fn choose(&mut self, suggested_name: &str) -> Result<Option<PathBuf>, CodecError> {
        if self.0.is_dir() {
            Ok(Some(self.0.join(suggested_name)))
        } else {
            Ok(Some(self.0.clone()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    Cancelled,
}

/// Name to suggest when saving an edited copy of `name`.
pub fn suggested_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    format!("{}-edited.pdf", stem)
}

/// Write `bytes` wherever `destination` says. Cancelling is not an error.
pub fn export(
    destination: &mut dyn SaveDestination,
    suggested_name: &str,
    bytes: &[u8],
) -> Result<SaveOutcome, CodecError> {
    let Some(path) = destination.choose(suggested_name)? else {
        tracing::info!(suggested_name, "export cancelled");
        return Ok(SaveOutcome::Cancelled);
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, bytes)?;

    tracing::info!(path = %path.display(), bytes = bytes.len(), "exported PDF");
    Ok(SaveOutcome::Saved(path))
}
