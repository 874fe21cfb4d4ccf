//! PDF file adapter for the editor
//!
//! Opens PDF bytes into a [`pdfedit_core::Document`] and writes an edited
//! document back out: page tree, form values, optional flattening and
//! overlays drawn as page content.

pub mod error;
pub mod export;
mod forms;
mod images;
pub mod loader;
mod objects;
mod page_tree;
mod render;
pub mod saver;

pub use error::CodecError;
pub use export::{export, suggested_name, FixedPath, SaveDestination, SaveOutcome};
pub use loader::{open, open_path};
pub use saver::{save, SaveOptions};
