//! PDF overlay editor core
//!
//! The document model, its pure mutation engine, snapshot history and the
//! viewport/document coordinate transforms. Nothing here touches PDF bytes;
//! see `pdfedit-codec` for opening and saving.

pub mod config;
pub mod coords;
pub mod error;
pub mod history;
pub mod model;
pub mod operations;
pub mod recent_files;
pub mod session;

pub use config::EditorConfig;
pub use coords::{Point, Rect, Size, ViewportInfo};
pub use error::EditorError;
pub use history::History;
pub use model::{
    ArrowOverlay, Color, Document, DocumentId, FieldKind, FieldValue, FontFamily, FormField,
    HighlightOverlay, ImageMime, ImageOverlay, InkOverlay, Overlay, OverlayId, OverlayKind, Page,
    RectOverlay, Rotation, TextOverlay,
};
pub use operations::{apply, EditOperation, OverlayPatch};
pub use recent_files::{FileInfo, JsonFileStore, KeyValueStore, MemoryStore, RecentFiles};
pub use session::EditorSession;
