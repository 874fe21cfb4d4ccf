//! In-memory document model
//!
//! A [`Document`] owns its pages, the overlays bound to each page, a snapshot
//! of the source form fields and the codec bytes it was opened from. All
//! geometry is in PDF points with a bottom-left origin.
//!
//! The model is only changed by replacement: the functions in
//! [`crate::operations`] take a `&Document` and return a new one, so any
//! snapshot held by [`crate::history::History`] stays valid.

use crate::coords::{Point, Rect};
use crate::error::EditorError;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayId(pub String);

impl OverlayId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OverlayId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for OverlayId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Page rotation in clockwise quarter turns. Serialized as degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Normalize any multiple of 90 (including negative values, as found in
    /// `/Rotate` entries) into a rotation.
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {}", other)),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Position in the document; rewritten on every structural edit.
    #[serde(default)]
    pub index: usize,
    pub width_pt: f64,
    pub height_pt: f64,
    #[serde(default)]
    pub rotation: Rotation,
    /// 1-based page number in the source bytes, `None` for inserted pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<u32>,
}

impl Page {
    /// A new blank page that does not exist in the source bytes.
    pub fn blank(width_pt: f64, height_pt: f64) -> Self {
        Self {
            index: 0,
            width_pt,
            height_pt,
            rotation: Rotation::Deg0,
            source: None,
        }
    }

    /// US Letter, 612 x 792 points.
    pub fn letter() -> Self {
        Self::blank(612.0, 792.0)
    }

    pub fn from_source(page_number: u32, width_pt: f64, height_pt: f64) -> Self {
        Self {
            index: page_number.saturating_sub(1) as usize,
            width_pt,
            height_pt,
            rotation: Rotation::Deg0,
            source: Some(page_number),
        }
    }
}

/// RGB color with components in the 0-1 range.
///
/// Deserializes from `{"r", "g", "b"}` or a `"#RRGGBB"` string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ColorRepr")]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
    pub const YELLOW: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 0.0,
    };

    /// Parse "#RRGGBB" or "RRGGBB". Anything shorter or non-ASCII falls
    /// back to black.
    pub fn from_hex(color: &str) -> Self {
        let hex = color.trim_start_matches('#');
        if hex.len() >= 6 && hex.is_ascii() {
            let channel = |range: std::ops::Range<usize>| {
                u8::from_str_radix(&hex[range], 16).unwrap_or(0) as f64 / 255.0
            };
            Color {
                r: channel(0..2),
                g: channel(2..4),
                b: channel(4..6),
            }
        } else {
            Color::BLACK
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Hex(String),
    Rgb { r: f64, g: f64, b: f64 },
}

impl From<ColorRepr> for Color {
    fn from(repr: ColorRepr) -> Self {
        match repr {
            ColorRepr::Hex(hex) => Color::from_hex(&hex),
            ColorRepr::Rgb { r, g, b } => Color { r, g, b },
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

fn default_highlight_color() -> Color {
    Color::YELLOW
}

/// Deserializes from any CSS or PDF font name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum FontFamily {
    #[default]
    Helvetica,
    Inter,
    Times,
    Courier,
}

impl FontFamily {
    /// Map a CSS or PDF font name onto one of the supported families.
    pub fn from_css_name(name: &str) -> Self {
        let lower = name.to_lowercase();

        match lower.as_str() {
            "serif" => return FontFamily::Times,
            "sans-serif" | "cursive" | "fantasy" => return FontFamily::Helvetica,
            "monospace" => return FontFamily::Courier,
            _ => {}
        }

        if lower.contains("inter") {
            return FontFamily::Inter;
        }
        if lower.contains("times") || lower.contains("georgia") || lower.contains("garamond") {
            return FontFamily::Times;
        }
        if lower.contains("courier")
            || lower.contains("mono")
            || lower.contains("consolas")
            || lower.contains("monaco")
        {
            return FontFamily::Courier;
        }

        FontFamily::Helvetica
    }
}

impl From<String> for FontFamily {
    fn from(name: String) -> Self {
        FontFamily::from_css_name(&name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub x: f64,
    pub y: f64,
    pub text: String,
    #[serde(default)]
    pub font_family: FontFamily,
    pub font_size: f64,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub color: Color,
}

impl TextOverlay {
    /// Standard-14 base font for this family and style. Inter has no
    /// standard-14 counterpart and renders as Helvetica.
    pub fn pdf_font_name(&self) -> &'static str {
        match self.font_family {
            FontFamily::Times => match (self.bold, self.italic) {
                (true, true) => "Times-BoldItalic",
                (true, false) => "Times-Bold",
                (false, true) => "Times-Italic",
                (false, false) => "Times-Roman",
            },
            FontFamily::Courier => match (self.bold, self.italic) {
                (true, true) => "Courier-BoldOblique",
                (true, false) => "Courier-Bold",
                (false, true) => "Courier-Oblique",
                (false, false) => "Courier",
            },
            FontFamily::Helvetica | FontFamily::Inter => match (self.bold, self.italic) {
                (true, true) => "Helvetica-BoldOblique",
                (true, false) => "Helvetica-Bold",
                (false, true) => "Helvetica-Oblique",
                (false, false) => "Helvetica",
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectOverlay {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub stroke: f64,
    #[serde(default)]
    pub fill: bool,
    #[serde(default)]
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightOverlay {
    pub quads: Vec<Rect>,
    #[serde(default = "default_highlight_color")]
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowOverlay {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub stroke: f64,
    #[serde(default)]
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InkOverlay {
    pub path: Vec<Point>,
    pub stroke: f64,
    #[serde(default)]
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageMime {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/svg+xml")]
    Svg,
}

impl ImageMime {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(ImageMime::Png),
            "image/jpeg" | "image/jpg" => Some(ImageMime::Jpeg),
            "image/svg+xml" => Some(ImageMime::Svg),
            _ => None,
        }
    }
}

/// Deserializes from either `mime` plus base64 `data`, or a `src` data URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ImageSource")]
pub struct ImageOverlay {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub mime: ImageMime,
    /// Raw encoded image bytes, base64 in serialized form.
    #[serde(serialize_with = "serialize_base64")]
    pub data: Arc<[u8]>,
}

#[derive(Deserialize)]
struct ImageSource {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    mime: Option<ImageMime>,
    data: Option<String>,
    src: Option<String>,
}

impl TryFrom<ImageSource> for ImageOverlay {
    type Error = EditorError;

    fn try_from(source: ImageSource) -> Result<Self, Self::Error> {
        let ImageSource {
            x,
            y,
            w,
            h,
            mime,
            data,
            src,
        } = source;
        match (src, mime, data) {
            (Some(url), _, _) => ImageOverlay::from_data_url(x, y, w, h, &url),
            (None, Some(mime), Some(data)) => {
                let data = base64::engine::general_purpose::STANDARD
                    .decode(data.trim())
                    .map_err(|e| EditorError::SerializationError(e.to_string()))?;
                Ok(ImageOverlay {
                    x,
                    y,
                    w,
                    h,
                    mime,
                    data: Arc::from(data),
                })
            }
            _ => Err(EditorError::SerializationError(
                "image overlay needs `src` or both `mime` and `data`".into(),
            )),
        }
    }
}

impl ImageOverlay {
    /// Build an image overlay from a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        data_url: &str,
    ) -> Result<Self, EditorError> {
        let rest = data_url.strip_prefix("data:").ok_or_else(|| {
            EditorError::SerializationError("Image source is not a data URL".into())
        })?;
        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            EditorError::SerializationError("Data URL has no payload".into())
        })?;
        let mime_str = header.strip_suffix(";base64").ok_or_else(|| {
            EditorError::SerializationError("Only base64 data URLs are supported".into())
        })?;
        let mime = ImageMime::from_mime(mime_str).ok_or_else(|| {
            EditorError::SerializationError(format!("Unsupported image type: {}", mime_str))
        })?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| EditorError::SerializationError(e.to_string()))?;

        Ok(Self {
            x,
            y,
            w,
            h,
            mime,
            data: Arc::from(data),
        })
    }
}

fn serialize_base64<S: serde::Serializer>(data: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OverlayKind {
    Text(TextOverlay),
    Rect(RectOverlay),
    Highlight(HighlightOverlay),
    Arrow(ArrowOverlay),
    Ink(InkOverlay),
    Image(ImageOverlay),
}

impl OverlayKind {
    pub fn name(&self) -> &'static str {
        match self {
            OverlayKind::Text(_) => "text",
            OverlayKind::Rect(_) => "rect",
            OverlayKind::Highlight(_) => "highlight",
            OverlayKind::Arrow(_) => "arrow",
            OverlayKind::Ink(_) => "ink",
            OverlayKind::Image(_) => "image",
        }
    }

    /// Same geometry shifted by `(dx, dy)` document units.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        let shift = |p: &Point| Point {
            x: p.x + dx,
            y: p.y + dy,
        };
        match self {
            OverlayKind::Text(t) => OverlayKind::Text(TextOverlay {
                x: t.x + dx,
                y: t.y + dy,
                ..t.clone()
            }),
            OverlayKind::Rect(r) => OverlayKind::Rect(RectOverlay {
                x: r.x + dx,
                y: r.y + dy,
                ..r.clone()
            }),
            OverlayKind::Highlight(h) => OverlayKind::Highlight(HighlightOverlay {
                quads: h
                    .quads
                    .iter()
                    .map(|q| Rect {
                        x: q.x + dx,
                        y: q.y + dy,
                        ..*q
                    })
                    .collect(),
                color: h.color,
            }),
            OverlayKind::Arrow(a) => OverlayKind::Arrow(ArrowOverlay {
                x1: a.x1 + dx,
                y1: a.y1 + dy,
                x2: a.x2 + dx,
                y2: a.y2 + dy,
                ..a.clone()
            }),
            OverlayKind::Ink(i) => OverlayKind::Ink(InkOverlay {
                path: i.path.iter().map(shift).collect(),
                ..i.clone()
            }),
            OverlayKind::Image(img) => OverlayKind::Image(ImageOverlay {
                x: img.x + dx,
                y: img.y + dy,
                ..img.clone()
            }),
        }
    }

    /// Axis-aligned bounding box in document units.
    ///
    /// Text width is estimated at half an em per character; the real advance
    /// widths are only known to the renderer.
    pub fn bounds(&self) -> Rect {
        match self {
            OverlayKind::Text(t) => Rect {
                x: t.x,
                y: t.y,
                w: t.font_size * 0.5 * t.text.chars().count() as f64,
                h: t.font_size,
            },
            OverlayKind::Rect(r) => Rect {
                x: r.x,
                y: r.y,
                w: r.w,
                h: r.h,
            },
            OverlayKind::Highlight(h) => bounding_rect(h.quads.iter().flat_map(|q| {
                [
                    Point { x: q.x, y: q.y },
                    Point {
                        x: q.x + q.w,
                        y: q.y + q.h,
                    },
                ]
            })),
            OverlayKind::Arrow(a) => bounding_rect([
                Point { x: a.x1, y: a.y1 },
                Point { x: a.x2, y: a.y2 },
            ]),
            OverlayKind::Ink(i) => bounding_rect(i.path.iter().copied()),
            OverlayKind::Image(img) => Rect {
                x: img.x,
                y: img.y,
                w: img.w,
                h: img.h,
            },
        }
    }
}

fn bounding_rect(points: impl IntoIterator<Item = Point>) -> Rect {
    let mut iter = points.into_iter();
    let Some(first) = iter.next() else {
        return Rect::default();
    };
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in iter {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Rect {
        x: min_x,
        y: min_y,
        w: max_x - min_x,
        h: max_y - min_y,
    }
}

fn default_opacity() -> f64 {
    1.0
}

/// A user annotation bound to one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub id: OverlayId,
    pub page_index: usize,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub z: i32,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(flatten)]
    pub kind: OverlayKind,
}

impl Overlay {
    pub fn new(page_index: usize, kind: OverlayKind) -> Self {
        Self {
            id: OverlayId::generate(),
            page_index,
            locked: false,
            z: 0,
            opacity: 1.0,
            kind,
        }
    }

    pub fn with_id(mut self, id: impl Into<OverlayId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            kind: self.kind.translated(dx, dy),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Checkbox,
    Radio,
    Dropdown,
}

impl FieldKind {
    /// Whether `value` has the shape this kind of field stores.
    pub fn accepts(&self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (FieldKind::Checkbox, FieldValue::Bool(_))
                | (FieldKind::Text, FieldValue::Text(_))
                | (FieldKind::Radio, FieldValue::Text(_))
                | (FieldKind::Dropdown, FieldValue::Text(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Bool(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub page_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
}

impl FormField {
    pub fn new(name: impl Into<String>, kind: FieldKind, page_index: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            page_index,
            value: None,
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct Document {
    pub(crate) id: DocumentId,
    pub(crate) name: String,
    pub(crate) pages: Vec<Page>,
    pub(crate) overlays: BTreeMap<usize, Vec<Overlay>>,
    pub(crate) forms: Vec<FormField>,
    pub(crate) source_bytes: Arc<[u8]>,
    pub(crate) modified_at: DateTime<Utc>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pages", &self.pages)
            .field("overlays", &self.overlays)
            .field("forms", &self.forms)
            .field("source_bytes", &format_args!("<{} bytes>", self.source_bytes.len()))
            .field("modified_at", &self.modified_at)
            .finish()
    }
}

impl Document {
    /// Build a document from what the codec extracted. Overlays start empty,
    /// pages are renumbered and duplicate form names keep their first entry.
    pub fn new(
        name: impl Into<String>,
        source_bytes: impl Into<Arc<[u8]>>,
        pages: Vec<Page>,
        forms: Vec<FormField>,
    ) -> Self {
        let mut pages = pages;
        renumber(&mut pages);

        let mut seen = HashSet::new();
        let forms = forms
            .into_iter()
            .filter(|field| {
                let fresh = seen.insert(field.name.clone());
                if !fresh {
                    tracing::debug!(name = %field.name, "dropping duplicate form field");
                }
                fresh
            })
            .collect();

        Self {
            id: DocumentId::generate(),
            name: name.into(),
            pages,
            overlays: BTreeMap::new(),
            forms,
            source_bytes: source_bytes.into(),
            modified_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn form_fields(&self) -> &[FormField] {
        &self.forms
    }

    pub fn form_field(&self, name: &str) -> Option<&FormField> {
        self.forms.iter().find(|f| f.name == name)
    }

    pub fn source_bytes(&self) -> &[u8] {
        &self.source_bytes
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// Overlays on a page in paint order: ascending `z`, insertion order
    /// among equal `z`.
    pub fn overlays_for_page(&self, index: usize) -> Vec<&Overlay> {
        let mut overlays: Vec<&Overlay> = self
            .overlays
            .get(&index)
            .map(|list| list.iter().collect())
            .unwrap_or_default();
        overlays.sort_by_key(|o| o.z);
        overlays
    }

    /// All overlays, page by page in insertion order.
    pub fn overlays(&self) -> impl Iterator<Item = &Overlay> {
        self.overlays.values().flatten()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.values().map(Vec::len).sum()
    }

    pub fn find_overlay(&self, id: &OverlayId) -> Option<&Overlay> {
        self.overlays().find(|o| &o.id == id)
    }

    pub fn validate(&self) -> Result<(), EditorError> {
        for (position, page) in self.pages.iter().enumerate() {
            if page.index != position {
                return Err(EditorError::InvariantViolation(format!(
                    "page at position {} has index {}",
                    position, page.index
                )));
            }
        }

        let mut ids = HashSet::new();
        for (key, list) in &self.overlays {
            if *key >= self.pages.len() {
                return Err(EditorError::InvariantViolation(format!(
                    "overlays bound to missing page {}",
                    key
                )));
            }
            for overlay in list {
                if overlay.page_index != *key {
                    return Err(EditorError::InvariantViolation(format!(
                        "overlay {} stored under page {} but bound to page {}",
                        overlay.id, key, overlay.page_index
                    )));
                }
                if !ids.insert(&overlay.id) {
                    return Err(EditorError::InvariantViolation(format!(
                        "duplicate overlay id {}",
                        overlay.id
                    )));
                }
            }
        }

        let mut names = HashSet::new();
        for field in &self.forms {
            if !names.insert(field.name.as_str()) {
                return Err(EditorError::InvariantViolation(format!(
                    "duplicate form field {}",
                    field.name
                )));
            }
        }

        Ok(())
    }

    pub(crate) fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

pub(crate) fn renumber(pages: &mut [Page]) {
    for (index, page) in pages.iter_mut().enumerate() {
        page.index = index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(x: f64, y: f64, s: &str) -> OverlayKind {
        OverlayKind::Text(TextOverlay {
            x,
            y,
            text: s.to_string(),
            font_family: FontFamily::Helvetica,
            font_size: 12.0,
            bold: false,
            italic: false,
            color: Color::BLACK,
        })
    }

    fn three_pages() -> Vec<Page> {
        vec![Page::letter(), Page::letter(), Page::blank(595.0, 842.0)]
    }

    #[test]
    fn test_new_document_renumbers_pages_and_starts_without_overlays() {
        let doc = Document::new("a.pdf", vec![1u8, 2, 3], three_pages(), vec![]);
        assert_eq!(doc.page_count(), 3);
        let indices: Vec<usize> = doc.pages().iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(doc.overlay_count(), 0);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_new_document_drops_duplicate_form_names() {
        let forms = vec![
            FormField::new("name", FieldKind::Text, 0),
            FormField::new("name", FieldKind::Checkbox, 1),
            FormField::new("agree", FieldKind::Checkbox, 1),
        ];
        let doc = Document::new("a.pdf", Vec::new(), three_pages(), forms);
        assert_eq!(doc.form_fields().len(), 2);
        assert_eq!(doc.form_field("name").map(|f| f.kind), Some(FieldKind::Text));
    }

    #[test]
    fn test_overlays_for_page_orders_by_z_then_insertion() {
        let mut doc = Document::new("a.pdf", Vec::new(), three_pages(), vec![]);
        doc.overlays.insert(
            0,
            vec![
                Overlay::new(0, text(0.0, 0.0, "top")).with_id("a").with_z(5),
                Overlay::new(0, text(0.0, 0.0, "first")).with_id("b"),
                Overlay::new(0, text(0.0, 0.0, "second")).with_id("c"),
            ],
        );

        let order: Vec<&str> = doc
            .overlays_for_page(0)
            .iter()
            .map(|o| o.id.0.as_str())
            .collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert!(doc.overlays_for_page(2).is_empty());
    }

    #[test]
    fn test_validate_detects_misbound_overlay() {
        let mut doc = Document::new("a.pdf", Vec::new(), three_pages(), vec![]);
        doc.overlays
            .insert(0, vec![Overlay::new(2, text(1.0, 1.0, "x"))]);
        assert!(matches!(
            doc.validate(),
            Err(EditorError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_rotation_serializes_as_degrees() {
        let json = serde_json::to_string(&Rotation::Deg270).unwrap();
        assert_eq!(json, "270");
        let parsed: Rotation = serde_json::from_str("90").unwrap();
        assert_eq!(parsed, Rotation::Deg90);
        assert!(serde_json::from_str::<Rotation>("45").is_err());
    }

    #[test]
    fn test_rotation_from_degrees_normalizes() {
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn test_overlay_json_is_tagged_by_kind() {
        let overlay = Overlay::new(0, text(10.0, 20.0, "Hello")).with_id("t1");
        let json = serde_json::to_value(&overlay).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["id"], "t1");
        assert_eq!(json["text"], "Hello");

        let back: Overlay = serde_json::from_value(json).unwrap();
        assert_eq!(back, overlay);
    }

    #[test]
    fn test_overlay_defaults_when_deserializing() {
        let json = r#"{"id":"r","page_index":1,"kind":"rect","x":1,"y":2,"w":3,"h":4,"stroke":2}"#;
        let overlay: Overlay = serde_json::from_str(json).unwrap();
        assert_eq!(overlay.opacity, 1.0);
        assert_eq!(overlay.z, 0);
        assert!(!overlay.locked);
        assert!(matches!(overlay.kind, OverlayKind::Rect(RectOverlay { fill: false, .. })));
    }

    #[test]
    fn test_translated_moves_every_point() {
        let ink = OverlayKind::Ink(InkOverlay {
            path: vec![Point { x: 0.0, y: 0.0 }, Point { x: 10.0, y: 5.0 }],
            stroke: 2.0,
            color: Color::BLACK,
        });
        let moved = ink.translated(3.0, -1.0);
        let OverlayKind::Ink(moved) = moved else {
            panic!("expected ink");
        };
        assert_eq!(
            moved.path,
            vec![Point { x: 3.0, y: -1.0 }, Point { x: 13.0, y: 4.0 }]
        );
    }

    #[test]
    fn test_bounds_of_arrow_is_normalized() {
        let arrow = OverlayKind::Arrow(ArrowOverlay {
            x1: 50.0,
            y1: 80.0,
            x2: 10.0,
            y2: 20.0,
            stroke: 1.0,
            color: Color::BLACK,
        });
        assert_eq!(
            arrow.bounds(),
            Rect {
                x: 10.0,
                y: 20.0,
                w: 40.0,
                h: 60.0
            }
        );
    }

    #[test]
    fn test_color_from_hex() {
        assert_eq!(Color::from_hex("#FFFF00"), Color::YELLOW);
        assert_eq!(Color::from_hex("000000"), Color::BLACK);
        assert_eq!(Color::from_hex("#FFF"), Color::BLACK);
    }

    #[test]
    fn test_color_from_hex_rejects_multibyte_input() {
        assert_eq!(Color::from_hex("#a\u{20ac}bc"), Color::BLACK);
        assert_eq!(Color::from_hex("ff\u{e9}0000"), Color::BLACK);
    }

    #[test]
    fn test_color_deserializes_from_hex_or_components() {
        let hex: Color = serde_json::from_str(r##""#ffff00""##).unwrap();
        assert_eq!(hex, Color::YELLOW);
        let rgb: Color = serde_json::from_str(r#"{"r":1,"g":1,"b":0}"#).unwrap();
        assert_eq!(rgb, Color::YELLOW);
        let round: Color = serde_json::from_str(&serde_json::to_string(&Color::YELLOW).unwrap()).unwrap();
        assert_eq!(round, Color::YELLOW);
    }

    #[test]
    fn test_font_family_deserializes_css_names() {
        let family: FontFamily = serde_json::from_str(r#""Georgia, serif""#).unwrap();
        assert_eq!(family, FontFamily::Times);
        let family: FontFamily = serde_json::from_str(r#""Courier""#).unwrap();
        assert_eq!(family, FontFamily::Courier);
        let family: FontFamily = serde_json::from_str(r#""Inter""#).unwrap();
        assert_eq!(family, FontFamily::Inter);
    }

    #[test]
    fn test_font_family_mapping() {
        assert_eq!(FontFamily::from_css_name("serif"), FontFamily::Times);
        assert_eq!(FontFamily::from_css_name("TimesNewRomanPSMT"), FontFamily::Times);
        assert_eq!(FontFamily::from_css_name("Consolas"), FontFamily::Courier);
        assert_eq!(FontFamily::from_css_name("Inter Variable"), FontFamily::Inter);
        assert_eq!(FontFamily::from_css_name("g_d0_f1"), FontFamily::Helvetica);
    }

    #[test]
    fn test_pdf_font_name_variants() {
        let mut t = TextOverlay {
            x: 0.0,
            y: 0.0,
            text: String::new(),
            font_family: FontFamily::Times,
            font_size: 12.0,
            bold: true,
            italic: true,
            color: Color::BLACK,
        };
        assert_eq!(t.pdf_font_name(), "Times-BoldItalic");
        t.font_family = FontFamily::Inter;
        t.bold = false;
        assert_eq!(t.pdf_font_name(), "Helvetica-Oblique");
        t.font_family = FontFamily::Courier;
        t.italic = false;
        assert_eq!(t.pdf_font_name(), "Courier");
    }

    #[test]
    fn test_field_kind_accepts() {
        assert!(FieldKind::Checkbox.accepts(&FieldValue::Bool(true)));
        assert!(!FieldKind::Checkbox.accepts(&FieldValue::Text("on".into())));
        assert!(FieldKind::Radio.accepts(&FieldValue::Text("a".into())));
        assert!(!FieldKind::Dropdown.accepts(&FieldValue::Bool(false)));
    }

    #[test]
    fn test_image_from_data_url() {
        let img = ImageOverlay::from_data_url(1.0, 2.0, 3.0, 4.0, "data:image/png;base64,AAEC")
            .unwrap();
        assert_eq!(img.mime, ImageMime::Png);
        assert_eq!(&*img.data, &[0u8, 1, 2]);

        assert!(ImageOverlay::from_data_url(0.0, 0.0, 1.0, 1.0, "https://x/y.png").is_err());
        assert!(
            ImageOverlay::from_data_url(0.0, 0.0, 1.0, 1.0, "data:image/gif;base64,AA==").is_err()
        );
    }

    #[test]
    fn test_image_overlay_json_accepts_data_url() {
        let json = r#"{"id":"i","page_index":0,"kind":"image","x":1,"y":2,"w":3,"h":4,"src":"data:image/jpeg;base64,AAEC"}"#;
        let overlay: Overlay = serde_json::from_str(json).unwrap();
        match &overlay.kind {
            OverlayKind::Image(img) => {
                assert_eq!(img.mime, ImageMime::Jpeg);
                assert_eq!(&*img.data, &[0u8, 1, 2]);
            }
            other => panic!("unexpected kind: {:?}", other),
        }

        let back: Overlay = serde_json::from_value(serde_json::to_value(&overlay).unwrap()).unwrap();
        assert_eq!(back, overlay);

        let missing = r#"{"id":"i","page_index":0,"kind":"image","x":1,"y":2,"w":3,"h":4}"#;
        assert!(serde_json::from_str::<Overlay>(missing).is_err());
    }

    #[test]
    fn test_document_debug_hides_bytes() {
        let doc = Document::new("a.pdf", vec![0u8; 4096], vec![Page::letter()], vec![]);
        let debug = format!("{:?}", doc);
        assert!(debug.contains("<4096 bytes>"));
    }
}
