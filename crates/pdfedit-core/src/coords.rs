//! Coordinate transformation between viewport pixels and document units
//!
//! Viewport space has its origin at the top-left of the rendered page and
//! grows downward. Document space is in PDF points with a bottom-left origin.

use crate::model::Page;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub w: f64,
    pub h: f64,
}

/// Axis-aligned rectangle anchored at its lower-left corner in document
/// space, or its top-left corner in viewport space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// How a page is currently displayed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportInfo {
    pub scale: f64,
    pub width_px: f64,
    pub height_px: f64,
}

impl ViewportInfo {
    /// Viewport for `page` rendered at `scale` pixels per point.
    pub fn for_page(page: &Page, scale: f64) -> Self {
        Self {
            scale,
            width_px: page.width_pt * scale,
            height_px: page.height_pt * scale,
        }
    }

    /// The transforms divide by `scale`; callers check this at the input
    /// boundary.
    pub fn is_valid(&self) -> bool {
        self.scale.is_finite() && self.scale > 0.0
    }
}

/// Convert a viewport point (top-left origin, pixels) to document units
/// (bottom-left origin, points)
pub fn to_document_units(point: Point, page: &Page, viewport: &ViewportInfo) -> Point {
    Point {
        x: point.x / viewport.scale,
        y: page.height_pt - point.y / viewport.scale,
    }
}

/// Convert document units back to viewport pixels
pub fn to_pixels(point: Point, page: &Page, viewport: &ViewportInfo) -> Point {
    Point {
        x: point.x * viewport.scale,
        y: (page.height_pt - point.y) * viewport.scale,
    }
}

pub fn size_to_document_units(size: Size, viewport: &ViewportInfo) -> Size {
    Size {
        w: size.w / viewport.scale,
        h: size.h / viewport.scale,
    }
}

pub fn size_to_pixels(size: Size, viewport: &ViewportInfo) -> Size {
    Size {
        w: size.w * viewport.scale,
        h: size.h * viewport.scale,
    }
}

/// Convert a rectangle dragged out in the viewport (top-left anchor) into a
/// document rectangle anchored at its lower-left corner.
pub fn rect_to_document_units(rect: Rect, page: &Page, viewport: &ViewportInfo) -> Rect {
    let bottom_left = to_document_units(
        Point {
            x: rect.x,
            y: rect.y + rect.h,
        },
        page,
        viewport,
    );
    let size = size_to_document_units(Size { w: rect.w, h: rect.h }, viewport);
    Rect {
        x: bottom_left.x,
        y: bottom_left.y,
        w: size.w,
        h: size.h,
    }
}

pub fn center_of(x: f64, y: f64, w: f64, h: f64) -> Point {
    Point {
        x: x + w / 2.0,
        y: y + h / 2.0,
    }
}

/// Inclusive on all four edges.
pub fn contains_point(point: Point, rect: Rect) -> bool {
    point.x >= rect.x
        && point.x <= rect.x + rect.w
        && point.y >= rect.y
        && point.y <= rect.y + rect.h
}

pub fn distance(p1: Point, p2: Point) -> f64 {
    (p2.x - p1.x).hypot(p2.y - p1.y)
}

/// Round each axis to the nearest multiple of `grid_size`. A non-positive
/// grid disables snapping.
pub fn snap_to_grid(point: Point, grid_size: f64) -> Point {
    if grid_size <= 0.0 || !grid_size.is_finite() {
        return point;
    }
    Point {
        x: (point.x / grid_size).round() * grid_size,
        y: (point.y / grid_size).round() * grid_size,
    }
}
