//! Mutation engine
//!
//! Every edit is a pure function from a borrowed [`Document`] to a new one.
//! A stale id or out-of-range page is not an error: the result is simply a
//! document equal to the input, so replaying an edit against a newer
//! document is harmless.

use crate::error::EditorError;
use crate::model::{
    renumber, Color, Document, FieldValue, FontFamily, Overlay, OverlayId, OverlayKind, Page,
    Rotation,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fields of an overlay that can be replaced in place. `id` and
/// `page_index` are fixed; use [`move_overlay`] to rebind.
///
/// `kind` replaces the whole shape. The remaining fields merge into the
/// shape (after `kind`, when both are given) and are ignored by shapes that
/// do not have them. `x` and `y` move the overlay so its bounds start there.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<OverlayKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<FontFamily>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
}

fn merge<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

impl OverlayPatch {
    fn apply_to(&self, overlay: &Overlay) -> Overlay {
        let kind = self.kind.as_ref().unwrap_or(&overlay.kind);
        Overlay {
            id: overlay.id.clone(),
            page_index: overlay.page_index,
            locked: self.locked.unwrap_or(overlay.locked),
            z: self.z.unwrap_or(overlay.z),
            opacity: self.opacity.map(|o| o.clamp(0.0, 1.0)).unwrap_or(overlay.opacity),
            kind: self.merge_fields(kind),
        }
    }

    fn merge_fields(&self, kind: &OverlayKind) -> OverlayKind {
        let mut kind = if self.x.is_some() || self.y.is_some() {
            let origin = kind.bounds();
            let dx = self.x.map_or(0.0, |x| x - origin.x);
            let dy = self.y.map_or(0.0, |y| y - origin.y);
            kind.translated(dx, dy)
        } else {
            kind.clone()
        };

        match &mut kind {
            OverlayKind::Text(t) => {
                merge(&mut t.text, &self.text);
                merge(&mut t.font_family, &self.font_family);
                merge(&mut t.font_size, &self.font_size);
                merge(&mut t.bold, &self.bold);
                merge(&mut t.italic, &self.italic);
                merge(&mut t.color, &self.color);
            }
            OverlayKind::Rect(r) => {
                merge(&mut r.w, &self.w);
                merge(&mut r.h, &self.h);
                merge(&mut r.stroke, &self.stroke);
                merge(&mut r.fill, &self.fill);
                merge(&mut r.color, &self.color);
            }
            OverlayKind::Highlight(h) => merge(&mut h.color, &self.color),
            OverlayKind::Arrow(a) => {
                merge(&mut a.stroke, &self.stroke);
                merge(&mut a.color, &self.color);
            }
            OverlayKind::Ink(i) => {
                merge(&mut i.stroke, &self.stroke);
                merge(&mut i.color, &self.color);
            }
            OverlayKind::Image(i) => {
                merge(&mut i.w, &self.w);
                merge(&mut i.h, &self.h);
            }
        }
        kind
    }
}

/// A serializable edit, as read from an edit script or dispatched by a
/// front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EditOperation {
    AddOverlay {
        overlay: Overlay,
    },
    UpdateOverlay {
        id: OverlayId,
        patch: OverlayPatch,
    },
    DeleteOverlay {
        id: OverlayId,
    },
    MoveOverlay {
        id: OverlayId,
        page_index: usize,
    },
    UpdateFormField {
        name: String,
        value: FieldValue,
    },
    RotatePage {
        index: usize,
        rotation: Rotation,
    },
    DeletePage {
        index: usize,
    },
    InsertPage {
        index: usize,
        page: Page,
    },
    ReorderPages {
        order: Vec<usize>,
    },
}

impl EditOperation {
    pub fn name(&self) -> &'static str {
        match self {
            EditOperation::AddOverlay { .. } => "add_overlay",
            EditOperation::UpdateOverlay { .. } => "update_overlay",
            EditOperation::DeleteOverlay { .. } => "delete_overlay",
            EditOperation::MoveOverlay { .. } => "move_overlay",
            EditOperation::UpdateFormField { .. } => "update_form_field",
            EditOperation::RotatePage { .. } => "rotate_page",
            EditOperation::DeletePage { .. } => "delete_page",
            EditOperation::InsertPage { .. } => "insert_page",
            EditOperation::ReorderPages { .. } => "reorder_pages",
        }
    }

    /// The page this edit targets, for page-scoped edits.
    pub fn page(&self) -> Option<usize> {
        match self {
            EditOperation::AddOverlay { overlay } => Some(overlay.page_index),
            EditOperation::MoveOverlay { page_index, .. } => Some(*page_index),
            EditOperation::RotatePage { index, .. }
            | EditOperation::DeletePage { index }
            | EditOperation::InsertPage { index, .. } => Some(*index),
            EditOperation::UpdateOverlay { .. }
            | EditOperation::DeleteOverlay { .. }
            | EditOperation::UpdateFormField { .. }
            | EditOperation::ReorderPages { .. } => None,
        }
    }

    pub fn from_json_list(json: &str) -> Result<Vec<EditOperation>, EditorError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Run one edit against `doc`.
pub fn apply(doc: &Document, op: &EditOperation) -> Result<Document, EditorError> {
    tracing::debug!(op = op.name(), "applying edit");
    let next = match op {
        EditOperation::AddOverlay { overlay } => add_overlay(doc, overlay.clone()),
        EditOperation::UpdateOverlay { id, patch } => update_overlay(doc, id, patch),
        EditOperation::DeleteOverlay { id } => delete_overlay(doc, id),
        EditOperation::MoveOverlay { id, page_index } => move_overlay(doc, id, *page_index),
        EditOperation::UpdateFormField { name, value } => {
            update_form_field(doc, name, value.clone())
        }
        EditOperation::RotatePage { index, rotation } => rotate_page(doc, *index, *rotation),
        EditOperation::DeletePage { index } => delete_page(doc, *index),
        EditOperation::InsertPage { index, page } => insert_page(doc, *index, page.clone()),
        EditOperation::ReorderPages { order } => reorder_pages(doc, order)?,
    };
    Ok(next)
}

fn locate(doc: &Document, id: &OverlayId) -> Option<(usize, usize)> {
    doc.overlays.iter().find_map(|(page, list)| {
        list.iter()
            .position(|o| &o.id == id)
            .map(|position| (*page, position))
    })
}

/// Append `overlay` to its page's list; it paints above everything with the
/// same `z`.
pub fn add_overlay(doc: &Document, overlay: Overlay) -> Document {
    if overlay.page_index >= doc.page_count() {
        tracing::warn!(
            id = %overlay.id,
            page = overlay.page_index,
            pages = doc.page_count(),
            "overlay targets a missing page, ignoring"
        );
        return doc.clone();
    }
    if doc.find_overlay(&overlay.id).is_some() {
        tracing::warn!(id = %overlay.id, "overlay id already in use, ignoring");
        return doc.clone();
    }

    let mut next = doc.clone();
    next.overlays
        .entry(overlay.page_index)
        .or_default()
        .push(overlay);
    next.touch();
    next
}

pub fn update_overlay(doc: &Document, id: &OverlayId, patch: &OverlayPatch) -> Document {
    let Some((page, position)) = locate(doc, id) else {
        tracing::debug!(id = %id, "update_overlay: no such overlay");
        return doc.clone();
    };

    let mut next = doc.clone();
    if let Some(list) = next.overlays.get_mut(&page) {
        let updated = patch.apply_to(&list[position]);
        list[position] = updated;
    }
    next.touch();
    next
}

pub fn delete_overlay(doc: &Document, id: &OverlayId) -> Document {
    let Some((page, position)) = locate(doc, id) else {
        tracing::debug!(id = %id, "delete_overlay: no such overlay");
        return doc.clone();
    };

    let mut next = doc.clone();
    take_overlay(&mut next.overlays, page, position);
    next.touch();
    next
}

/// Rebind an overlay to another page. It lands at the end of the
/// destination list.
pub fn move_overlay(doc: &Document, id: &OverlayId, new_page_index: usize) -> Document {
    let Some((page, position)) = locate(doc, id) else {
        tracing::debug!(id = %id, "move_overlay: no such overlay");
        return doc.clone();
    };
    if new_page_index >= doc.page_count() {
        tracing::debug!(id = %id, page = new_page_index, "move_overlay: no such page");
        return doc.clone();
    }

    let mut next = doc.clone();
    if let Some(overlay) = take_overlay(&mut next.overlays, page, position) {
        next.overlays
            .entry(new_page_index)
            .or_default()
            .push(Overlay {
                page_index: new_page_index,
                ..overlay
            });
    }
    next.touch();
    next
}

fn take_overlay(
    overlays: &mut BTreeMap<usize, Vec<Overlay>>,
    page: usize,
    position: usize,
) -> Option<Overlay> {
    let list = overlays.get_mut(&page)?;
    let overlay = list.remove(position);
    if list.is_empty() {
        overlays.remove(&page);
    }
    Some(overlay)
}

/// Store a new value for the named field. The value's shape is not checked
/// against the field kind here; the codec skips mismatches on save.
pub fn update_form_field(doc: &Document, name: &str, value: FieldValue) -> Document {
    let Some(position) = doc.forms.iter().position(|f| f.name == name) else {
        tracing::debug!(name, "update_form_field: no such field");
        return doc.clone();
    };

    let mut next = doc.clone();
    next.forms[position].value = Some(value);
    next.touch();
    next
}

/// Set a page's display rotation. Overlay geometry stays in the page's
/// unrotated space.
pub fn rotate_page(doc: &Document, index: usize, rotation: Rotation) -> Document {
    if index >= doc.page_count() {
        tracing::debug!(index, "rotate_page: no such page");
        return doc.clone();
    }

    let mut next = doc.clone();
    next.pages[index].rotation = rotation;
    next.touch();
    next
}

/// Remove a page together with its overlays and form fields, shifting
/// everything bound above it down by one.
pub fn delete_page(doc: &Document, index: usize) -> Document {
    if index >= doc.page_count() {
        tracing::debug!(index, "delete_page: no such page");
        return doc.clone();
    }

    let mut next = doc.clone();
    next.pages.remove(index);
    renumber(&mut next.pages);

    next.overlays = rebind_overlays(&doc.overlays, |page| match page.cmp(&index) {
        std::cmp::Ordering::Less => Some(page),
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Greater => Some(page - 1),
    });

    next.forms = doc
        .forms
        .iter()
        .filter(|f| f.page_index != index)
        .cloned()
        .map(|mut f| {
            if f.page_index > index {
                f.page_index -= 1;
            }
            f
        })
        .collect();

    next.touch();
    next
}

/// Insert `page` before `index`. An index past the end appends.
pub fn insert_page(doc: &Document, index: usize, page: Page) -> Document {
    let index = index.min(doc.page_count());

    let mut next = doc.clone();
    next.pages.insert(index, page);
    renumber(&mut next.pages);

    let shift = |p: usize| if p >= index { p + 1 } else { p };
    next.overlays = rebind_overlays(&doc.overlays, |p| Some(shift(p)));
    for field in &mut next.forms {
        field.page_index = shift(field.page_index);
    }

    next.touch();
    next
}

/// Rearrange pages so that new position `i` holds old page `order[i]`.
///
/// `order` must be a permutation of `0..page_count`; anything else is
/// rejected without touching the document.
pub fn reorder_pages(doc: &Document, order: &[usize]) -> Result<Document, EditorError> {
    let count = doc.page_count();
    if order.len() != count {
        return Err(EditorError::InvalidPermutation(format!(
            "expected {} entries, got {}",
            count,
            order.len()
        )));
    }

    let mut new_of_old = vec![usize::MAX; count];
    for (new_index, &old_index) in order.iter().enumerate() {
        if old_index >= count {
            return Err(EditorError::InvalidPermutation(format!(
                "page {} out of range for {} pages",
                old_index, count
            )));
        }
        if new_of_old[old_index] != usize::MAX {
            return Err(EditorError::InvalidPermutation(format!(
                "page {} listed twice",
                old_index
            )));
        }
        new_of_old[old_index] = new_index;
    }

    let mut next = doc.clone();
    next.pages = order.iter().map(|&old| doc.pages[old].clone()).collect();
    renumber(&mut next.pages);

    next.overlays = rebind_overlays(&doc.overlays, |p| new_of_old.get(p).copied());
    for field in &mut next.forms {
        if let Some(&new_index) = new_of_old.get(field.page_index) {
            field.page_index = new_index;
        }
    }

    next.touch();
    Ok(next)
}

/// Rebuild the page map through `remap`; `None` drops the page's overlays.
fn rebind_overlays(
    overlays: &BTreeMap<usize, Vec<Overlay>>,
    remap: impl Fn(usize) -> Option<usize>,
) -> BTreeMap<usize, Vec<Overlay>> {
    overlays
        .iter()
        .filter_map(|(&page, list)| {
            let target = remap(page)?;
            let rebound = list
                .iter()
                .map(|o| Overlay {
                    page_index: target,
                    ..o.clone()
                })
                .collect();
            Some((target, rebound))
        })
        .collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::model::{Color, RectOverlay};
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Step {
        Add(usize, u8),
        Delete(u8),
        Move(u8, usize),
        DeletePage(usize),
        InsertPage(usize),
        Reorder(Vec<usize>),
        Rotate(usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0usize..6, 0u8..8).prop_map(|(p, id)| Step::Add(p, id)),
            (0u8..8).prop_map(Step::Delete),
            (0u8..8, 0usize..6).prop_map(|(id, p)| Step::Move(id, p)),
            (0usize..6).prop_map(Step::DeletePage),
            (0usize..8).prop_map(Step::InsertPage),
            Just((0..6).collect::<Vec<usize>>())
                .prop_shuffle()
                .prop_map(Step::Reorder),
            (0usize..6).prop_map(Step::Rotate),
        ]
    }

    fn rect(page_index: usize, id: u8) -> Overlay {
        Overlay::new(
            page_index,
            OverlayKind::Rect(RectOverlay {
                x: 0.0,
                y: 0.0,
                w: 1.0,
                h: 1.0,
                stroke: 1.0,
                fill: false,
                color: Color::BLACK,
            }),
        )
        .with_id(format!("o{}", id))
    }

    fn run(doc: &Document, step: &Step) -> Document {
        match step {
            Step::Add(p, id) => add_overlay(doc, rect(*p, *id)),
            Step::Delete(id) => delete_overlay(doc, &format!("o{}", id).into()),
            Step::Move(id, p) => move_overlay(doc, &format!("o{}", id).into(), *p),
            Step::DeletePage(i) => delete_page(doc, *i),
            Step::InsertPage(i) => insert_page(doc, *i, Page::letter()),
            Step::Reorder(order) => {
                // Only valid when the page count matches the generated order.
                let order: Vec<usize> = order
                    .iter()
                    .copied()
                    .filter(|&i| i < doc.page_count())
                    .collect();
                reorder_pages(doc, &order).unwrap_or_else(|_| doc.clone())
            }
            Step::Rotate(i) => rotate_page(doc, *i, Rotation::Deg90),
        }
    }

    proptest! {
        #[test]
        fn invariants_hold_under_random_edits(steps in prop::collection::vec(step(), 0..40)) {
            let mut doc = Document::new(
                "p.pdf",
                Vec::new(),
                vec![Page::letter(), Page::letter(), Page::letter()],
                vec![],
            );
            for s in &steps {
                let before = doc.clone();
                doc = run(&doc, s);
                prop_assert!(doc.validate().is_ok(), "after {:?}: {:?}", s, doc.validate());
                prop_assert!(before.validate().is_ok());
            }
        }

        #[test]
        fn overlays_survive_page_shuffles(
            steps in prop::collection::vec(
                prop_oneof![
                    (0usize..8).prop_map(Step::InsertPage),
                    Just(Step::Reorder(vec![5, 4, 3, 2, 1, 0])),
                    (0usize..6).prop_map(Step::Rotate),
                ],
                0..20,
            )
        ) {
            let mut doc = Document::new(
                "p.pdf",
                Vec::new(),
                vec![Page::letter(), Page::letter(), Page::letter()],
                vec![],
            );
            doc = add_overlay(&doc, rect(0, 0));
            doc = add_overlay(&doc, rect(2, 1));
            for s in &steps {
                doc = run(&doc, s);
            }
            // Inserts, reorders and rotations never drop overlays.
            prop_assert_eq!(doc.overlay_count(), 2);
            prop_assert!(doc.validate().is_ok());
        }
    }
}
