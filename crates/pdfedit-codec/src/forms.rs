//! AcroForm access: field discovery, value write-back, pruning and
//! flattening.
//!
//! Field kinds are decided here from `/FT` and `/Ff`, so the editor model
//! only ever sees the closed [`FieldKind`] set.

use crate::error::CodecError;
use crate::objects::{
    add_resource, annotations, append_content, dict_entry, name, number, pdf_text, real,
    references, resolve, text_string,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document as PdfDocument, Object, ObjectId, StringFormat};
use pdfedit_core::{FieldKind, FieldValue, FormField};
use std::collections::{HashMap, HashSet};

const FLAG_RADIO: i64 = 1 << 15;
const FLAG_PUSHBUTTON: i64 = 1 << 16;
const ANNOT_HIDDEN: i64 = 1 << 1;
const MAX_FIELD_DEPTH: usize = 32;

/// A terminal field in the AcroForm tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldNode {
    pub id: ObjectId,
    /// Fully qualified name, `parent.child`
    pub name: String,
    pub kind: FieldKind,
    /// Widget annotations; the field itself when field and widget are merged.
    pub widgets: Vec<ObjectId>,
}

fn acroform<'a>(doc: &'a PdfDocument) -> Option<&'a Dictionary> {
    let catalog = doc.catalog().ok()?;
    dict_entry(doc, catalog, b"AcroForm")?.as_dict().ok()
}

/// Run `f` against the AcroForm dictionary, wherever it lives.
fn with_acroform<F: FnOnce(&mut Dictionary)>(doc: &mut PdfDocument, f: F) {
    let reference = doc
        .catalog()
        .ok()
        .and_then(|catalog| catalog.get(b"AcroForm").ok())
        .and_then(|obj| obj.as_reference().ok());

    match reference {
        Some(id) => {
            if let Ok(form) = doc.get_dictionary_mut(id) {
                f(form);
            }
        }
        None => {
            if let Ok(catalog) = doc.catalog_mut() {
                if let Ok(Object::Dictionary(form)) = catalog.get_mut(b"AcroForm") {
                    f(form);
                }
            }
        }
    }
}

fn classify(field_type: Option<&[u8]>, flags: i64) -> Option<FieldKind> {
    match field_type? {
        b"Tx" => Some(FieldKind::Text),
        b"Btn" if flags & FLAG_PUSHBUTTON != 0 => None,
        b"Btn" if flags & FLAG_RADIO != 0 => Some(FieldKind::Radio),
        b"Btn" => Some(FieldKind::Checkbox),
        b"Ch" => Some(FieldKind::Dropdown),
        _ => None,
    }
}

/// Every supported terminal field, in document order.
pub(crate) fn collect_fields(doc: &PdfDocument) -> Vec<FieldNode> {
    let mut out = Vec::new();
    let Some(form) = acroform(doc) else {
        return out;
    };
    let roots = form
        .get(b"Fields")
        .map(|fields| references(doc, fields))
        .unwrap_or_default();

    for root in roots {
        walk(doc, root, None, None, 0, 0, &mut out);
    }
    out
}

fn walk(
    doc: &PdfDocument,
    id: ObjectId,
    parent_name: Option<&str>,
    inherited_type: Option<Vec<u8>>,
    inherited_flags: i64,
    depth: usize,
    out: &mut Vec<FieldNode>,
) {
    if depth > MAX_FIELD_DEPTH {
        tracing::warn!(?id, "form field tree too deep, stopping");
        return;
    }
    let Ok(dict) = doc.get_dictionary(id) else {
        return;
    };

    let partial = dict_entry(doc, dict, b"T").and_then(text_string);
    let full_name = match (parent_name, partial) {
        (Some(parent), Some(partial)) => format!("{}.{}", parent, partial),
        (None, Some(partial)) => partial,
        (Some(parent), None) => parent.to_string(),
        (None, None) => return,
    };
    let field_type = dict_entry(doc, dict, b"FT")
        .and_then(|obj| obj.as_name().ok())
        .map(|n| n.to_vec())
        .or(inherited_type);
    let flags = dict
        .get(b"Ff")
        .ok()
        .and_then(|obj| number(doc, obj))
        .map(|n| n as i64)
        .unwrap_or(inherited_flags);

    let kids = dict
        .get(b"Kids")
        .map(|kids| references(doc, kids))
        .unwrap_or_default();
    let child_fields: Vec<ObjectId> = kids
        .iter()
        .copied()
        .filter(|kid| {
            doc.get_dictionary(*kid)
                .map(|d| d.has(b"T"))
                .unwrap_or(false)
        })
        .collect();

    if !child_fields.is_empty() {
        for child in child_fields {
            walk(
                doc,
                child,
                Some(&full_name),
                field_type.clone(),
                flags,
                depth + 1,
                out,
            );
        }
        return;
    }

    let Some(kind) = classify(field_type.as_deref(), flags) else {
        tracing::debug!(name = %full_name, "skipping unsupported form field");
        return;
    };
    let widgets = if kids.is_empty() { vec![id] } else { kids };

    out.push(FieldNode {
        id,
        name: full_name,
        kind,
        widgets,
    });
}

/// Extract the form field snapshot for the editor model. `page_index_of`
/// maps page object ids to model indices.
pub(crate) fn read_fields(
    doc: &PdfDocument,
    page_index_of: &HashMap<ObjectId, usize>,
) -> Vec<FormField> {
    let nodes = collect_fields(doc);
    if nodes.is_empty() {
        return Vec::new();
    }

    let mut annot_page: HashMap<ObjectId, usize> = HashMap::new();
    for (&page_id, &index) in page_index_of {
        for annot in annotations(doc, page_id) {
            annot_page.insert(annot, index);
        }
    }

    let mut seen = HashSet::new();
    nodes
        .into_iter()
        .filter(|node| seen.insert(node.name.clone()))
        .map(|node| {
            let page_index = node
                .widgets
                .iter()
                .find_map(|widget| widget_page(doc, *widget, page_index_of, &annot_page))
                .unwrap_or(0);
            FormField::new(node.name, node.kind, page_index)
        })
        .collect()
}

fn widget_page(
    doc: &PdfDocument,
    widget: ObjectId,
    page_index_of: &HashMap<ObjectId, usize>,
    annot_page: &HashMap<ObjectId, usize>,
) -> Option<usize> {
    let from_p = doc
        .get_dictionary(widget)
        .ok()
        .and_then(|w| w.get(b"P").ok())
        .and_then(|p| p.as_reference().ok())
        .and_then(|page_id| page_index_of.get(&page_id).copied());
    from_p.or_else(|| annot_page.get(&widget).copied())
}

/// Appearance state names of a widget other than `Off`.
fn on_states(doc: &PdfDocument, widget: ObjectId) -> Vec<Vec<u8>> {
    let Ok(dict) = doc.get_dictionary(widget) else {
        return Vec::new();
    };
    dict_entry(doc, dict, b"AP")
        .and_then(|ap| ap.as_dict().ok())
        .and_then(|ap| dict_entry(doc, ap, b"N"))
        .and_then(|normal| normal.as_dict().ok())
        .map(|states| {
            states
                .iter()
                .map(|(key, _)| key.clone())
                .filter(|key| key.as_slice() != b"Off")
                .collect()
        })
        .unwrap_or_default()
}

fn set_on(doc: &mut PdfDocument, id: ObjectId, key: &str, value: Object) -> Result<(), CodecError> {
    doc.get_dictionary_mut(id)?.set(key, value);
    Ok(())
}

/// Writes a model value into a PDF form field.
pub(crate) trait ApplyValue {
    fn apply_value(
        &self,
        doc: &mut PdfDocument,
        field: &FieldNode,
        value: &FieldValue,
    ) -> Result<(), CodecError>;
}

impl ApplyValue for FieldKind {
    fn apply_value(
        &self,
        doc: &mut PdfDocument,
        field: &FieldNode,
        value: &FieldValue,
    ) -> Result<(), CodecError> {
        match (self, value) {
            (FieldKind::Text, FieldValue::Text(text)) => {
                set_on(doc, field.id, "V", pdf_text(text))?;
                // Stale appearances would show the old text; viewers rebuild
                // them from /V because NeedAppearances is set.
                for widget in &field.widgets {
                    doc.get_dictionary_mut(*widget)?.remove(b"AP");
                }
            }
            (FieldKind::Dropdown, FieldValue::Text(choice)) => {
                set_on(doc, field.id, "V", pdf_text(choice))?;
            }
            (FieldKind::Checkbox, FieldValue::Bool(checked)) => {
                let on = field
                    .widgets
                    .iter()
                    .flat_map(|w| on_states(doc, *w))
                    .next()
                    .unwrap_or_else(|| b"Yes".to_vec());
                let state = if *checked { on } else { b"Off".to_vec() };
                set_on(doc, field.id, "V", Object::Name(state.clone()))?;
                for widget in &field.widgets {
                    set_on(doc, *widget, "AS", Object::Name(state.clone()))?;
                }
            }
            (FieldKind::Radio, FieldValue::Text(option)) => {
                let selected = option.as_bytes().to_vec();
                set_on(doc, field.id, "V", Object::Name(selected.clone()))?;
                for widget in &field.widgets {
                    let state = if on_states(doc, *widget).contains(&selected) {
                        selected.clone()
                    } else {
                        b"Off".to_vec()
                    };
                    set_on(doc, *widget, "AS", Object::Name(state))?;
                }
            }
            (kind, value) => {
                return Err(CodecError::OperationError(format!(
                    "{:?} field {} cannot hold {:?}",
                    kind, field.name, value
                )))
            }
        }
        Ok(())
    }
}

/// Write every set model value into its PDF field. Values whose shape does
/// not fit the field are skipped with a warning. Returns how many fields
/// were written.
pub(crate) fn write_values(doc: &mut PdfDocument, fields: &[FormField]) -> Result<usize, CodecError> {
    let nodes: HashMap<String, FieldNode> = collect_fields(doc)
        .into_iter()
        .map(|node| (node.name.clone(), node))
        .collect();

    let mut written = 0;
    for field in fields {
        let Some(value) = &field.value else {
            continue;
        };
        let Some(node) = nodes.get(&field.name) else {
            tracing::debug!(name = %field.name, "form field no longer in document");
            continue;
        };
        if !field.kind.accepts(value) || node.kind != field.kind {
            tracing::warn!(
                name = %field.name,
                kind = ?field.kind,
                ?value,
                "form value does not match field type, skipping"
            );
            continue;
        }
        node.kind.apply_value(doc, node, value)?;
        written += 1;
    }

    if written > 0 {
        with_acroform(doc, |form| form.set("NeedAppearances", Object::Boolean(true)));
    }
    Ok(written)
}

/// Drop fields whose widgets all sat on `dropped_annots`, and trim dropped
/// widgets from fields that keep some.
pub(crate) fn prune_fields(
    doc: &mut PdfDocument,
    dropped_annots: &HashSet<ObjectId>,
) -> Result<(), CodecError> {
    if dropped_annots.is_empty() {
        return Ok(());
    }

    for node in collect_fields(doc) {
        let remaining: Vec<ObjectId> = node
            .widgets
            .iter()
            .copied()
            .filter(|w| !dropped_annots.contains(w))
            .collect();

        if remaining.is_empty() {
            tracing::debug!(name = %node.name, "removing form field on deleted page");
            detach_field(doc, node.id)?;
        } else if remaining.len() < node.widgets.len() {
            let kids = remaining.into_iter().map(Object::Reference).collect();
            set_on(doc, node.id, "Kids", Object::Array(kids))?;
        }
    }
    Ok(())
}

fn detach_field(doc: &mut PdfDocument, id: ObjectId) -> Result<(), CodecError> {
    let parent = doc
        .get_dictionary(id)?
        .get(b"Parent")
        .ok()
        .and_then(|p| p.as_reference().ok());

    let keep = |obj: &Object| obj.as_reference().map(|r| r != id).unwrap_or(true);
    match parent {
        Some(parent_id) => {
            let parent = doc.get_dictionary_mut(parent_id)?;
            if let Ok(Object::Array(kids)) = parent.get_mut(b"Kids") {
                kids.retain(keep);
            }
        }
        None => with_acroform(doc, |form| {
            if let Ok(Object::Array(fields)) = form.get_mut(b"Fields") {
                fields.retain(keep);
            }
        }),
    }
    Ok(())
}

/// Bake widget appearances into page content and remove the interactive
/// form. Widgets without an appearance stream fall back to their plain
/// value.
pub(crate) fn flatten(doc: &mut PdfDocument, page_ids: &[ObjectId]) -> Result<usize, CodecError> {
    let mut flattened = 0;

    for &page_id in page_ids {
        let annots = annotations(doc, page_id);
        let widgets: Vec<ObjectId> = annots
            .iter()
            .copied()
            .filter(|id| is_widget(doc, *id))
            .collect();
        if widgets.is_empty() {
            continue;
        }

        let mut ops = Vec::new();
        let mut helvetica = None;
        for widget in &widgets {
            if draw_widget(doc, page_id, *widget, &mut helvetica, &mut ops)? {
                flattened += 1;
            }
        }

        if !ops.is_empty() {
            let content = Content { operations: ops }.encode()?;
            append_content(doc, page_id, content)?;
        }

        let page = doc.get_dictionary_mut(page_id)?;
        let kept: Vec<Object> = annots
            .iter()
            .filter(|id| !widgets.contains(*id))
            .map(|id| Object::Reference(*id))
            .collect();
        if kept.is_empty() {
            page.remove(b"Annots");
        } else {
            page.set("Annots", Object::Array(kept));
        }
    }

    if let Ok(catalog) = doc.catalog_mut() {
        catalog.remove(b"AcroForm");
    }
    tracing::debug!(widgets = flattened, "flattened form");
    Ok(flattened)
}

fn is_widget(doc: &PdfDocument, id: ObjectId) -> bool {
    doc.get_dictionary(id)
        .ok()
        .and_then(|d| dict_entry(doc, d, b"Subtype"))
        .and_then(|s| s.as_name().ok())
        .map(|s| s == b"Widget")
        .unwrap_or(false)
}

/// The appearance stream a widget currently shows, if any.
fn normal_appearance(doc: &PdfDocument, widget: &Dictionary) -> Option<ObjectId> {
    let ap = dict_entry(doc, widget, b"AP")?.as_dict().ok()?;
    let normal = ap.get(b"N").ok()?;
    if let Ok(id) = normal.as_reference() {
        if matches!(doc.get_object(id), Ok(Object::Stream(_))) {
            return Some(id);
        }
    }
    let states = resolve(doc, normal).as_dict().ok()?;
    let current = dict_entry(doc, widget, b"AS")?.as_name().ok()?;
    states.get(current).ok()?.as_reference().ok()
}

/// Field value for a widget, looking at the widget and then its parent.
fn widget_value(doc: &PdfDocument, widget: &Dictionary) -> Option<String> {
    let direct = dict_entry(doc, widget, b"V");
    let value = direct.or_else(|| {
        let parent = dict_entry(doc, widget, b"Parent")?.as_dict().ok()?;
        dict_entry(doc, parent, b"V")
    })?;
    match value {
        Object::String(..) => text_string(value),
        _ => None,
    }
}

fn rect_of(doc: &PdfDocument, dict: &Dictionary, key: &[u8]) -> Option<[f64; 4]> {
    let items = dict_entry(doc, dict, key)?.as_array().ok()?;
    if items.len() != 4 {
        return None;
    }
    let v: Vec<f64> = items.iter().filter_map(|o| number(doc, o)).collect();
    (v.len() == 4).then(|| [v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])])
}

fn draw_widget(
    doc: &mut PdfDocument,
    page_id: ObjectId,
    widget_id: ObjectId,
    helvetica: &mut Option<String>,
    ops: &mut Vec<Operation>,
) -> Result<bool, CodecError> {
    let widget = doc.get_dictionary(widget_id)?.clone();
    let flags = widget
        .get(b"F")
        .ok()
        .and_then(|f| number(doc, f))
        .map(|f| f as i64)
        .unwrap_or(0);
    if flags & ANNOT_HIDDEN != 0 {
        return Ok(false);
    }
    let Some([x0, y0, x1, y1]) = rect_of(doc, &widget, b"Rect") else {
        return Ok(false);
    };
    let (w, h) = (x1 - x0, y1 - y0);

    if let Some(stream_id) = normal_appearance(doc, &widget) {
        let bbox = doc
            .get_object(stream_id)
            .ok()
            .and_then(|obj| obj.as_stream().ok())
            .and_then(|stream| rect_of(doc, &stream.dict, b"BBox"))
            .unwrap_or([0.0, 0.0, w, h]);
        let (bw, bh) = (bbox[2] - bbox[0], bbox[3] - bbox[1]);
        let sx = if bw > 0.0 { w / bw } else { 1.0 };
        let sy = if bh > 0.0 { h / bh } else { 1.0 };

        if let Ok(Object::Stream(stream)) = doc.get_object_mut(stream_id) {
            stream.dict.set("Type", name("XObject"));
            stream.dict.set("Subtype", name("Form"));
        }
        let key = add_resource(doc, page_id, "XObject", "PeFx", Object::Reference(stream_id))?;

        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                real(sx),
                real(0.0),
                real(0.0),
                real(sy),
                real(x0 - bbox[0] * sx),
                real(y0 - bbox[1] * sy),
            ],
        ));
        ops.push(Operation::new("Do", vec![name(&key)]));
        ops.push(Operation::new("Q", vec![]));
        return Ok(true);
    }

    let Some(text) = widget_value(doc, &widget).filter(|t| !t.is_empty()) else {
        return Ok(false);
    };
    let size = (h * 0.7).clamp(4.0, 12.0);
    let font = match helvetica {
        Some(key) => key.clone(),
        None => {
            let key = add_resource(
                doc,
                page_id,
                "Font",
                "PeHelv",
                Object::Dictionary(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                }),
            )?;
            *helvetica = Some(key.clone());
            key
        }
    };
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![name(&font), real(size)]));
    ops.push(Operation::new("g", vec![real(0.0)]));
    ops.push(Operation::new(
        "Td",
        vec![real(x0 + 2.0), real(y0 + (h - size) / 2.0 + size * 0.2)],
    ));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(
            crate::render::win_ansi(&text),
            StringFormat::Literal,
        )],
    ));
    ops.push(Operation::new("ET", vec![]));
    Ok(true)
}
