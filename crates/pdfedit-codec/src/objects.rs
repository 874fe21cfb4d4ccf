//! Small helpers over lopdf objects: reference resolution, numbers, text
//! strings, inherited page attributes and content/resource plumbing.

use crate::error::CodecError;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

/// US Letter, used when a page has no usable MediaBox.
pub(crate) const LETTER: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

const MAX_DEPTH: usize = 32;

/// Follow references until a direct object is reached.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..MAX_DEPTH {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => current = target,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

pub(crate) fn dict_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve(doc, obj))
}

pub(crate) fn number(doc: &Document, obj: &Object) -> Option<f64> {
    match resolve(doc, obj) {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

pub(crate) fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

pub(crate) fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

pub(crate) fn references(doc: &Document, obj: &Object) -> Vec<ObjectId> {
    match resolve(doc, obj) {
        Object::Array(items) => items
            .iter()
            .filter_map(|item| item.as_reference().ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise single-byte).
pub(crate) fn text_string(obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        Some(String::from_utf16_lossy(&units))
    } else {
        Some(bytes.iter().map(|&b| b as char).collect())
    }
}

/// Encode `text` as a PDF text string, falling back to UTF-16BE when it is
/// not plain ASCII.
pub(crate) fn pdf_text(text: &str) -> Object {
    if text.is_ascii() {
        Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

/// Look up a page attribute, walking up `/Parent` for inheritable keys.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Page MediaBox as normalized `[x0, y0, x1, y1]`, inherited through the page
/// tree and defaulting to US Letter.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let values: Option<Vec<f64>> = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .filter(|items| items.len() == 4)
        .and_then(|items| items.iter().map(|item| number(doc, item)).collect());

    match values {
        Some(v) => [v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])],
        None => LETTER,
    }
}

pub(crate) fn native_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited(doc, page_id, b"Rotate")
        .and_then(|obj| number(doc, obj))
        .map(|deg| deg as i64)
        .unwrap_or(0)
}

/// Annotation references on a page.
pub(crate) fn annotations(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    doc.get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .map(|annots| references(doc, annots))
        .unwrap_or_default()
}

/// Append `content` after the page's existing content. The existing streams
/// are bracketed by `q`/`Q` so their graphics state cannot leak into ours.
pub(crate) fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
) -> Result<(), CodecError> {
    let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 3);
    if !existing.is_empty() {
        let push = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let pop = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
        contents.push(Object::Reference(push));
        contents.extend(existing);
        contents.push(Object::Reference(pop));
    }
    let added = doc.add_object(Stream::new(Dictionary::new(), content));
    contents.push(Object::Reference(added));

    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Register `value` under `/Resources/<category>` with the first key
/// `<prefix><n>` the page does not use yet, and return that key.
///
/// Inherited or indirect resource dictionaries are copied onto the page
/// first, so sibling pages sharing them are unaffected. Existing entries are
/// never replaced: content drawn by an earlier save keeps its resources.
pub(crate) fn add_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &str,
    prefix: &str,
    value: Object,
) -> Result<String, CodecError> {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let mut entries = resources
        .get(category.as_bytes())
        .ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default();
    let key = (0..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|key| !entries.has(key.as_bytes()))
        .unwrap_or_else(|| prefix.to_string());
    entries.set(key.as_str(), value);
    resources.set(category, Object::Dictionary(entries));

    doc.get_dictionary_mut(page_id)?
        .set("Resources", Object::Dictionary(resources));
    Ok(key)
}
