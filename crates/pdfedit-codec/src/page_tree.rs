//! Rebuild the page tree from the editor's page list.

use crate::error::CodecError;
use crate::objects::{inherited, native_rotation, real};
use lopdf::{dictionary, Dictionary, Document as PdfDocument, Object, ObjectId};
use pdfedit_core::Page;
use std::collections::HashSet;

/// Attributes a page may inherit from its ancestors. They are copied onto
/// the page itself once it hangs directly off the root.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RebuiltTree {
    /// Page object for each model page, in model order.
    pub page_ids: Vec<ObjectId>,
    /// Source pages that are no longer in the document.
    pub dropped: Vec<ObjectId>,
}

fn pages_root(doc: &PdfDocument) -> Result<ObjectId, CodecError> {
    let catalog = doc
        .catalog()
        .map_err(|_| CodecError::OperationError("No catalog".into()))?;

    catalog
        .get(b"Pages")
        .map_err(|_| CodecError::OperationError("No Pages in catalog".into()))?
        .as_reference()
        .map_err(|_| CodecError::OperationError("Pages is not a reference".into()))
}

/// Make a source page self-contained so it can be re-parented.
fn materialise(doc: &mut PdfDocument, page_id: ObjectId) -> Result<(), CodecError> {
    let mut copied = Vec::new();
    let page = doc.get_dictionary(page_id)?;
    for key in INHERITABLE {
        if !page.has(key) {
            if let Some(value) = inherited(doc, page_id, key) {
                copied.push((key.to_vec(), value.clone()));
            }
        }
    }

    let page = doc.get_dictionary_mut(page_id)?;
    for (key, value) in copied {
        page.set(key, value);
    }
    Ok(())
}

fn source_page(
    doc: &mut PdfDocument,
    page: &Page,
    number: u32,
    object: ObjectId,
    root: ObjectId,
    used: &mut HashSet<ObjectId>,
) -> Result<ObjectId, CodecError> {
    let native = native_rotation(doc, object);
    materialise(doc, object)?;

    // The same source page listed twice gets its own dictionary; content
    // streams and resources stay shared.
    let id = if used.insert(object) {
        object
    } else {
        tracing::debug!(page = number, "duplicating repeated source page");
        let mut copy = doc.get_dictionary(object)?.clone();
        copy.remove(b"Annots");
        doc.add_object(copy)
    };

    let rotation = (native + i64::from(page.rotation.degrees())).rem_euclid(360);
    let dict = doc.get_dictionary_mut(id)?;
    dict.set("Parent", Object::Reference(root));
    dict.set("Rotate", Object::Integer(rotation));
    Ok(id)
}

fn blank_page(doc: &mut PdfDocument, page: &Page, root: ObjectId) -> ObjectId {
    let mut dict = dictionary! {
        "Type" => "Page",
        "Parent" => root,
        "MediaBox" => vec![0.into(), 0.into(), real(page.width_pt), real(page.height_pt)],
        "Resources" => Dictionary::new(),
    };
    if page.rotation.degrees() != 0 {
        dict.set("Rotate", Object::Integer(i64::from(page.rotation.degrees())));
    }
    doc.add_object(dict)
}

/// Replace the document's page tree with a flat one holding `pages` in
/// order. Source pages keep their objects; inserted pages are created blank.
pub(crate) fn rebuild(doc: &mut PdfDocument, pages: &[Page]) -> Result<RebuiltTree, CodecError> {
    let root = pages_root(doc)?;
    let source = doc.get_pages();

    let mut used = HashSet::new();
    let mut page_ids = Vec::with_capacity(pages.len());
    for page in pages {
        let id = match page.source {
            Some(number) => {
                let object = *source.get(&number).ok_or_else(|| {
                    CodecError::OperationError(format!(
                        "Source page {} not found in PDF",
                        number
                    ))
                })?;
                source_page(doc, page, number, object, root, &mut used)?
            }
            None => blank_page(doc, page, root),
        };
        page_ids.push(id);
    }

    let dropped: Vec<ObjectId> = source
        .values()
        .copied()
        .filter(|id| !used.contains(id))
        .collect();

    let pages_dict = doc
        .get_dictionary_mut(root)
        .map_err(|_| CodecError::OperationError("Invalid pages dictionary".into()))?;
    let kids = page_ids
        .iter()
        .map(|&id| Object::Reference(id))
        .collect::<Vec<_>>();
    pages_dict.set("Kids", Object::Array(kids));
    pages_dict.set("Count", Object::Integer(page_ids.len() as i64));

    tracing::debug!(
        pages = page_ids.len(),
        dropped = dropped.len(),
        "rebuilt page tree"
    );
    Ok(RebuiltTree { page_ids, dropped })
}
