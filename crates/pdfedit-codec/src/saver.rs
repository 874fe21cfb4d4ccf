//! Serialise an editor document back to PDF bytes.

use crate::error::CodecError;
use crate::forms::{flatten, prune_fields, write_values};
use crate::objects::annotations;
use crate::page_tree::rebuild;
use crate::render::draw_overlays;
use lopdf::Document as PdfDocument;
use pdfedit_core::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    /// Bake form fields into page content and drop the interactive form.
    pub flatten_forms: bool,
    /// Draw overlays into page content.
    pub include_overlays: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            flatten_forms: false,
            include_overlays: true,
        }
    }
}

/// Apply the document's pages, form values and overlays to its source bytes
/// and return the new PDF.
pub fn save(doc: &Document, options: &SaveOptions) -> Result<Vec<u8>, CodecError> {
    doc.validate()
        .map_err(|e| CodecError::OperationError(e.to_string()))?;

    let mut pdf = PdfDocument::load_mem(doc.source_bytes())
        .map_err(|e| CodecError::InvalidSource(e.to_string()))?;

    let tree = rebuild(&mut pdf, doc.pages())?;

    let dropped_annots: HashSet<_> = tree
        .dropped
        .iter()
        .flat_map(|&page_id| annotations(&pdf, page_id))
        .collect();
    prune_fields(&mut pdf, &dropped_annots)?;

    let written = write_values(&mut pdf, doc.form_fields())?;

    if options.flatten_forms {
        flatten(&mut pdf, &tree.page_ids)?;
    }

    let mut drawn = 0;
    if options.include_overlays {
        for (index, &page_id) in tree.page_ids.iter().enumerate() {
            let overlays = doc.overlays_for_page(index);
            drawn += draw_overlays(&mut pdf, page_id, &overlays)?;
        }
    }

    pdf.prune_objects();
    pdf.compress();

    let mut output = Vec::new();
    pdf.save_to(&mut output)?;

    tracing::info!(
        name = doc.name(),
        pages = tree.page_ids.len(),
        fields = written,
        overlays = drawn,
        bytes = output.len(),
        "saved PDF"
    );
    Ok(output)
}
