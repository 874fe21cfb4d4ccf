//! Parse PDF bytes into an editor document.

use crate::error::CodecError;
use crate::forms::read_fields;
use crate::objects::media_box;
use lopdf::Document as PdfDocument;
use pdfedit_core::{Document, Page};
use std::collections::HashMap;
use std::path::Path;

const PDF_HEADER: &[u8] = b"%PDF-";

/// Build a [`Document`] from PDF bytes. The bytes are kept unchanged as the
/// document's source.
pub fn open(name: &str, bytes: impl Into<Vec<u8>>) -> Result<Document, CodecError> {
    let bytes = bytes.into();
    let pdf = PdfDocument::load_mem(&bytes).map_err(|e| CodecError::InvalidSource(e.to_string()))?;

    let mut pages = Vec::new();
    let mut page_index_of = HashMap::new();
    for (index, (number, page_id)) in pdf.get_pages().into_iter().enumerate() {
        let [x0, y0, x1, y1] = media_box(&pdf, page_id);
        pages.push(Page::from_source(number, x1 - x0, y1 - y0));
        page_index_of.insert(page_id, index);
    }
    if pages.is_empty() {
        return Err(CodecError::InvalidSource("PDF has no pages".into()));
    }

    let forms = read_fields(&pdf, &page_index_of);
    tracing::info!(
        name,
        pages = pages.len(),
        fields = forms.len(),
        "opened PDF"
    );
    Ok(Document::new(name, bytes, pages, forms))
}

/// Read and open a PDF file. Files that neither end in `.pdf` nor start with
/// a PDF header are rejected.
pub fn open_path(path: impl AsRef<Path>) -> Result<Document, CodecError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;

    let has_extension = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !has_extension && !bytes.starts_with(PDF_HEADER) {
        return Err(CodecError::UnsupportedFileType(path.display().to_string()));
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    open(&name, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Object};
    use pretty_assertions::assert_eq;

    fn two_page_pdf() -> Vec<u8> {
        let mut doc = PdfDocument::with_version("1.7");
        let pages_id = doc.new_object_id();
        let letter = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        let a4 = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![10.into(), 10.into(), 605.into(), 852.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![letter.into(), a4.into()],
                "Count" => 2,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_open_reads_page_sizes() {
        let doc = open("two.pdf", two_page_pdf()).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.pages()[0].source, Some(1));
        assert_eq!(doc.pages()[1].width_pt, 595.0);
        assert_eq!(doc.pages()[1].height_pt, 842.0);
        assert_eq!(doc.pages()[1].index, 1);
        assert!(doc.form_fields().is_empty());
        assert_eq!(doc.overlay_count(), 0);
    }

    #[test]
    fn test_open_rejects_garbage() {
        let result = open("junk.pdf", b"hello world".to_vec());
        assert!(matches!(result, Err(CodecError::InvalidSource(_))));
    }

    #[test]
    fn test_open_path_accepts_header_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.bin");
        std::fs::write(&path, two_page_pdf()).unwrap();

        let doc = open_path(&path).unwrap();
        assert_eq!(doc.name(), "scan.bin");
        assert_eq!(doc.page_count(), 2);
    }

    #[test]
    fn test_open_path_rejects_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"just text").unwrap();

        let result = open_path(&path);
        assert!(matches!(result, Err(CodecError::UnsupportedFileType(_))));
    }

    #[test]
    fn test_open_path_missing_file_is_io_error() {
        let result = open_path("/definitely/not/here.pdf");
        assert!(matches!(result, Err(CodecError::Io(_))));
    }
}
