//! Draw overlays into page content.
//!
//! Overlays are painted as plain content stream operators after the page's
//! own content, so every viewer shows them and nothing stays editable.

use crate::error::CodecError;
use crate::images::embed_image;
use crate::objects::{add_resource, append_content, media_box, name, real};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document as PdfDocument, Object, ObjectId, StringFormat};
use pdfedit_core::{
    ArrowOverlay, Color, HighlightOverlay, ImageOverlay, InkOverlay, Overlay, OverlayKind,
    RectOverlay, TextOverlay,
};
use std::collections::HashMap;
use std::f64::consts::PI;

/// Line advance as a multiple of the font size.
const LINE_HEIGHT: f64 = 1.2;
/// Baseline offset above the text box bottom, as a multiple of the font size.
const DESCENT: f64 = 0.2;
const ARROW_HEAD_ANGLE: f64 = PI / 6.0;
const MIN_ARROW_HEAD: f64 = 10.0;

/// Encode text for a standard-14 font with WinAnsiEncoding. Characters
/// outside the encoding become `?`.
pub(crate) fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            ' '..='~' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8A,
            '‹' => 0x8B,
            'Œ' => 0x8C,
            'Ž' => 0x8E,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9A,
            '›' => 0x9B,
            'œ' => 0x9C,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => b'?',
        })
        .collect()
}

fn fill_color(color: &Color) -> Operation {
    Operation::new("rg", vec![real(color.r), real(color.g), real(color.b)])
}

fn stroke_color(color: &Color) -> Operation {
    Operation::new("RG", vec![real(color.r), real(color.g), real(color.b)])
}

fn op(operator: &str, operands: &[f64]) -> Operation {
    Operation::new(operator, operands.iter().map(|&v| real(v)).collect())
}

/// Builds the operator list for one page, registering resources as it goes.
struct PagePainter<'a> {
    doc: &'a mut PdfDocument,
    page_id: ObjectId,
    ops: Vec<Operation>,
    fonts: HashMap<&'static str, String>,
}

impl<'a> PagePainter<'a> {
    fn new(doc: &'a mut PdfDocument, page_id: ObjectId) -> Self {
        Self {
            doc,
            page_id,
            ops: Vec::new(),
            fonts: HashMap::new(),
        }
    }

    fn font(&mut self, base_font: &'static str) -> Result<String, CodecError> {
        if let Some(key) = self.fonts.get(base_font) {
            return Ok(key.clone());
        }
        let key = add_resource(
            self.doc,
            self.page_id,
            "Font",
            "PeF",
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => name(base_font),
                "Encoding" => "WinAnsiEncoding",
            }),
        )?;
        self.fonts.insert(base_font, key.clone());
        Ok(key)
    }

    /// Push an ExtGState for opacity and blending, if either is needed.
    fn graphics_state(&mut self, opacity: f64, multiply: bool) -> Result<(), CodecError> {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity >= 1.0 && !multiply {
            return Ok(());
        }
        let mut state = dictionary! {
            "Type" => "ExtGState",
            "CA" => real(opacity),
            "ca" => real(opacity),
        };
        if multiply {
            state.set("BM", name("Multiply"));
        }
        let key = add_resource(
            self.doc,
            self.page_id,
            "ExtGState",
            "PeGs",
            Object::Dictionary(state),
        )?;
        self.ops.push(Operation::new("gs", vec![name(&key)]));
        Ok(())
    }

    fn paint(&mut self, overlay: &Overlay) -> Result<bool, CodecError> {
        let multiply = matches!(overlay.kind, OverlayKind::Highlight(_));
        let start = self.ops.len();
        self.ops.push(Operation::new("q", vec![]));
        self.graphics_state(overlay.opacity, multiply)?;

        let drawn = match &overlay.kind {
            OverlayKind::Text(text) => self.text(text)?,
            OverlayKind::Rect(rect) => self.rect(rect),
            OverlayKind::Highlight(highlight) => self.highlight(highlight),
            OverlayKind::Arrow(arrow) => self.arrow(arrow),
            OverlayKind::Ink(ink) => self.ink(ink),
            OverlayKind::Image(image) => self.image(image)?,
        };

        if drawn {
            self.ops.push(Operation::new("Q", vec![]));
        } else {
            self.ops.truncate(start);
        }
        Ok(drawn)
    }

    fn text(&mut self, text: &TextOverlay) -> Result<bool, CodecError> {
        if text.text.trim().is_empty() || text.font_size <= 0.0 {
            return Ok(false);
        }
        let font = self.font(text.pdf_font_name())?;
        let lines: Vec<&str> = text.text.lines().collect();
        let size = text.font_size;

        self.ops.push(Operation::new("BT", vec![]));
        self.ops
            .push(Operation::new("Tf", vec![name(&font), real(size)]));
        self.ops.push(fill_color(&text.color));
        // First line on top, last line resting on the box bottom.
        for (i, line) in lines.iter().enumerate() {
            let below = (lines.len() - 1 - i) as f64;
            let baseline = text.y + size * DESCENT + below * size * LINE_HEIGHT;
            self.ops
                .push(op("Tm", &[1.0, 0.0, 0.0, 1.0, text.x, baseline]));
            self.ops.push(Operation::new(
                "Tj",
                vec![Object::String(win_ansi(line), StringFormat::Literal)],
            ));
        }
        self.ops.push(Operation::new("ET", vec![]));
        Ok(true)
    }

    fn rect(&mut self, rect: &RectOverlay) -> bool {
        self.ops.push(op("w", &[rect.stroke.max(0.0)]));
        self.ops.push(stroke_color(&rect.color));
        if rect.fill {
            self.ops.push(fill_color(&rect.color));
        }
        self.ops.push(op("re", &[rect.x, rect.y, rect.w, rect.h]));
        let paint = if rect.fill { "B" } else { "S" };
        self.ops.push(Operation::new(paint, vec![]));
        true
    }

    fn highlight(&mut self, highlight: &HighlightOverlay) -> bool {
        if highlight.quads.is_empty() {
            return false;
        }
        self.ops.push(fill_color(&highlight.color));
        for quad in &highlight.quads {
            self.ops.push(op("re", &[quad.x, quad.y, quad.w, quad.h]));
        }
        self.ops.push(Operation::new("f", vec![]));
        true
    }

    fn arrow(&mut self, arrow: &ArrowOverlay) -> bool {
        let (dx, dy) = (arrow.x2 - arrow.x1, arrow.y2 - arrow.y1);
        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        let angle = dy.atan2(dx);
        let head = MIN_ARROW_HEAD.max(arrow.stroke * 4.0);
        let wing = |offset: f64| {
            (
                arrow.x2 - head * (angle + offset).cos(),
                arrow.y2 - head * (angle + offset).sin(),
            )
        };
        let (lx, ly) = wing(ARROW_HEAD_ANGLE);
        let (rx, ry) = wing(-ARROW_HEAD_ANGLE);

        self.ops.push(op("w", &[arrow.stroke.max(0.0)]));
        self.ops.push(stroke_color(&arrow.color));
        self.ops.push(fill_color(&arrow.color));
        self.ops.push(op("m", &[arrow.x1, arrow.y1]));
        self.ops.push(op("l", &[arrow.x2, arrow.y2]));
        self.ops.push(Operation::new("S", vec![]));
        self.ops.push(op("m", &[arrow.x2, arrow.y2]));
        self.ops.push(op("l", &[lx, ly]));
        self.ops.push(op("l", &[rx, ry]));
        self.ops.push(Operation::new("h", vec![]));
        self.ops.push(Operation::new("f", vec![]));
        true
    }

    fn ink(&mut self, ink: &InkOverlay) -> bool {
        let Some(first) = ink.path.first() else {
            return false;
        };
        self.ops.push(op("w", &[ink.stroke.max(0.0)]));
        self.ops.push(op("J", &[1.0]));
        self.ops.push(op("j", &[1.0]));
        self.ops.push(stroke_color(&ink.color));
        self.ops.push(op("m", &[first.x, first.y]));
        if ink.path.len() == 1 {
            // A zero-length segment with round caps renders as a dot.
            self.ops.push(op("l", &[first.x, first.y]));
        }
        for point in &ink.path[1..] {
            self.ops.push(op("l", &[point.x, point.y]));
        }
        self.ops.push(Operation::new("S", vec![]));
        true
    }

    fn image(&mut self, image: &ImageOverlay) -> Result<bool, CodecError> {
        let Some(xobject) = embed_image(self.doc, image)? else {
            return Ok(false);
        };
        let key = add_resource(
            self.doc,
            self.page_id,
            "XObject",
            "PeIm",
            Object::Reference(xobject),
        )?;
        self.ops
            .push(op("cm", &[image.w, 0.0, 0.0, image.h, image.x, image.y]));
        self.ops.push(Operation::new("Do", vec![name(&key)]));
        Ok(true)
    }
}

/// Paint `overlays` onto a page in the given order. Returns how many were
/// drawn; overlays with nothing visible are skipped.
pub(crate) fn draw_overlays(
    doc: &mut PdfDocument,
    page_id: ObjectId,
    overlays: &[&Overlay],
) -> Result<usize, CodecError> {
    if overlays.is_empty() {
        return Ok(0);
    }
    let [x0, y0, _, _] = media_box(doc, page_id);

    let mut painter = PagePainter::new(doc, page_id);
    painter.ops.push(Operation::new("q", vec![]));
    // Overlay coordinates are relative to the MediaBox corner.
    if x0 != 0.0 || y0 != 0.0 {
        painter.ops.push(op("cm", &[1.0, 0.0, 0.0, 1.0, x0, y0]));
    }

    let mut drawn = 0;
    for overlay in overlays {
        if painter.paint(overlay)? {
            drawn += 1;
        } else {
            tracing::debug!(id = %overlay.id, kind = overlay.kind.name(), "overlay has nothing to draw");
        }
    }
    painter.ops.push(Operation::new("Q", vec![]));

    if drawn > 0 {
        let content = Content {
            operations: painter.ops,
        }
        .encode()?;
        append_content(doc, page_id, content)?;
    }
    Ok(drawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfedit_core::{ImageMime, Point, Rect};
    use std::sync::Arc;

    fn page_doc(media_box: [i64; 4]) -> (PdfDocument, ObjectId) {
        let mut doc = PdfDocument::with_version("1.7");
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => media_box.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>(),
        });
        (doc, page_id)
    }

    /// Operators of the most recently appended content stream.
    fn drawn_operators(doc: &PdfDocument, page_id: ObjectId) -> Vec<Operation> {
        let contents = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .as_array()
            .unwrap();
        let last = contents.last().unwrap().as_reference().unwrap();
        let stream = doc.get_object(last).unwrap().as_stream().unwrap();
        Content::decode(&stream.content).unwrap().operations
    }

    fn operators(ops: &[Operation]) -> Vec<&str> {
        ops.iter().map(|o| o.operator.as_str()).collect()
    }

    fn page_resources(doc: &PdfDocument, page_id: ObjectId, category: &[u8]) -> lopdf::Dictionary {
        doc.get_dictionary(page_id)
            .unwrap()
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(category)
            .unwrap()
            .as_dict()
            .unwrap()
            .clone()
    }

    fn text(text: &str) -> Overlay {
        Overlay::new(
            0,
            OverlayKind::Text(TextOverlay {
                x: 72.0,
                y: 700.0,
                text: text.into(),
                font_family: Default::default(),
                font_size: 12.0,
                bold: true,
                italic: false,
                color: Color::BLACK,
            }),
        )
    }

    #[test]
    fn test_win_ansi_maps_latin_and_punctuation() {
        assert_eq!(win_ansi("Aé€"), vec![b'A', 0xE9, 0x80]);
        assert_eq!(win_ansi("“hi”"), vec![0x93, b'h', b'i', 0x94]);
        assert_eq!(win_ansi("漢"), vec![b'?']);
    }

    #[test]
    fn test_text_uses_standard_font_per_line() {
        let (mut doc, page_id) = page_doc([0, 0, 612, 792]);
        let overlay = text("first\nsecond");
        assert_eq!(draw_overlays(&mut doc, page_id, &[&overlay]).unwrap(), 1);

        let ops = drawn_operators(&doc, page_id);
        let names = operators(&ops);
        assert_eq!(names.iter().filter(|&&n| n == "Tj").count(), 2);
        assert_eq!(names.iter().filter(|&&n| n == "Tm").count(), 2);

        let fonts = page_resources(&doc, page_id, b"Font");
        let font = fonts.get(b"PeF0").unwrap().as_dict().unwrap();
        assert_eq!(
            font.get(b"BaseFont").unwrap().as_name().unwrap(),
            b"Helvetica-Bold"
        );
    }

    #[test]
    fn test_empty_text_is_skipped() {
        let (mut doc, page_id) = page_doc([0, 0, 612, 792]);
        let overlay = text("   ");
        assert_eq!(draw_overlays(&mut doc, page_id, &[&overlay]).unwrap(), 0);
        assert!(doc.get_dictionary(page_id).unwrap().get(b"Contents").is_err());
    }

    #[test]
    fn test_filled_rect_and_stroked_rect() {
        let (mut doc, page_id) = page_doc([0, 0, 612, 792]);
        let filled = Overlay::new(
            0,
            OverlayKind::Rect(RectOverlay {
                x: 10.0,
                y: 10.0,
                w: 50.0,
                h: 20.0,
                stroke: 2.0,
                fill: true,
                color: Color::from_hex("#ff0000"),
            }),
        );
        let outline = Overlay::new(
            0,
            OverlayKind::Rect(RectOverlay {
                x: 100.0,
                y: 10.0,
                w: 50.0,
                h: 20.0,
                stroke: 1.0,
                fill: false,
                color: Color::BLACK,
            }),
        );
        assert_eq!(draw_overlays(&mut doc, page_id, &[&filled, &outline]).unwrap(), 2);

        let ops = drawn_operators(&doc, page_id);
        let names = operators(&ops);
        assert!(names.contains(&"B"));
        assert!(names.contains(&"S"));
        assert_eq!(names.iter().filter(|&&n| n == "re").count(), 2);
    }

    #[test]
    fn test_highlight_uses_multiply_blend() {
        let (mut doc, page_id) = page_doc([0, 0, 612, 792]);
        let overlay = Overlay::new(
            0,
            OverlayKind::Highlight(HighlightOverlay {
                quads: vec![
                    Rect {
                        x: 10.0,
                        y: 10.0,
                        w: 100.0,
                        h: 12.0,
                    },
                    Rect {
                        x: 10.0,
                        y: 24.0,
                        w: 80.0,
                        h: 12.0,
                    },
                ],
                color: Color::YELLOW,
            }),
        )
        .with_opacity(0.4);
        draw_overlays(&mut doc, page_id, &[&overlay]).unwrap();

        let states = page_resources(&doc, page_id, b"ExtGState");
        let state = states.get(b"PeGs0").unwrap().as_dict().unwrap();
        assert_eq!(state.get(b"BM").unwrap().as_name().unwrap(), b"Multiply");
        assert_eq!(state.get(b"ca").unwrap(), &Object::Real(0.4));

        let ops = drawn_operators(&doc, page_id);
        assert!(operators(&ops).contains(&"gs"));
    }

    #[test]
    fn test_opaque_shapes_need_no_graphics_state() {
        let (mut doc, page_id) = page_doc([0, 0, 612, 792]);
        let overlay = Overlay::new(
            0,
            OverlayKind::Ink(InkOverlay {
                path: vec![Point { x: 1.0, y: 1.0 }, Point { x: 5.0, y: 8.0 }],
                stroke: 2.0,
                color: Color::BLACK,
            }),
        );
        draw_overlays(&mut doc, page_id, &[&overlay]).unwrap();
        let ops = drawn_operators(&doc, page_id);
        let names = operators(&ops);
        assert!(!names.contains(&"gs"));
        assert!(names.contains(&"J"));
        assert_eq!(names.iter().filter(|&&n| n == "l").count(), 1);
    }

    #[test]
    fn test_single_point_ink_draws_a_dot() {
        let (mut doc, page_id) = page_doc([0, 0, 612, 792]);
        let overlay = Overlay::new(
            0,
            OverlayKind::Ink(InkOverlay {
                path: vec![Point { x: 3.0, y: 3.0 }],
                stroke: 4.0,
                color: Color::BLACK,
            }),
        );
        assert_eq!(draw_overlays(&mut doc, page_id, &[&overlay]).unwrap(), 1);
        let ops = drawn_operators(&doc, page_id);
        assert_eq!(operators(&ops).iter().filter(|&&n| n == "l").count(), 1);
    }

    #[test]
    fn test_arrow_has_shaft_and_filled_head() {
        let (mut doc, page_id) = page_doc([0, 0, 612, 792]);
        let overlay = Overlay::new(
            0,
            OverlayKind::Arrow(ArrowOverlay {
                x1: 0.0,
                y1: 0.0,
                x2: 100.0,
                y2: 0.0,
                stroke: 1.0,
                color: Color::BLACK,
            }),
        );
        draw_overlays(&mut doc, page_id, &[&overlay]).unwrap();
        let ops = drawn_operators(&doc, page_id);
        let names = operators(&ops);
        assert!(names.contains(&"S"));
        assert!(names.contains(&"h"));
        assert!(names.contains(&"f"));
    }

    #[test]
    fn test_offset_media_box_translates_overlays() {
        let (mut doc, page_id) = page_doc([50, 50, 662, 842]);
        let overlay = text("offset");
        draw_overlays(&mut doc, page_id, &[&overlay]).unwrap();
        let ops = drawn_operators(&doc, page_id);
        assert_eq!(ops[1].operator, "cm");
        assert_eq!(ops[1].operands[4].as_float().unwrap(), 50.0);
    }

    #[test]
    fn test_svg_image_is_skipped() {
        let (mut doc, page_id) = page_doc([0, 0, 612, 792]);
        let overlay = Overlay::new(
            0,
            OverlayKind::Image(ImageOverlay {
                x: 0.0,
                y: 0.0,
                w: 10.0,
                h: 10.0,
                mime: ImageMime::Svg,
                data: Arc::from(b"<svg/>".to_vec()),
            }),
        );
        assert_eq!(draw_overlays(&mut doc, page_id, &[&overlay]).unwrap(), 0);
    }

    #[test]
    fn test_png_image_is_placed_with_do() {
        let (mut doc, page_id) = page_doc([0, 0, 612, 792]);
        let overlay = Overlay::new(
            0,
            OverlayKind::Image(ImageOverlay {
                x: 20.0,
                y: 30.0,
                w: 40.0,
                h: 20.0,
                mime: ImageMime::Png,
                data: Arc::from(crate::images::tests::tiny_png()),
            }),
        );
        assert_eq!(draw_overlays(&mut doc, page_id, &[&overlay]).unwrap(), 1);
        let xobjects = page_resources(&doc, page_id, b"XObject");
        assert!(xobjects.has(b"PeIm0"));
        let ops = drawn_operators(&doc, page_id);
        assert!(operators(&ops).contains(&"Do"));
    }
}
