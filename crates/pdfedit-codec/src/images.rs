//! Image XObjects for image overlays.
//!
//! PNG is decoded and re-encoded as Flate with a separate soft mask for
//! alpha. JPEG is embedded as-is with DCTDecode.

use crate::error::CodecError;
use crate::objects::name;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document as PdfDocument, Object, ObjectId, Stream};
use pdfedit_core::{ImageMime, ImageOverlay};
use std::io::Write;

/// Embed an overlay's image and return its XObject id, or `None` when the
/// format cannot be embedded.
pub(crate) fn embed_image(
    doc: &mut PdfDocument,
    image: &ImageOverlay,
) -> Result<Option<ObjectId>, CodecError> {
    match image.mime {
        ImageMime::Png => embed_png(doc, &image.data).map(Some),
        ImageMime::Jpeg => embed_jpeg(doc, &image.data).map(Some),
        ImageMime::Svg => {
            tracing::warn!("SVG image overlays cannot be embedded, skipping");
            Ok(None)
        }
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn image_stream(dict: lopdf::Dictionary, data: Vec<u8>) -> Stream {
    let mut stream = Stream::new(dict, data);
    // Already encoded; lopdf must not compress it again.
    stream.allows_compression = false;
    stream
}

fn embed_png(doc: &mut PdfDocument, data: &[u8]) -> Result<ObjectId, CodecError> {
    let mut decoder = png::Decoder::new(data);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| CodecError::ImageError(format!("PNG header: {}", e)))?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buf)
        .map_err(|e| CodecError::ImageError(format!("PNG data: {}", e)))?;
    let pixels = &buf[..frame.buffer_size()];

    let (color_space, channels, has_alpha) = match frame.color_type {
        png::ColorType::Grayscale => ("DeviceGray", 1, false),
        png::ColorType::GrayscaleAlpha => ("DeviceGray", 1, true),
        png::ColorType::Rgb => ("DeviceRGB", 3, false),
        png::ColorType::Rgba => ("DeviceRGB", 3, true),
        png::ColorType::Indexed => {
            return Err(CodecError::ImageError(
                "indexed PNG was not expanded".into(),
            ))
        }
    };

    let (color, alpha) = if has_alpha {
        split_alpha(pixels, channels)
    } else {
        (pixels.to_vec(), Vec::new())
    };

    let (width, height) = (frame.width as i64, frame.height as i64);
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => name(color_space),
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if has_alpha {
        let mask = image_stream(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha)?,
        );
        let mask_id = doc.add_object(mask);
        dict.set("SMask", Object::Reference(mask_id));
    }

    Ok(doc.add_object(image_stream(dict, deflate(&color)?)))
}

/// Split interleaved `channels + 1` samples into color and alpha planes.
fn split_alpha(pixels: &[u8], channels: usize) -> (Vec<u8>, Vec<u8>) {
    let stride = channels + 1;
    let count = pixels.len() / stride;
    let mut color = Vec::with_capacity(count * channels);
    let mut alpha = Vec::with_capacity(count);
    for pixel in pixels.chunks_exact(stride) {
        color.extend_from_slice(&pixel[..channels]);
        alpha.push(pixel[channels]);
    }
    (color, alpha)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JpegInfo {
    pub width: u16,
    pub height: u16,
    pub components: u8,
}

/// Read dimensions from the first start-of-frame marker.
pub(crate) fn jpeg_info(data: &[u8]) -> Option<JpegInfo> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let segment = data.get(pos + 4..pos + 2 + length)?;
            if segment.len() < 6 {
                return None;
            }
            return Some(JpegInfo {
                height: u16::from_be_bytes([segment[1], segment[2]]),
                width: u16::from_be_bytes([segment[3], segment[4]]),
                components: segment[5],
            });
        }
        pos += 2 + length;
    }
    None
}

fn embed_jpeg(doc: &mut PdfDocument, data: &[u8]) -> Result<ObjectId, CodecError> {
    let info = jpeg_info(data)
        .ok_or_else(|| CodecError::ImageError("JPEG has no frame header".into()))?;
    let color_space = match info.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => {
            return Err(CodecError::ImageError(format!(
                "JPEG with {} components",
                n
            )))
        }
    };

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => info.width as i64,
        "Height" => info.height as i64,
        "ColorSpace" => name(color_space),
        "BitsPerComponent" => 8,
        "Filter" => "DCTDecode",
    };
    Ok(doc.add_object(image_stream(dict, data.to_vec())))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn jpeg_info_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = jpeg_info(&data);
        }

        #[test]
        fn split_alpha_partitions_samples(pixels in proptest::collection::vec(any::<u8>(), 0..64)) {
            let whole = pixels.len() / 4 * 4;
            let (color, alpha) = split_alpha(&pixels[..whole], 3);
            prop_assert_eq!(color.len(), whole / 4 * 3);
            prop_assert_eq!(alpha.len(), whole / 4);
        }
    }
}
