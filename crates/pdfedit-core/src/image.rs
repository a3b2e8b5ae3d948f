//! Image decoding and XObject embedding for placed images.
//!
//! JPEG data passes straight through as a DCTDecode stream; only the header
//! is scanned for dimensions. PNG data is decoded, split into an RGB (or
//! gray) stream plus an optional alpha channel that becomes an SMask, and
//! recompressed with FlateDecode.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::EditError;

/// Width cap applied when an image is first dropped on a page. Wider images
/// are scaled down keeping aspect ratio; narrower ones keep their natural
/// size. Signature stamps get a tighter cap.
pub const MAX_IMAGE_WIDTH: f64 = 200.0;
pub const MAX_SIGNATURE_WIDTH: f64 = 150.0;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

pub fn sniff_format(bytes: &[u8]) -> Result<ImageFormat, EditError> {
    if bytes.starts_with(&PNG_SIGNATURE) {
        Ok(ImageFormat::Png)
    } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        Ok(ImageFormat::Jpeg)
    } else {
        Err(EditError::InvalidImage(
            "unsupported format, expected PNG or JPEG".to_string(),
        ))
    }
}

/// Pixel data ready to be written into the document as an image XObject.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    color_space: &'static str,
    /// Set for passthrough data that is already in a PDF filter format.
    passthrough_filter: Option<&'static str>,
    data: Vec<u8>,
    /// Raw 8-bit alpha samples, row-major, when the source had transparency.
    alpha: Option<Vec<u8>>,
}

pub fn decode(bytes: &[u8]) -> Result<DecodedImage, EditError> {
    match sniff_format(bytes)? {
        ImageFormat::Jpeg => decode_jpeg(bytes),
        ImageFormat::Png => decode_png(bytes),
    }
}

/// Natural pixel dimensions without a full decode.
pub fn dimensions(bytes: &[u8]) -> Result<(u32, u32), EditError> {
    match sniff_format(bytes)? {
        ImageFormat::Jpeg => {
            let (width, height, _) = jpeg_info(bytes)?;
            Ok((width, height))
        }
        ImageFormat::Png => {
            let decoder = png::Decoder::new(bytes);
            let reader = decoder
                .read_info()
                .map_err(|e| EditError::InvalidImage(e.to_string()))?;
            let info = reader.info();
            Ok((info.width, info.height))
        }
    }
}

/// Display size for a freshly placed image, in page pixels.
pub fn placement_size(width: u32, height: u32, max_width: f64) -> (f64, f64) {
    let (w, h) = (f64::from(width), f64::from(height));
    if w <= max_width {
        return (w, h);
    }
    let scale = max_width / w;
    (max_width, h * scale)
}

fn decode_jpeg(bytes: &[u8]) -> Result<DecodedImage, EditError> {
    let (width, height, components) = jpeg_info(bytes)?;
    let color_space = match components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        other => {
            return Err(EditError::InvalidImage(format!(
                "unsupported JPEG component count {other}"
            )))
        }
    };
    Ok(DecodedImage {
        width,
        height,
        color_space,
        passthrough_filter: Some("DCTDecode"),
        data: bytes.to_vec(),
        alpha: None,
    })
}

/// Scan JPEG segments for the first start-of-frame marker and return
/// (width, height, component count).
fn jpeg_info(bytes: &[u8]) -> Result<(u32, u32, u8), EditError> {
    if bytes.len() < 4 || bytes[0] != 0xff || bytes[1] != 0xd8 {
        return Err(EditError::InvalidImage("not a JPEG stream".to_string()));
    }
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xff {
            return Err(EditError::InvalidImage(
                "malformed JPEG segment marker".to_string(),
            ));
        }
        let marker = bytes[pos + 1];
        // Fill bytes before a marker are legal.
        if marker == 0xff {
            pos += 1;
            continue;
        }
        // Standalone markers carry no length field.
        if marker == 0x01 || (0xd0..=0xd8).contains(&marker) {
            pos += 2;
            continue;
        }
        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        if len < 2 || pos + 2 + len > bytes.len() {
            return Err(EditError::InvalidImage(
                "truncated JPEG segment".to_string(),
            ));
        }
        let is_sof = matches!(marker, 0xc0..=0xcf) && !matches!(marker, 0xc4 | 0xc8 | 0xcc);
        if is_sof {
            if len < 8 || pos + 10 > bytes.len() {
                return Err(EditError::InvalidImage(
                    "truncated JPEG frame header".to_string(),
                ));
            }
            let height = u32::from(u16::from_be_bytes([bytes[pos + 5], bytes[pos + 6]]));
            let width = u32::from(u16::from_be_bytes([bytes[pos + 7], bytes[pos + 8]]));
            let components = bytes[pos + 9];
            return Ok((width, height, components));
        }
        if marker == 0xda {
            // Entropy-coded data follows; a valid file has SOF before this.
            break;
        }
        pos += 2 + len;
    }
    Err(EditError::InvalidImage(
        "missing JPEG frame header".to_string(),
    ))
}

fn decode_png(bytes: &[u8]) -> Result<DecodedImage, EditError> {
    let mut decoder = png::Decoder::new(bytes);
    // Expand palettes and strip 16-bit depth so every row is plain 8-bit.
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| EditError::InvalidImage(e.to_string()))?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| EditError::InvalidImage(e.to_string()))?;
    buf.truncate(info.buffer_size());

    let (width, height) = (info.width, info.height);
    let pixel_count = (width as usize) * (height as usize);

    match info.color_type {
        png::ColorType::Rgb => Ok(DecodedImage {
            width,
            height,
            color_space: "DeviceRGB",
            passthrough_filter: None,
            data: buf,
            alpha: None,
        }),
        png::ColorType::Grayscale => Ok(DecodedImage {
            width,
            height,
            color_space: "DeviceGray",
            passthrough_filter: None,
            data: buf,
            alpha: None,
        }),
        png::ColorType::Rgba => {
            let mut rgb = Vec::with_capacity(pixel_count * 3);
            let mut alpha = Vec::with_capacity(pixel_count);
            let mut has_alpha = false;
            for pixel in buf.chunks_exact(4) {
                rgb.extend_from_slice(&pixel[..3]);
                if pixel[3] != 255 {
                    has_alpha = true;
                }
                alpha.push(pixel[3]);
            }
            Ok(DecodedImage {
                width,
                height,
                color_space: "DeviceRGB",
                passthrough_filter: None,
                data: rgb,
                alpha: has_alpha.then_some(alpha),
            })
        }
        png::ColorType::GrayscaleAlpha => {
            let mut gray = Vec::with_capacity(pixel_count);
            let mut alpha = Vec::with_capacity(pixel_count);
            let mut has_alpha = false;
            for pixel in buf.chunks_exact(2) {
                gray.push(pixel[0]);
                if pixel[1] != 255 {
                    has_alpha = true;
                }
                alpha.push(pixel[1]);
            }
            Ok(DecodedImage {
                width,
                height,
                color_space: "DeviceGray",
                passthrough_filter: None,
                data: gray,
                alpha: has_alpha.then_some(alpha),
            })
        }
        other => Err(EditError::InvalidImage(format!(
            "unsupported PNG color type {other:?}"
        ))),
    }
}

fn flate_compress(data: &[u8]) -> Result<Vec<u8>, EditError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| EditError::InvalidImage(e.to_string()))
}

/// Writes the image (and its SMask, if any) into the document and returns
/// the XObject id to reference from a content stream.
pub fn add_image_xobject(doc: &mut Document, image: &DecodedImage) -> Result<ObjectId, EditError> {
    let smask_id = match &image.alpha {
        Some(alpha) => {
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => i64::from(image.width),
                    "Height" => i64::from(image.height),
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                flate_compress(alpha)?,
            );
            Some(doc.add_object(stream))
        }
        None => None,
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(image.width),
        "Height" => i64::from(image.height),
        "ColorSpace" => image.color_space,
        "BitsPerComponent" => 8,
    };
    let data = match image.passthrough_filter {
        Some(filter) => {
            dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
            image.data.clone()
        }
        None => {
            dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
            flate_compress(&image.data)?
        }
    };
    if let Some(smask_id) = smask_id {
        dict.set("SMask", Object::Reference(smask_id));
    }

    Ok(doc.add_object(Stream::new(dict, data)))
}
