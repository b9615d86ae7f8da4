//! Image-to-PDF: decode a raster image and wrap it in a single-page PDF.
//!
//! The page is sized to the image at 72 DPI (one pixel per point), capped at
//! the 14 400 pt page limit most readers enforce. Any alpha channel is
//! composited onto white because PDF image XObjects without an SMask cannot
//! carry transparency, and every other colour mode is normalised to 8-bit RGB.
//!
//! Baseline JPEGs with one or three components are embedded verbatim with
//! `DCTDecode`; decoding and re-encoding them would only lose quality.
//! Everything else is embedded as zlib-compressed RGB (`FlateDecode`).
//!
//! All functions here are CPU-bound and synchronous; the backend calls them
//! from `spawn_blocking`.

use crate::backend::Backend;
use crate::error::ItemError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, ImageFormat, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Write;
use tracing::debug;

/// Largest page edge, in points, accepted by common PDF readers.
const MAX_PAGE_PT: f64 = 14_400.0;

/// Convert encoded image bytes into a single-page PDF.
pub fn image_to_pdf(bytes: &[u8]) -> Result<Vec<u8>, ItemError> {
    let format = image::guess_format(bytes)
        .map_err(|e| ItemError::failed(Backend::Image, format!("unrecognised image data: {e}")))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ItemError::failed(Backend::Image, format!("failed to decode image: {e}")))?;
    let (width, height) = (img.width(), img.height());

    let xobject = match (format, jpeg_components(bytes)) {
        (ImageFormat::Jpeg, Some(1)) => dct_stream(bytes, width, height, "DeviceGray"),
        (ImageFormat::Jpeg, Some(3)) => dct_stream(bytes, width, height, "DeviceRGB"),
        _ => flate_stream(&to_rgb(&img))?,
    };

    debug!("Image {}x{} ({:?}) → PDF page", width, height, format);
    single_page_pdf(width, height, xobject)
        .map_err(|e| ItemError::failed(Backend::Image, format!("failed to write PDF: {e}")))
}

/// Flatten to 8-bit RGB, compositing transparent pixels onto white.
fn to_rgb(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(rgb.pixels_mut()) {
        let [r, g, b, a] = src.0;
        let a = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        dst.0 = [blend(r), blend(g), blend(b)];
    }
    rgb
}

fn flate_stream(rgb: &RgbImage) -> Result<Stream, ItemError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(rgb.as_raw())
        .and_then(|_| encoder.finish())
        .map(|data| {
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => i64::from(rgb.width()),
                    "Height" => i64::from(rgb.height()),
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                data,
            )
        })
        .map_err(|e| ItemError::failed(Backend::Image, format!("failed to compress pixels: {e}")))
}

fn dct_stream(jpeg: &[u8], width: u32, height: u32, color_space: &str) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg.to_vec(),
    )
}

/// Number of colour components declared by a JPEG's start-of-frame marker.
///
/// Returns `None` for anything that is not a plain 8-bit JPEG frame.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let len = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            // SOF payload: precision(1) height(2) width(2) components(1)
            let precision = *bytes.get(pos + 4)?;
            let components = *bytes.get(pos + 9)?;
            return (precision == 8).then_some(components);
        }
        if marker == 0xDA || len < 2 {
            return None;
        }
        pos += 2 + len;
    }
    None
}

/// Page dimensions in points for an image of `width` x `height` pixels.
fn page_size(width: u32, height: u32) -> (i64, i64) {
    let longest = f64::from(width.max(height));
    let scale = if longest > MAX_PAGE_PT {
        MAX_PAGE_PT / longest
    } else {
        1.0
    };
    let w = (f64::from(width) * scale).round().max(1.0) as i64;
    let h = (f64::from(height) * scale).round().max(1.0) as i64;
    (w, h)
}

fn single_page_pdf(width: u32, height: u32, xobject: Stream) -> Result<Vec<u8>, lopdf::Error> {
    let (pw, ph) = page_size(width, height);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let image_id = doc.add_object(xobject);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![pw.into(), 0.into(), 0.into(), ph.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), pw.into(), ph.into()],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)?;
    Ok(buf)
}
