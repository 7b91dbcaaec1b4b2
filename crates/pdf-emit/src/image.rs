//! Image XObjects
//!
//! Encoded JPEG data is embedded unchanged whenever a reader can decode it
//! with `/DCTDecode` as is. Everything else is written as deflated 8-bit
//! pixels, with a separate gray `/SMask` image when the source has alpha.

use crate::canon::{EmitContext, ObjNumMap, SubstituteMap};
use crate::object::{deflate, write_stream_body, Dict};
use crate::pool::{ObjectHandle, ObjectPool};
use crate::{PdfError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GenericImageView};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::{self, Write};

impl From<image::ImageError> for PdfError {
    fn from(err: image::ImageError) -> Self {
        PdfError::ImageError(err.to_string())
    }
}

/// EXIF orientation tag
const ORIENTATION_TAG: u16 = 0x0112;
/// EXIF orientation value for unrotated images
const TOP_LEFT: u16 = 1;

/// Colour model of a JPEG, judged by its component count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColor {
    Gray,
    Yuv,
    Other,
}

/// What a JPEG header says about the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub color: JpegColor,
    /// EXIF orientation, 1 (top-left) when absent
    pub orientation: u16,
}

/// Read the frame header and EXIF orientation of a JPEG
///
/// Scanning stops at the first start-of-scan marker.
pub fn jpeg_info(data: &[u8]) -> Option<JpegInfo> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }

    let mut frame = None;
    let mut orientation = TOP_LEFT;
    let mut i = 2;
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        if marker == 0xFF {
            // fill byte
            i += 1;
            continue;
        }
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            i += 2;
            continue;
        }
        if marker == 0xDA || marker == 0xD9 {
            break;
        }

        let length = u16::from_be_bytes([*data.get(i + 2)?, *data.get(i + 3)?]) as usize;
        if length < 2 {
            return None;
        }
        let segment = data.get(i + 4..i + 2 + length)?;
        match marker {
            0xC0..=0xCF if marker != 0xC4 && marker != 0xC8 && marker != 0xCC => {
                if segment.len() < 6 {
                    return None;
                }
                let height = u16::from_be_bytes([segment[1], segment[2]]) as u32;
                let width = u16::from_be_bytes([segment[3], segment[4]]) as u32;
                let color = match segment[5] {
                    1 => JpegColor::Gray,
                    3 => JpegColor::Yuv,
                    _ => JpegColor::Other,
                };
                frame = Some((width, height, color));
            }
            0xE1 => {
                if let Some(value) = exif_orientation(segment) {
                    orientation = value;
                }
            }
            _ => {}
        }
        i += 2 + length;
    }

    let (width, height, color) = frame?;
    Some(JpegInfo {
        width,
        height,
        color,
        orientation,
    })
}

/// Orientation from an APP1 `Exif\0\0` payload
fn exif_orientation(segment: &[u8]) -> Option<u16> {
    let tiff = segment.strip_prefix(b"Exif\0\0")?;
    let big_endian = match tiff.get(0..2)? {
        b"MM" => true,
        b"II" => false,
        _ => return None,
    };
    let read_u16 = |offset: usize| -> Option<u16> {
        let b = tiff.get(offset..offset + 2)?;
        Some(if big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    };
    let read_u32 = |offset: usize| -> Option<u32> {
        let b = tiff.get(offset..offset + 4)?;
        Some(if big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    };

    let ifd = read_u32(4)? as usize;
    let entries = read_u16(ifd)? as usize;
    for n in 0..entries {
        let entry = ifd + 2 + n * 12;
        if read_u16(entry)? == ORIENTATION_TAG {
            let value = read_u16(entry + 8)?;
            return Some(if (1..=8).contains(&value) { value } else { TOP_LEFT });
        }
    }
    None
}

/// An empty context for objects that never hold references
fn emit_standalone<W: Write + ?Sized>(dict: &Dict, out: &mut W) -> io::Result<()> {
    let nums = ObjNumMap::new();
    let subs = SubstituteMap::new();
    dict.emit(out, &EmitContext::new(&nums, &subs))
}

/// JPEG bytes embedded unchanged with `/DCTDecode`
#[derive(Debug, Clone)]
pub struct JpegImage {
    pub width: u32,
    pub height: u32,
    pub yuv: bool,
    pub data: Vec<u8>,
}

impl JpegImage {
    /// Accept `data` if a PDF reader can display it as an image of
    /// `width` x `height` without any transformation
    pub fn passthrough(data: &[u8], width: u32, height: u32) -> Option<Self> {
        let info = jpeg_info(data)?;
        let good_color = matches!(info.color, JpegColor::Yuv | JpegColor::Gray);
        if info.width != width || info.height != height || !good_color {
            return None;
        }
        if info.orientation != TOP_LEFT {
            return None;
        }
        Some(Self {
            width,
            height,
            yuv: info.color == JpegColor::Yuv,
            data: data.to_vec(),
        })
    }

    pub fn emit<W: Write + ?Sized>(&self, out: &mut W, _ctx: &EmitContext<'_>) -> io::Result<()> {
        let mut dict = Dict::with_type("XObject");
        dict.insert_name("Subtype", "Image");
        dict.insert_int("Width", self.width as i32);
        dict.insert_int("Height", self.height as i32);
        dict.insert_name("ColorSpace", if self.yuv { "DeviceRGB" } else { "DeviceGray" });
        dict.insert_int("BitsPerComponent", 8);
        dict.insert_name("Filter", "DCTDecode");
        dict.insert_int("Length", self.data.len() as i32);
        emit_standalone(&dict, out)?;
        write_stream_body(out, &self.data)
    }
}

/// Colour space of raw pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawColor {
    Rgb,
    Gray,
}

impl RawColor {
    fn channels(self) -> usize {
        match self {
            RawColor::Rgb => 3,
            RawColor::Gray => 1,
        }
    }

    fn color_space(self) -> &'static str {
        match self {
            RawColor::Rgb => "DeviceRGB",
            RawColor::Gray => "DeviceGray",
        }
    }
}

/// Row-major 8-bit pixels, deflated when written
#[derive(Debug, Clone)]
pub struct RawImage {
    width: u32,
    height: u32,
    color: RawColor,
    pixels: Vec<u8>,
    smask: Option<ObjectHandle>,
}

impl RawImage {
    pub fn new(width: u32, height: u32, color: RawColor, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * color.channels()
        );
        Self {
            width,
            height,
            color,
            pixels,
            smask: None,
        }
    }

    pub fn with_smask(mut self, smask: ObjectHandle) -> Self {
        self.smask = Some(smask);
        self
    }

    pub fn smask(&self) -> Option<ObjectHandle> {
        self.smask
    }

    pub fn color(&self) -> RawColor {
        self.color
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn emit<W: Write + ?Sized>(&self, out: &mut W, ctx: &EmitContext<'_>) -> io::Result<()> {
        let data = deflate(&self.pixels)?;
        let mut dict = Dict::with_type("XObject");
        dict.insert_name("Subtype", "Image");
        dict.insert_int("Width", self.width as i32);
        dict.insert_int("Height", self.height as i32);
        dict.insert_name("ColorSpace", self.color.color_space());
        if let Some(smask) = self.smask {
            dict.insert_ref("SMask", smask);
        }
        dict.insert_int("BitsPerComponent", 8);
        dict.insert_name("Filter", "FlateDecode");
        dict.insert_int("Length", data.len() as i32);
        dict.emit(out, ctx)?;
        write_stream_body(out, &data)
    }
}

/// A decoded image plus, when available, the bytes it was decoded from
#[derive(Debug, Clone)]
pub struct ImageSource {
    pub image: DynamicImage,
    pub encoded: Option<Vec<u8>>,
}

impl ImageSource {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            encoded: None,
        }
    }

    /// Decode an encoded image, keeping the bytes for passthrough
    pub fn from_encoded(data: Vec<u8>) -> Result<Self> {
        let image = image::load_from_memory(&data)?;
        Ok(Self {
            image,
            encoded: Some(data),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    fn is_gray(&self) -> bool {
        matches!(
            self.image.color(),
            ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16
        )
    }

    /// True when every pixel is fully opaque
    pub fn is_opaque(&self) -> bool {
        if !self.image.color().has_alpha() {
            return true;
        }
        self.image.pixels().all(|(_, _, pixel)| pixel[3] == u8::MAX)
    }

    /// Hash of the pixels and encoded bytes, used to embed an image once
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.width().hash(&mut hasher);
        self.height().hash(&mut hasher);
        let color = self.image.color();
        (color.bytes_per_pixel(), color.has_alpha(), color.has_color()).hash(&mut hasher);
        self.image.as_bytes().hash(&mut hasher);
        self.encoded.hash(&mut hasher);
        hasher.finish()
    }

    fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let flattened = if self.is_gray() {
            DynamicImage::ImageLuma8(self.image.to_luma8())
        } else {
            DynamicImage::ImageRgb8(self.image.to_rgb8())
        };
        let mut data = Vec::new();
        flattened.write_with_encoder(JpegEncoder::new_with_quality(&mut data, quality))?;
        Ok(data)
    }
}

/// Add the XObject for `source` (and its soft mask) to the pool
///
/// With a `jpeg_quality`, opaque images are re-encoded as JPEG.
pub fn create_image_object(
    pool: &mut ObjectPool,
    source: &ImageSource,
    jpeg_quality: Option<u8>,
) -> ObjectHandle {
    let (width, height) = (source.width(), source.height());
    if let Some(jpeg) = source
        .encoded
        .as_deref()
        .and_then(|data| JpegImage::passthrough(data, width, height))
    {
        log::debug!("embedding {width}x{height} JPEG unchanged");
        return pool.add(jpeg);
    }

    let opaque = source.is_opaque();
    if let Some(quality) = jpeg_quality.filter(|_| opaque) {
        match source.encode_jpeg(quality) {
            Ok(data) => {
                if let Some(jpeg) = JpegImage::passthrough(&data, width, height) {
                    log::debug!("embedding {width}x{height} image as JPEG, quality {quality}");
                    return pool.add(jpeg);
                }
            }
            Err(e) => log::warn!("JPEG re-encode failed, embedding raw pixels: {e}"),
        }
    }

    let color = if source.is_gray() {
        RawColor::Gray
    } else {
        RawColor::Rgb
    };
    let mut image = RawImage::new(width, height, color, color_pixels(source, color));
    if !opaque {
        let alpha = source.image.to_rgba8().pixels().map(|p| p[3]).collect();
        let smask = pool.add(RawImage::new(width, height, RawColor::Gray, alpha));
        image = image.with_smask(smask);
    }
    log::debug!(
        "embedding {width}x{height} image as raw {:?} pixels{}",
        color,
        if opaque { "" } else { " with soft mask" }
    );
    pool.add(image)
}

/// Colour channels without alpha; fully transparent pixels take the
/// alpha-weighted average colour of their 3x3 neighbourhood
fn color_pixels(source: &ImageSource, color: RawColor) -> Vec<u8> {
    let (width, height) = (source.width(), source.height());
    match color {
        RawColor::Rgb => strip_alpha(source.image.to_rgba8().as_raw(), width, height, 3),
        RawColor::Gray => strip_alpha(source.image.to_luma_alpha8().as_raw(), width, height, 1),
    }
}

/// Drop the trailing alpha byte of every pixel of interleaved `data`
fn strip_alpha(data: &[u8], width: u32, height: u32, channels: usize) -> Vec<u8> {
    let (width, height) = (width as usize, height as usize);
    let stride = channels + 1;
    let pixel = |x: usize, y: usize| &data[(y * width + x) * stride..][..stride];

    let mut out = Vec::with_capacity(width * height * channels);
    for y in 0..height {
        for x in 0..width {
            let current = pixel(x, y);
            if current[channels] != 0 {
                out.extend_from_slice(&current[..channels]);
                continue;
            }

            let mut sums = [0u32; 3];
            let mut alpha = 0u32;
            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    let neighbor = pixel(nx, ny);
                    let a = neighbor[channels] as u32;
                    for c in 0..channels {
                        sums[c] += neighbor[c] as u32 * a;
                    }
                    alpha += a;
                }
            }
            for sum in &sums[..channels] {
                out.push(if alpha > 0 { (sum / alpha) as u8 } else { 0 });
            }
        }
    }
    out
}
