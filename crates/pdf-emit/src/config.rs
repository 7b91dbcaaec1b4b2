//! Document-level options

use crate::metadata::Metadata;
use crate::{PdfError, Result};
use serde::{Deserialize, Serialize};

/// Options fixed for the lifetime of a [`PdfDocument`](crate::PdfDocument)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentOptions {
    /// Resolution for content the caller rasterizes before handing it over;
    /// the writer only validates it
    pub raster_dpi: f32,
    /// JPEG quality for re-encoding opaque images; outside 0..=100 keeps
    /// images as deflated pixels
    pub jpeg_quality: i32,
    pub metadata: Metadata,
    /// Hex strings written as the trailer `/ID`
    pub document_id: Option<[String; 2]>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            raster_dpi: 72.0,
            jpeg_quality: -1,
            metadata: Metadata::default(),
            document_id: None,
        }
    }
}

impl DocumentOptions {
    /// Parse options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.raster_dpi.is_finite() && self.raster_dpi > 0.0) {
            return Err(PdfError::ConfigError(format!(
                "raster_dpi must be positive, got {}",
                self.raster_dpi
            )));
        }
        if let Some(id) = &self.document_id {
            for part in id {
                if part.len() % 2 != 0 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(PdfError::ConfigError(format!(
                        "document_id must be hex, got {part:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// The JPEG quality opaque images are re-encoded at, if re-encoding is on
    pub fn reencode_quality(&self) -> Option<u8> {
        u8::try_from(self.jpeg_quality).ok().filter(|q| *q <= 100)
    }

    /// Decoded trailer `/ID` strings
    pub fn document_id_bytes(&self) -> Option<[Vec<u8>; 2]> {
        let [first, second] = self.document_id.as_ref()?;
        Some([decode_hex(first)?, decode_hex(second)?])
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}
