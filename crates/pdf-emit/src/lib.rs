//! PDF emission backend
//!
//! This crate turns finished page content into a PDF file:
//! - An object model with indirect objects held in an arena
//! - Incremental serialization with an exact cross-reference table
//! - Type0/CID, Type1 and Type3 fonts with compressed widths, ToUnicode maps
//!   and TrueType subsetting
//! - A balanced page tree
//! - Image XObjects with JPEG passthrough and soft masks
//!
//! # Example
//!
//! ```ignore
//! use pdf_emit::{Color, ContentStream, PageContent, PdfDocument, ResourceDict};
//!
//! let mut doc = PdfDocument::new(std::fs::File::create("out.pdf")?);
//! doc.begin_page(612.0, 792.0)?;
//! let mut content = ContentStream::new();
//! content.fill_color(Color::rgb(0.0, 0.0, 1.0)).fill_rect(72.0, 72.0, 200.0, 100.0);
//! doc.end_page(PageContent::new(content.into_bytes(), ResourceDict::new()))?;
//! doc.close()?;
//! ```

pub mod canon;
mod config;
mod content;
mod document;
pub mod font;
pub mod image;
mod metadata;
pub mod object;
pub mod page_tree;
pub mod pool;
pub mod serializer;

pub use config::DocumentOptions;
pub use content::{Color, ContentStream, Link, ResourceDict};
pub use document::{PageContent, PdfDocument};
pub use font::{FontType, GlyphSet, GlyphUsage, PdfFont, PdfFontKind, Typeface};
pub use crate::image::ImageSource;
pub use metadata::{format_date, Metadata};
pub use object::{Array, Dict, Object, Stream};
pub use pool::{ObjectHandle, ObjectPool};

use thiserror::Error;

/// Errors that can occur while writing a document
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("No document produced: the document has no pages")]
    NoPages,

    #[error("A page is already open")]
    PageAlreadyOpen,

    #[error("No page is open")]
    NoOpenPage,

    #[error("Object {0} has already been written")]
    SealedObject(usize),

    #[error("Object {0} is not a dictionary")]
    NotADictionary(usize),

    #[error("Failed to parse font: {0}")]
    FontParseError(String),

    #[error("Font subset error: {0}")]
    FontSubsetError(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for PdfError {
    fn from(err: serde_json::Error) -> Self {
        PdfError::ConfigError(err.to_string())
    }
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PdfError::NoPages.to_string(),
            "No document produced: the document has no pages"
        );
        assert_eq!(
            PdfError::SealedObject(4).to_string(),
            "Object 4 has already been written"
        );
    }

    #[test]
    fn test_json_error_is_config_error() {
        let err: PdfError = serde_json::from_str::<DocumentOptions>("[").unwrap_err().into();
        assert!(matches!(err, PdfError::ConfigError(_)));
    }
}
