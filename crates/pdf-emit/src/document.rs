//! Streaming document writer
//!
//! Pages are written one at a time: each page's content stream (and every
//! image it uses) is flushed to the output as soon as the page ends, so only
//! the small page and font dictionaries stay in memory until [`close`].
//!
//! [`close`]: PdfDocument::close

use crate::config::DocumentOptions;
use crate::content::{ContentStream, Link, ResourceDict};
use crate::font::{FontCache, GlyphUsage, PdfFont, Typeface};
use crate::image::{create_image_object, ImageSource};
use crate::metadata::Metadata;
use crate::object::{Array, Dict, Stream};
use crate::page_tree::generate_page_tree;
use crate::pool::{ObjectHandle, ObjectPool};
use crate::serializer::{CountingWriter, ObjectSerializer};
use crate::{PdfError, Result};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

/// Everything the renderer produced for one page
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// Content stream operators
    pub content: Vec<u8>,
    pub resources: ResourceDict,
    pub links: Vec<Link>,
    /// Glyphs drawn by `content`, merged into the document's usage at
    /// [`PdfDocument::end_page`]
    pub glyph_usage: GlyphUsage,
}

impl PageContent {
    pub fn new(content: Vec<u8>, resources: ResourceDict) -> Self {
        Self {
            content,
            resources,
            links: Vec::new(),
            glyph_usage: GlyphUsage::new(),
        }
    }

    /// Page content from a builder, keeping the glyphs it drew
    pub fn from_stream(content: ContentStream, resources: ResourceDict) -> Self {
        let (content, glyph_usage) = content.into_parts();
        Self {
            glyph_usage,
            ..Self::new(content, resources)
        }
    }
}

/// Page size in points
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageSize {
    width: f32,
    height: f32,
}

/// A PDF document written incrementally to `W`
///
/// # Example
/// ```ignore
/// let mut doc = PdfDocument::new(Vec::new());
/// doc.begin_page(612.0, 792.0)?;
/// let mut content = ContentStream::new();
/// content.fill_color(Color::rgb(1.0, 0.0, 0.0)).fill_rect(0.0, 0.0, 100.0, 100.0);
/// doc.end_page(PageContent::new(content.into_bytes(), ResourceDict::new()))?;
/// doc.close()?;
/// let bytes = doc.into_inner();
/// ```
pub struct PdfDocument<W: Write> {
    out: CountingWriter<W>,
    options: DocumentOptions,
    pool: ObjectPool,
    serializer: ObjectSerializer,
    /// Page dictionaries in order; `/Parent` is filled in at close
    pages: Vec<ObjectHandle>,
    current_page: Option<PageSize>,
    fonts: FontCache,
    /// Glyphs drawn on the open page
    page_glyph_usage: GlyphUsage,
    /// Glyphs drawn on finished pages
    glyph_usage: GlyphUsage,
    /// Image XObjects by content hash
    images: HashMap<u64, ObjectHandle>,
    /// `/ExtGState` dictionaries by alpha
    graphic_states: HashMap<u32, ObjectHandle>,
}

impl<W: Write> PdfDocument<W> {
    pub fn new(out: W) -> Self {
        Self::create(out, DocumentOptions::default())
    }

    /// Fails with [`PdfError::ConfigError`] when `options` do not validate
    pub fn with_options(out: W, options: DocumentOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::create(out, options))
    }

    fn create(out: W, options: DocumentOptions) -> Self {
        Self {
            out: CountingWriter::new(out),
            options,
            pool: ObjectPool::new(),
            serializer: ObjectSerializer::new(),
            pages: Vec::new(),
            current_page: None,
            fonts: FontCache::new(),
            page_glyph_usage: GlyphUsage::new(),
            glyph_usage: GlyphUsage::new(),
            images: HashMap::new(),
            graphic_states: HashMap::new(),
        }
    }

    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    /// Replace the metadata; has no effect once the first page has begun
    pub fn set_metadata(&mut self, metadata: Metadata) {
        if self.serializer.header_written() {
            log::warn!("metadata set after the Info dictionary was written; ignored");
            return;
        }
        self.options.metadata = metadata;
    }

    /// Start a page of `width` x `height` points
    ///
    /// The file header and Info dictionary are written before the first page.
    pub fn begin_page(&mut self, width: f32, height: f32) -> Result<()> {
        if self.current_page.is_some() {
            return Err(PdfError::PageAlreadyOpen);
        }
        if !self.serializer.header_written() {
            let info = self.options.metadata.to_info_dict();
            self.serializer
                .serialize_header(&mut self.out, &mut self.pool, info)?;
            log::debug!("wrote header");
        }
        self.current_page = Some(PageSize { width, height });
        Ok(())
    }

    pub fn is_page_open(&self) -> bool {
        self.current_page.is_some()
    }

    /// The font resource that draws `glyph` of `typeface`
    ///
    /// Type0 fonts are subset to the glyphs recorded for them, either by
    /// [`ContentStream::show_glyphs`] on a page passed through
    /// [`PageContent::from_stream`] or by [`note_glyph_usage`](Self::note_glyph_usage).
    pub fn font_resource(&mut self, typeface: &Arc<Typeface>, glyph: u16) -> PdfFont {
        self.fonts.font_resource(&mut self.pool, typeface, glyph)
    }

    /// Record glyphs drawn with `font` on the open page, for subsetting
    pub fn note_glyph_usage(&mut self, font: &PdfFont, glyphs: &[u16]) {
        self.page_glyph_usage
            .note_glyph_usage(font.handle(), glyphs);
    }

    /// The image XObject for `source`, written to the output right away
    ///
    /// Drawing the same image again returns the same XObject.
    pub fn image_resource(&mut self, source: &ImageSource) -> Result<ObjectHandle> {
        if self.current_page.is_none() {
            return Err(PdfError::NoOpenPage);
        }
        let key = source.content_hash();
        if let Some(&handle) = self.images.get(&key) {
            return Ok(handle);
        }

        let handle = create_image_object(&mut self.pool, source, self.options.reencode_quality());
        self.serializer.add_object_recursively(handle, &self.pool);
        self.serializer
            .serialize_objects(&mut self.out, &mut self.pool)?;
        self.images.insert(key, handle);
        Ok(handle)
    }

    /// An `/ExtGState` setting stroke and fill alpha
    pub fn alpha_state(&mut self, alpha: f32) -> ObjectHandle {
        let alpha = alpha.clamp(0.0, 1.0);
        let pool = &mut self.pool;
        *self
            .graphic_states
            .entry(alpha.to_bits())
            .or_insert_with(|| {
                let mut dict = Dict::with_type("ExtGState");
                dict.insert_scalar("CA", alpha);
                dict.insert_scalar("ca", alpha);
                pool.add(dict)
            })
    }

    /// Finish the open page
    ///
    /// The content stream is written immediately; the page dictionary is kept
    /// until [`close`](Self::close) builds the page tree.
    pub fn end_page(&mut self, page: PageContent) -> Result<()> {
        let size = self.current_page.take().ok_or(PdfError::NoOpenPage)?;

        let contents = self.pool.add(Stream::new(page.content));
        self.serializer.add_object_recursively(contents, &self.pool);
        self.serializer
            .serialize_objects(&mut self.out, &mut self.pool)?;

        let mut dict = Dict::with_type("Page");
        dict.insert_object("Resources", page.resources.to_dict());
        let mut media_box = Array::with_capacity(4);
        media_box.append_int(0);
        media_box.append_int(0);
        media_box.append_scalar(size.width);
        media_box.append_scalar(size.height);
        dict.insert_object("MediaBox", media_box);
        if !page.links.is_empty() {
            let mut annotations = Array::with_capacity(page.links.len());
            for link in &page.links {
                annotations.append_obj_ref(link.to_dict(), &mut self.pool);
            }
            dict.insert_object("Annots", annotations);
        }
        dict.insert_ref("Contents", contents);
        self.pages.push(self.pool.add(dict));

        self.page_glyph_usage.merge(&page.glyph_usage);
        self.glyph_usage.merge(&self.page_glyph_usage);
        self.page_glyph_usage.clear();
        log::debug!(
            "finished page {} ({}x{})",
            self.pages.len(),
            size.width,
            size.height
        );
        Ok(())
    }

    /// Subset fonts, write the page tree, the catalog and the trailer
    ///
    /// Fails with [`PdfError::NoPages`] when no page was finished; nothing
    /// has been written in that case. The document is reset either way.
    pub fn close(&mut self) -> Result<()> {
        if self.current_page.is_some() {
            return Err(PdfError::PageAlreadyOpen);
        }
        if self.pages.is_empty() {
            self.reset();
            return Err(PdfError::NoPages);
        }
        let result = self.write_trailer();
        self.reset();
        result
    }

    fn write_trailer(&mut self) -> Result<()> {
        for (original, subset) in self.fonts.build_subsets(&mut self.pool, &self.glyph_usage) {
            self.serializer
                .substitutes_mut()
                .set_substitute(original, subset);
        }

        let page_count = self.pages.len();
        let pages = std::mem::take(&mut self.pages);
        let root = generate_page_tree(&mut self.pool, pages)?.ok_or(PdfError::NoPages)?;
        let mut catalog = Dict::with_type("Catalog");
        catalog.insert_ref("Pages", root);
        let catalog = self.pool.add(catalog);

        let id = self.options.document_id_bytes();
        self.serializer
            .serialize_footer(&mut self.out, &mut self.pool, catalog, id.as_ref())?;
        log::debug!(
            "closed document: {} pages, {} objects, {} bytes",
            page_count,
            self.serializer.serialized_count(),
            self.out.bytes_written()
        );
        Ok(())
    }

    /// Drop every page, font and object; bytes already written stay in the
    /// output and must be discarded by the caller
    pub fn abort(&mut self) {
        log::debug!("aborting document after {} pages", self.pages.len());
        self.reset();
    }

    fn reset(&mut self) {
        self.pool.clear();
        self.serializer.reset();
        self.pages.clear();
        self.current_page = None;
        self.fonts.clear();
        self.page_glyph_usage.clear();
        self.glyph_usage.clear();
        self.images.clear();
        self.graphic_states.clear();
    }

    /// Number of finished pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn bytes_written(&self) -> u64 {
        self.out.bytes_written()
    }

    pub fn get_ref(&self) -> &W {
        self.out.get_ref()
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}
