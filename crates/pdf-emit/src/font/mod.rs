//! PDF font resources: Type0/CID, Type1 and Type3
//!
//! A font resource is created lazily the first time a glyph of a typeface is
//! drawn. Single-byte fonts (Type1, Type3) cover a window of at most 255
//! glyphs, so a large typeface may need several of them. Type0 fonts address
//! every glyph with two-byte codes and are subset when the document closes.

pub mod advance;
pub mod tounicode;
pub mod type1;
mod typeface;

pub use typeface::{style, BBox, FontFlags, FontType, Typeface};

use crate::object::{format_scalar, Array, Dict, Object, Stream};
use crate::pool::{ObjectHandle, ObjectPool};
use crate::{PdfError, Result};
use advance::{advance_for, compose_advance_data, glyph_widths, scale_from_font_units, MetricType};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;
use subsetter::GlyphRemapper;

/// Glyphs per single-byte font; code 0 is reserved for glyph 0
const MAX_SINGLE_BYTE_GLYPHS: u16 = 255;

/// Set of glyph IDs drawn with a font
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphSet {
    glyphs: BTreeSet<u16>,
}

impl GlyphSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, glyphs: &[u16]) {
        self.glyphs.extend(glyphs.iter().copied());
    }

    pub fn has(&self, glyph: u16) -> bool {
        self.glyphs.contains(&glyph)
    }

    pub fn merge(&mut self, other: &GlyphSet) {
        self.glyphs.extend(other.glyphs.iter().copied());
    }

    /// Glyph IDs in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.glyphs.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// Glyphs used per font resource, in order of first use
#[derive(Debug, Clone, Default)]
pub struct GlyphUsage {
    sets: Vec<(ObjectHandle, GlyphSet)>,
}

impl GlyphUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_glyph_usage(&mut self, font: ObjectHandle, glyphs: &[u16]) {
        self.glyph_set_mut(font).set(glyphs);
    }

    /// Fold another usage map (usually one page's) into this one
    pub fn merge(&mut self, other: &GlyphUsage) {
        for (font, glyphs) in &other.sets {
            self.glyph_set_mut(*font).merge(glyphs);
        }
    }

    pub fn get(&self, font: ObjectHandle) -> Option<&GlyphSet> {
        self.sets
            .iter()
            .find(|(handle, _)| *handle == font)
            .map(|(_, glyphs)| glyphs)
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }

    fn glyph_set_mut(&mut self, font: ObjectHandle) -> &mut GlyphSet {
        let index = match self.sets.iter().position(|(handle, _)| *handle == font) {
            Some(index) => index,
            None => {
                self.sets.push((font, GlyphSet::new()));
                self.sets.len() - 1
            }
        };
        &mut self.sets[index].1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfFontKind {
    /// Composite font with an Identity-H encoded CID descendant
    Type0,
    Type1,
    /// Glyphs drawn from outline content streams
    Type3,
}

impl PdfFontKind {
    fn for_typeface(typeface: &Typeface) -> Self {
        if typeface.flags.multi_master {
            return PdfFontKind::Type3;
        }
        match typeface.font_type {
            FontType::TrueType | FontType::Type1Cid => PdfFontKind::Type0,
            FontType::Type1 => PdfFontKind::Type1,
            FontType::Cff | FontType::Other => PdfFontKind::Type3,
        }
    }
}

/// A font resource in the object pool
#[derive(Debug, Clone)]
pub struct PdfFont {
    typeface: Arc<Typeface>,
    kind: PdfFontKind,
    handle: ObjectHandle,
    first_glyph: u16,
    last_glyph: u16,
    descriptor: Option<ObjectHandle>,
}

impl PdfFont {
    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub fn kind(&self) -> PdfFontKind {
        self.kind
    }

    pub fn typeface(&self) -> &Arc<Typeface> {
        &self.typeface
    }

    pub fn first_glyph(&self) -> u16 {
        self.first_glyph
    }

    pub fn last_glyph(&self) -> u16 {
        self.last_glyph
    }

    pub fn multi_byte_glyphs(&self) -> bool {
        self.kind == PdfFontKind::Type0
    }

    pub fn has_glyph(&self, glyph: u16) -> bool {
        glyph == 0 || (self.first_glyph..=self.last_glyph).contains(&glyph)
    }

    /// Type0 fonts are replaced by a subset at close time
    pub fn can_subset(&self) -> bool {
        self.kind == PdfFontKind::Type0 && self.typeface.can_subset()
    }

    /// Convert glyph IDs to this font's character codes in place
    ///
    /// Returns how many leading glyphs were converted; conversion stops at
    /// the first glyph outside the font's window.
    pub fn glyphs_to_font_encoding(&self, glyphs: &mut [u16]) -> usize {
        if self.multi_byte_glyphs() {
            return glyphs.len();
        }
        for (i, glyph) in glyphs.iter_mut().enumerate() {
            if *glyph == 0 {
                continue;
            }
            if *glyph < self.first_glyph || *glyph > self.last_glyph {
                return i;
            }
            *glyph -= self.first_glyph - 1;
        }
        glyphs.len()
    }

    /// Move the window so it starts at the 255-glyph boundary below `glyph`
    ///
    /// Glyphs past the end of the typeface land in its last window. The
    /// window is never empty, even for a typeface holding only glyph 0.
    fn adjust_range_for_single_byte_encoding(&mut self, glyph: u16) {
        let glyph = glyph.clamp(1, self.last_glyph.max(1)) as i32;
        let first = glyph - (glyph - 1) % MAX_SINGLE_BYTE_GLYPHS as i32;
        self.first_glyph = first as u16;
        let window_end = self.first_glyph as u32 + MAX_SINGLE_BYTE_GLYPHS as u32 - 1;
        if self.last_glyph as u32 > window_end {
            self.last_glyph = window_end as u16;
        }
        self.last_glyph = self.last_glyph.max(self.first_glyph);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    Exact,
    Related,
    None,
}

#[derive(Debug)]
struct FontEntry {
    font_id: u32,
    glyph: u16,
    font: PdfFont,
}

impl FontEntry {
    fn matches(&self, font_id: u32, glyph: u16) -> Match {
        if self.font_id != font_id {
            return Match::None;
        }
        if self.glyph == 0 || glyph == 0 || self.font.has_glyph(glyph) {
            Match::Exact
        } else {
            Match::Related
        }
    }
}

/// Font resources created so far in a document
#[derive(Debug, Default)]
pub struct FontCache {
    fonts: Vec<FontEntry>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn clear(&mut self) {
        self.fonts.clear();
    }

    pub fn fonts(&self) -> impl Iterator<Item = &PdfFont> {
        self.fonts.iter().map(|entry| &entry.font)
    }

    fn find(&self, font_id: u32, glyph: u16) -> (Option<&PdfFont>, Option<&PdfFont>) {
        let mut related = None;
        for entry in &self.fonts {
            match entry.matches(font_id, glyph) {
                Match::Exact => return (Some(&entry.font), None),
                Match::Related => related = Some(&entry.font),
                Match::None => {}
            }
        }
        (None, related)
    }

    /// The font resource that can draw `glyph` of `typeface`, created if needed
    pub fn font_resource(
        &mut self,
        pool: &mut ObjectPool,
        typeface: &Arc<Typeface>,
        glyph: u16,
    ) -> PdfFont {
        let (exact, related) = self.find(typeface.id, glyph);
        if let Some(font) = exact {
            return font.clone();
        }

        let mut related_descriptor = None;
        if let Some(related) = related {
            if related.kind == PdfFontKind::Type0 {
                return related.clone();
            }
            if related.kind == PdfFontKind::Type1 {
                related_descriptor = related.descriptor;
            }
        }

        let font = create_font(pool, typeface, glyph, related_descriptor);
        log::debug!(
            "created {:?} font for {} (glyphs {}..={})",
            font.kind,
            typeface.name,
            font.first_glyph,
            font.last_glyph
        );
        self.fonts.push(FontEntry {
            font_id: typeface.id,
            glyph: font.first_glyph,
            font: font.clone(),
        });
        font
    }

    /// Build a subset replacement for every subsettable Type0 font
    ///
    /// Returns `(original, subset)` pairs for the substitute map. Fonts with
    /// no recorded usage are reduced to glyph 0.
    pub fn build_subsets(
        &self,
        pool: &mut ObjectPool,
        usage: &GlyphUsage,
    ) -> Vec<(ObjectHandle, ObjectHandle)> {
        let empty = GlyphSet::new();
        self.fonts()
            .filter(|font| font.can_subset())
            .map(|font| {
                let glyphs = usage.get(font.handle).unwrap_or(&empty);
                let subset = type0_font(pool, &font.typeface, Some(glyphs));
                (font.handle, pool.add(subset))
            })
            .collect()
    }
}

fn create_font(
    pool: &mut ObjectPool,
    typeface: &Arc<Typeface>,
    glyph: u16,
    related_descriptor: Option<ObjectHandle>,
) -> PdfFont {
    let kind = PdfFontKind::for_typeface(typeface);
    let mut font = PdfFont {
        typeface: Arc::clone(typeface),
        kind,
        handle: pool.add(Dict::with_type("Font")),
        first_glyph: 1,
        last_glyph: typeface.last_glyph_id(),
        descriptor: related_descriptor,
    };

    let dict = match kind {
        PdfFontKind::Type0 => {
            if font.typeface.can_subset() {
                // filled in by the subset at close
                return font;
            }
            type0_font(pool, typeface, None)
        }
        PdfFontKind::Type1 => {
            font.adjust_range_for_single_byte_encoding(glyph);
            type1_font(pool, &mut font)
        }
        PdfFontKind::Type3 => {
            font.adjust_range_for_single_byte_encoding(glyph);
            type3_font(pool, &font)
        }
    };
    if let Ok(slot) = pool.dict_mut(font.handle) {
        *slot = dict;
    }
    font
}

fn font_bbox(bbox: &BBox, em_size: u16) -> Array {
    let mut array = Array::with_capacity(4);
    for value in [bbox.left, bbox.bottom, bbox.right, bbox.top] {
        let value = value.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        array.append_scalar(scale_from_font_units(value, em_size));
    }
    array
}

fn tounicode(
    pool: &mut ObjectPool,
    dict: &mut Dict,
    typeface: &Typeface,
    subset: Option<&GlyphSet>,
    multi_byte: bool,
    first_glyph: u16,
    last_glyph: u16,
) {
    if typeface.glyph_to_unicode.is_empty() {
        return;
    }
    let stream = tounicode::tounicode_stream(
        &typeface.glyph_to_unicode,
        subset,
        multi_byte,
        first_glyph,
        last_glyph,
    );
    dict.insert_obj_ref("ToUnicode", stream, pool);
}

/// Descriptor entries shared by every font kind
fn descriptor_entries(descriptor: &mut Dict, typeface: &Typeface, default_width: i16) {
    let em = typeface.em_size;
    descriptor.insert_name("FontName", typeface.name.as_bytes());
    descriptor.insert_int("Flags", (typeface.style | style::SYMBOLIC) as i32);
    descriptor.insert_scalar("Ascent", scale_from_font_units(typeface.ascent, em));
    descriptor.insert_scalar("Descent", scale_from_font_units(typeface.descent, em));
    descriptor.insert_scalar("StemV", scale_from_font_units(typeface.stem_v, em));
    descriptor.insert_scalar("CapHeight", scale_from_font_units(typeface.cap_height, em));
    descriptor.insert_int("ItalicAngle", typeface.italic_angle as i32);
    descriptor.insert_object("FontBBox", font_bbox(&typeface.bbox, em));
    if default_width > 0 {
        descriptor.insert_scalar("MissingWidth", scale_from_font_units(default_width, em));
    }
}

fn font_program(typeface: &Typeface) -> Option<&[u8]> {
    if !typeface.can_embed() {
        log::warn!("font {} does not allow embedding", typeface.name);
        return None;
    }
    match typeface.font_data.as_deref() {
        Some(data) if !data.is_empty() => Some(data),
        _ => {
            log::warn!("font {} has no font program", typeface.name);
            None
        }
    }
}

/// Subset a TrueType program to glyph 0 and `glyphs`
///
/// The subset numbers its glyphs densely; the returned remapper gives the new
/// glyph ID of every kept glyph.
fn subset_truetype(program: &[u8], glyphs: &GlyphSet) -> Result<(Vec<u8>, GlyphRemapper)> {
    let mut remapper = GlyphRemapper::new();
    remapper.remap(0);
    for glyph in glyphs.iter() {
        remapper.remap(glyph);
    }
    let data = subsetter::subset(program, 0, &remapper)
        .map_err(|e| PdfError::FontSubsetError(format!("{e:?}")))?;
    Ok((data, remapper))
}

/// `/CIDToGIDMap` stream: two bytes per CID, up to the highest kept glyph
fn cid_to_gid_map(remapper: &GlyphRemapper, glyph_ids: &[u16]) -> Stream {
    let last = glyph_ids.iter().copied().max().unwrap_or(0);
    let mut data = Vec::with_capacity((last as usize + 1) * 2);
    for cid in 0..=last {
        let gid = remapper.get(cid).unwrap_or(0);
        data.extend_from_slice(&gid.to_be_bytes());
    }
    Stream::new(data)
}

/// The descriptor, and the remapper when the embedded program was subset
fn cid_font_descriptor(
    pool: &mut ObjectPool,
    typeface: &Typeface,
    subset: Option<&GlyphSet>,
) -> (Dict, Option<GlyphRemapper>) {
    let mut descriptor = Dict::with_type("FontDescriptor");
    descriptor_entries(&mut descriptor, typeface, 0);
    let Some(program) = font_program(typeface) else {
        return (descriptor, None);
    };

    let mut remapper = None;
    match typeface.font_type {
        FontType::TrueType => {
            let data = match subset.filter(|_| typeface.can_subset()) {
                Some(glyphs) => match subset_truetype(program, glyphs) {
                    Ok((data, glyph_map)) => {
                        log::debug!(
                            "subset {} to {} glyphs, {} bytes",
                            typeface.name,
                            glyphs.len(),
                            data.len()
                        );
                        remapper = Some(glyph_map);
                        data
                    }
                    Err(e) => {
                        log::warn!("subsetting {} failed, embedding full font: {e}", typeface.name);
                        program.to_vec()
                    }
                },
                None => program.to_vec(),
            };
            let mut dict = Dict::new();
            dict.insert_int("Length1", data.len() as i32);
            descriptor.insert_obj_ref("FontFile2", Stream::with_dict(dict, data), pool);
        }
        FontType::Cff | FontType::Type1Cid => {
            let mut dict = Dict::new();
            let subtype = if typeface.font_type == FontType::Cff {
                "Type1C"
            } else {
                "CIDFontType0C"
            };
            dict.insert_name("Subtype", subtype);
            descriptor.insert_obj_ref("FontFile3", Stream::with_dict(dict, program.to_vec()), pool);
        }
        FontType::Type1 | FontType::Other => {
            debug_assert!(false, "no CID font program for {:?}", typeface.font_type);
        }
    }
    (descriptor, remapper)
}

fn cid_font(pool: &mut ObjectPool, typeface: &Typeface, subset: Option<&GlyphSet>) -> Dict {
    let glyph_ids: Option<Vec<u16>> = subset.map(|glyphs| {
        let mut ids = Vec::with_capacity(glyphs.len() + 1);
        if !glyphs.has(0) {
            ids.push(0);
        }
        ids.extend(glyphs.iter());
        ids
    });

    let mut dict = Dict::with_type("Font");
    let (descriptor, remapper) = cid_font_descriptor(pool, typeface, subset);
    dict.insert_obj_ref("FontDescriptor", descriptor, pool);
    dict.insert_name("BaseFont", typeface.name.as_bytes());
    if typeface.font_type == FontType::Type1Cid {
        dict.insert_name("Subtype", "CIDFontType0");
    } else {
        dict.insert_name("Subtype", "CIDFontType2");
        // CIDs in content are the original glyph IDs
        match (&remapper, glyph_ids.as_deref()) {
            (Some(remapper), Some(ids)) => {
                dict.insert_obj_ref("CIDToGIDMap", cid_to_gid_map(remapper, ids), pool);
            }
            _ => dict.insert_name("CIDToGIDMap", "Identity"),
        }
    }

    let mut system_info = Dict::new();
    system_info.insert_string("Registry", "Adobe");
    system_info.insert_string("Ordering", "Identity");
    system_info.insert_int("Supplement", 0);
    dict.insert_object("CIDSystemInfo", system_info);

    let metrics = glyph_widths(typeface.glyph_count(), glyph_ids.as_deref(), |g| {
        typeface.advance(g)
    });
    let (widths, default_width) = compose_advance_data(&metrics, typeface.em_size);
    if !widths.is_empty() {
        dict.insert_object("W", widths);
    }
    dict.insert_scalar("DW", scale_from_font_units(default_width, typeface.em_size));
    dict
}

/// A complete Type0 font dictionary, optionally limited to `subset`
fn type0_font(pool: &mut ObjectPool, typeface: &Typeface, subset: Option<&GlyphSet>) -> Dict {
    let mut dict = Dict::with_type("Font");
    dict.insert_name("Subtype", "Type0");
    dict.insert_name("BaseFont", typeface.name.as_bytes());
    dict.insert_name("Encoding", "Identity-H");

    let cid = cid_font(pool, typeface, subset);
    let mut descendants = Array::new();
    descendants.append_obj_ref(cid, pool);
    dict.insert_object("DescendantFonts", descendants);

    tounicode(
        pool,
        &mut dict,
        typeface,
        subset,
        true,
        1,
        typeface.last_glyph_id(),
    );
    dict
}

fn type1_font(pool: &mut ObjectPool, font: &mut PdfFont) -> Dict {
    let typeface = Arc::clone(&font.typeface);
    let metrics = glyph_widths(typeface.glyph_count(), None, |g| typeface.advance(g));
    let default_width = metrics
        .iter()
        .find(|m| m.kind == MetricType::Default)
        .and_then(|m| m.advance.first().copied())
        .unwrap_or(0);

    let mut dict = Dict::with_type("Font");
    let descriptor = match font.descriptor {
        Some(shared) => shared,
        None => {
            let mut descriptor = Dict::with_type("FontDescriptor");
            descriptor_entries(&mut descriptor, &typeface, default_width);
            if let Some(program) = font_program(&typeface) {
                match type1::parse_type1(program) {
                    Some(parsed) => {
                        let mut stream_dict = Dict::new();
                        stream_dict.insert_int("Length1", parsed.header_len as i32);
                        stream_dict.insert_int("Length2", parsed.data_len as i32);
                        stream_dict.insert_int("Length3", parsed.trailer_len as i32);
                        descriptor.insert_obj_ref(
                            "FontFile",
                            Stream::with_dict(stream_dict, parsed.data),
                            pool,
                        );
                    }
                    None => log::warn!("font {} is not a PFB or PFA program", typeface.name),
                }
            }
            let handle = pool.add(descriptor);
            font.descriptor = Some(handle);
            handle
        }
    };
    dict.insert_ref("FontDescriptor", descriptor);
    dict.insert_name("Subtype", "Type1");
    dict.insert_name("BaseFont", typeface.name.as_bytes());

    // code 0 is glyph 0, codes 1.. are the window
    let em = typeface.em_size;
    let width_of = |glyph: u16| advance_for(&metrics, glyph).unwrap_or(default_width);
    let mut widths = Array::new();
    widths.append_scalar(scale_from_font_units(width_of(0), em));
    for glyph in font.first_glyph..=font.last_glyph {
        widths.append_scalar(scale_from_font_units(width_of(glyph), em));
    }
    dict.insert_int("FirstChar", 0);
    dict.insert_int("LastChar", widths.len() as i32 - 1);
    dict.insert_object("Widths", widths);

    let mut differences = Array::with_capacity(font.last_glyph.saturating_sub(font.first_glyph) as usize + 2);
    differences.append_int(1);
    for glyph in font.first_glyph..=font.last_glyph {
        let name = typeface
            .glyph_names
            .get(glyph as usize)
            .map(String::as_str)
            .unwrap_or(".notdef");
        differences.append_name(name);
    }
    let mut encoding = Dict::with_type("Encoding");
    encoding.insert_object("Differences", differences);
    dict.insert_object("Encoding", encoding);
    dict
}

/// Glyph procedure: `d1` metrics followed by the outline in glyph space
fn char_proc(typeface: &Typeface, glyph: u16, width: f32) -> Vec<u8> {
    let em = typeface.em_size;
    let scale = |v: i32| scale_from_font_units(v.clamp(i16::MIN as i32, i16::MAX as i32) as i16, em);
    let bbox = typeface
        .glyph_bboxes
        .get(glyph as usize)
        .copied()
        .unwrap_or_default();

    let mut content = format_scalar(width);
    // glyph space is y-down, so the font's top is the smaller y
    let _ = writeln!(
        content,
        " 0 {} {} {} {} d1",
        scale(bbox.left).round() as i32,
        -scale(bbox.top).round() as i32,
        scale(bbox.right).round() as i32,
        -scale(bbox.bottom).round() as i32
    );

    let mut content = content.into_bytes();
    if let Some(outline) = typeface.glyph_outlines.get(glyph as usize) {
        content.extend_from_slice(outline);
    }
    content
}

fn type3_font(pool: &mut ObjectPool, font: &PdfFont) -> Dict {
    let typeface = &font.typeface;
    let em = typeface.em_size;

    let mut dict = Dict::with_type("Font");
    dict.insert_name("Subtype", "Type3");
    // flip about the x-axis and scale by 1/1000
    let matrix: Array = [0.001, 0.0, 0.0, -0.001, 0.0, 0.0]
        .into_iter()
        .map(|v: f32| Object::Scalar(v))
        .collect();
    dict.insert_object("FontMatrix", matrix);

    let mut char_procs = Dict::new();
    let mut differences = Array::new();
    differences.append_int(1);
    let mut widths = Array::new();
    let mut bbox = BBox::default();
    for glyph in font.first_glyph..=font.last_glyph {
        let name = format!("gid{glyph}");
        differences.append_name(name.as_bytes());

        let width = scale_from_font_units(typeface.advance(glyph), em);
        widths.append_scalar(width);
        if let Some(glyph_bbox) = typeface.glyph_bboxes.get(glyph as usize) {
            bbox.join(glyph_bbox);
        }

        let content = char_proc(typeface, glyph, width);
        char_procs.insert_obj_ref(&name, Stream::new(content), pool);
    }

    let mut encoding = Dict::with_type("Encoding");
    encoding.insert_object("Differences", differences);
    dict.insert_object("CharProcs", char_procs);
    dict.insert_object("Encoding", encoding);

    // same y-down orientation as the glyph procedures
    let flipped = BBox::new(bbox.left, -bbox.top, bbox.right, -bbox.bottom);
    dict.insert_object("FontBBox", font_bbox(&flipped, em));
    dict.insert_int("FirstChar", 1);
    dict.insert_int("LastChar", font.last_glyph as i32 - font.first_glyph as i32 + 1);
    dict.insert_object("Widths", widths);

    tounicode(
        pool,
        &mut dict,
        typeface,
        None,
        false,
        font.first_glyph,
        font.last_glyph,
    );
    dict
}
