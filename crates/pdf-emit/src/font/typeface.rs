//! Typeface metrics consumed by the font writer

use crate::{PdfError, Result};
use ttf_parser::{name_id, Face, GlyphId, Permissions};

/// Outline format of the font program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontType {
    Type1,
    Type1Cid,
    Cff,
    TrueType,
    #[default]
    Other,
}

/// Licensing and format flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FontFlags {
    pub not_embeddable: bool,
    pub not_subsettable: bool,
    pub multi_master: bool,
}

/// PDF font descriptor style flags
pub mod style {
    pub const FIXED_PITCH: u32 = 1 << 0;
    pub const SERIF: u32 = 1 << 1;
    pub const SYMBOLIC: u32 = 1 << 2;
    pub const SCRIPT: u32 = 1 << 3;
    pub const NONSYMBOLIC: u32 = 1 << 5;
    pub const ITALIC: u32 = 1 << 6;
    pub const ALL_CAP: u32 = 1 << 16;
    pub const SMALL_CAP: u32 = 1 << 17;
    pub const FORCE_BOLD: u32 = 1 << 18;
}

/// Integer rectangle in font units, y up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BBox {
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
    pub top: i32,
}

impl BBox {
    pub fn new(left: i32, bottom: i32, right: i32, top: i32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.bottom >= self.top
    }

    pub fn join(&mut self, other: &BBox) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = *other;
            return;
        }
        self.left = self.left.min(other.left);
        self.bottom = self.bottom.min(other.bottom);
        self.right = self.right.max(other.right);
        self.top = self.top.max(other.top);
    }
}

/// Everything the PDF backend needs to know about a typeface
///
/// Glyph tables are indexed by glyph ID; `advances` defines the glyph count.
#[derive(Debug, Clone, Default)]
pub struct Typeface {
    /// Identifies the typeface across font lookups
    pub id: u32,
    pub font_type: FontType,
    pub flags: FontFlags,
    /// PostScript name
    pub name: String,
    pub em_size: u16,
    /// Combination of [`style`] flags
    pub style: u32,
    pub italic_angle: i16,
    pub ascent: i16,
    pub descent: i16,
    pub cap_height: i16,
    pub stem_v: i16,
    pub bbox: BBox,
    /// Horizontal advance per glyph, in font units
    pub advances: Vec<i16>,
    /// PostScript glyph names (Type1)
    pub glyph_names: Vec<String>,
    /// Unicode value per glyph, 0 when unknown
    pub glyph_to_unicode: Vec<u32>,
    /// Glyph bounds in font units (Type3)
    pub glyph_bboxes: Vec<BBox>,
    /// Glyph outline content stream operators in 1000-unit, y-down glyph
    /// space (Type3)
    pub glyph_outlines: Vec<Vec<u8>>,
    /// Raw font program
    pub font_data: Option<Vec<u8>>,
}

impl Typeface {
    pub fn glyph_count(&self) -> u16 {
        self.advances.len().min(u16::MAX as usize) as u16
    }

    pub fn last_glyph_id(&self) -> u16 {
        self.glyph_count().saturating_sub(1)
    }

    pub fn advance(&self, glyph: u16) -> i16 {
        self.advances.get(glyph as usize).copied().unwrap_or(0)
    }

    pub fn can_embed(&self) -> bool {
        !self.flags.not_embeddable
    }

    pub fn can_subset(&self) -> bool {
        !self.flags.not_subsettable
    }

    /// Build metrics from a TrueType font file
    ///
    /// OpenType files with CFF outlines are rejected: their program cannot
    /// be embedded as `/FontFile2`.
    ///
    /// # Arguments
    /// * `id` - Identifier used to share PDF fonts between lookups
    /// * `data` - TrueType font file bytes
    pub fn from_truetype(id: u32, data: Vec<u8>) -> Result<Self> {
        let face = Face::parse(&data, 0)
            .map_err(|e| PdfError::FontParseError(format!("{e:?}")))?;
        if face.tables().glyf.is_none() {
            let outlines = if face.tables().cff.is_some() { "CFF" } else { "no" };
            return Err(PdfError::FontParseError(format!(
                "expected TrueType outlines, found {outlines} outlines"
            )));
        }

        let num_glyphs = face.number_of_glyphs();
        let advances = (0..num_glyphs)
            .map(|g| {
                face.glyph_hor_advance(GlyphId(g))
                    .map(|a| a.min(i16::MAX as u16) as i16)
                    .unwrap_or(0)
            })
            .collect();
        let glyph_names = (0..num_glyphs)
            .map(|g| {
                face.glyph_name(GlyphId(g))
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("gid{g}"))
            })
            .collect();

        let mut glyph_to_unicode = vec![0u32; num_glyphs as usize];
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|codepoint| {
                    let Some(GlyphId(g)) = subtable.glyph_index(codepoint) else {
                        return;
                    };
                    // keep the lowest code point mapped to a glyph
                    if let Some(slot) = glyph_to_unicode.get_mut(g as usize) {
                        if *slot == 0 || codepoint < *slot {
                            *slot = codepoint;
                        }
                    }
                });
            }
        }

        let name = face
            .names()
            .into_iter()
            .filter(|n| n.name_id == name_id::POST_SCRIPT_NAME)
            .find_map(|n| n.to_string())
            .map(|n| n.replace(' ', ""))
            .unwrap_or_else(|| format!("Font{id}"));

        let mut style_flags = 0;
        if face.is_monospaced() {
            style_flags |= style::FIXED_PITCH;
        }
        if face.is_italic() {
            style_flags |= style::ITALIC;
        }

        let bbox = face.global_bounding_box();
        let ascent = face.ascender();
        let stem_v = if face.is_bold() { 120 } else { 80 };

        // without an OS/2 table there are no licensing restrictions
        let has_os2 = face.tables().os2.is_some();
        let not_embeddable = face.permissions() == Some(Permissions::Restricted)
            || (has_os2 && !face.is_outline_embedding_allowed());
        let not_subsettable = has_os2 && !face.is_subsetting_allowed();
        let italic_angle = face.italic_angle().unwrap_or(0.0).round() as i16;

        Ok(Self {
            id,
            font_type: FontType::TrueType,
            flags: FontFlags {
                not_embeddable,
                not_subsettable,
                multi_master: false,
            },
            name,
            em_size: face.units_per_em(),
            style: style_flags,
            italic_angle,
            ascent,
            descent: face.descender(),
            cap_height: face.capital_height().unwrap_or(ascent),
            stem_v,
            bbox: BBox::new(
                bbox.x_min as i32,
                bbox.y_min as i32,
                bbox.x_max as i32,
                bbox.y_max as i32,
            ),
            advances,
            glyph_names,
            glyph_to_unicode,
            glyph_bboxes: Vec::new(),
            glyph_outlines: Vec::new(),
            font_data: Some(data),
        })
    }
}
