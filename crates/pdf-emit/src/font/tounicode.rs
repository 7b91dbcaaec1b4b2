//! ToUnicode CMap generation

use super::GlyphSet;
use crate::object::Stream;
use std::fmt::Write as _;

/// Maximum number of entries in one `beginbfchar`/`beginbfrange` block
const MAX_ENTRIES_PER_SECTION: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BfChar {
    pub glyph_id: u16,
    pub unicode: u32,
}

/// Consecutive glyph IDs mapping to consecutive code points
///
/// A range never changes the high byte of the glyph ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BfRange {
    pub start: u16,
    pub end: u16,
    pub unicode: u32,
}

/// Split the glyph→Unicode table into single mappings and ranges
///
/// For single-byte fonts (`multi_byte == false`) glyph `first_glyph` is
/// written as code 1. Glyphs mapped to 0 have no Unicode value and are skipped.
pub fn build_cmap_entries(
    glyph_to_unicode: &[u32],
    subset: Option<&GlyphSet>,
    multi_byte: bool,
    first_glyph: u16,
    last_glyph: u16,
) -> (Vec<BfChar>, Vec<BfRange>) {
    let mut chars = Vec::new();
    let mut ranges = Vec::new();
    if glyph_to_unicode.is_empty() {
        return (chars, ranges);
    }

    let glyph_offset: i32 = if multi_byte { 0 } else { first_glyph as i32 - 1 };
    let limit = (last_glyph as i32 + 1).min(glyph_to_unicode.len() as i32) - glyph_offset;
    let unicode_at = |i: i32| glyph_to_unicode[(i + glyph_offset) as usize];

    let mut current: Option<BfRange> = None;
    for i in (first_glyph as i32 - glyph_offset)..=limit {
        let in_subset = i < limit
            && unicode_at(i) != 0
            && subset.map_or(true, |s| s.has((i + glyph_offset) as u16));

        if let Some(range) = current {
            // A bfrange may not change the high byte: <1035> <10FF> is fine,
            // <1035> <1100> is not.
            let in_range = i == range.end as i32 + 1
                && i >> 8 == range.start as i32 >> 8
                && i < limit
                && unicode_at(i) == range.unicode.wrapping_add((i - range.start as i32) as u32);
            if !in_subset || !in_range {
                if range.end > range.start {
                    ranges.push(range);
                } else {
                    chars.push(BfChar {
                        glyph_id: range.start,
                        unicode: range.unicode,
                    });
                }
                current = None;
            }
        }

        if in_subset {
            match current.as_mut() {
                Some(range) => range.end = i as u16,
                None => {
                    current = Some(BfRange {
                        start: i as u16,
                        end: i as u16,
                        unicode: unicode_at(i),
                    })
                }
            }
        }
    }
    (chars, ranges)
}

fn write_utf16be(out: &mut String, unicode: u32) {
    let c = char::from_u32(unicode).unwrap_or(char::REPLACEMENT_CHARACTER);
    let mut units = [0u16; 2];
    for unit in c.encode_utf16(&mut units) {
        let _ = write!(out, "{unit:04X}");
    }
}

/// Append the bfchar and bfrange sections; all bfchar entries come first
pub fn append_cmap_sections(out: &mut String, chars: &[BfChar], ranges: &[BfRange]) {
    for chunk in chars.chunks(MAX_ENTRIES_PER_SECTION) {
        let _ = writeln!(out, "{} beginbfchar", chunk.len());
        for entry in chunk {
            let _ = write!(out, "<{:04X}> <", entry.glyph_id);
            write_utf16be(out, entry.unicode);
            out.push_str(">\n");
        }
        out.push_str("endbfchar\n");
    }
    for chunk in ranges.chunks(MAX_ENTRIES_PER_SECTION) {
        let _ = writeln!(out, "{} beginbfrange", chunk.len());
        for entry in chunk {
            let _ = write!(out, "<{:04X}> <{:04X}> <", entry.start, entry.end);
            write_utf16be(out, entry.unicode);
            out.push_str(">\n");
        }
        out.push_str("endbfrange\n");
    }
}

fn append_header(out: &mut String, first: u16, last: u16) {
    // "12 dict begin" is the value Adobe readers expect.
    out.push_str("/CIDInit /ProcSet findresource begin\n");
    out.push_str("12 dict begin\n");
    out.push_str("begincmap\n");
    out.push_str("/CIDSystemInfo\n");
    out.push_str("<<  /Registry (Adobe)\n");
    out.push_str("/Ordering (UCS)\n");
    out.push_str("/Supplement 0\n");
    out.push_str(">> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n");
    out.push_str("/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n");
    let _ = writeln!(out, "<{first:04X}> <{last:04X}>");
    out.push_str("endcodespacerange\n");
}

fn append_footer(out: &mut String) {
    out.push_str("endcmap\n");
    out.push_str("CMapName currentdict /CMap defineresource pop\n");
    out.push_str("end\n");
    out.push_str("end");
}

/// Generate the complete CMap program text
pub fn generate_tounicode_cmap(
    glyph_to_unicode: &[u32],
    subset: Option<&GlyphSet>,
    multi_byte: bool,
    first_glyph: u16,
    last_glyph: u16,
) -> String {
    let mut cmap = String::new();
    if multi_byte {
        append_header(&mut cmap, first_glyph, last_glyph);
    } else {
        append_header(&mut cmap, 1, last_glyph.saturating_sub(first_glyph) + 1);
    }
    let (chars, ranges) =
        build_cmap_entries(glyph_to_unicode, subset, multi_byte, first_glyph, last_glyph);
    append_cmap_sections(&mut cmap, &chars, &ranges);
    append_footer(&mut cmap);
    cmap
}

/// ToUnicode stream object for a font
pub fn tounicode_stream(
    glyph_to_unicode: &[u32],
    subset: Option<&GlyphSet>,
    multi_byte: bool,
    first_glyph: u16,
    last_glyph: u16,
) -> Stream {
    let cmap = generate_tounicode_cmap(
        glyph_to_unicode,
        subset,
        multi_byte,
        first_glyph,
        last_glyph,
    );
    Stream::new(cmap.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sections(
        table: &[u32],
        subset: Option<&GlyphSet>,
        multi_byte: bool,
        first: u16,
        last: u16,
    ) -> String {
        let (chars, ranges) = build_cmap_entries(table, subset, multi_byte, first, last);
        let mut out = String::new();
        append_cmap_sections(&mut out, &chars, &ranges);
        out
    }

    #[test]
    fn test_chars_before_ranges() {
        // glyphs 3..=5 are a range, 7 and 9 are single mappings
        let mut table = vec![0u32; 10];
        table[3] = 0x41;
        table[4] = 0x42;
        table[5] = 0x43;
        table[7] = 0x61;
        table[9] = 0x7A;
        assert_eq!(
            sections(&table, None, true, 1, 9),
            "2 beginbfchar\n<0007> <0061>\n<0009> <007A>\nendbfchar\n\
             1 beginbfrange\n<0003> <0005> <0041>\nendbfrange\n"
        );
    }

    #[test]
    fn test_subset_filter() {
        let table: Vec<u32> = (0..20).map(|g| 0x100 + g).collect();
        let mut subset = GlyphSet::new();
        subset.set(&[2, 3, 4, 10]);
        assert_eq!(
            sections(&table, Some(&subset), true, 1, 19),
            "1 beginbfchar\n<000A> <010A>\nendbfchar\n\
             1 beginbfrange\n<0002> <0004> <0102>\nendbfrange\n"
        );
    }

    #[test]
    fn test_range_does_not_cross_high_byte() {
        let table: Vec<u32> = (0..0x300).map(|g| 0x4E00 + g).collect();
        let (chars, ranges) = build_cmap_entries(&table, None, true, 1, 0x2FF);
        assert!(chars.is_empty());
        assert_eq!(ranges.len(), 3);
        for range in &ranges {
            assert_eq!(range.start >> 8, range.end >> 8);
        }
        assert_eq!(ranges[0].start, 1);
        assert_eq!(ranges[0].end, 0xFF);
        assert_eq!(ranges[1].start, 0x100);
        assert_eq!(ranges[1].unicode, 0x4F00);
    }

    #[test]
    fn test_single_byte_offsets() {
        // glyphs 256..=258 are codes 1..=3 in the second 255-glyph window
        let mut table = vec![0u32; 300];
        table[256] = 0x61;
        table[257] = 0x62;
        table[258] = 0x78;
        let cmap = generate_tounicode_cmap(&table, None, false, 256, 258);
        assert!(cmap.contains("<0001> <0003>\nendcodespacerange\n"));
        assert!(cmap.contains("1 beginbfchar\n<0003> <0078>\nendbfchar\n"));
        assert!(cmap.contains("1 beginbfrange\n<0001> <0002> <0061>\nendbfrange\n"));
    }

    #[test]
    fn test_window_past_table_end() {
        // one-glyph table, window of code 1 only
        let cmap = generate_tounicode_cmap(&[0x20], None, false, 1, 1);
        assert!(cmap.contains("<0001> <0001>\nendcodespacerange\n"));
        assert!(!cmap.contains("beginbfchar"));
        assert!(!cmap.contains("beginbfrange"));
    }

    #[test]
    fn test_surrogate_pairs() {
        let mut table = vec![0u32; 4];
        table[2] = 0x1F600;
        assert_eq!(
            sections(&table, None, true, 1, 3),
            "1 beginbfchar\n<0002> <D83DDE00>\nendbfchar\n"
        );
    }

    #[test]
    fn test_sections_are_chunked() {
        // every other code point, so nothing forms a range
        let table: Vec<u32> = (0..251).map(|g| 0x41 + 2 * g).collect();
        let out = sections(&table, None, true, 1, 250);
        assert!(out.starts_with("100 beginbfchar\n"));
        assert_eq!(out.matches("beginbfchar").count(), 3);
        assert!(out.contains("50 beginbfchar\n"));
    }

    #[test]
    fn test_full_cmap_layout() {
        let cmap = generate_tounicode_cmap(&[0, 0x41], None, true, 1, 1);
        assert_eq!(
            cmap,
            "/CIDInit /ProcSet findresource begin\n\
             12 dict begin\n\
             begincmap\n\
             /CIDSystemInfo\n\
             <<  /Registry (Adobe)\n\
             /Ordering (UCS)\n\
             /Supplement 0\n\
             >> def\n\
             /CMapName /Adobe-Identity-UCS def\n\
             /CMapType 2 def\n\
             1 begincodespacerange\n\
             <0001> <0001>\n\
             endcodespacerange\n\
             1 beginbfchar\n\
             <0001> <0041>\n\
             endbfchar\n\
             endcmap\n\
             CMapName currentdict /CMap defineresource pop\n\
             end\n\
             end"
        );
    }

    #[test]
    fn test_empty_table() {
        let (chars, ranges) = build_cmap_entries(&[], None, true, 1, 10);
        assert!(chars.is_empty());
        assert!(ranges.is_empty());
    }
}
