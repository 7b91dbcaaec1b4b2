//! Shared fixtures for the integration tests
//!
//! Fonts and images are generated in memory so the repository carries no
//! binary fixtures.

#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};

/// Units per em of [`test_font`]
pub const UNITS_PER_EM: u16 = 1000;
/// Glyph advances of [`test_font`], by glyph ID
pub const ADVANCES: [u16; 4] = [500, 600, 650, 700];

fn u16be(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn i16be(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn u32be(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// A closed triangle; `size` tells glyphs apart
fn triangle(size: i16) -> Vec<u8> {
    let mut glyph = Vec::new();
    i16be(&mut glyph, 1); // contours
    for value in [0, 0, size, size] {
        i16be(&mut glyph, value);
    }
    u16be(&mut glyph, 2); // last point index
    u16be(&mut glyph, 0); // no instructions
    glyph.extend_from_slice(&[0x01, 0x01, 0x01]);
    for x in [0, size, -size / 2] {
        i16be(&mut glyph, x);
    }
    for y in [0, 0, size] {
        i16be(&mut glyph, y);
    }
    glyph
}

fn head() -> Vec<u8> {
    let mut head = Vec::new();
    u32be(&mut head, 0x0001_0000);
    u32be(&mut head, 0x0001_0000);
    u32be(&mut head, 0); // checksum adjustment
    u32be(&mut head, 0x5F0F_3CF5);
    u16be(&mut head, 0); // flags
    u16be(&mut head, UNITS_PER_EM);
    head.extend_from_slice(&[0; 16]); // dates
    for value in [-50, -200, 1000, 800] {
        i16be(&mut head, value);
    }
    u16be(&mut head, 0); // mac style
    u16be(&mut head, 8); // lowest ppem
    i16be(&mut head, 2);
    i16be(&mut head, 0); // short loca
    i16be(&mut head, 0);
    head
}

fn hhea() -> Vec<u8> {
    let mut hhea = Vec::new();
    u32be(&mut hhea, 0x0001_0000);
    i16be(&mut hhea, 800);
    i16be(&mut hhea, -200);
    i16be(&mut hhea, 0);
    u16be(&mut hhea, 700);
    hhea.extend_from_slice(&[0; 22]);
    u16be(&mut hhea, ADVANCES.len() as u16);
    hhea
}

/// Format 4 cmap: 'A', 'B', 'C' map to glyphs 1, 2, 3
fn cmap() -> Vec<u8> {
    let mut subtable = Vec::new();
    u16be(&mut subtable, 4);
    u16be(&mut subtable, 32);
    u16be(&mut subtable, 0);
    u16be(&mut subtable, 4); // two segments
    u16be(&mut subtable, 4);
    u16be(&mut subtable, 1);
    u16be(&mut subtable, 0);
    for end in [0x43, 0xFFFF] {
        u16be(&mut subtable, end);
    }
    u16be(&mut subtable, 0);
    for start in [0x41, 0xFFFF] {
        u16be(&mut subtable, start);
    }
    for delta in [1u16.wrapping_sub(0x41), 1] {
        u16be(&mut subtable, delta);
    }
    for _ in 0..2 {
        u16be(&mut subtable, 0);
    }

    let mut cmap = Vec::new();
    u16be(&mut cmap, 0);
    u16be(&mut cmap, 1);
    u16be(&mut cmap, 3);
    u16be(&mut cmap, 1);
    u32be(&mut cmap, 12);
    cmap.extend_from_slice(&subtable);
    cmap
}

fn name(postscript_name: &str) -> Vec<u8> {
    let encoded: Vec<u8> = postscript_name
        .encode_utf16()
        .flat_map(u16::to_be_bytes)
        .collect();
    let mut name = Vec::new();
    u16be(&mut name, 0);
    u16be(&mut name, 1);
    u16be(&mut name, 6 + 12);
    for value in [3, 1, 0x409, 6, encoded.len() as u16, 0] {
        u16be(&mut name, value);
    }
    name.extend_from_slice(&encoded);
    name
}

/// Version 4 OS/2 table; licensing bits past 0x000F need version 2 or later
fn os2(fs_type: u16) -> Vec<u8> {
    let mut os2 = Vec::new();
    u16be(&mut os2, 4); // version
    i16be(&mut os2, 600);
    u16be(&mut os2, 400); // weight
    u16be(&mut os2, 5); // width
    u16be(&mut os2, fs_type);
    os2.resize(62, 0);
    u16be(&mut os2, 0x0040); // regular
    os2.resize(88, 0);
    i16be(&mut os2, 700); // cap height
    os2.resize(96, 0);
    os2
}

fn hmtx() -> Vec<u8> {
    let mut hmtx = Vec::new();
    for advance in ADVANCES {
        u16be(&mut hmtx, advance);
        i16be(&mut hmtx, 0);
    }
    hmtx
}

fn post() -> Vec<u8> {
    let mut post = Vec::new();
    u32be(&mut post, 0x0003_0000);
    post.resize(32, 0);
    post
}

/// Assemble an sfnt file; tables must be sorted by tag
fn font_file(version: u32, tables: Vec<(&[u8; 4], Vec<u8>)>) -> Vec<u8> {
    let mut out = Vec::new();
    u32be(&mut out, version);
    u16be(&mut out, tables.len() as u16);
    u16be(&mut out, 0);
    u16be(&mut out, 0);
    u16be(&mut out, 0);

    let mut offset = 12 + tables.len() * 16;
    for (tag, data) in &tables {
        out.extend_from_slice(*tag);
        u32be(&mut out, 0);
        u32be(&mut out, offset as u32);
        u32be(&mut out, data.len() as u32);
        offset += (data.len() + 3) & !3;
    }
    for (_, data) in &tables {
        out.extend_from_slice(data);
        out.resize((out.len() + 3) & !3, 0);
    }
    out
}

/// A four glyph TrueType font: `.notdef`, `A`, `B` and `C`
///
/// `fs_type` is written to the OS/2 table.
pub fn test_font_with_fs_type(fs_type: u16) -> Vec<u8> {
    let glyphs = [triangle(400), triangle(500), triangle(600), triangle(700)];
    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    for glyph in &glyphs {
        u16be(&mut loca, (glyf.len() / 2) as u16);
        glyf.extend_from_slice(glyph);
        glyf.resize((glyf.len() + 3) & !3, 0);
    }
    u16be(&mut loca, (glyf.len() / 2) as u16);

    let mut maxp = Vec::new();
    u32be(&mut maxp, 0x0001_0000);
    u16be(&mut maxp, glyphs.len() as u16);
    u16be(&mut maxp, 3); // points
    u16be(&mut maxp, 1); // contours
    maxp.resize(32, 0);

    font_file(0x0001_0000, vec![
        (b"OS/2", os2(fs_type)),
        (b"cmap", cmap()),
        (b"glyf", glyf),
        (b"head", head()),
        (b"hhea", hhea()),
        (b"hmtx", hmtx()),
        (b"loca", loca),
        (b"maxp", maxp),
        (b"name", name("TestSans-Regular")),
        (b"post", post()),
    ])
}

pub fn test_font() -> Vec<u8> {
    test_font_with_fs_type(0)
}

/// An `OTTO` font: the same metrics, outlines in a `CFF ` table
pub fn test_cff_font() -> Vec<u8> {
    let mut maxp = Vec::new();
    u32be(&mut maxp, 0x0000_5000);
    u16be(&mut maxp, ADVANCES.len() as u16);

    font_file(u32::from_be_bytes(*b"OTTO"), vec![
        (b"CFF ", vec![1, 0, 4, 2]),
        (b"OS/2", os2(0)),
        (b"cmap", cmap()),
        (b"head", head()),
        (b"hhea", hhea()),
        (b"hmtx", hmtx()),
        (b"maxp", maxp),
        (b"name", name("TestSans-Regular")),
        (b"post", post()),
    ])
}

/// A baseline JPEG of a solid colour
pub fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([20, 120, 220])));
    let mut data = Vec::new();
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut data, 85))
        .unwrap();
    data
}

pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
