//! Page content streams and resource dictionaries

use crate::font::{GlyphUsage, PdfFont};
use crate::object::{format_scalar, Array, Dict};
use crate::pool::ObjectHandle;
use std::fmt::Write as _;

/// RGB colour, components in 0.0 - 1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Create a colour from 0-255 components
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    pub fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// A URI link annotation, rectangle in page coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub rect: [f32; 4],
    pub uri: String,
}

impl Link {
    pub fn new(rect: [f32; 4], uri: impl Into<String>) -> Self {
        Self {
            rect,
            uri: uri.into(),
        }
    }

    pub fn to_dict(&self) -> Dict {
        let mut dict = Dict::with_type("Annot");
        dict.insert_name("Subtype", "Link");
        let mut rect = Array::with_capacity(4);
        for value in self.rect {
            rect.append_scalar(value);
        }
        dict.insert_object("Rect", rect);
        let mut border = Array::with_capacity(3);
        for _ in 0..3 {
            border.append_int(0);
        }
        dict.insert_object("Border", border);
        let mut action = Dict::new();
        action.insert_name("S", "URI");
        action.insert_string("URI", self.uri.as_bytes());
        dict.insert_object("A", action);
        dict
    }
}

/// Resources used by one page, named `F0`, `X0`, `G0` … in order of first use
#[derive(Debug, Clone, Default)]
pub struct ResourceDict {
    fonts: Vec<ObjectHandle>,
    xobjects: Vec<ObjectHandle>,
    graphic_states: Vec<ObjectHandle>,
}

fn resource_name(list: &mut Vec<ObjectHandle>, prefix: char, handle: ObjectHandle) -> String {
    let index = match list.iter().position(|&h| h == handle) {
        Some(index) => index,
        None => {
            list.push(handle);
            list.len() - 1
        }
    };
    format!("{prefix}{index}")
}

impl ResourceDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_font(&mut self, font: ObjectHandle) -> String {
        resource_name(&mut self.fonts, 'F', font)
    }

    pub fn add_xobject(&mut self, xobject: ObjectHandle) -> String {
        resource_name(&mut self.xobjects, 'X', xobject)
    }

    pub fn add_graphic_state(&mut self, state: ObjectHandle) -> String {
        resource_name(&mut self.graphic_states, 'G', state)
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty() && self.xobjects.is_empty() && self.graphic_states.is_empty()
    }

    /// The `/Resources` dictionary
    pub fn to_dict(&self) -> Dict {
        let mut dict = Dict::new();
        let groups = [
            ("ExtGState", 'G', &self.graphic_states),
            ("XObject", 'X', &self.xobjects),
            ("Font", 'F', &self.fonts),
        ];
        for (key, prefix, handles) in groups {
            if handles.is_empty() {
                continue;
            }
            let mut group = Dict::new();
            for (i, &handle) in handles.iter().enumerate() {
                group.insert_ref(&format!("{prefix}{i}"), handle);
            }
            dict.insert_object(key, group);
        }

        let mut proc_set = Array::with_capacity(5);
        for name in ["PDF", "Text", "ImageB", "ImageC", "ImageI"] {
            proc_set.append_name(name);
        }
        dict.insert_object("ProcSet", proc_set);
        dict
    }
}

/// Builder for the handful of operators page content needs
#[derive(Debug, Clone, Default)]
pub struct ContentStream {
    ops: String,
    glyph_usage: GlyphUsage,
}

impl ContentStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn numbers(&mut self, values: &[f32]) {
        for value in values {
            self.ops.push_str(&format_scalar(*value));
            self.ops.push(' ');
        }
    }

    pub fn save(&mut self) -> &mut Self {
        self.ops.push_str("q\n");
        self
    }

    pub fn restore(&mut self) -> &mut Self {
        self.ops.push_str("Q\n");
        self
    }

    /// Concatenate `[a b c d e f]` to the current transform
    pub fn transform(&mut self, matrix: [f32; 6]) -> &mut Self {
        self.numbers(&matrix);
        self.ops.push_str("cm\n");
        self
    }

    pub fn fill_color(&mut self, color: Color) -> &mut Self {
        self.numbers(&[color.r, color.g, color.b]);
        self.ops.push_str("rg\n");
        self
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.numbers(&[x, y, width, height]);
        self.ops.push_str("re\nf\n");
        self
    }

    /// Apply a named `/ExtGState`
    pub fn graphic_state(&mut self, name: &str) -> &mut Self {
        let _ = writeln!(self.ops, "/{name} gs");
        self
    }

    /// Draw an image XObject scaled into the given rectangle
    pub fn draw_image(&mut self, name: &str, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.save();
        self.transform([width, 0.0, 0.0, height, x, y]);
        let _ = writeln!(self.ops, "/{name} Do");
        self.restore()
    }

    /// Show `glyphs` with `font` starting at `(x, y)`
    ///
    /// Returns how many glyphs were written; a single-byte font stops at the
    /// first glyph outside its window and the caller continues with the font
    /// resource for that glyph. The written glyphs are recorded for font
    /// subsetting.
    pub fn show_glyphs(
        &mut self,
        font: &PdfFont,
        name: &str,
        size: f32,
        x: f32,
        y: f32,
        glyphs: &[u16],
    ) -> usize {
        let mut encoded = glyphs.to_vec();
        let count = font.glyphs_to_font_encoding(&mut encoded);
        self.glyph_usage
            .note_glyph_usage(font.handle(), &glyphs[..count]);
        let mut hex = String::with_capacity(count * 4 + 2);
        hex.push('<');
        for code in &encoded[..count] {
            if font.multi_byte_glyphs() {
                let _ = write!(hex, "{code:04X}");
            } else {
                let _ = write!(hex, "{:02X}", *code as u8);
            }
        }
        hex.push('>');

        self.ops.push_str("BT\n");
        let _ = writeln!(self.ops, "/{name} {} Tf", format_scalar(size));
        self.numbers(&[x, y]);
        self.ops.push_str("Td\n");
        let _ = writeln!(self.ops, "{hex} Tj");
        self.ops.push_str("ET\n");
        count
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.ops.as_bytes()
    }

    /// Glyphs drawn so far, per font
    pub fn glyph_usage(&self) -> &GlyphUsage {
        &self.glyph_usage
    }

    /// The operators alone; recorded glyph usage is dropped
    pub fn into_bytes(self) -> Vec<u8> {
        self.ops.into_bytes()
    }

    pub fn into_parts(self) -> (Vec<u8>, GlyphUsage) {
        (self.ops.into_bytes(), self.glyph_usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{FontCache, FontType, Typeface};
    use crate::object::Object;
    use crate::pool::ObjectPool;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn typeface(font_type: FontType, glyph_count: usize) -> Arc<Typeface> {
        Arc::new(Typeface {
            id: 1,
            font_type,
            name: "Test".into(),
            em_size: 1000,
            advances: vec![500; glyph_count],
            ..Default::default()
        })
    }

    #[test]
    fn test_resource_names_are_reused() {
        let mut pool = ObjectPool::new();
        let a = pool.add(Dict::new());
        let b = pool.add(Dict::new());
        let mut resources = ResourceDict::new();
        assert_eq!(resources.add_font(a), "F0");
        assert_eq!(resources.add_font(b), "F1");
        assert_eq!(resources.add_font(a), "F0");
        assert_eq!(resources.add_xobject(a), "X0");
        assert_eq!(resources.add_graphic_state(b), "G0");

        let dict = resources.to_dict();
        let keys: Vec<&str> = dict.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["ExtGState", "XObject", "Font", "ProcSet"]);
        let fonts = dict.get("Font").and_then(Object::as_dict).unwrap();
        assert_eq!(fonts.get("F1").and_then(Object::as_reference), Some(b));
    }

    #[test]
    fn test_empty_resources_have_proc_set() {
        let dict = ResourceDict::new().to_dict();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get("ProcSet").and_then(Object::as_array).map(Array::len), Some(5));
    }

    #[test]
    fn test_fill_and_image_operators() {
        let mut content = ContentStream::new();
        content
            .fill_color(Color::from_rgb(255, 0, 0))
            .fill_rect(0.0, 0.0, 100.0, 100.0)
            .draw_image("X0", 10.0, 20.0, 50.5, 30.0);
        assert_eq!(
            String::from_utf8(content.into_bytes()).unwrap(),
            "1 0 0 rg\n0 0 100 100 re\nf\nq\n50.5 0 0 30 10 20 cm\n/X0 Do\nQ\n"
        );
    }

    #[test]
    fn test_multi_byte_glyphs_are_four_hex_digits() {
        let mut pool = ObjectPool::new();
        let mut cache = FontCache::new();
        let typeface = typeface(FontType::TrueType, 400);
        let font = cache.font_resource(&mut pool, &typeface, 300);

        let mut content = ContentStream::new();
        let written = content.show_glyphs(&font, "F0", 12.0, 72.0, 700.0, &[43, 300]);
        assert_eq!(written, 2);
        assert_eq!(
            String::from_utf8(content.into_bytes()).unwrap(),
            "BT\n/F0 12 Tf\n72 700 Td\n<002B012C> Tj\nET\n"
        );
    }

    #[test]
    fn test_single_byte_glyphs_stop_at_window_end() {
        let mut pool = ObjectPool::new();
        let mut cache = FontCache::new();
        let typeface = typeface(FontType::Other, 600);
        let font = cache.font_resource(&mut pool, &typeface, 3);
        assert_eq!((font.first_glyph(), font.last_glyph()), (1, 255));

        let mut content = ContentStream::new();
        let written = content.show_glyphs(&font, "F0", 10.0, 0.0, 0.0, &[3, 0, 255, 256]);
        assert_eq!(written, 3);
        let used = content.glyph_usage().get(font.handle()).unwrap();
        assert_eq!(used.iter().collect::<Vec<_>>(), vec![0, 3, 255]);
        let text = String::from_utf8(content.into_bytes()).unwrap();
        assert!(text.contains("<0300FF> Tj"));
    }

    #[test]
    fn test_link_annotation() {
        let dict = Link::new([0.0, 0.0, 10.0, 5.5], "https://example.com").to_dict();
        let keys: Vec<&str> = dict.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["Type", "Subtype", "Rect", "Border", "A"]);
        let action = dict.get("A").and_then(Object::as_dict).unwrap();
        assert_eq!(
            action.get("URI"),
            Some(&Object::String(b"https://example.com".to_vec()))
        );
    }
}
