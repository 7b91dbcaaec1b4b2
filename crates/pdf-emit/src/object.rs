//! PDF object model
//!
//! Direct objects (scalars, names, strings, arrays, dictionaries and streams)
//! are owned inline by their container. Anything that must become an
//! indirect object is moved into the [`ObjectPool`] and referenced through an
//! [`ObjectHandle`].

use crate::canon::{EmitContext, ObjNumMap, SubstituteMap};
use crate::pool::{IndirectObject, ObjectHandle, ObjectPool};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Write};

/// Deflate only pays off when it saves more than the `/Filter` entry costs.
const MINIMUM_SAVINGS: usize = "/Filter_/FlateDecode_".len();

/// A direct PDF value
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Int(i32),
    Bool(bool),
    Scalar(f32),
    Name(Vec<u8>),
    String(Vec<u8>),
    Array(Array),
    Dict(Dict),
    Stream(Stream),
    Reference(ObjectHandle),
}

impl Object {
    /// Create a name object (written with a leading `/`)
    pub fn name(name: impl Into<Vec<u8>>) -> Self {
        Object::Name(name.into())
    }

    /// Create a byte string object
    pub fn string(data: impl Into<Vec<u8>>) -> Self {
        Object::String(data.into())
    }

    /// Create a text string; non-ASCII text is stored as UTF-16BE with a BOM
    pub fn text(text: &str) -> Self {
        if text.is_ascii() {
            return Object::String(text.as_bytes().to_vec());
        }
        let mut data = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            data.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(data)
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Object::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&[u8]> {
        match self {
            Object::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Object::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dict(dict) => Some(dict),
            Object::Stream(stream) => Some(stream.dict()),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectHandle> {
        match self {
            Object::Reference(handle) => Some(*handle),
            _ => None,
        }
    }

    /// Write the PDF representation of this object
    pub fn emit<W: Write + ?Sized>(&self, out: &mut W, ctx: &EmitContext<'_>) -> io::Result<()> {
        match self {
            Object::Int(value) => write!(out, "{value}"),
            Object::Bool(value) => out.write_all(if *value { b"true" } else { b"false" }),
            Object::Scalar(value) => write_scalar(out, *value),
            Object::Name(name) => write_name(out, name),
            Object::String(data) => write_string(out, data),
            Object::Array(array) => array.emit(out, ctx),
            Object::Dict(dict) => dict.emit(out, ctx),
            Object::Stream(stream) => stream.emit(out, ctx),
            Object::Reference(handle) => match ctx.object_number(*handle) {
                Some(number) => write!(out, "{number} 0 R"),
                None => {
                    debug_assert!(false, "reference to unnumbered object {handle:?}");
                    out.write_all(b"null")
                }
            },
        }
    }

    /// Register every indirect object this value refers to
    pub fn add_resources(&self, map: &mut ObjNumMap, pool: &ObjectPool, subs: &SubstituteMap) {
        match self {
            Object::Array(array) => array.add_resources(map, pool, subs),
            Object::Dict(dict) => dict.add_resources(map, pool, subs),
            Object::Stream(stream) => stream.dict.add_resources(map, pool, subs),
            Object::Reference(handle) => map.add_object_recursively(Some(*handle), pool, subs),
            _ => {}
        }
    }
}

impl From<i32> for Object {
    fn from(value: i32) -> Self {
        Object::Int(value)
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Bool(value)
    }
}

impl From<f32> for Object {
    fn from(value: f32) -> Self {
        Object::Scalar(value)
    }
}

impl From<Array> for Object {
    fn from(value: Array) -> Self {
        Object::Array(value)
    }
}

impl From<Dict> for Object {
    fn from(value: Dict) -> Self {
        Object::Dict(value)
    }
}

impl From<Stream> for Object {
    fn from(value: Stream) -> Self {
        Object::Stream(value)
    }
}

impl From<ObjectHandle> for Object {
    fn from(value: ObjectHandle) -> Self {
        Object::Reference(value)
    }
}

/// Ordered PDF array
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Array {
    items: Vec<Object>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Object> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.items.iter()
    }

    pub fn append_int(&mut self, value: i32) {
        self.items.push(Object::Int(value));
    }

    pub fn append_bool(&mut self, value: bool) {
        self.items.push(Object::Bool(value));
    }

    pub fn append_scalar(&mut self, value: f32) {
        self.items.push(Object::Scalar(value));
    }

    pub fn append_name(&mut self, name: impl Into<Vec<u8>>) {
        self.items.push(Object::Name(name.into()));
    }

    pub fn append_string(&mut self, data: impl Into<Vec<u8>>) {
        self.items.push(Object::String(data.into()));
    }

    /// Append an owned inline value
    pub fn append_object(&mut self, value: impl Into<Object>) {
        self.items.push(value.into());
    }

    /// Move `value` into the pool and append a reference to it
    pub fn append_obj_ref(
        &mut self,
        value: impl Into<IndirectObject>,
        pool: &mut ObjectPool,
    ) -> ObjectHandle {
        let handle = pool.add(value);
        self.items.push(Object::Reference(handle));
        handle
    }

    /// Append a reference to an object that is already in the pool
    pub fn append_ref(&mut self, handle: ObjectHandle) {
        self.items.push(Object::Reference(handle));
    }

    pub fn emit<W: Write + ?Sized>(&self, out: &mut W, ctx: &EmitContext<'_>) -> io::Result<()> {
        out.write_all(b"[")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                out.write_all(b" ")?;
            }
            item.emit(out, ctx)?;
        }
        out.write_all(b"]")
    }

    pub fn add_resources(&self, map: &mut ObjNumMap, pool: &ObjectPool, subs: &SubstituteMap) {
        for item in &self.items {
            item.add_resources(map, pool, subs);
        }
    }
}

impl FromIterator<Object> for Array {
    fn from_iter<T: IntoIterator<Item = Object>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// PDF dictionary with insertion-ordered keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict {
    entries: Vec<(String, Object)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dictionary whose first entry is `/Type /<type_name>`
    pub fn with_type(type_name: &str) -> Self {
        let mut dict = Self::new();
        dict.insert_name("Type", type_name);
        dict
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Object)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Store an owned inline value under `key`
    ///
    /// An existing entry with the same key is replaced in place.
    pub fn insert_object(&mut self, key: &str, value: impl Into<Object>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Move `value` into the pool and store a reference to it under `key`
    pub fn insert_obj_ref(
        &mut self,
        key: &str,
        value: impl Into<IndirectObject>,
        pool: &mut ObjectPool,
    ) -> ObjectHandle {
        let handle = pool.add(value);
        self.insert_object(key, Object::Reference(handle));
        handle
    }

    /// Store a reference to an object whose number is assigned elsewhere
    pub fn insert_ref(&mut self, key: &str, handle: ObjectHandle) {
        self.insert_object(key, Object::Reference(handle));
    }

    pub fn insert_int(&mut self, key: &str, value: i32) {
        self.insert_object(key, Object::Int(value));
    }

    pub fn insert_bool(&mut self, key: &str, value: bool) {
        self.insert_object(key, Object::Bool(value));
    }

    pub fn insert_scalar(&mut self, key: &str, value: f32) {
        self.insert_object(key, Object::Scalar(value));
    }

    pub fn insert_name(&mut self, key: &str, name: impl Into<Vec<u8>>) {
        self.insert_object(key, Object::Name(name.into()));
    }

    pub fn insert_string(&mut self, key: &str, data: impl Into<Vec<u8>>) {
        self.insert_object(key, Object::String(data.into()));
    }

    pub fn insert_text(&mut self, key: &str, text: &str) {
        self.insert_object(key, Object::text(text));
    }

    pub fn emit<W: Write + ?Sized>(&self, out: &mut W, ctx: &EmitContext<'_>) -> io::Result<()> {
        out.write_all(b"<<")?;
        self.emit_entries(out, ctx, true)?;
        out.write_all(b">>")
    }

    fn emit_entries<W: Write + ?Sized>(
        &self,
        out: &mut W,
        ctx: &EmitContext<'_>,
        mut first: bool,
    ) -> io::Result<()> {
        for (key, value) in &self.entries {
            if !first {
                out.write_all(b"\n")?;
            }
            first = false;
            write_name(out, key.as_bytes())?;
            out.write_all(b" ")?;
            value.emit(out, ctx)?;
        }
        Ok(())
    }

    pub fn add_resources(&self, map: &mut ObjNumMap, pool: &ObjectPool, subs: &SubstituteMap) {
        for (_, value) in &self.entries {
            value.add_resources(map, pool, subs);
        }
    }
}

/// Stream object: a dictionary plus a byte payload
///
/// `/Length` (and `/Filter` when the payload was deflated) are computed at
/// emission time and written ahead of the stream's own entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stream {
    dict: Dict,
    data: Vec<u8>,
    compressed: bool,
}

impl Stream {
    /// Create a stream, deflating `data` when that makes it smaller
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_dict(Dict::new(), data)
    }

    /// Create a stream with its own dictionary entries, deflating when worthwhile
    pub fn with_dict(dict: Dict, data: Vec<u8>) -> Self {
        if data.len() < MINIMUM_SAVINGS {
            return Self::uncompressed(dict, data);
        }
        match deflate(&data) {
            Ok(compressed) if compressed.len() + MINIMUM_SAVINGS < data.len() => Self {
                dict,
                data: compressed,
                compressed: true,
            },
            _ => Self::uncompressed(dict, data),
        }
    }

    /// Create a stream whose payload is written verbatim
    pub fn uncompressed(dict: Dict, data: Vec<u8>) -> Self {
        Self {
            dict,
            data,
            compressed: false,
        }
    }

    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    pub fn dict_mut(&mut self) -> &mut Dict {
        &mut self.dict
    }

    /// Payload as it will be written (deflated if `is_compressed`)
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn emit<W: Write + ?Sized>(&self, out: &mut W, ctx: &EmitContext<'_>) -> io::Result<()> {
        out.write_all(b"<<")?;
        if self.compressed {
            out.write_all(b"/Filter /FlateDecode\n")?;
        }
        write!(out, "/Length {}", self.data.len())?;
        self.dict.emit_entries(out, ctx, false)?;
        out.write_all(b">>")?;
        write_stream_body(out, &self.data)
    }
}

/// Write ` stream\n<data>\nendstream` following an already written dictionary
pub(crate) fn write_stream_body<W: Write + ?Sized>(out: &mut W, data: &[u8]) -> io::Result<()> {
    out.write_all(b" stream\n")?;
    out.write_all(data)?;
    out.write_all(b"\nendstream")
}

/// Zlib-compress `data` for a `/FlateDecode` stream
pub(crate) fn deflate(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Write a real number in the shortest form that round-trips
///
/// Integral values print without a fraction and the leading zero of values
/// between -1 and 1 is dropped (`.5`, `-.25`).
pub fn write_scalar<W: Write + ?Sized>(out: &mut W, value: f32) -> io::Result<()> {
    out.write_all(format_scalar(value).as_bytes())
}

pub(crate) fn format_scalar(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1.0e15 {
        return format!("{}", value as i64);
    }
    let text = format!("{value}");
    if let Some(rest) = text.strip_prefix("0.") {
        format!(".{rest}")
    } else if let Some(rest) = text.strip_prefix("-0.") {
        format!("-.{rest}")
    } else {
        text
    }
}

/// Write `/name`, escaping irregular bytes as `#XX`
pub fn write_name<W: Write + ?Sized>(out: &mut W, name: &[u8]) -> io::Result<()> {
    let mut escaped = Vec::with_capacity(name.len() + 1);
    escaped.push(b'/');
    for &byte in name {
        if byte < b'!' || byte > b'~' || b"#/%()<>[]{}".contains(&byte) {
            escaped.extend_from_slice(format!("#{byte:02X}").as_bytes());
        } else {
            escaped.push(byte);
        }
    }
    out.write_all(&escaped)
}

/// Write a string as a literal `( … )` or, when that would be longer or the
/// data is not 7-bit clean, as uppercase hex `< … >`
pub fn write_string<W: Write + ?Sized>(out: &mut W, data: &[u8]) -> io::Result<()> {
    let mut extras = 0usize;
    let mut seven_bit_clean = true;
    for &byte in data {
        if byte > b'~' {
            seven_bit_clean = false;
            break;
        }
        if byte < b' ' {
            extras += 3;
        } else if matches!(byte, b'\\' | b'(' | b')') {
            extras += 1;
        }
    }

    let mut encoded = Vec::with_capacity(data.len() * 2 + 2);
    if seven_bit_clean && extras <= data.len() {
        encoded.push(b'(');
        for &byte in data {
            match byte {
                b'\\' | b'(' | b')' => {
                    encoded.push(b'\\');
                    encoded.push(byte);
                }
                _ if byte < b' ' => {
                    encoded.extend_from_slice(format!("\\{byte:03o}").as_bytes());
                }
                _ => encoded.push(byte),
            }
        }
        encoded.push(b')');
    } else {
        encoded.push(b'<');
        for &byte in data {
            encoded.extend_from_slice(format!("{byte:02X}").as_bytes());
        }
        encoded.push(b'>');
    }
    out.write_all(&encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn emit_to_string(object: &Object) -> String {
        let nums = ObjNumMap::new();
        let subs = SubstituteMap::new();
        let ctx = EmitContext::new(&nums, &subs);
        let mut out = Vec::new();
        object.emit(&mut out, &ctx).unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(emit_to_string(&Object::Int(42)), "42");
        assert_eq!(emit_to_string(&Object::Int(-1)), "-1");
        assert_eq!(emit_to_string(&Object::Bool(true)), "true");
        assert_eq!(emit_to_string(&Object::Scalar(0.5)), ".5");
        assert_eq!(emit_to_string(&Object::Scalar(-0.5)), "-.5");
        assert_eq!(emit_to_string(&Object::Scalar(110999.75)), "110999.75");
        assert_eq!(emit_to_string(&Object::Scalar(50000000.1)), "50000000");
        assert_eq!(emit_to_string(&Object::Scalar(0.0)), "0");
        assert_eq!(emit_to_string(&Object::Scalar(f32::NAN)), "0");
        assert_eq!(emit_to_string(&Object::Scalar(0.001)), ".001");
    }

    #[test]
    fn test_literal_strings() {
        assert_eq!(
            emit_to_string(&Object::string("test ) string ( foo")),
            "(test \\) string \\( foo)"
        );
        assert_eq!(
            emit_to_string(&Object::string("\ttest ) string ( foo")),
            "(\\011test \\) string \\( foo)"
        );
        assert_eq!(emit_to_string(&Object::string("")), "()");
    }

    #[test]
    fn test_hex_strings() {
        assert_eq!(
            emit_to_string(&Object::string(vec![0x01, 0x02, 0x03, 0x04])),
            "<01020304>"
        );
        assert_eq!(emit_to_string(&Object::string(vec![0xDE, 0xAD])), "<DEAD>");
    }

    #[test]
    fn test_text_string_utf16() {
        assert_eq!(emit_to_string(&Object::text("Title")), "(Title)");
        assert_eq!(emit_to_string(&Object::text("é")), "<FEFF00E9>");
    }

    #[test]
    fn test_names() {
        assert_eq!(emit_to_string(&Object::name("Type")), "/Type");
        assert_eq!(
            emit_to_string(&Object::name("Test name\twith#tab")),
            "/Test#20name#09with#23tab"
        );
        assert_eq!(
            emit_to_string(&Object::name("A#/%()<>[]{}B")),
            "/A#23#2F#25#28#29#3C#3E#5B#5D#7B#7DB"
        );
        assert_eq!(
            emit_to_string(&Object::name(vec![0xDE, 0xAD, b'b', b'e', 0xEF])),
            "/#DE#ADbe#EF"
        );
    }

    #[test]
    fn test_array() {
        let mut inner = Array::new();
        inner.append_int(-1);

        let mut array = Array::new();
        array.append_int(42);
        array.append_scalar(0.5);
        array.append_int(0);
        array.append_bool(true);
        array.append_name("ThisName");
        array.append_string("This String");
        array.append_object(inner);
        assert_eq!(
            emit_to_string(&array.into()),
            "[42 .5 0 true /ThisName (This String) [-1]]"
        );
        assert_eq!(emit_to_string(&Array::new().into()), "[]");
    }

    #[test]
    fn test_dict() {
        let mut dict = Dict::new();
        assert_eq!(emit_to_string(&dict.clone().into()), "<<>>");

        dict.insert_int("n1", 24);
        dict.insert_int("n2", 99);
        assert_eq!(emit_to_string(&dict.clone().into()), "<</n1 24\n/n2 99>>");

        assert_eq!(
            emit_to_string(&Dict::with_type("DType").into()),
            "<</Type /DType>>"
        );
    }

    #[test]
    fn test_dict_insert_replaces_existing_key() {
        let mut dict = Dict::new();
        dict.insert_int("Count", 1);
        dict.insert_name("Type", "Pages");
        dict.insert_int("Count", 2);
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get("Count"), Some(&Object::Int(2)));
        assert_eq!(
            emit_to_string(&dict.into()),
            "<</Count 2\n/Type /Pages>>"
        );
    }

    #[test]
    fn test_small_stream_is_not_compressed() {
        let stream = Stream::new(b"Test\nFoo\tBar".to_vec());
        assert!(!stream.is_compressed());
        assert_eq!(
            emit_to_string(&stream.into()),
            "<</Length 12>> stream\nTest\nFoo\tBar\nendstream"
        );
    }

    #[test]
    fn test_stream_entries_follow_length() {
        let mut dict = Dict::new();
        dict.insert_int("Attribute", 42);
        let stream = Stream::with_dict(dict, b"Test\nFoo\tBar".to_vec());
        assert_eq!(
            emit_to_string(&stream.into()),
            "<</Length 12\n/Attribute 42>> stream\nTest\nFoo\tBar\nendstream"
        );
    }

    #[test]
    fn test_repetitive_stream_is_compressed() {
        let data = b"0 0 m 100 100 l S\n".repeat(64);
        let stream = Stream::new(data.clone());
        assert!(stream.is_compressed());
        assert!(stream.data().len() + MINIMUM_SAVINGS < data.len());

        let text = emit_to_string(&stream.clone().into());
        let expected = format!("<</Filter /FlateDecode\n/Length {}>> stream\n", stream.data().len());
        assert!(text.starts_with(&expected));

        let mut decoder = flate2::read::ZlibDecoder::new(stream.data());
        let mut inflated = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut inflated).unwrap();
        assert_eq!(inflated, data);
    }
}
