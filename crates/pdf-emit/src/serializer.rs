//! Incremental file writer: header, object records, xref table and trailer

use crate::canon::{EmitContext, ObjNumMap, SubstituteMap};
use crate::object::{Array, Dict, Object};
use crate::pool::{ObjectHandle, ObjectPool};
use std::io::{self, Write};

/// `%PDF-1.4` followed by a comment of high-bit bytes marking the file binary
pub const HEADER: &[u8] = b"%PDF-1.4\n%\xD3\xEB\xE9\xE1\n";

/// Writer adapter that counts the bytes passed through it
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    pub fn bytes_written(&self) -> u64 {
        self.count
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Numbers objects, writes them as soon as they are registered and keeps the
/// offset of every record for the cross-reference table
#[derive(Debug, Default)]
pub struct ObjectSerializer {
    nums: ObjNumMap,
    subs: SubstituteMap,
    offsets: Vec<u64>,
    next_to_serialize: usize,
    base_offset: u64,
    info: Option<ObjectHandle>,
    header_written: bool,
}

impl ObjectSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nums(&self) -> &ObjNumMap {
        &self.nums
    }

    pub fn substitutes(&self) -> &SubstituteMap {
        &self.subs
    }

    pub fn substitutes_mut(&mut self) -> &mut SubstituteMap {
        &mut self.subs
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    /// Number of objects written so far
    pub fn serialized_count(&self) -> usize {
        self.next_to_serialize
    }

    /// Number `handle` and everything it references
    pub fn add_object_recursively(&mut self, handle: ObjectHandle, pool: &ObjectPool) {
        self.nums
            .add_object_recursively(Some(handle), pool, &self.subs);
    }

    /// Write the file header, then register and write the Info dictionary
    pub fn serialize_header<W: Write>(
        &mut self,
        out: &mut CountingWriter<W>,
        pool: &mut ObjectPool,
        info: Dict,
    ) -> io::Result<()> {
        debug_assert!(!self.header_written);
        self.base_offset = out.bytes_written();
        out.write_all(HEADER)?;
        self.header_written = true;

        let info = pool.add(info);
        self.info = Some(info);
        self.add_object_recursively(info, pool);
        self.serialize_objects(out, pool)
    }

    /// Write every numbered object that has not been written yet
    ///
    /// Each object is sealed right after it is written so its payload can be
    /// freed while the document is still open.
    pub fn serialize_objects<W: Write>(
        &mut self,
        out: &mut CountingWriter<W>,
        pool: &mut ObjectPool,
    ) -> io::Result<()> {
        let start = self.next_to_serialize;
        while self.next_to_serialize < self.nums.len() {
            let handle = self.nums.objects()[self.next_to_serialize];
            let number = self.next_to_serialize + 1;
            self.offsets.push(out.bytes_written() - self.base_offset);

            write!(out, "{number} 0 obj\n")?;
            match pool.get(handle) {
                Some(object) => object.emit(out, &EmitContext::new(&self.nums, &self.subs))?,
                None => {
                    debug_assert!(false, "object {number} was already written");
                    out.write_all(b"null")?;
                }
            }
            out.write_all(b"\nendobj\n")?;
            log::trace!("wrote object {number}");

            pool.seal(handle);
            self.next_to_serialize += 1;
        }
        if self.next_to_serialize > start {
            log::debug!(
                "flushed objects {}..={}",
                start + 1,
                self.next_to_serialize
            );
        }
        Ok(())
    }

    /// Number and flush everything under `root`, then write the xref table
    /// and trailer
    pub fn serialize_footer<W: Write>(
        &mut self,
        out: &mut CountingWriter<W>,
        pool: &mut ObjectPool,
        root: ObjectHandle,
        id: Option<&[Vec<u8>; 2]>,
    ) -> io::Result<()> {
        self.add_object_recursively(root, pool);
        self.serialize_objects(out, pool)?;

        let xref_offset = out.bytes_written() - self.base_offset;
        let object_count = self.offsets.len();
        write!(out, "xref\n0 {}\n", object_count + 1)?;
        out.write_all(b"0000000000 65535 f \n")?;
        for offset in &self.offsets {
            write!(out, "{offset:010} 00000 n \n")?;
        }

        let mut trailer = Dict::new();
        trailer.insert_int("Size", object_count as i32 + 1);
        trailer.insert_ref("Root", root);
        if let Some(info) = self.info {
            trailer.insert_ref("Info", info);
        }
        if let Some([first, second]) = id {
            let mut array = Array::new();
            array.append_object(Object::String(first.clone()));
            array.append_object(Object::String(second.clone()));
            trailer.insert_object("ID", array);
        }

        out.write_all(b"trailer\n")?;
        trailer.emit(out, &EmitContext::new(&self.nums, &self.subs))?;
        write!(out, "\nstartxref\n{xref_offset}\n%%EOF")?;
        out.flush()
    }

    /// Forget all numbering and offsets
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
