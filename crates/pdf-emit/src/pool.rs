//! Arena of indirect objects
//!
//! Every object that is written as `N 0 obj … endobj` lives in the pool and
//! is addressed by an [`ObjectHandle`]. Handles are stable for the lifetime
//! of a document; object numbers are assigned separately by the
//! [`ObjNumMap`](crate::canon::ObjNumMap).

use crate::canon::{EmitContext, ObjNumMap, SubstituteMap};
use crate::image::{JpegImage, RawImage};
use crate::object::{Dict, Object, Stream};
use crate::{PdfError, Result};
use std::io::{self, Write};

/// Index of an object in the [`ObjectPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(u32);

impl ObjectHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Payload of an indirect object
#[derive(Debug, Clone)]
pub enum IndirectObject {
    Object(Object),
    /// Raw pixels, deflated when emitted
    Image(RawImage),
    /// Encoded JPEG bytes written unchanged
    Jpeg(JpegImage),
}

impl IndirectObject {
    pub fn emit<W: Write + ?Sized>(&self, out: &mut W, ctx: &EmitContext<'_>) -> io::Result<()> {
        match self {
            IndirectObject::Object(object) => object.emit(out, ctx),
            IndirectObject::Image(image) => image.emit(out, ctx),
            IndirectObject::Jpeg(jpeg) => jpeg.emit(out, ctx),
        }
    }

    pub fn add_resources(&self, map: &mut ObjNumMap, pool: &ObjectPool, subs: &SubstituteMap) {
        match self {
            IndirectObject::Object(object) => object.add_resources(map, pool, subs),
            IndirectObject::Image(image) => {
                if let Some(smask) = image.smask() {
                    map.add_object_recursively(Some(smask), pool, subs);
                }
            }
            IndirectObject::Jpeg(_) => {}
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            IndirectObject::Object(object) => object.as_dict(),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            IndirectObject::Object(Object::Dict(dict)) => Some(dict),
            IndirectObject::Object(Object::Stream(stream)) => Some(stream.dict_mut()),
            _ => None,
        }
    }
}

impl From<Object> for IndirectObject {
    fn from(value: Object) -> Self {
        IndirectObject::Object(value)
    }
}

impl From<Dict> for IndirectObject {
    fn from(value: Dict) -> Self {
        IndirectObject::Object(Object::Dict(value))
    }
}

impl From<Stream> for IndirectObject {
    fn from(value: Stream) -> Self {
        IndirectObject::Object(Object::Stream(value))
    }
}

impl From<RawImage> for IndirectObject {
    fn from(value: RawImage) -> Self {
        IndirectObject::Image(value)
    }
}

impl From<JpegImage> for IndirectObject {
    fn from(value: JpegImage) -> Self {
        IndirectObject::Jpeg(value)
    }
}

#[derive(Debug)]
enum Slot {
    Building(IndirectObject),
    /// Already serialized; the payload has been released
    Sealed,
}

/// Owner of all indirect objects of one document
#[derive(Debug, Default)]
pub struct ObjectPool {
    slots: Vec<Slot>,
}

impl ObjectPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move an object into the pool
    pub fn add(&mut self, object: impl Into<IndirectObject>) -> ObjectHandle {
        let handle = ObjectHandle(self.slots.len() as u32);
        self.slots.push(Slot::Building(object.into()));
        handle
    }

    /// Borrow a live object; `None` once it has been sealed
    pub fn get(&self, handle: ObjectHandle) -> Option<&IndirectObject> {
        match self.slots.get(handle.index()) {
            Some(Slot::Building(object)) => Some(object),
            _ => None,
        }
    }

    /// Borrow a live object for mutation
    ///
    /// Sealed objects have already been written and can no longer change.
    pub fn get_mut(&mut self, handle: ObjectHandle) -> Result<&mut IndirectObject> {
        match self.slots.get_mut(handle.index()) {
            Some(Slot::Building(object)) => Ok(object),
            _ => Err(PdfError::SealedObject(handle.index())),
        }
    }

    /// Borrow the dictionary of a live Dict or Stream object for mutation
    pub fn dict_mut(&mut self, handle: ObjectHandle) -> Result<&mut Dict> {
        self.get_mut(handle)?
            .as_dict_mut()
            .ok_or(PdfError::NotADictionary(handle.index()))
    }

    /// Release the payload of a serialized object
    pub fn seal(&mut self, handle: ObjectHandle) {
        if let Some(slot) = self.slots.get_mut(handle.index()) {
            *slot = Slot::Sealed;
        }
    }

    pub fn is_sealed(&self, handle: ObjectHandle) -> bool {
        matches!(self.slots.get(handle.index()), Some(Slot::Sealed))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
