//! Object numbering and substitution

use crate::pool::{ObjectHandle, ObjectPool};
use std::collections::HashMap;

/// Replacement table consulted whenever a handle is numbered or referenced
///
/// Used to swap a full font for its subset at close time without touching
/// the dictionaries that already reference the original.
#[derive(Debug, Default)]
pub struct SubstituteMap {
    substitutes: HashMap<ObjectHandle, ObjectHandle>,
}

impl SubstituteMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_substitute(&mut self, original: ObjectHandle, substitute: ObjectHandle) {
        debug_assert_ne!(original, substitute);
        self.substitutes.insert(original, substitute);
    }

    /// The substitute for `handle`, or `handle` itself
    pub fn resolve(&self, handle: ObjectHandle) -> ObjectHandle {
        self.substitutes.get(&handle).copied().unwrap_or(handle)
    }

    pub fn len(&self) -> usize {
        self.substitutes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.substitutes.is_empty()
    }

    pub fn clear(&mut self) {
        self.substitutes.clear();
    }
}

/// Assigns indirect object numbers, starting at 1, in discovery order
#[derive(Debug, Default)]
pub struct ObjNumMap {
    numbers: HashMap<ObjectHandle, u32>,
    objects: Vec<ObjectHandle>,
}

impl ObjNumMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number a single object; returns false if it already had a number
    pub fn add_object(&mut self, handle: ObjectHandle) -> bool {
        if self.numbers.contains_key(&handle) {
            return false;
        }
        self.objects.push(handle);
        self.numbers.insert(handle, self.objects.len() as u32);
        true
    }

    /// Number `handle` (after substitution) and everything reachable from it
    ///
    /// Objects that already have a number are skipped, so calling this
    /// repeatedly on the same graph is harmless.
    pub fn add_object_recursively(
        &mut self,
        handle: Option<ObjectHandle>,
        pool: &ObjectPool,
        subs: &SubstituteMap,
    ) {
        let Some(handle) = handle else {
            return;
        };
        let handle = subs.resolve(handle);
        if self.add_object(handle) {
            if let Some(object) = pool.get(handle) {
                object.add_resources(self, pool, subs);
            }
        }
    }

    pub fn object_number(&self, handle: ObjectHandle) -> Option<u32> {
        self.numbers.get(&handle).copied()
    }

    /// Objects in the order their numbers were assigned
    pub fn objects(&self) -> &[ObjectHandle] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.numbers.clear();
        self.objects.clear();
    }
}

/// Read-only view used while writing objects
#[derive(Debug, Clone, Copy)]
pub struct EmitContext<'a> {
    nums: &'a ObjNumMap,
    subs: &'a SubstituteMap,
}

impl<'a> EmitContext<'a> {
    pub fn new(nums: &'a ObjNumMap, subs: &'a SubstituteMap) -> Self {
        Self { nums, subs }
    }

    /// Object number a reference to `handle` resolves to
    pub fn object_number(&self, handle: ObjectHandle) -> Option<u32> {
        self.nums.object_number(self.subs.resolve(handle))
    }
}
