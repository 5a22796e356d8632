//! Nominally typed native handles
//!
//! The native library hands back raw pointers for six distinct object
//! categories. They are all `void*` on the wire; here each category
//! gets its own marker so that a type handle cannot be passed where a
//! value handle is expected. Handles are plain copies of the raw
//! pointer - ownership of the context/module/builder trio lives in
//! [`Session`], everything else is owned by its context on the native
//! side.

use std::ffi::c_void;
use std::marker::PhantomData;

/// Marker for the owning native context
pub enum ContextKind {}
/// Marker for a native module
pub enum ModuleKind {}
/// Marker for an instruction builder
pub enum BuilderKind {}
/// Marker for a native type
pub enum TypeKind {}
/// Marker for a native value (constants, instructions, functions)
pub enum ValueKind {}
/// Marker for a native basic block
pub enum BlockKind {}

/// A non-null native pointer tagged with its category
pub struct Handle<K> {
    raw: *mut c_void,
    _kind: PhantomData<K>,
}

// Manual impls: derive would require K: Clone/Copy
impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K> Copy for Handle<K> {}

impl<K> std::fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({:p})", self.raw)
    }
}

impl<K> Handle<K> {
    /// Wrap a pointer returned by the native library. `None` when the
    /// call reported failure by returning null.
    pub(crate) fn new(raw: *mut c_void) -> Option<Self> {
        if raw.is_null() {
            None
        } else {
            Some(Self {
                raw,
                _kind: PhantomData,
            })
        }
    }

    pub(crate) fn raw(self) -> *mut c_void {
        self.raw
    }
}

pub type ContextHandle = Handle<ContextKind>;
pub type ModuleHandle = Handle<ModuleKind>;
pub type BuilderHandle = Handle<BuilderKind>;
pub type TypeHandle = Handle<TypeKind>;
pub type ValueHandle = Handle<ValueKind>;
pub type BlockHandle = Handle<BlockKind>;

/// Flatten handles into the contiguous pointer array the native
/// calls take for their variadic-length parameters.
pub(crate) fn marshal<K>(handles: &[Handle<K>]) -> Vec<*mut c_void> {
    handles.iter().map(|h| h.raw).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_rejects_null() {
        assert!(TypeHandle::new(std::ptr::null_mut()).is_none());
    }

    #[test]
    fn test_marshal_preserves_order() {
        let a = 0x10usize as *mut c_void;
        let b = 0x20usize as *mut c_void;
        let handles = [ValueHandle::new(a).unwrap(), ValueHandle::new(b).unwrap()];
        assert_eq!(marshal(&handles), vec![a, b]);
    }
}
