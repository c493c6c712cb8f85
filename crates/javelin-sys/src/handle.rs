//! Typed raw handles
//!
//! JNI hands out untyped pointers for environments, objects, method IDs and
//! field IDs. Each kind gets its own newtype here so that passing a field ID
//! where a method ID is expected is a compile error.
//!
//! None of these types are `Send` or `Sync`: an environment and the local
//! references created through it are only valid on the thread that obtained
//! them. Layers that need to park a handle in shared state wrap it and
//! justify the `Send` impl there.

use jni_sys::{JNIEnv, jfieldID, jmethodID, jobject};
use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

/// A thread's JNI environment (`JNIEnv*`)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Env(NonNull<JNIEnv>);

impl Env {
    /// Wrap a raw environment pointer
    ///
    /// # Safety
    /// `raw` must be null or an environment pointer produced by the VM (or
    /// by an implementation of [`crate::NativeInterface`] that never
    /// dereferences it).
    pub unsafe fn from_raw(raw: *mut JNIEnv) -> Option<Self> {
        NonNull::new(raw).map(Self)
    }

    /// Get the raw `JNIEnv*`
    pub fn as_raw(self) -> *mut JNIEnv {
        self.0.as_ptr()
    }

    /// Address of the environment, used as an identity key
    pub fn addr(self) -> usize {
        self.0.as_ptr().addr()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Env({:#x})", self.addr())
    }
}

/// A non-null VM object reference (`jobject`)
///
/// Whether the reference is local or global is decided by whoever created
/// it; the handle itself does not track it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(NonNull<c_void>);

impl ObjectRef {
    /// Wrap a raw object reference, `None` for a null `jobject`
    ///
    /// # Safety
    /// `raw` must be null or a reference produced by the VM.
    pub unsafe fn from_raw(raw: jobject) -> Option<Self> {
        NonNull::new(raw.cast::<c_void>()).map(Self)
    }

    /// Get the raw `jobject`
    pub fn as_raw(self) -> jobject {
        self.0.as_ptr().cast()
    }

    /// Address of the reference, used as an identity key
    pub fn addr(self) -> usize {
        self.0.as_ptr().addr()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:#x})", self.addr())
    }
}

/// A resolved method ID (`jmethodID`)
///
/// Method IDs stay valid until the declaring class is unloaded and may be
/// used from any thread.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(NonNull<c_void>);

impl MethodId {
    /// # Safety
    /// `raw` must be null or a method ID produced by the VM.
    pub unsafe fn from_raw(raw: jmethodID) -> Option<Self> {
        NonNull::new(raw.cast::<c_void>()).map(Self)
    }

    pub fn as_raw(self) -> jmethodID {
        self.0.as_ptr().cast()
    }

    pub fn addr(self) -> usize {
        self.0.as_ptr().addr()
    }
}

impl fmt::Debug for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodId({:#x})", self.addr())
    }
}

/// A resolved field ID (`jfieldID`)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(NonNull<c_void>);

impl FieldId {
    /// # Safety
    /// `raw` must be null or a field ID produced by the VM.
    pub unsafe fn from_raw(raw: jfieldID) -> Option<Self> {
        NonNull::new(raw.cast::<c_void>()).map(Self)
    }

    pub fn as_raw(self) -> jfieldID {
        self.0.as_ptr().cast()
    }

    pub fn addr(self) -> usize {
        self.0.as_ptr().addr()
    }
}

impl fmt::Debug for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldId({:#x})", self.addr())
    }
}
