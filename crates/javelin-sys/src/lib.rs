//! Raw JNI bindings and the native invocation seam
//!
//! This crate provides the low-level layer the bridge runtime is built on:
//!
//! - typed raw handles ([`Env`], [`ObjectRef`], [`MethodId`], [`FieldId`])
//!   instead of untyped `jobject`/`jmethodID` pointers
//! - [`JavaType`] and [`JValue`] for return kinds and owned results
//! - descriptor parsing ([`MethodDescriptor`], [`parse_field_descriptor`])
//! - the [`NativeInterface`] trait, the exact subset of the JNI function
//!   tables the runtime consumes
//! - [`JniNativeInterface`], the production implementation over a `JavaVM*`
//! - `emulator` (feature `emulator`): an in-process VM that enforces the
//!   JNI rules, used by tests and benches
//!
//! Use the safe wrappers in `javelin-core` for higher-level access.

// Safe functions here take raw handles the caller obtained from the VM; the
// JNI contract for those handles is documented on each type.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

mod descriptor;
mod handle;
mod interface;
mod jni;
mod value;

#[cfg(feature = "emulator")]
pub mod emulator;

pub use descriptor::{DescriptorError, MethodDescriptor, parse_field_descriptor};
pub use handle::{Env, FieldId, MethodId, ObjectRef};
pub use interface::NativeInterface;
pub use jni::JniNativeInterface;
pub use value::{JValue, JavaType};

// Re-export jni-sys for direct FFI access when needed
pub use jni_sys;
pub use jni_sys::{JNI_ERR, JNI_EDETACHED, JNI_OK, JNI_VERSION_1_6, JavaVM, jint, jvalue};
