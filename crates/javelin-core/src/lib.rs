//! Thread-aware JNI bridge runtime.
//!
//! This crate lets native code call into a JVM or Android runtime, and be
//! called from it, on top of the raw seam in `javelin-sys`:
//!
//! - [`EnvironmentRegistry`] gives every calling thread its own
//!   environment, attaching lazily and detaching on thread exit
//! - [`HandleCache`] resolves each class, method and field once and shares
//!   the handle with every thread
//! - [`ExceptionBridge`] moves VM exceptions out of the VM after every call
//!   and parks them per thread until asked for
//! - [`JniEnv`] is the call surface: construct objects, call methods by
//!   return kind, read fields, with temporary references released per call
//! - [`value`] converts native values to VM objects and back
//!
//! # Example
//!
//! ```
//! use javelin_core::{Arg, Bridge, BridgeConfig};
//! use javelin_core::javelin_sys::emulator::Emulator;
//! use std::sync::Arc;
//!
//! let bridge = Bridge::new(Arc::new(Emulator::new()), BridgeConfig::default());
//! let env = bridge.env().unwrap();
//!
//! let boxed = env.to_foreign(&42i32).unwrap();
//! assert_eq!(env.from_foreign::<i32>(boxed.as_obj()).unwrap(), 42);
//!
//! let parse = env
//!     .static_method("java/lang/Integer", "parseInt", "(Ljava/lang/String;)I")
//!     .unwrap();
//! let integer = env.class("java/lang/Integer").unwrap();
//! let n: i32 = env.call_static(&integer, &parse, &[Arg::Str("nope")]);
//! assert_eq!(n, 0);
//! assert!(env.rethrow().is_err());
//! ```
//!
//! # Thread Safety
//!
//! [`Bridge`] and the handles it caches are `Send + Sync`. The session
//! ([`JniEnv`]) and local references ([`LocalRef`]) belong to the thread
//! that created them and are `!Send` and `!Sync`.
//!
//! ## Example: Wrong (won't compile)
//!
//! ```compile_fail
//! use javelin_core::{Bridge, BridgeConfig};
//! use javelin_core::javelin_sys::emulator::Emulator;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let bridge = Arc::new(Bridge::new(Arc::new(Emulator::new()), BridgeConfig::default()));
//! let env = bridge.env().unwrap();
//! thread::scope(|s| {
//!     s.spawn(move || env.class("java/lang/String")); // Error: JniEnv is !Send
//! });
//! ```
//!
//! ## Example: Correct
//!
//! ```
//! use javelin_core::{Bridge, BridgeConfig};
//! use javelin_core::javelin_sys::emulator::Emulator;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let bridge = Arc::new(Bridge::new(Arc::new(Emulator::new()), BridgeConfig::default()));
//! let worker = Arc::clone(&bridge);
//! thread::spawn(move || {
//!     let env = worker.env().unwrap(); // attaches this thread
//!     env.class("java/lang/String").unwrap();
//!     worker.thread_exited();
//! })
//! .join()
//! .unwrap();
//! ```

mod bridge;
mod config;
mod env;
mod error;
mod exception;
mod handles;
mod invoke;
pub mod known;
mod lookup;
mod registry;
mod thread;
pub mod value;

pub use bridge::{Bridge, on_load};
pub use config::{BridgeConfig, ClassLookup, UriBinding};
pub use env::{JniEnv, LocalRef};
pub use error::{BridgeError, BridgeResult};
pub use exception::ExceptionBridge;
pub use handles::{
    CacheStats, ClassHandle, FieldHandle, HandleCache, MemberKey, MethodHandle,
    StaticMethodHandle,
};
pub use invoke::{Arg, ReturnValue};
pub use registry::EnvironmentRegistry;
pub use thread::ThreadKey;
pub use value::{
    Bridgeable, Coded, ForeignError, FromForeign, JsonTextCoder, StructuredCoder, ToForeign,
};

// Re-export javelin-sys for direct access to the raw layer
pub use javelin_sys;
