//! Method invocation
//!
//! Every call made through [`JniEnv`] follows the same sequence:
//!
//! 1. any exception parked by an earlier call on this thread is discarded
//! 2. arguments are marshaled into a contiguous `jvalue` array; references
//!    created for the call are tracked in a [`LocalFrame`]
//! 3. the array-style JNI function runs, with a null argument pointer when
//!    there are no arguments
//! 4. the frame releases its references
//! 5. a VM exception raised by the call is captured and parked
//!
//! Results come back unchanged. A call never fails on the native side; use
//! [`JniEnv::take_exception`] or [`JniEnv::rethrow`] to observe what the VM
//! raised. If creating an argument raised (say an `OutOfMemoryError` from
//! `NewString`), that exception is parked instead and the call is skipped,
//! returning the zero value of its kind.

use javelin_sys::{JValue, JavaType, ObjectRef, jvalue};
use tracing::warn;

use crate::env::{JniEnv, LocalRef};
use crate::error::{BridgeError, BridgeResult};
use crate::handles::{ClassHandle, FieldHandle, MethodHandle, StaticMethodHandle};
use crate::value::ToForeign;

/// One argument of a call
#[derive(Clone, Copy)]
pub enum Arg<'a> {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// A reference the caller keeps ownership of
    Object(Option<ObjectRef>),
    /// A local reference handed over to the call, released after it
    Local(ObjectRef),
    /// A string, created for the call and released after it
    Str(&'a str),
    /// A native value converted for the call and released after it
    Value(&'a dyn ToForeign),
}

impl std::fmt::Debug for Arg<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Boolean(v) => write!(f, "Boolean({v})"),
            Arg::Byte(v) => write!(f, "Byte({v})"),
            Arg::Char(v) => write!(f, "Char({v})"),
            Arg::Short(v) => write!(f, "Short({v})"),
            Arg::Int(v) => write!(f, "Int({v})"),
            Arg::Long(v) => write!(f, "Long({v})"),
            Arg::Float(v) => write!(f, "Float({v})"),
            Arg::Double(v) => write!(f, "Double({v})"),
            Arg::Object(v) => write!(f, "Object({v:?})"),
            Arg::Local(v) => write!(f, "Local({v:?})"),
            Arg::Str(v) => write!(f, "Str({v:?})"),
            Arg::Value(_) => f.write_str("Value(..)"),
        }
    }
}

macro_rules! arg_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Arg<'_> {
                fn from(v: $ty) -> Self {
                    Arg::$variant(v)
                }
            }
        )*
    };
}

arg_from! {
    bool => Boolean,
    i8 => Byte,
    u16 => Char,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    Option<ObjectRef> => Object,
}

impl From<ObjectRef> for Arg<'_> {
    fn from(obj: ObjectRef) -> Self {
        Arg::Object(Some(obj))
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(s: &'a str) -> Self {
        Arg::Str(s)
    }
}

impl From<&ClassHandle> for Arg<'_> {
    fn from(class: &ClassHandle) -> Self {
        Arg::Object(Some(class.as_obj()))
    }
}

impl From<&LocalRef<'_>> for Arg<'_> {
    fn from(local: &LocalRef<'_>) -> Self {
        Arg::Object(Some(local.as_obj()))
    }
}

/// Local references owned by one call
pub(crate) struct LocalFrame<'e, 'b> {
    env: &'e JniEnv<'b>,
    refs: Vec<ObjectRef>,
}

impl<'e, 'b> LocalFrame<'e, 'b> {
    fn new(env: &'e JniEnv<'b>) -> Self {
        Self {
            env,
            refs: Vec::new(),
        }
    }

    fn track(&mut self, obj: ObjectRef) -> ObjectRef {
        self.refs.push(obj);
        obj
    }
}

impl Drop for LocalFrame<'_, '_> {
    fn drop(&mut self) {
        for obj in self.refs.drain(..) {
            self.env.delete_local_ref(obj);
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Native types a call can return, one per `Call<Kind>MethodA` variant
pub trait ReturnValue: sealed::Sealed + Sized {
    const KIND: JavaType;

    fn from_jvalue(value: JValue) -> Self;
}

macro_rules! return_value {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl ReturnValue for $ty {
                const KIND: JavaType = JavaType::$kind;

                fn from_jvalue(value: JValue) -> Self {
                    match value {
                        JValue::$kind(v) => v,
                        _ => Default::default(),
                    }
                }
            }
        )*
    };
}

return_value! {
    bool => Boolean,
    i8 => Byte,
    u16 => Char,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    Option<ObjectRef> => Object,
}

impl sealed::Sealed for () {}

impl ReturnValue for () {
    const KIND: JavaType = JavaType::Void;

    fn from_jvalue(_: JValue) -> Self {}
}

impl<'b> JniEnv<'b> {
    /// Build the argument array, or `None` when creating an argument left
    /// an exception parked
    fn marshal(&self, args: &[Arg<'_>], frame: &mut LocalFrame<'_, 'b>) -> Option<Vec<jvalue>> {
        let mut raw = Vec::with_capacity(args.len());
        for arg in args {
            let value = match *arg {
                Arg::Boolean(v) => JValue::Boolean(v),
                Arg::Byte(v) => JValue::Byte(v),
                Arg::Char(v) => JValue::Char(v),
                Arg::Short(v) => JValue::Short(v),
                Arg::Int(v) => JValue::Int(v),
                Arg::Long(v) => JValue::Long(v),
                Arg::Float(v) => JValue::Float(v),
                Arg::Double(v) => JValue::Double(v),
                Arg::Object(obj) => JValue::Object(obj),
                Arg::Local(obj) => JValue::Object(Some(frame.track(obj))),
                Arg::Str(s) => {
                    let units: Vec<u16> = s.encode_utf16().collect();
                    match self.native().new_string(self.raw(), &units) {
                        Some(obj) => JValue::Object(Some(frame.track(obj))),
                        None => {
                            if self.argument_raised() {
                                return None;
                            }
                            warn!(len = s.len(), "string argument could not be created, passing null");
                            JValue::Object(None)
                        }
                    }
                }
                Arg::Value(v) => match v.to_foreign(self) {
                    Ok(obj) => JValue::Object(Some(frame.track(obj))),
                    Err(e) => {
                        if self.argument_raised() {
                            return None;
                        }
                        warn!(error = %e, "argument conversion failed, passing null");
                        JValue::Object(None)
                    }
                },
            };
            raw.push(value.as_jni());
        }
        Some(raw)
    }

    /// Park whatever a failed argument left in the VM; true if the call
    /// must be skipped
    fn argument_raised(&self) -> bool {
        let exceptions = self.bridge().exceptions();
        exceptions.capture(self.raw(), self.thread());
        if exceptions.has_pending(self.thread()) {
            warn!("creating an argument raised, skipping the call");
            return true;
        }
        false
    }

    /// Shared call sequence; `call` receives the argument layout. `None`
    /// when the call was skipped.
    fn invoke<T>(&self, args: &[Arg<'_>], call: impl FnOnce(Option<&[jvalue]>) -> T) -> Option<T> {
        self.bridge().exceptions().reset(self.raw(), self.thread());
        let mut frame = LocalFrame::new(self);
        let raw = self.marshal(args, &mut frame)?;
        let layout = if raw.is_empty() { None } else { Some(raw.as_slice()) };
        let result = call(layout);
        drop(frame);
        self.bridge().exceptions().capture(self.raw(), self.thread());
        Some(result)
    }

    /// `NewObjectA`; `None` if the constructor raised or the VM could not
    /// allocate
    pub fn construct(
        &self,
        class: &ClassHandle,
        ctor: &MethodHandle,
        args: &[Arg<'_>],
    ) -> Option<ObjectRef> {
        debug_assert_eq!(ctor.arity(), args.len(), "{}", ctor.key());
        self.invoke(args, |layout| {
            self.native()
                .new_object(self.raw(), class.as_obj(), ctor.id(), layout)
        })
        .flatten()
    }

    /// [`construct`](Self::construct) that reports a null result as
    /// [`BridgeError::CantCreateObject`]
    pub fn new_object(
        &self,
        class: &ClassHandle,
        ctor: &MethodHandle,
        args: &[Arg<'_>],
    ) -> BridgeResult<ObjectRef> {
        self.construct(class, ctor, args)
            .ok_or_else(|| BridgeError::CantCreateObject(class.name().to_string()))
    }

    /// `Call<Kind>MethodA`, the kind chosen by `R`
    pub fn call<R: ReturnValue>(
        &self,
        obj: ObjectRef,
        method: &MethodHandle,
        args: &[Arg<'_>],
    ) -> R {
        debug_assert_eq!(method.return_type(), R::KIND, "{}", method.key());
        debug_assert_eq!(method.arity(), args.len(), "{}", method.key());
        let value = self.invoke(args, |layout| {
            self.native()
                .call_method(self.raw(), obj, method.id(), R::KIND, layout)
        });
        R::from_jvalue(value.unwrap_or(JValue::Void))
    }

    /// `CallStatic<Kind>MethodA`, the kind chosen by `R`
    pub fn call_static<R: ReturnValue>(
        &self,
        class: &ClassHandle,
        method: &StaticMethodHandle,
        args: &[Arg<'_>],
    ) -> R {
        debug_assert_eq!(method.return_type(), R::KIND, "{}", method.key());
        debug_assert_eq!(method.arity(), args.len(), "{}", method.key());
        let value = self.invoke(args, |layout| {
            self.native().call_static_method(
                self.raw(),
                class.as_obj(),
                method.id(),
                R::KIND,
                layout,
            )
        });
        R::from_jvalue(value.unwrap_or(JValue::Void))
    }

    pub fn call_void(&self, obj: ObjectRef, method: &MethodHandle, args: &[Arg<'_>]) {
        self.call::<()>(obj, method, args)
    }

    pub fn call_static_void(
        &self,
        class: &ClassHandle,
        method: &StaticMethodHandle,
        args: &[Arg<'_>],
    ) {
        self.call_static::<()>(class, method, args)
    }

    /// `Get<Kind>Field`, the kind chosen by `R`
    pub fn get_field<R: ReturnValue>(&self, obj: ObjectRef, field: &FieldHandle) -> R {
        debug_assert_eq!(field.field_type(), R::KIND, "{}", field.key());
        let value = self.invoke(&[], |_| {
            self.native()
                .get_field(self.raw(), obj, field.id(), R::KIND)
        });
        R::from_jvalue(value.unwrap_or(JValue::Void))
    }
}
