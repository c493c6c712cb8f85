//! Conversions between native values and VM objects
//!
//! [`ToForeign`] turns a native value into a new local reference the caller
//! owns; [`FromForeign`] reads a native value back out of a reference. The
//! fixed mappings live in the submodules:
//!
//! | native | VM class |
//! |---|---|
//! | `i8`, `i16`, `i32`, `i64`, `f32`, `f64`, `bool` | the matching box |
//! | `u8`, `u16`, `u32` | the next wider signed box, range-checked |
//! | `u64` | `java/math/BigInteger` |
//! | `String` | `java/lang/String` |
//! | `Vec<u8>` | `java/nio/ByteBuffer` |
//! | `DateTime<Utc>` | `java/util/Date` |
//! | `Url` | the configured URI class |
//! | `BigInt` | `java/math/BigInteger` |
//! | [`ForeignError`] | `java/lang/Exception` |
//! | [`Coded<T>`] | whatever the installed [`StructuredCoder`] produces |
//!
//! Every failure, including an exception raised by a constructor or
//! accessor, is reported as [`BridgeError::Conversion`]. A raised exception
//! also stays parked for [`JniEnv::take_exception`].

mod bigint;
mod bytes;
mod coded;
mod error;
mod number;
mod text;
mod time;
mod uri;

pub use coded::{Coded, JsonTextCoder, StructuredCoder};
pub use error::{ForeignError, JAVA_EXCEPTION_DOMAIN};

use javelin_sys::ObjectRef;

use crate::env::{JniEnv, LocalRef};
use crate::error::{BridgeError, BridgeResult};
use crate::invoke::{Arg, ReturnValue};
use crate::known::{self, BoxedType};

/// Native value that can be converted into a VM object
pub trait ToForeign {
    /// Create a new local reference; the caller owns it
    fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef>;
}

/// Native value that can be read back out of a VM object
pub trait FromForeign: Sized {
    fn from_foreign(env: &JniEnv<'_>, obj: ObjectRef) -> BridgeResult<Self>;
}

/// Convertible both ways
pub trait Bridgeable: ToForeign + FromForeign {}

impl<T: ToForeign + FromForeign> Bridgeable for T {}

impl<T: ToForeign + ?Sized> ToForeign for &T {
    fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
        (**self).to_foreign(env)
    }
}

impl<'b> JniEnv<'b> {
    /// Convert `value`, releasing the reference when the guard drops
    pub fn to_foreign<T: ToForeign + ?Sized>(&self, value: &T) -> BridgeResult<LocalRef<'b>> {
        value.to_foreign(self).map(|obj| self.auto_local(obj))
    }

    pub fn from_foreign<T: FromForeign>(&self, obj: ObjectRef) -> BridgeResult<T> {
        T::from_foreign(self, obj)
    }

    /// [`from_foreign`](Self::from_foreign) that maps a null reference to
    /// `None`
    pub fn from_foreign_opt<T: FromForeign>(
        &self,
        obj: Option<ObjectRef>,
    ) -> BridgeResult<Option<T>> {
        obj.map(|obj| T::from_foreign(self, obj)).transpose()
    }
}

/// Report a failed class or member lookup as a conversion failure of `T`
fn unavailable<T: ?Sized>(err: BridgeError) -> BridgeError {
    if err.is_resolution_failure() {
        BridgeError::conversion_of::<T>(err.to_string())
    } else {
        err
    }
}

fn raised<T: ?Sized>(env: &JniEnv<'_>, what: &str) -> BridgeResult<()> {
    if env.has_pending_exception() {
        return Err(BridgeError::conversion_of::<T>(format!("{what} raised an exception")));
    }
    Ok(())
}

/// `new class(args)` for the conversion of `T`
pub(crate) fn construct<T: ?Sized>(
    env: &JniEnv<'_>,
    class: &str,
    ctor: &str,
    args: &[Arg<'_>],
) -> BridgeResult<ObjectRef> {
    let handle = env.class(class).map_err(unavailable::<T>)?;
    let ctor = env.constructor(class, ctor).map_err(unavailable::<T>)?;
    let obj = env.construct(&handle, &ctor, args);
    raised::<T>(env, class)?;
    obj.ok_or_else(|| BridgeError::conversion_of::<T>(format!("{class} construction returned null")))
}

/// `class.name(args)` returning an object, for the conversion of `T`
pub(crate) fn call_static_object<T: ?Sized>(
    env: &JniEnv<'_>,
    class: &str,
    name: &str,
    sig: &str,
    args: &[Arg<'_>],
) -> BridgeResult<ObjectRef> {
    let handle = env.class(class).map_err(unavailable::<T>)?;
    let method = env.static_method(class, name, sig).map_err(unavailable::<T>)?;
    let obj = env.call_static::<Option<ObjectRef>>(&handle, &method, args);
    raised::<T>(env, name)?;
    obj.ok_or_else(|| BridgeError::conversion_of::<T>(format!("{class}.{name} returned null")))
}

/// `obj.name()` through the accessor declared by `owner`
pub(crate) fn access<T: ?Sized, R: ReturnValue>(
    env: &JniEnv<'_>,
    obj: ObjectRef,
    owner: &str,
    name: &str,
    sig: &str,
) -> BridgeResult<R> {
    let method = env.method(owner, name, sig).map_err(unavailable::<T>)?;
    let value = env.call::<R>(obj, &method, &[]);
    raised::<T>(env, name)?;
    Ok(value)
}

/// Object accessor whose result must not be null
pub(crate) fn access_object<'b, T: ?Sized>(
    env: &JniEnv<'b>,
    obj: ObjectRef,
    owner: &str,
    name: &str,
    sig: &str,
) -> BridgeResult<LocalRef<'b>> {
    access::<T, Option<ObjectRef>>(env, obj, owner, name, sig)?
        .map(|result| env.auto_local(result))
        .ok_or_else(|| BridgeError::conversion_of::<T>(format!("{name} returned null")))
}

/// `obj.toString()` as a native string
pub(crate) fn display<T: ?Sized>(env: &JniEnv<'_>, obj: ObjectRef) -> BridgeResult<String> {
    let text = access_object::<T>(env, obj, known::OBJECT, "toString", "()Ljava/lang/String;")?;
    String::from_foreign(env, text.as_obj())
}

pub(crate) fn boxed<T: ?Sized>(
    env: &JniEnv<'_>,
    ty: &BoxedType,
    arg: Arg<'_>,
) -> BridgeResult<ObjectRef> {
    construct::<T>(env, ty.class, ty.ctor, &[arg])
}

pub(crate) fn unboxed<T: ?Sized, R: ReturnValue>(
    env: &JniEnv<'_>,
    obj: ObjectRef,
    ty: &BoxedType,
) -> BridgeResult<R> {
    access::<T, R>(env, obj, ty.owner, ty.accessor, ty.accessor_sig)
}
