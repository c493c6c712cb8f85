use javelin_sys::ObjectRef;

use super::{FromForeign, ToForeign, boxed, construct, display, unboxed};
use crate::env::JniEnv;
use crate::error::{BridgeError, BridgeResult};
use crate::invoke::Arg;
use crate::known;

macro_rules! boxed_primitive {
    ($($ty:ty => $boxed:expr, $variant:ident;)*) => {
        $(
            impl ToForeign for $ty {
                fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
                    boxed::<$ty>(env, &$boxed, Arg::$variant(*self))
                }
            }

            impl FromForeign for $ty {
                fn from_foreign(env: &JniEnv<'_>, obj: ObjectRef) -> BridgeResult<Self> {
                    unboxed::<$ty, $ty>(env, obj, &$boxed)
                }
            }
        )*
    };
}

boxed_primitive! {
    i8 => known::BYTE, Byte;
    i16 => known::SHORT, Short;
    i32 => known::INTEGER, Int;
    i64 => known::LONG, Long;
    f32 => known::FLOAT, Float;
    f64 => known::DOUBLE, Double;
    bool => known::BOOLEAN, Boolean;
}

// Unsigned values ride in the next wider signed box
macro_rules! widened_unsigned {
    ($($ty:ty => $wide:ty, $boxed:expr, $variant:ident;)*) => {
        $(
            impl ToForeign for $ty {
                fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
                    boxed::<$ty>(env, &$boxed, Arg::$variant(<$wide>::from(*self)))
                }
            }

            impl FromForeign for $ty {
                fn from_foreign(env: &JniEnv<'_>, obj: ObjectRef) -> BridgeResult<Self> {
                    let wide = unboxed::<$ty, $wide>(env, obj, &$boxed)?;
                    <$ty>::try_from(wide).map_err(|_| {
                        BridgeError::conversion_of::<$ty>(format!("{wide} is out of range"))
                    })
                }
            }
        )*
    };
}

widened_unsigned! {
    u8 => i16, known::SHORT, Short;
    u16 => i32, known::INTEGER, Int;
    u32 => i64, known::LONG, Long;
}

impl ToForeign for u64 {
    fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
        let digits = self.to_string();
        construct::<u64>(env, known::BIG_INTEGER, "(Ljava/lang/String;)V", &[Arg::Str(&digits)])
    }
}

impl FromForeign for u64 {
    fn from_foreign(env: &JniEnv<'_>, obj: ObjectRef) -> BridgeResult<Self> {
        let digits = display::<u64>(env, obj)?;
        digits
            .parse()
            .map_err(|e| BridgeError::conversion_of::<u64>(format!("{digits:?}: {e}")))
    }
}
