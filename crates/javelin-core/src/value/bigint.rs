use javelin_sys::ObjectRef;
use num_bigint::BigInt;

use super::{FromForeign, ToForeign, construct, display};
use crate::env::JniEnv;
use crate::error::{BridgeError, BridgeResult};
use crate::invoke::Arg;
use crate::known;

impl ToForeign for BigInt {
    fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
        let digits = self.to_str_radix(10);
        construct::<BigInt>(env, known::BIG_INTEGER, "(Ljava/lang/String;)V", &[Arg::Str(&digits)])
    }
}

impl FromForeign for BigInt {
    fn from_foreign(env: &JniEnv<'_>, obj: ObjectRef) -> BridgeResult<Self> {
        let digits = display::<BigInt>(env, obj)?;
        digits
            .parse()
            .map_err(|e| BridgeError::conversion_of::<BigInt>(format!("{digits:?}: {e}")))
    }
}
