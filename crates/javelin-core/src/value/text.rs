use javelin_sys::ObjectRef;

use super::{FromForeign, ToForeign};
use crate::env::JniEnv;
use crate::error::{BridgeError, BridgeResult};

impl ToForeign for str {
    fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
        let units: Vec<u16> = self.encode_utf16().collect();
        env.native().new_string(env.raw(), &units).ok_or_else(|| {
            env.park_exception();
            BridgeError::conversion_of::<String>("NewString returned null")
        })
    }
}

impl ToForeign for String {
    fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
        self.as_str().to_foreign(env)
    }
}

/// Unpaired surrogates become U+FFFD
impl FromForeign for String {
    fn from_foreign(env: &JniEnv<'_>, obj: ObjectRef) -> BridgeResult<Self> {
        let units = env
            .native()
            .get_string_chars(env.raw(), obj)
            .ok_or_else(|| BridgeError::conversion_of::<String>("GetStringChars returned null"))?;
        Ok(String::from_utf16_lossy(&units))
    }
}
