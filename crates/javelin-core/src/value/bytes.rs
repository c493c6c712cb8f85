use javelin_sys::ObjectRef;

use super::{FromForeign, ToForeign, access_object, call_static_object};
use crate::env::JniEnv;
use crate::error::{BridgeError, BridgeResult};
use crate::invoke::Arg;
use crate::known;

impl ToForeign for [u8] {
    fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
        let array = env
            .native()
            .new_byte_array(env.raw(), self)
            .map(|array| env.auto_local(array))
            .ok_or_else(|| {
                env.park_exception();
                BridgeError::conversion_of::<Vec<u8>>("NewByteArray returned null")
            })?;
        call_static_object::<Vec<u8>>(
            env,
            known::BYTE_BUFFER,
            "wrap",
            "([B)Ljava/nio/ByteBuffer;",
            &[Arg::from(&array)],
        )
    }
}

impl ToForeign for Vec<u8> {
    fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
        self.as_slice().to_foreign(env)
    }
}

/// Reads the whole backing array, ignoring position and limit
impl FromForeign for Vec<u8> {
    fn from_foreign(env: &JniEnv<'_>, obj: ObjectRef) -> BridgeResult<Self> {
        let array = access_object::<Vec<u8>>(env, obj, known::BYTE_BUFFER, "array", "()[B")?;
        env.native()
            .get_byte_array(env.raw(), array.as_obj())
            .ok_or_else(|| BridgeError::conversion_of::<Vec<u8>>("GetByteArrayRegion failed"))
    }
}
