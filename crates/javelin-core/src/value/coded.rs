use javelin_sys::ObjectRef;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{FromForeign, ToForeign};
use crate::env::JniEnv;
use crate::error::{BridgeError, BridgeResult};

/// Encodes structured values into VM objects and back
///
/// Installed with [`Bridge::with_coder`](crate::Bridge::with_coder) and used
/// by [`Coded`].
pub trait StructuredCoder: Send + Sync {
    fn encode(&self, value: &serde_json::Value, env: &JniEnv<'_>) -> BridgeResult<ObjectRef>;

    fn decode(&self, obj: ObjectRef, env: &JniEnv<'_>) -> BridgeResult<serde_json::Value>;
}

/// Stores values as JSON text in a `java/lang/String`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTextCoder;

impl StructuredCoder for JsonTextCoder {
    fn encode(&self, value: &serde_json::Value, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
        serde_json::to_string(value)?.to_foreign(env)
    }

    fn decode(&self, obj: ObjectRef, env: &JniEnv<'_>) -> BridgeResult<serde_json::Value> {
        let text = String::from_foreign(env, obj)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Any serde type, converted through the bridge's [`StructuredCoder`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coded<T>(pub T);

impl<T> Coded<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

fn coder<'b>(env: &JniEnv<'b>) -> BridgeResult<&'b dyn StructuredCoder> {
    env.bridge()
        .coder()
        .ok_or_else(|| BridgeError::config("no structured coder installed on the bridge"))
}

impl<T: Serialize> ToForeign for Coded<T> {
    fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
        let value = serde_json::to_value(&self.0)?;
        coder(env)?.encode(&value, env)
    }
}

impl<T: DeserializeOwned> FromForeign for Coded<T> {
    fn from_foreign(env: &JniEnv<'_>, obj: ObjectRef) -> BridgeResult<Self> {
        let value = coder(env)?.decode(obj, env)?;
        Ok(Coded(serde_json::from_value(value)?))
    }
}
