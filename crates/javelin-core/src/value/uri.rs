use javelin_sys::ObjectRef;
use url::Url;

use super::{FromForeign, ToForeign, call_static_object, display};
use crate::env::JniEnv;
use crate::error::{BridgeError, BridgeResult};
use crate::invoke::Arg;

/// Built through the factory of [`BridgeConfig::uri`](crate::BridgeConfig)
impl ToForeign for Url {
    fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
        let binding = &env.bridge().config().uri;
        call_static_object::<Url>(
            env,
            &binding.class,
            &binding.factory,
            &binding.signature,
            &[Arg::Str(self.as_str())],
        )
    }
}

impl FromForeign for Url {
    fn from_foreign(env: &JniEnv<'_>, obj: ObjectRef) -> BridgeResult<Self> {
        let text = display::<Url>(env, obj)?;
        Url::parse(&text).map_err(|e| BridgeError::conversion_of::<Url>(format!("{text:?}: {e}")))
    }
}
