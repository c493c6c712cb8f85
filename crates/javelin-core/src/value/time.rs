use chrono::{DateTime, Utc};
use javelin_sys::ObjectRef;

use super::{FromForeign, ToForeign, access, construct};
use crate::env::JniEnv;
use crate::error::{BridgeError, BridgeResult};
use crate::invoke::Arg;
use crate::known;

/// Milliseconds since the epoch; sub-millisecond precision is dropped
impl ToForeign for DateTime<Utc> {
    fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
        let millis = self.timestamp_millis();
        construct::<Self>(env, known::DATE, "(J)V", &[Arg::Long(millis)])
    }
}

impl FromForeign for DateTime<Utc> {
    fn from_foreign(env: &JniEnv<'_>, obj: ObjectRef) -> BridgeResult<Self> {
        let millis = access::<Self, i64>(env, obj, known::DATE, "getTime", "()J")?;
        DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            BridgeError::conversion_of::<Self>(format!("{millis} ms is out of range"))
        })
    }
}
