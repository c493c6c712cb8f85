use javelin_sys::ObjectRef;
use thiserror::Error;

use super::{FromForeign, ToForeign, access, construct};
use crate::env::JniEnv;
use crate::error::BridgeResult;
use crate::invoke::Arg;
use crate::known;

/// Domain used when a throwable carries no message
pub const JAVA_EXCEPTION_DOMAIN: &str = "JavaException";

/// A native error as it crosses into the VM: a domain and a numeric code,
/// carried as a `java/lang/Exception` with the message `domain:code`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{domain}:{code}")]
pub struct ForeignError {
    pub domain: String,
    pub code: i64,
}

impl ForeignError {
    pub fn new(domain: impl Into<String>, code: i64) -> Self {
        Self {
            domain: domain.into(),
            code,
        }
    }

    /// Error of the native type `E`, its unqualified type name as the
    /// domain (a qualified path would not survive the `:` split)
    pub fn of<E: ?Sized>(code: i64) -> Self {
        let name = std::any::type_name::<E>();
        let name = name.rsplit("::").next().unwrap_or(name);
        Self::new(name, code)
    }

    /// Inverse of the `domain:code` message, tolerant of anything else
    ///
    /// A missing or empty message gives `JavaException:0`. Without a colon
    /// the whole message is the domain. A code that does not parse as is,
    /// surrounding whitespace included, is 0.
    pub fn parse(message: Option<&str>) -> Self {
        let Some(message) = message.filter(|m| !m.is_empty()) else {
            return Self::new(JAVA_EXCEPTION_DOMAIN, 0);
        };
        let mut parts = message.split(':').filter(|part| !part.is_empty());
        match (parts.next(), parts.next()) {
            (Some(domain), Some(code)) => Self::new(domain, code.parse().unwrap_or(0)),
            (Some(domain), None) => Self::new(domain, 0),
            (None, _) => Self::new(JAVA_EXCEPTION_DOMAIN, 0),
        }
    }
}

impl ToForeign for ForeignError {
    fn to_foreign(&self, env: &JniEnv<'_>) -> BridgeResult<ObjectRef> {
        let message = self.to_string();
        construct::<Self>(env, known::EXCEPTION, "(Ljava/lang/String;)V", &[Arg::Str(&message)])
    }
}

impl FromForeign for ForeignError {
    fn from_foreign(env: &JniEnv<'_>, obj: ObjectRef) -> BridgeResult<Self> {
        let message = access::<Self, Option<ObjectRef>>(
            env,
            obj,
            known::THROWABLE,
            "getMessage",
            "()Ljava/lang/String;",
        )?
        .map(|message| env.auto_local(message));
        let message = match message {
            Some(message) => Some(String::from_foreign(env, message.as_obj())?),
            None => None,
        };
        Ok(Self::parse(message.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ForeignError::new("Net", 7).to_string(), "Net:7");
    }

    #[test]
    fn test_parse() {
        assert_eq!(ForeignError::parse(Some("Net:7")), ForeignError::new("Net", 7));
        assert_eq!(ForeignError::parse(Some("Net:-3")), ForeignError::new("Net", -3));
        // Codes are taken verbatim, padding included
        assert_eq!(ForeignError::parse(Some("Net: 3")), ForeignError::new("Net", 0));
        assert_eq!(ForeignError::parse(Some("boom")), ForeignError::new("boom", 0));
        assert_eq!(ForeignError::parse(Some("Net:abc")), ForeignError::new("Net", 0));
        assert_eq!(ForeignError::parse(Some("::")), ForeignError::new("JavaException", 0));
        assert_eq!(ForeignError::parse(Some("")), ForeignError::new("JavaException", 0));
        assert_eq!(ForeignError::parse(None), ForeignError::new("JavaException", 0));
    }

    #[test]
    fn test_of_uses_type_name() {
        struct Timeout;
        let err = ForeignError::of::<Timeout>(2);
        assert_eq!(err.domain, "Timeout");
        assert_eq!(ForeignError::parse(Some(&err.to_string())), err);
        assert_eq!(err.code, 2);
    }
}
