//! Bridge configuration
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration.

use javelin_sys::{JNI_VERSION_1_6, JavaType, MethodDescriptor, jint};
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// How class handles are resolved on a cache miss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassLookup {
    /// `FindClass` with the binary name
    #[default]
    FindClass,
    /// `ClassLoader.loadClass` on the context class loader captured at
    /// bootstrap. Needed on Android, where `FindClass` from a thread the
    /// app attached only sees system classes.
    ContextClassLoader,
}

/// Which VM class and static factory back [`url::Url`] conversions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UriBinding {
    /// Binary class name
    pub class: String,
    /// Static factory taking a `String`
    pub factory: String,
    pub signature: String,
}

impl Default for UriBinding {
    fn default() -> Self {
        Self {
            class: "android/net/Uri".into(),
            factory: "parse".into(),
            signature: "(Ljava/lang/String;)Landroid/net/Uri;".into(),
        }
    }
}

impl UriBinding {
    /// `java.net.URI.create`, for desktop JVMs
    pub fn java_net() -> Self {
        Self {
            class: "java/net/URI".into(),
            factory: "create".into(),
            signature: "(Ljava/lang/String;)Ljava/net/URI;".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Version passed to `GetEnv` and returned from the load hook.
    /// Default: JNI 1.6
    pub jni_version: jint,

    /// Default: [`ClassLookup::FindClass`]
    pub class_lookup: ClassLookup,

    /// Print captured exceptions through `ExceptionDescribe`.
    /// Default: false
    pub describe_exceptions: bool,

    pub uri: UriBinding,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            jni_version: JNI_VERSION_1_6,
            class_lookup: ClassLookup::FindClass,
            describe_exceptions: false,
            uri: UriBinding::default(),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn jni_version(mut self, version: jint) -> Self {
        self.jni_version = version;
        self
    }

    pub fn class_lookup(mut self, lookup: ClassLookup) -> Self {
        self.class_lookup = lookup;
        self
    }

    pub fn describe_exceptions(mut self, enabled: bool) -> Self {
        self.describe_exceptions = enabled;
        self
    }

    pub fn uri(mut self, binding: UriBinding) -> Self {
        self.uri = binding;
        self
    }

    /// Check that the values can work against a VM
    pub fn validate(&self) -> BridgeResult<()> {
        if self.jni_version <= 0 {
            return Err(BridgeError::config(format!(
                "jni_version must be positive, got {:#x}",
                self.jni_version
            )));
        }
        let uri = &self.uri;
        if uri.class.is_empty() || uri.factory.is_empty() {
            return Err(BridgeError::config("uri binding needs a class and a factory"));
        }
        let desc = MethodDescriptor::parse(&uri.signature).map_err(|source| {
            BridgeError::InvalidDescriptor {
                key: format!("{}.{}{}", uri.class, uri.factory, uri.signature),
                source,
            }
        })?;
        if desc.args != [JavaType::Object] || desc.ret != JavaType::Object {
            return Err(BridgeError::config(format!(
                "uri factory must take one String and return an object: {}",
                uri.signature
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.jni_version, JNI_VERSION_1_6);
        assert_eq!(config.class_lookup, ClassLookup::FindClass);
        assert!(!config.describe_exceptions);
        assert_eq!(config.uri.class, "android/net/Uri");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = BridgeConfig::from_json(
            r#"{"class_lookup": "context_class_loader", "describe_exceptions": true}"#,
        )
        .unwrap();
        assert_eq!(config.class_lookup, ClassLookup::ContextClassLoader);
        assert!(config.describe_exceptions);
        assert_eq!(config.uri, UriBinding::default());

        assert_eq!(BridgeConfig::from_json("{}").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        assert!(matches!(
            BridgeConfig::from_json(r#"{"class_lookup": "nope"}"#),
            Err(BridgeError::Json(_))
        ));
        assert!(matches!(
            BridgeConfig::from_json(r#"{"jni_version": 0}"#),
            Err(BridgeError::Config(_))
        ));
        assert!(matches!(
            BridgeConfig::from_json(r#"{"uri": {"signature": "(I)V"}}"#),
            Err(BridgeError::Config(_))
        ));
        assert!(matches!(
            BridgeConfig::from_json(r#"{"uri": {"signature": "(Ljava/lang/String"}}"#),
            Err(BridgeError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::new()
            .uri(UriBinding::java_net())
            .class_lookup(ClassLookup::ContextClassLoader)
            .describe_exceptions(true);
        assert_eq!(config.uri.factory, "create");
        assert!(config.validate().is_ok());
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(BridgeConfig::from_json(&json).unwrap(), config);
    }
}
