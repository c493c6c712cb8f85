//! Error types for bridge operations
//!
//! Native failures (attachment, resolution, conversion) are `Result`
//! values. VM exceptions are never turned into errors on their own; they sit
//! in the [`ExceptionBridge`](crate::ExceptionBridge) until the caller asks
//! for them, and only [`JniEnv::rethrow`](crate::JniEnv::rethrow) produces
//! [`BridgeError::PendingException`].

use javelin_sys::{DescriptorError, jint};
use std::panic::Location;
use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The VM refused to attach the calling thread
    #[error("Attaching thread failed with JNI status {code} (requested at {location})")]
    AttachmentFailure {
        code: jint,
        location: &'static Location<'static>,
    },

    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// Method or field not found, keyed `class.namesignature`
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Invalid descriptor for {key}: {source}")]
    InvalidDescriptor {
        key: String,
        #[source]
        source: DescriptorError,
    },

    #[error("Cannot convert {type_name}: {reason}")]
    Conversion { type_name: String, reason: String },

    #[error("Can't create object of class {0}")]
    CantCreateObject(String),

    /// A VM exception explicitly rethrown as a native error
    #[error("{class}{}", format_message(message))]
    PendingException {
        class: String,
        message: Option<String>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("A bridge is already installed for this process")]
    AlreadyInstalled,
}

fn format_message(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(": {m}"),
        None => String::new(),
    }
}

impl BridgeError {
    pub fn conversion(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conversion {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Conversion failure for the native type `T`
    pub fn conversion_of<T: ?Sized>(reason: impl Into<String>) -> Self {
        Self::conversion(std::any::type_name::<T>(), reason)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this is a failed class or member lookup
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::ClassNotFound(_) | Self::MemberNotFound(_) | Self::InvalidDescriptor { .. }
        )
    }

    /// Short variant name, used as the prefix when raising into the VM
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AttachmentFailure { .. } => "AttachmentFailure",
            Self::ClassNotFound(_) => "ClassNotFound",
            Self::MemberNotFound(_) => "MemberNotFound",
            Self::InvalidDescriptor { .. } => "InvalidDescriptor",
            Self::Conversion { .. } => "Conversion",
            Self::CantCreateObject(_) => "CantCreateObject",
            Self::PendingException { .. } => "PendingException",
            Self::Json(_) => "Json",
            Self::Config(_) => "Config",
            Self::AlreadyInstalled => "AlreadyInstalled",
        }
    }

    /// The payload of the error without its prefix
    pub fn detail(&self) -> String {
        match self {
            Self::AttachmentFailure { code, location } => format!("status {code} at {location}"),
            Self::ClassNotFound(name) => name.clone(),
            Self::MemberNotFound(key) => key.clone(),
            Self::InvalidDescriptor { key, source } => format!("{key}: {source}"),
            Self::Conversion { type_name, reason } => format!("{type_name}: {reason}"),
            Self::CantCreateObject(class) => class.clone(),
            Self::PendingException { .. } => self.to_string(),
            Self::Json(e) => e.to_string(),
            Self::Config(message) => message.clone(),
            Self::AlreadyInstalled => "bridge".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_display() {
        let err = BridgeError::conversion("u8", "300 is out of range");
        assert_eq!(err.to_string(), "Cannot convert u8: 300 is out of range");
        assert_eq!(err.error_kind(), "Conversion");
        assert_eq!(err.detail(), "u8: 300 is out of range");
    }

    #[test]
    fn test_conversion_of_uses_type_name() {
        let err = BridgeError::conversion_of::<u64>("bad digits");
        assert!(matches!(err, BridgeError::Conversion { ref type_name, .. } if type_name == "u64"));
    }

    #[test]
    fn test_pending_exception_display() {
        let err = BridgeError::PendingException {
            class: "java/lang/IllegalStateException".into(),
            message: Some("closed".into()),
        };
        assert_eq!(err.to_string(), "java/lang/IllegalStateException: closed");

        let err = BridgeError::PendingException {
            class: "java/lang/Error".into(),
            message: None,
        };
        assert_eq!(err.to_string(), "java/lang/Error");
    }

    #[test]
    fn test_resolution_failures() {
        assert!(BridgeError::ClassNotFound("a/B".into()).is_resolution_failure());
        assert!(BridgeError::MemberNotFound("a/B.c()V".into()).is_resolution_failure());
        assert!(!BridgeError::AlreadyInstalled.is_resolution_failure());
    }

    #[test]
    fn test_attachment_failure_names_location() {
        let err = BridgeError::AttachmentFailure {
            code: -1,
            location: Location::caller(),
        };
        assert!(err.to_string().contains("error.rs"));
        assert_eq!(err.error_kind(), "AttachmentFailure");
    }
}
