//! Field and method descriptor parsing
//!
//! Only the shape of a descriptor matters to the runtime: which kinds the
//! arguments are, and which `Call<Kind>MethodA` variant the return type
//! selects. Class names inside `L...;` are checked for being non-empty and
//! are otherwise passed through.

use crate::value::JavaType;
use thiserror::Error;

/// A malformed descriptor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("descriptor is empty")]
    Empty,

    #[error("method descriptor must be of the form (args)ret: {0}")]
    MissingParen(String),

    #[error("unexpected character '{ch}' at offset {offset} in {descriptor}")]
    UnexpectedChar {
        descriptor: String,
        ch: char,
        offset: usize,
    },

    #[error("unterminated class name in {0}")]
    UnterminatedClass(String),

    #[error("trailing characters after type in {0}")]
    Trailing(String),

    #[error("void is only valid as a method return type: {0}")]
    MisplacedVoid(String),

    #[error("constructor descriptor must return void: {0}")]
    ConstructorReturn(String),
}

/// Parsed `(args)ret` method descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub args: Vec<JavaType>,
    pub ret: JavaType,
}

impl MethodDescriptor {
    /// Parse a method descriptor such as `(ILjava/lang/String;)V`
    pub fn parse(descriptor: &str) -> Result<Self, DescriptorError> {
        if descriptor.is_empty() {
            return Err(DescriptorError::Empty);
        }
        let bytes = descriptor.as_bytes();
        if bytes[0] != b'(' {
            return Err(DescriptorError::MissingParen(descriptor.to_string()));
        }

        let mut pos = 1;
        let mut args = Vec::new();
        loop {
            match bytes.get(pos) {
                Some(b')') => {
                    pos += 1;
                    break;
                }
                Some(_) => {
                    let (ty, next) = parse_type(descriptor, pos)?;
                    if ty == JavaType::Void {
                        return Err(DescriptorError::MisplacedVoid(descriptor.to_string()));
                    }
                    args.push(ty);
                    pos = next;
                }
                None => return Err(DescriptorError::MissingParen(descriptor.to_string())),
            }
        }

        if pos >= bytes.len() {
            return Err(DescriptorError::Empty);
        }
        let (ret, end) = parse_type(descriptor, pos)?;
        if end != bytes.len() {
            return Err(DescriptorError::Trailing(descriptor.to_string()));
        }
        Ok(Self { args, ret })
    }
}

/// Parse a single field descriptor such as `I` or `[Ljava/lang/String;`
pub fn parse_field_descriptor(descriptor: &str) -> Result<JavaType, DescriptorError> {
    if descriptor.is_empty() {
        return Err(DescriptorError::Empty);
    }
    let (ty, end) = parse_type(descriptor, 0)?;
    if ty == JavaType::Void {
        return Err(DescriptorError::MisplacedVoid(descriptor.to_string()));
    }
    if end != descriptor.len() {
        return Err(DescriptorError::Trailing(descriptor.to_string()));
    }
    Ok(ty)
}

/// Parse one type starting at `pos`, returning it and the offset after it
fn parse_type(descriptor: &str, pos: usize) -> Result<(JavaType, usize), DescriptorError> {
    let bytes = descriptor.as_bytes();
    let unexpected = |offset: usize| DescriptorError::UnexpectedChar {
        descriptor: descriptor.to_string(),
        ch: descriptor[offset..].chars().next().unwrap_or('\0'),
        offset,
    };

    let ty = match bytes.get(pos) {
        Some(b'Z') => JavaType::Boolean,
        Some(b'B') => JavaType::Byte,
        Some(b'C') => JavaType::Char,
        Some(b'S') => JavaType::Short,
        Some(b'I') => JavaType::Int,
        Some(b'J') => JavaType::Long,
        Some(b'F') => JavaType::Float,
        Some(b'D') => JavaType::Double,
        Some(b'V') => JavaType::Void,
        Some(b'L') => {
            let rest = &descriptor[pos + 1..];
            return match rest.find(';') {
                Some(0) => Err(unexpected(pos + 1)),
                Some(len) => Ok((JavaType::Object, pos + 1 + len + 1)),
                None => Err(DescriptorError::UnterminatedClass(descriptor.to_string())),
            };
        }
        Some(b'[') => {
            let mut elem = pos + 1;
            while bytes.get(elem) == Some(&b'[') {
                elem += 1;
            }
            let (inner, next) = parse_type(descriptor, elem)?;
            if inner == JavaType::Void {
                return Err(DescriptorError::MisplacedVoid(descriptor.to_string()));
            }
            return Ok((JavaType::Object, next));
        }
        Some(_) => return Err(unexpected(pos)),
        None => return Err(DescriptorError::Empty),
    };
    Ok((ty, pos + 1))
}
