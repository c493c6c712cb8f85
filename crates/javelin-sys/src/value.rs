//! Return kinds and owned results of native calls

use crate::handle::ObjectRef;
use jni_sys::{JNI_FALSE, JNI_TRUE, jvalue};
use std::mem;

/// The kind of a JNI value, as named by a descriptor character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JavaType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Any reference type, including arrays
    Object,
    Void,
}

impl JavaType {
    /// Descriptor character for this kind (`L` for every reference type)
    pub fn descriptor_char(self) -> char {
        match self {
            JavaType::Boolean => 'Z',
            JavaType::Byte => 'B',
            JavaType::Char => 'C',
            JavaType::Short => 'S',
            JavaType::Int => 'I',
            JavaType::Long => 'J',
            JavaType::Float => 'F',
            JavaType::Double => 'D',
            JavaType::Object => 'L',
            JavaType::Void => 'V',
        }
    }

    /// The value a call of this kind yields when it could not be made
    pub fn default_value(self) -> JValue {
        match self {
            JavaType::Boolean => JValue::Boolean(false),
            JavaType::Byte => JValue::Byte(0),
            JavaType::Char => JValue::Char(0),
            JavaType::Short => JValue::Short(0),
            JavaType::Int => JValue::Int(0),
            JavaType::Long => JValue::Long(0),
            JavaType::Float => JValue::Float(0.0),
            JavaType::Double => JValue::Double(0.0),
            JavaType::Object => JValue::Object(None),
            JavaType::Void => JValue::Void,
        }
    }
}

/// An owned JNI value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JValue {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Object(Option<ObjectRef>),
    Void,
}

impl JValue {
    /// Kind of this value
    pub fn java_type(&self) -> JavaType {
        match self {
            JValue::Boolean(_) => JavaType::Boolean,
            JValue::Byte(_) => JavaType::Byte,
            JValue::Char(_) => JavaType::Char,
            JValue::Short(_) => JavaType::Short,
            JValue::Int(_) => JavaType::Int,
            JValue::Long(_) => JavaType::Long,
            JValue::Float(_) => JavaType::Float,
            JValue::Double(_) => JavaType::Double,
            JValue::Object(_) => JavaType::Object,
            JValue::Void => JavaType::Void,
        }
    }

    /// Lower into the `jvalue` union used by the `*A` call variants
    ///
    /// The union is zeroed first so the bytes past the active member are
    /// never uninitialized.
    pub fn as_jni(&self) -> jvalue {
        // SAFETY: all-zero bytes are a valid value for every member
        let mut raw: jvalue = unsafe { mem::zeroed() };
        match *self {
            JValue::Boolean(v) => raw.z = if v { JNI_TRUE } else { JNI_FALSE },
            JValue::Byte(v) => raw.b = v,
            JValue::Char(v) => raw.c = v,
            JValue::Short(v) => raw.s = v,
            JValue::Int(v) => raw.i = v,
            JValue::Long(v) => raw.j = v,
            JValue::Float(v) => raw.f = v,
            JValue::Double(v) => raw.d = v,
            JValue::Object(Some(obj)) => raw.l = obj.as_raw(),
            JValue::Object(None) | JValue::Void => {}
        }
        raw
    }

    /// Read a `jvalue` of the given kind back into an owned value
    ///
    /// # Safety
    /// `raw` must have been written through the member matching `ty`.
    pub unsafe fn from_jni(raw: jvalue, ty: JavaType) -> JValue {
        unsafe {
            match ty {
                JavaType::Boolean => JValue::Boolean(raw.z != JNI_FALSE),
                JavaType::Byte => JValue::Byte(raw.b),
                JavaType::Char => JValue::Char(raw.c),
                JavaType::Short => JValue::Short(raw.s),
                JavaType::Int => JValue::Int(raw.i),
                JavaType::Long => JValue::Long(raw.j),
                JavaType::Float => JValue::Float(raw.f),
                JavaType::Double => JValue::Double(raw.d),
                JavaType::Object => JValue::Object(ObjectRef::from_raw(raw.l)),
                JavaType::Void => JValue::Void,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowering_reads_back() {
        let values = [
            JValue::Boolean(true),
            JValue::Byte(-3),
            JValue::Char(0x263a),
            JValue::Short(i16::MIN),
            JValue::Int(-1),
            JValue::Long(i64::MAX),
            JValue::Float(1.5),
            JValue::Double(-0.25),
            JValue::Object(None),
        ];
        for value in values {
            let back = unsafe { JValue::from_jni(value.as_jni(), value.java_type()) };
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_defaults_match_kind() {
        for ty in [JavaType::Int, JavaType::Object, JavaType::Void, JavaType::Char] {
            assert_eq!(ty.default_value().java_type(), ty);
        }
        assert_eq!(JavaType::Long.descriptor_char(), 'J');
    }
}
