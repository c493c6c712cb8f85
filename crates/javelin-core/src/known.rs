//! Well-known VM classes used by the bridge itself

use crate::env::JniEnv;
use crate::error::BridgeResult;

pub const OBJECT: &str = "java/lang/Object";
pub const STRING: &str = "java/lang/String";
pub const NUMBER: &str = "java/lang/Number";
pub const CLASS: &str = "java/lang/Class";
pub const THROWABLE: &str = "java/lang/Throwable";
pub const EXCEPTION: &str = "java/lang/Exception";
pub const THREAD: &str = "java/lang/Thread";
pub const CLASS_LOADER: &str = "java/lang/ClassLoader";
pub const DATE: &str = "java/util/Date";
pub const BYTE_BUFFER: &str = "java/nio/ByteBuffer";
pub const BIG_INTEGER: &str = "java/math/BigInteger";
pub const VM_DEBUG: &str = "dalvik/system/VMDebug";

/// A boxed primitive: its class, constructor and unboxing accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxedType {
    pub class: &'static str,
    pub ctor: &'static str,
    /// Class declaring the accessor
    pub owner: &'static str,
    pub accessor: &'static str,
    pub accessor_sig: &'static str,
}

pub const BYTE: BoxedType = BoxedType {
    class: "java/lang/Byte",
    ctor: "(B)V",
    owner: NUMBER,
    accessor: "byteValue",
    accessor_sig: "()B",
};

pub const SHORT: BoxedType = BoxedType {
    class: "java/lang/Short",
    ctor: "(S)V",
    owner: NUMBER,
    accessor: "shortValue",
    accessor_sig: "()S",
};

pub const INTEGER: BoxedType = BoxedType {
    class: "java/lang/Integer",
    ctor: "(I)V",
    owner: NUMBER,
    accessor: "intValue",
    accessor_sig: "()I",
};

pub const LONG: BoxedType = BoxedType {
    class: "java/lang/Long",
    ctor: "(J)V",
    owner: NUMBER,
    accessor: "longValue",
    accessor_sig: "()J",
};

pub const FLOAT: BoxedType = BoxedType {
    class: "java/lang/Float",
    ctor: "(F)V",
    owner: NUMBER,
    accessor: "floatValue",
    accessor_sig: "()F",
};

pub const DOUBLE: BoxedType = BoxedType {
    class: "java/lang/Double",
    ctor: "(D)V",
    owner: NUMBER,
    accessor: "doubleValue",
    accessor_sig: "()D",
};

pub const BOOLEAN: BoxedType = BoxedType {
    class: "java/lang/Boolean",
    ctor: "(Z)V",
    owner: "java/lang/Boolean",
    accessor: "booleanValue",
    accessor_sig: "()Z",
};

const PRELOADED: &[&str] = &[
    OBJECT, STRING, NUMBER, CLASS, THROWABLE, EXCEPTION, BYTE.class, SHORT.class,
    INTEGER.class, LONG.class, FLOAT.class, DOUBLE.class, BOOLEAN.class,
];

/// Resolve the classes every conversion needs into the handle cache
///
/// Keeps going past failures and reports the first one.
pub fn preload(env: &JniEnv<'_>) -> BridgeResult<()> {
    let mut first_error = None;
    for name in PRELOADED {
        if let Err(e) = env.class(name) {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
