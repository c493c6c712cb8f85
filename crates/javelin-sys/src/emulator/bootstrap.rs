//! The slice of the JDK every emulated VM starts with

use super::heap::{Ctx, Heap, Native, ObjId, Payload, Thrown, Value};
use std::sync::Arc;

fn native<F>(f: F) -> Native
where
    F: Fn(&mut Ctx<'_>) -> Result<Value, Thrown> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn method<F>(heap: &mut Heap, class: &str, name: &str, sig: &str, f: F)
where
    F: Fn(&mut Ctx<'_>) -> Result<Value, Thrown> + Send + Sync + 'static,
{
    let class = heap
        .class_by_name(class)
        .unwrap_or_else(|| panic!("bootstrap class {class} missing"));
    heap.define_method(class, name, sig, false, native(f));
}

fn static_method<F>(heap: &mut Heap, class: &str, name: &str, sig: &str, f: F)
where
    F: Fn(&mut Ctx<'_>) -> Result<Value, Thrown> + Send + Sync + 'static,
{
    let class = heap
        .class_by_name(class)
        .unwrap_or_else(|| panic!("bootstrap class {class} missing"));
    heap.define_method(class, name, sig, true, native(f));
}

const THROWABLES: &[(&str, &str)] = &[
    ("java/lang/Throwable", "java/lang/Object"),
    ("java/lang/Exception", "java/lang/Throwable"),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    ("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
    ("java/lang/NumberFormatException", "java/lang/IllegalArgumentException"),
    ("java/lang/IllegalStateException", "java/lang/RuntimeException"),
    ("java/lang/NullPointerException", "java/lang/RuntimeException"),
    ("java/lang/ClassCastException", "java/lang/RuntimeException"),
    ("java/lang/ClassNotFoundException", "java/lang/Exception"),
    ("java/lang/Error", "java/lang/Throwable"),
    ("java/lang/VirtualMachineError", "java/lang/Error"),
    ("java/lang/OutOfMemoryError", "java/lang/VirtualMachineError"),
    ("java/lang/LinkageError", "java/lang/Error"),
    ("java/lang/NoClassDefFoundError", "java/lang/LinkageError"),
    ("java/lang/IncompatibleClassChangeError", "java/lang/LinkageError"),
    ("java/lang/NoSuchMethodError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/NoSuchFieldError", "java/lang/IncompatibleClassChangeError"),
];

pub(crate) fn install(heap: &mut Heap) {
    heap.define_class("java/lang/Object", None);
    heap.define_class("java/lang/Class", Some("java/lang/Object"));
    heap.define_class("java/lang/String", Some("java/lang/Object"));
    heap.define_class("[B", Some("java/lang/Object"));

    method(heap, "java/lang/Object", "<init>", "()V", |_| Ok(Value::Void));
    method(heap, "java/lang/Object", "toString", "()Ljava/lang/String;", |ctx| {
        let Some(this) = ctx.this() else {
            return Ok(Value::Object(None));
        };
        if matches!(ctx.heap().payload(this), Payload::Str(_)) {
            return Ok(Value::Object(Some(this)));
        }
        let text = display(ctx.heap(), this);
        Ok(ctx.new_string(&text))
    });
    method(heap, "java/lang/Class", "getName", "()Ljava/lang/String;", |ctx| {
        let Payload::Class(class) = ctx.payload() else {
            return Ok(Value::Object(None));
        };
        let name = ctx.heap().class_name(class).replace('/', ".");
        Ok(ctx.new_string(&name))
    });

    install_throwables(heap);
    install_numbers(heap);
    install_library(heap);
    install_threads(heap);
}

fn install_throwables(heap: &mut Heap) {
    for &(name, superclass) in THROWABLES {
        heap.define_class(name, Some(superclass));
        method(heap, name, "<init>", "()V", |ctx| {
            ctx.set_payload(Payload::Throwable { message: None });
            Ok(Value::Void)
        });
        method(heap, name, "<init>", "(Ljava/lang/String;)V", |ctx| {
            let message = ctx.string_arg(0);
            ctx.set_payload(Payload::Throwable { message });
            Ok(Value::Void)
        });
    }
    method(
        heap,
        "java/lang/Throwable",
        "getMessage",
        "()Ljava/lang/String;",
        |ctx| match ctx.payload() {
            Payload::Throwable {
                message: Some(message),
            } => Ok(ctx.new_string(&message)),
            _ => Ok(Value::Object(None)),
        },
    );
}

/// Integral view of a numeric payload, two's complement low bits for
/// BigInteger like `BigInteger.longValue()`
enum Num {
    Int(i64),
    Float(f64),
}

fn number(payload: &Payload) -> Option<Num> {
    Some(match payload {
        Payload::Byte(v) => Num::Int(i64::from(*v)),
        Payload::Short(v) => Num::Int(i64::from(*v)),
        Payload::Int(v) => Num::Int(i64::from(*v)),
        Payload::Long(v) => Num::Int(*v),
        Payload::Float(v) => Num::Float(f64::from(*v)),
        Payload::Double(v) => Num::Float(*v),
        Payload::BigInteger(digits) => {
            let (negative, digits) = match digits.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, digits.as_str()),
            };
            let low = digits.bytes().fold(0u64, |acc, d| {
                acc.wrapping_mul(10).wrapping_add(u64::from(d - b'0'))
            });
            let low = if negative { low.wrapping_neg() } else { low };
            Num::Int(low as i64)
        }
        _ => return None,
    })
}

fn big_float(payload: &Payload) -> Option<f64> {
    match payload {
        Payload::BigInteger(digits) => digits.parse().ok(),
        _ => None,
    }
}

fn install_numbers(heap: &mut Heap) {
    heap.define_class("java/lang/Number", Some("java/lang/Object"));
    for class in [
        "java/lang/Byte",
        "java/lang/Short",
        "java/lang/Integer",
        "java/lang/Long",
        "java/lang/Float",
        "java/lang/Double",
        "java/math/BigInteger",
    ] {
        heap.define_class(class, Some("java/lang/Number"));
    }
    heap.define_class("java/lang/Boolean", Some("java/lang/Object"));

    let number_of = |ctx: &mut Ctx<'_>| match number(&ctx.payload()) {
        Some(n) => Ok(n),
        None => Err(ctx.throw("java/lang/ClassCastException", "not a number")),
    };
    method(heap, "java/lang/Number", "byteValue", "()B", move |ctx| {
        Ok(Value::Byte(match number_of(ctx)? {
            Num::Int(v) => v as i8,
            Num::Float(f) => (f as i32) as i8,
        }))
    });
    method(heap, "java/lang/Number", "shortValue", "()S", move |ctx| {
        Ok(Value::Short(match number_of(ctx)? {
            Num::Int(v) => v as i16,
            Num::Float(f) => (f as i32) as i16,
        }))
    });
    method(heap, "java/lang/Number", "intValue", "()I", move |ctx| {
        Ok(Value::Int(match number_of(ctx)? {
            Num::Int(v) => v as i32,
            Num::Float(f) => f as i32,
        }))
    });
    method(heap, "java/lang/Number", "longValue", "()J", move |ctx| {
        Ok(Value::Long(match number_of(ctx)? {
            Num::Int(v) => v,
            Num::Float(f) => f as i64,
        }))
    });
    method(heap, "java/lang/Number", "floatValue", "()F", move |ctx| {
        if let Some(f) = big_float(&ctx.payload()) {
            return Ok(Value::Float(f as f32));
        }
        Ok(Value::Float(match number_of(ctx)? {
            Num::Int(v) => v as f32,
            Num::Float(f) => f as f32,
        }))
    });
    method(heap, "java/lang/Number", "doubleValue", "()D", move |ctx| {
        if let Some(f) = big_float(&ctx.payload()) {
            return Ok(Value::Double(f));
        }
        Ok(Value::Double(match number_of(ctx)? {
            Num::Int(v) => v as f64,
            Num::Float(f) => f,
        }))
    });

    let boxes: [(&str, &str, fn(Value) -> Payload); 7] = [
        ("java/lang/Byte", "(B)V", |v| match v {
            Value::Byte(b) => Payload::Byte(b),
            _ => Payload::Plain,
        }),
        ("java/lang/Short", "(S)V", |v| match v {
            Value::Short(s) => Payload::Short(s),
            _ => Payload::Plain,
        }),
        ("java/lang/Integer", "(I)V", |v| match v {
            Value::Int(i) => Payload::Int(i),
            _ => Payload::Plain,
        }),
        ("java/lang/Long", "(J)V", |v| match v {
            Value::Long(j) => Payload::Long(j),
            _ => Payload::Plain,
        }),
        ("java/lang/Float", "(F)V", |v| match v {
            Value::Float(f) => Payload::Float(f),
            _ => Payload::Plain,
        }),
        ("java/lang/Double", "(D)V", |v| match v {
            Value::Double(d) => Payload::Double(d),
            _ => Payload::Plain,
        }),
        ("java/lang/Boolean", "(Z)V", |v| match v {
            Value::Boolean(z) => Payload::Boolean(z),
            _ => Payload::Plain,
        }),
    ];
    for (class, sig, wrap) in boxes {
        method(heap, class, "<init>", sig, move |ctx| {
            let payload = wrap(ctx.arg(0));
            ctx.set_payload(payload);
            Ok(Value::Void)
        });
    }

    method(heap, "java/lang/Boolean", "booleanValue", "()Z", |ctx| {
        Ok(Value::Boolean(matches!(ctx.payload(), Payload::Boolean(true))))
    });
    static_method(
        heap,
        "java/lang/Integer",
        "parseInt",
        "(Ljava/lang/String;)I",
        |ctx| {
            let Some(text) = ctx.string_arg(0) else {
                return Err(ctx.throw("java/lang/NumberFormatException", "Cannot parse null string"));
            };
            match text.parse::<i32>() {
                Ok(v) => Ok(Value::Int(v)),
                Err(_) => Err(ctx.throw(
                    "java/lang/NumberFormatException",
                    format!("For input string: \"{text}\""),
                )),
            }
        },
    );
    method(
        heap,
        "java/math/BigInteger",
        "<init>",
        "(Ljava/lang/String;)V",
        |ctx| {
            let Some(text) = ctx.string_arg(0) else {
                return Err(ctx.throw("java/lang/NullPointerException", "val"));
            };
            match normalize_integer(&text) {
                Some(digits) => {
                    ctx.set_payload(Payload::BigInteger(digits));
                    Ok(Value::Void)
                }
                None if text.is_empty() => Err(ctx.throw(
                    "java/lang/NumberFormatException",
                    "Zero length BigInteger",
                )),
                None => Err(ctx.throw(
                    "java/lang/NumberFormatException",
                    format!("For input string: \"{text}\""),
                )),
            }
        },
    );
}

/// Canonical decimal form of `[+-]?[0-9]+`
fn normalize_integer(text: &str) -> Option<String> {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let trimmed = digits.trim_start_matches('0');
    Some(match (trimmed.is_empty(), negative) {
        (true, _) => "0".to_string(),
        (false, true) => format!("-{trimmed}"),
        (false, false) => trimmed.to_string(),
    })
}

fn install_library(heap: &mut Heap) {
    heap.define_class("java/util/Date", Some("java/lang/Object"));
    method(heap, "java/util/Date", "<init>", "(J)V", |ctx| {
        if let Value::Long(ms) = ctx.arg(0) {
            ctx.set_payload(Payload::Date(ms));
        }
        Ok(Value::Void)
    });
    method(heap, "java/util/Date", "getTime", "()J", |ctx| match ctx.payload() {
        Payload::Date(ms) => Ok(Value::Long(ms)),
        _ => Ok(Value::Long(0)),
    });

    heap.define_class("android/net/Uri", Some("java/lang/Object"));
    static_method(
        heap,
        "android/net/Uri",
        "parse",
        "(Ljava/lang/String;)Landroid/net/Uri;",
        |ctx| {
            let Some(text) = ctx.string_arg(0) else {
                return Err(ctx.throw("java/lang/NullPointerException", "uriString"));
            };
            let uri = ctx.heap().alloc_named("android/net/Uri", Payload::Uri(text));
            Ok(Value::Object(Some(uri)))
        },
    );

    heap.define_class("java/net/URI", Some("java/lang/Object"));
    static_method(
        heap,
        "java/net/URI",
        "create",
        "(Ljava/lang/String;)Ljava/net/URI;",
        |ctx| {
            let Some(text) = ctx.string_arg(0) else {
                return Err(ctx.throw("java/lang/NullPointerException", "str"));
            };
            if let Some(index) = text.find(|c: char| " <>\"{}|\\^`".contains(c)) {
                return Err(ctx.throw(
                    "java/lang/IllegalArgumentException",
                    format!("Illegal character in path at index {index}: {text}"),
                ));
            }
            let uri = ctx.heap().alloc_named("java/net/URI", Payload::Uri(text));
            Ok(Value::Object(Some(uri)))
        },
    );

    heap.define_class("java/nio/ByteBuffer", Some("java/lang/Object"));
    static_method(
        heap,
        "java/nio/ByteBuffer",
        "wrap",
        "([B)Ljava/nio/ByteBuffer;",
        |ctx| {
            let Some(array) = ctx.object_arg(0) else {
                return Err(ctx.throw("java/lang/NullPointerException", "array"));
            };
            if !matches!(ctx.heap().payload(array), Payload::ByteArray(_)) {
                return Err(ctx.throw("java/lang/ClassCastException", "not a byte[]"));
            }
            let buffer = ctx
                .heap()
                .alloc_named("java/nio/ByteBuffer", Payload::Buffer(array));
            Ok(Value::Object(Some(buffer)))
        },
    );
    method(heap, "java/nio/ByteBuffer", "array", "()[B", |ctx| match ctx.payload() {
        Payload::Buffer(array) => Ok(Value::Object(Some(array))),
        _ => Ok(Value::Object(None)),
    });
}

fn install_threads(heap: &mut Heap) {
    heap.define_class("java/lang/ClassLoader", Some("java/lang/Object"));
    heap.define_class("java/lang/Thread", Some("java/lang/Object"));

    let loader = heap.alloc_named("java/lang/ClassLoader", Payload::ClassLoader);
    let thread = heap.alloc_named("java/lang/Thread", Payload::Thread);
    heap.pin(loader);
    heap.pin(thread);

    static_method(
        heap,
        "java/lang/Thread",
        "currentThread",
        "()Ljava/lang/Thread;",
        move |_| Ok(Value::Object(Some(thread))),
    );
    method(
        heap,
        "java/lang/Thread",
        "getContextClassLoader",
        "()Ljava/lang/ClassLoader;",
        move |_| Ok(Value::Object(Some(loader))),
    );
    method(
        heap,
        "java/lang/ClassLoader",
        "loadClass",
        "(Ljava/lang/String;)Ljava/lang/Class;",
        |ctx| {
            let Some(name) = ctx.string_arg(0) else {
                return Err(ctx.throw("java/lang/NullPointerException", "name"));
            };
            // Loaders take binary names with dots
            let found = if name.contains('/') {
                None
            } else {
                ctx.heap().class_by_name(&name.replace('.', "/"))
            };
            match found {
                Some(class) => Ok(Value::Object(Some(ctx.heap().class_object(class)))),
                None => Err(ctx.throw("java/lang/ClassNotFoundException", &name)),
            }
        },
    );
}

/// `toString()` of an object without an override
fn display(heap: &Heap, obj: ObjId) -> String {
    let class = heap.class_of(obj);
    let dotted = heap.class_name(class).replace('/', ".");
    match heap.payload(obj).clone() {
        Payload::Boolean(v) => v.to_string(),
        Payload::Byte(v) => v.to_string(),
        Payload::Short(v) => v.to_string(),
        Payload::Int(v) => v.to_string(),
        Payload::Long(v) => v.to_string(),
        Payload::Float(v) => format!("{v:?}"),
        Payload::Double(v) => format!("{v:?}"),
        Payload::BigInteger(digits) => digits,
        Payload::Date(ms) => format!("Date({ms})"),
        Payload::Uri(uri) => uri,
        Payload::Str(units) => String::from_utf16_lossy(&units),
        Payload::Throwable { message: Some(m) } => format!("{dotted}: {m}"),
        Payload::Throwable { message: None } => dotted,
        Payload::Class(class) => format!("class {}", heap.class_name(class).replace('/', ".")),
        Payload::Plain
        | Payload::ByteArray(_)
        | Payload::Buffer(_)
        | Payload::ClassLoader
        | Payload::Thread => format!("{dotted}@{:x}", obj.raw()),
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_integer;

    #[test]
    fn test_normalize_integer() {
        assert_eq!(normalize_integer("0042").as_deref(), Some("42"));
        assert_eq!(normalize_integer("-0").as_deref(), Some("0"));
        assert_eq!(normalize_integer("+7").as_deref(), Some("7"));
        assert_eq!(
            normalize_integer("18446744073709551615").as_deref(),
            Some("18446744073709551615")
        );
        assert_eq!(normalize_integer(""), None);
        assert_eq!(normalize_integer("-"), None);
        assert_eq!(normalize_integer("12a"), None);
    }
}
