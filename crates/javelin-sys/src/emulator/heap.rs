//! Object model of the emulated VM
//!
//! Classes, methods, fields and objects live here. Object payloads carry
//! the state the bootstrap classes need (boxed primitives, strings, byte
//! arrays, throwables); user-defined classes get instance fields.

use crate::descriptor::{MethodDescriptor, parse_field_descriptor};
use crate::value::{JValue, JavaType};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Identity of a heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(usize);

impl ObjId {
    pub fn raw(self) -> usize {
        self.0
    }
}

/// Identity of a defined class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(usize);

/// A throwable raised by a native method body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thrown(pub ObjId);

/// Implementation of an emulated method
pub type Native = Arc<dyn Fn(&mut Ctx<'_>) -> Result<Value, Thrown> + Send + Sync>;

/// Built-in state of an object
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Plain,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(Vec<u16>),
    ByteArray(Vec<u8>),
    /// Normalized decimal digits
    BigInteger(String),
    /// Milliseconds since the epoch
    Date(i64),
    Uri(String),
    /// A buffer wrapping a byte array object
    Buffer(ObjId),
    Throwable { message: Option<String> },
    Class(ClassId),
    ClassLoader,
    Thread,
}

/// A value as seen by method bodies: objects are heap identities, not
/// references
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Object(Option<ObjId>),
    Void,
}

impl Value {
    pub fn java_type(&self) -> JavaType {
        match self {
            Value::Boolean(_) => JavaType::Boolean,
            Value::Byte(_) => JavaType::Byte,
            Value::Char(_) => JavaType::Char,
            Value::Short(_) => JavaType::Short,
            Value::Int(_) => JavaType::Int,
            Value::Long(_) => JavaType::Long,
            Value::Float(_) => JavaType::Float,
            Value::Double(_) => JavaType::Double,
            Value::Object(_) => JavaType::Object,
            Value::Void => JavaType::Void,
        }
    }

    pub(crate) fn default_for(ty: JavaType) -> Value {
        match ty.default_value() {
            JValue::Boolean(v) => Value::Boolean(v),
            JValue::Byte(v) => Value::Byte(v),
            JValue::Char(v) => Value::Char(v),
            JValue::Short(v) => Value::Short(v),
            JValue::Int(v) => Value::Int(v),
            JValue::Long(v) => Value::Long(v),
            JValue::Float(v) => Value::Float(v),
            JValue::Double(v) => Value::Double(v),
            JValue::Object(_) => Value::Object(None),
            JValue::Void => Value::Void,
        }
    }
}

pub(crate) struct Object {
    pub(crate) class: ClassId,
    pub(crate) payload: Payload,
    pub(crate) fields: HashMap<usize, Value>,
}

pub(crate) struct Class {
    pub(crate) name: String,
    pub(crate) superclass: Option<ClassId>,
    pub(crate) object: ObjId,
    methods: HashMap<(String, String), usize>,
    statics: HashMap<(String, String), usize>,
    fields: HashMap<(String, String), usize>,
}

pub(crate) struct Method {
    pub(crate) class: ClassId,
    pub(crate) name: String,
    pub(crate) sig: String,
    pub(crate) desc: MethodDescriptor,
    pub(crate) is_static: bool,
    pub(crate) body: Native,
}

pub(crate) struct Field {
    pub(crate) class: ClassId,
    pub(crate) ty: JavaType,
}

/// All VM-wide state except references and environments
pub struct Heap {
    objects: HashMap<ObjId, Object>,
    next_obj: usize,
    classes: Vec<Class>,
    class_names: HashMap<String, ClassId>,
    pub(crate) methods: HashMap<usize, Method>,
    pub(crate) fields: HashMap<usize, Field>,
    next_addr: usize,
    roots: Vec<ObjId>,
}

impl Heap {
    pub(crate) fn new() -> Self {
        Self {
            objects: HashMap::new(),
            next_obj: 1,
            classes: Vec::new(),
            class_names: HashMap::new(),
            methods: HashMap::new(),
            fields: HashMap::new(),
            next_addr: 1,
            roots: Vec::new(),
        }
    }

    /// Fresh handle address, shared by environments, references and IDs
    pub(crate) fn next_addr(&mut self) -> usize {
        let addr = self.next_addr << 4;
        self.next_addr += 1;
        addr
    }

    // Classes

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_names.get(name).copied()
    }

    pub fn class_name(&self, class: ClassId) -> &str {
        &self.classes[class.0].name
    }

    /// Class object of a class, always alive
    pub fn class_object(&self, class: ClassId) -> ObjId {
        self.classes[class.0].object
    }

    pub fn is_subclass(&self, class: ClassId, ancestor: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.classes[c.0].superclass;
        }
        false
    }

    /// Define a class
    ///
    /// Class objects created before `java/lang/Class` exists are
    /// retargeted to it once it is defined.
    ///
    /// # Panics
    /// If the name is taken or the superclass is unknown.
    pub(crate) fn define_class(&mut self, name: &str, superclass: Option<&str>) -> ClassId {
        assert!(
            !self.class_names.contains_key(name),
            "class {name} is already defined"
        );
        let superclass = superclass.map(|s| {
            self.class_by_name(s)
                .unwrap_or_else(|| panic!("superclass {s} of {name} is not defined"))
        });
        let id = ClassId(self.classes.len());
        let meta = self.class_by_name("java/lang/Class").unwrap_or(id);
        let object = self.alloc_raw(meta, Payload::Class(id));
        self.roots.push(object);
        self.classes.push(Class {
            name: name.to_string(),
            superclass,
            object,
            methods: HashMap::new(),
            statics: HashMap::new(),
            fields: HashMap::new(),
        });
        self.class_names.insert(name.to_string(), id);
        if name == "java/lang/Class" {
            let earlier: Vec<ObjId> = self.classes.iter().map(|c| c.object).collect();
            for object in earlier {
                self.object_mut(object).class = id;
            }
        }
        id
    }

    /// # Panics
    /// If the signature is not a valid method descriptor.
    pub(crate) fn define_method(
        &mut self,
        class: ClassId,
        name: &str,
        sig: &str,
        is_static: bool,
        body: Native,
    ) -> usize {
        let desc = MethodDescriptor::parse(sig)
            .unwrap_or_else(|e| panic!("bad descriptor for {name}: {e}"));
        let addr = self.next_addr();
        self.methods.insert(
            addr,
            Method {
                class,
                name: name.to_string(),
                sig: sig.to_string(),
                desc,
                is_static,
                body,
            },
        );
        let key = (name.to_string(), sig.to_string());
        let table = &mut self.classes[class.0];
        if is_static {
            table.statics.insert(key, addr);
        } else {
            table.methods.insert(key, addr);
        }
        addr
    }

    /// # Panics
    /// If the signature is not a valid field descriptor.
    pub(crate) fn define_field(&mut self, class: ClassId, name: &str, sig: &str) -> usize {
        let ty = parse_field_descriptor(sig)
            .unwrap_or_else(|e| panic!("bad descriptor for field {name}: {e}"));
        let addr = self.next_addr();
        self.fields.insert(addr, Field { class, ty });
        self.classes[class.0]
            .fields
            .insert((name.to_string(), sig.to_string()), addr);
        addr
    }

    /// Instance method lookup; constructors are never inherited
    pub(crate) fn find_method(&self, class: ClassId, name: &str, sig: &str) -> Option<usize> {
        let key = (name.to_string(), sig.to_string());
        let mut current = Some(class);
        while let Some(c) = current {
            if let Some(addr) = self.classes[c.0].methods.get(&key) {
                return Some(*addr);
            }
            if name == "<init>" {
                return None;
            }
            current = self.classes[c.0].superclass;
        }
        None
    }

    pub(crate) fn find_static(&self, class: ClassId, name: &str, sig: &str) -> Option<usize> {
        let key = (name.to_string(), sig.to_string());
        let mut current = Some(class);
        while let Some(c) = current {
            if let Some(addr) = self.classes[c.0].statics.get(&key) {
                return Some(*addr);
            }
            current = self.classes[c.0].superclass;
        }
        None
    }

    pub(crate) fn find_field(&self, class: ClassId, name: &str, sig: &str) -> Option<usize> {
        let key = (name.to_string(), sig.to_string());
        let mut current = Some(class);
        while let Some(c) = current {
            if let Some(addr) = self.classes[c.0].fields.get(&key) {
                return Some(*addr);
            }
            current = self.classes[c.0].superclass;
        }
        None
    }

    // Objects

    fn alloc_raw(&mut self, class: ClassId, payload: Payload) -> ObjId {
        let id = ObjId(self.next_obj);
        self.next_obj += 1;
        self.objects.insert(
            id,
            Object {
                class,
                payload,
                fields: HashMap::new(),
            },
        );
        id
    }

    /// Allocate an instance of a class
    pub fn alloc(&mut self, class: ClassId, payload: Payload) -> ObjId {
        self.alloc_raw(class, payload)
    }

    /// Allocate an instance of a bootstrap class by name
    ///
    /// # Panics
    /// If the class is not defined.
    pub fn alloc_named(&mut self, class: &str, payload: Payload) -> ObjId {
        let class = self
            .class_by_name(class)
            .unwrap_or_else(|| panic!("class {class} is not defined"));
        self.alloc_raw(class, payload)
    }

    /// Keep an object alive for the lifetime of the VM
    pub(crate) fn pin(&mut self, obj: ObjId) {
        self.roots.push(obj);
    }

    pub(crate) fn object(&self, obj: ObjId) -> &Object {
        match self.objects.get(&obj) {
            Some(o) => o,
            None => panic!("JNI ERROR: use of collected object {obj:?}"),
        }
    }

    pub(crate) fn object_mut(&mut self, obj: ObjId) -> &mut Object {
        match self.objects.get_mut(&obj) {
            Some(o) => o,
            None => panic!("JNI ERROR: use of collected object {obj:?}"),
        }
    }

    pub fn class_of(&self, obj: ObjId) -> ClassId {
        self.object(obj).class
    }

    pub fn payload(&self, obj: ObjId) -> &Payload {
        &self.object(obj).payload
    }

    pub fn set_payload(&mut self, obj: ObjId, payload: Payload) {
        self.object_mut(obj).payload = payload;
    }

    pub fn new_string(&mut self, s: &str) -> ObjId {
        self.alloc_named("java/lang/String", Payload::Str(s.encode_utf16().collect()))
    }

    /// Contents of a `java/lang/String`, `None` for anything else
    pub fn string(&self, obj: ObjId) -> Option<String> {
        match self.payload(obj) {
            Payload::Str(units) => Some(String::from_utf16_lossy(units)),
            _ => None,
        }
    }

    /// Instantiate a throwable with a message
    pub fn throwable(&mut self, class: &str, message: Option<&str>) -> Thrown {
        Thrown(self.alloc_named(
            class,
            Payload::Throwable {
                message: message.map(str::to_string),
            },
        ))
    }

    pub(crate) fn live_objects(&self) -> usize {
        self.objects.len()
    }

    /// Mark from the given roots plus class objects and pinned objects,
    /// then drop everything unreachable
    pub(crate) fn collect(&mut self, roots: impl IntoIterator<Item = ObjId>) {
        let mut marked: HashSet<ObjId> = HashSet::new();
        let mut stack: Vec<ObjId> = roots.into_iter().chain(self.roots.iter().copied()).collect();
        while let Some(id) = stack.pop() {
            if !marked.insert(id) {
                continue;
            }
            let Some(obj) = self.objects.get(&id) else {
                continue;
            };
            if let Payload::Buffer(inner) = obj.payload {
                stack.push(inner);
            }
            for value in obj.fields.values() {
                if let Value::Object(Some(child)) = value {
                    stack.push(*child);
                }
            }
        }
        self.objects.retain(|id, _| marked.contains(id));
    }
}

/// What a method body sees while it runs
pub struct Ctx<'a> {
    heap: &'a mut Heap,
    this: Option<ObjId>,
    args: &'a [Value],
}

impl<'a> Ctx<'a> {
    pub(crate) fn new(heap: &'a mut Heap, this: Option<ObjId>, args: &'a [Value]) -> Self {
        Self { heap, this, args }
    }

    /// Receiver, `None` for static methods
    pub fn this(&self) -> Option<ObjId> {
        self.this
    }

    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).copied().unwrap_or(Value::Void)
    }

    pub fn object_arg(&self, index: usize) -> Option<ObjId> {
        match self.arg(index) {
            Value::Object(obj) => obj,
            _ => None,
        }
    }

    pub fn string_arg(&self, index: usize) -> Option<String> {
        self.object_arg(index).and_then(|obj| self.heap.string(obj))
    }

    pub fn heap(&mut self) -> &mut Heap {
        &mut *self.heap
    }

    pub fn throw(&mut self, class: &str, message: impl AsRef<str>) -> Thrown {
        self.heap.throwable(class, Some(message.as_ref()))
    }

    /// Payload of the receiver
    pub fn payload(&self) -> Payload {
        self.this
            .map(|obj| self.heap.payload(obj).clone())
            .unwrap_or(Payload::Plain)
    }

    pub fn set_payload(&mut self, payload: Payload) {
        if let Some(obj) = self.this {
            self.heap.set_payload(obj, payload);
        }
    }

    /// Store an instance field of the receiver by name and signature
    pub fn set_field(&mut self, name: &str, sig: &str, value: Value) {
        let Some(obj) = self.this else { return };
        let class = self.heap.class_of(obj);
        if let Some(addr) = self.heap.find_field(class, name, sig) {
            self.heap.object_mut(obj).fields.insert(addr, value);
        }
    }

    pub fn new_string(&mut self, s: &str) -> Value {
        Value::Object(Some(self.heap.new_string(s)))
    }
}
