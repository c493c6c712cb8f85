//! An in-process VM for tests and benches
//!
//! [`Emulator`] implements [`NativeInterface`] without a JVM. It carries a
//! small slice of the JDK (boxed numbers, strings, `BigInteger`, `Date`,
//! URIs, `ByteBuffer`, the common throwables, `Thread` and `ClassLoader`)
//! and lets tests define their own classes with native method bodies.
//!
//! Unlike a release JVM it checks the rules JNI leaves to the caller, the
//! way `-Xcheck:jni` does, and aborts (panics) on violation:
//!
//! - an environment used on a thread other than its own
//! - a call that is not exception-safe made while an exception is pending
//! - more live local references than the local capacity allows
//! - invalid, stale or double-deleted references
//! - wrong `Call<Kind>MethodA` variant or argument layout for a method
//!
//! Counters record reflective lookups, attaches and argument layouts so
//! tests can assert on caching and calling behavior.

mod bootstrap;
mod heap;

pub use heap::{ClassId, Ctx, Heap, ObjId, Payload, Thrown, Value};

use crate::handle::{Env, FieldId, MethodId, ObjectRef};
use crate::interface::NativeInterface;
use crate::value::{JValue, JavaType};
use jni_sys::{JNI_EDETACHED, JNI_ERR, JNI_OK, JNIEnv, jint, jvalue};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ptr;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Default local reference capacity, as on Android
pub const DEFAULT_LOCAL_CAPACITY: usize = 512;

/// Objects allocated before the first collection
const GC_THRESHOLD: usize = 4096;

/// Observable activity of the emulated VM
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// `FindClass` calls
    pub class_lookups: usize,
    /// `GetMethodID` and `GetStaticMethodID` calls
    pub method_lookups: usize,
    /// `GetFieldID` calls
    pub field_lookups: usize,
    pub attaches: usize,
    pub detaches: usize,
    /// Calls and constructions made with a null argument layout
    pub null_layouts: usize,
    /// Calls and constructions made with an argument array
    pub array_layouts: usize,
    /// `ExceptionDescribe` calls
    pub describes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefKind {
    Local(usize),
    Global,
}

#[derive(Debug, Clone, Copy)]
struct RefEntry {
    target: ObjId,
    kind: RefKind,
}

struct EnvState {
    thread: ThreadId,
    /// Created by the VM itself rather than by `AttachCurrentThread`
    vm_owned: bool,
    pending: Option<ObjId>,
    locals: usize,
}

struct State {
    heap: Heap,
    refs: HashMap<usize, RefEntry>,
    envs: HashMap<usize, EnvState>,
    threads: HashMap<ThreadId, usize>,
    local_capacity: usize,
    refuse_attach: bool,
    counters: Counters,
    next_gc: usize,
}

/// The emulated VM
pub struct Emulator {
    state: Mutex<State>,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulator {
    pub fn new() -> Self {
        let mut heap = Heap::new();
        bootstrap::install(&mut heap);
        Self {
            state: Mutex::new(State {
                heap,
                refs: HashMap::new(),
                envs: HashMap::new(),
                threads: HashMap::new(),
                local_capacity: DEFAULT_LOCAL_CAPACITY,
                refuse_attach: false,
                counters: Counters::default(),
                next_gc: GC_THRESHOLD,
            }),
        }
    }

    /// Limit live local references per environment
    pub fn with_local_capacity(self, capacity: usize) -> Self {
        self.state.lock().local_capacity = capacity;
        self
    }

    pub fn counters(&self) -> Counters {
        self.state.lock().counters
    }

    pub fn reset_counters(&self) {
        self.state.lock().counters = Counters::default();
    }

    /// Make `AttachCurrentThread` fail with `JNI_ERR`
    pub fn set_refuse_attach(&self, refuse: bool) {
        self.state.lock().refuse_attach = refuse;
    }

    /// Live local references across all environments
    pub fn live_local_refs(&self) -> usize {
        let state = self.state.lock();
        state.envs.values().map(|e| e.locals).sum()
    }

    pub fn live_global_refs(&self) -> usize {
        let state = self.state.lock();
        state
            .refs
            .values()
            .filter(|r| r.kind == RefKind::Global)
            .count()
    }

    pub fn live_objects(&self) -> usize {
        self.state.lock().heap.live_objects()
    }

    /// Whether the calling thread currently has an environment
    pub fn is_attached(&self) -> bool {
        self.state
            .lock()
            .threads
            .contains_key(&thread::current().id())
    }

    /// Give the calling thread an environment the way the VM does for its
    /// own threads; such threads must never be detached by native code
    pub fn adopt_current_thread(&self) -> Env {
        let mut state = self.state.lock();
        let current = thread::current().id();
        if let Some(addr) = state.threads.get(&current) {
            return env_handle(*addr);
        }
        state.new_env(current, true)
    }

    /// Define a class extending `superclass`
    ///
    /// # Panics
    /// If the class exists or the superclass does not.
    pub fn define_class(&self, name: &str, superclass: &str) {
        self.state.lock().heap.define_class(name, Some(superclass));
    }

    /// Define an instance method (or constructor, named `<init>`)
    ///
    /// # Panics
    /// If the class does not exist or `sig` is malformed.
    pub fn define_method<F>(&self, class: &str, name: &str, sig: &str, body: F)
    where
        F: Fn(&mut Ctx<'_>) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        self.define(class, name, sig, false, Arc::new(body));
    }

    /// Define a static method
    ///
    /// # Panics
    /// If the class does not exist or `sig` is malformed.
    pub fn define_static_method<F>(&self, class: &str, name: &str, sig: &str, body: F)
    where
        F: Fn(&mut Ctx<'_>) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        self.define(class, name, sig, true, Arc::new(body));
    }

    fn define(&self, class: &str, name: &str, sig: &str, is_static: bool, body: heap::Native) {
        let mut state = self.state.lock();
        let Some(id) = state.heap.class_by_name(class) else {
            panic!("class {class} is not defined");
        };
        state.heap.define_method(id, name, sig, is_static, body);
    }

    /// Define an instance field
    ///
    /// # Panics
    /// If the class does not exist or `sig` is malformed.
    pub fn define_field(&self, class: &str, name: &str, sig: &str) {
        let mut state = self.state.lock();
        let Some(id) = state.heap.class_by_name(class) else {
            panic!("class {class} is not defined");
        };
        state.heap.define_field(id, name, sig);
    }

    /// Free every local reference of the calling thread, as the VM does
    /// when a native method returns to Java
    ///
    /// # Panics
    /// If the calling thread has no environment.
    pub fn pop_native_frame(&self) {
        let mut state = self.state.lock();
        let Some(addr) = state.threads.get(&thread::current().id()).copied() else {
            panic!("pop_native_frame on a thread without an environment");
        };
        state.refs.retain(|_, r| r.kind != RefKind::Local(addr));
        if let Some(e) = state.envs.get_mut(&addr) {
            e.locals = 0;
        }
    }

    /// Class name of the exception pending on `env`, if any
    pub fn pending_exception_class(&self, env: Env) -> Option<String> {
        let state = self.state.lock();
        let pending = state.envs.get(&env.addr())?.pending?;
        let class = state.heap.class_of(pending);
        Some(state.heap.class_name(class).to_string())
    }

    /// Message of a throwable reference
    pub fn throwable_message(&self, env: Env, throwable: ObjectRef) -> Option<String> {
        let state = self.state.lock();
        let id = state.resolve(env.addr(), throwable, "throwable_message");
        match state.heap.payload(id) {
            Payload::Throwable { message } => message.clone(),
            _ => None,
        }
    }
}

fn env_handle(addr: usize) -> Env {
    // SAFETY: emulator handles are opaque and never dereferenced
    match unsafe { Env::from_raw(ptr::without_provenance_mut::<JNIEnv>(addr)) } {
        Some(env) => env,
        None => unreachable!("environment addresses are never zero"),
    }
}

fn object_handle(addr: usize) -> ObjectRef {
    // SAFETY: emulator handles are opaque and never dereferenced
    match unsafe { ObjectRef::from_raw(ptr::without_provenance_mut(addr)) } {
        Some(obj) => obj,
        None => unreachable!("reference addresses are never zero"),
    }
}

impl State {
    fn new_env(&mut self, thread: ThreadId, vm_owned: bool) -> Env {
        let addr = self.heap.next_addr();
        self.envs.insert(
            addr,
            EnvState {
                thread,
                vm_owned,
                pending: None,
                locals: 0,
            },
        );
        self.threads.insert(thread, addr);
        env_handle(addr)
    }

    /// Validate an environment for a JNI function call
    fn check_env(&self, env: Env, function: &str, exception_safe: bool) -> usize {
        let addr = env.addr();
        let Some(state) = self.envs.get(&addr) else {
            panic!("JNI ERROR: {function} called with unknown or detached JNIEnv {env:?}");
        };
        let current = thread::current().id();
        if state.thread != current {
            panic!(
                "JNI ERROR: {function} called with JNIEnv of thread {:?} on thread {current:?}",
                state.thread
            );
        }
        if !exception_safe && let Some(pending) = state.pending {
            let class = self.heap.class_name(self.heap.class_of(pending));
            panic!("JNI ERROR: {function} called with pending exception {class}");
        }
        addr
    }

    fn resolve(&self, env: usize, obj: ObjectRef, function: &str) -> ObjId {
        match self.refs.get(&obj.addr()) {
            Some(RefEntry {
                target,
                kind: RefKind::Global,
            }) => *target,
            Some(RefEntry {
                target,
                kind: RefKind::Local(owner),
            }) if *owner == env => *target,
            Some(_) => panic!("JNI ERROR: {function} got local reference {obj:?} of another JNIEnv"),
            None => panic!("JNI ERROR: {function} got invalid or deleted reference {obj:?}"),
        }
    }

    fn new_local(&mut self, env: usize, target: ObjId) -> ObjectRef {
        let capacity = self.local_capacity;
        let Some(state) = self.envs.get_mut(&env) else {
            panic!("JNI ERROR: local reference created for unknown JNIEnv");
        };
        if state.locals >= capacity {
            panic!("JNI ERROR: local reference table overflow (max={capacity})");
        }
        state.locals += 1;
        let addr = self.heap.next_addr();
        self.refs.insert(
            addr,
            RefEntry {
                target,
                kind: RefKind::Local(env),
            },
        );
        object_handle(addr)
    }

    fn throw(&mut self, env: usize, class: &str, message: &str) {
        let Thrown(obj) = self.heap.throwable(class, Some(message));
        if let Some(state) = self.envs.get_mut(&env) {
            state.pending = Some(obj);
        }
    }

    fn class_id(&self, env: usize, class: ObjectRef, function: &str) -> ClassId {
        let id = self.resolve(env, class, function);
        match self.heap.payload(id) {
            Payload::Class(class) => *class,
            _ => panic!("JNI ERROR: {function} got a non-class reference {class:?}"),
        }
    }

    /// Collection only runs at the entry of an allocating call, so every
    /// live object is reachable from a reference or a pending exception
    fn safepoint(&mut self) {
        if self.heap.live_objects() < self.next_gc {
            return;
        }
        let roots: Vec<ObjId> = self
            .refs
            .values()
            .map(|r| r.target)
            .chain(self.envs.values().filter_map(|e| e.pending))
            .collect();
        self.heap.collect(roots);
        self.next_gc = (self.heap.live_objects() * 2).max(GC_THRESHOLD);
    }

    fn to_jvalue(&mut self, env: usize, value: Value) -> JValue {
        match value {
            Value::Boolean(v) => JValue::Boolean(v),
            Value::Byte(v) => JValue::Byte(v),
            Value::Char(v) => JValue::Char(v),
            Value::Short(v) => JValue::Short(v),
            Value::Int(v) => JValue::Int(v),
            Value::Long(v) => JValue::Long(v),
            Value::Float(v) => JValue::Float(v),
            Value::Double(v) => JValue::Double(v),
            Value::Object(None) => JValue::Object(None),
            Value::Object(Some(id)) => JValue::Object(Some(self.new_local(env, id))),
            Value::Void => JValue::Void,
        }
    }

    /// Decode an argument layout against a method's parameter kinds
    fn decode_args(
        &mut self,
        env: usize,
        params: &[JavaType],
        args: Option<&[jvalue]>,
        function: &str,
    ) -> Vec<Value> {
        match args {
            None => self.counters.null_layouts += 1,
            Some(_) => self.counters.array_layouts += 1,
        }
        let raw = args.unwrap_or(&[]);
        if raw.len() < params.len() {
            panic!(
                "JNI ERROR: {function} needs {} arguments, layout has {}",
                params.len(),
                raw.len()
            );
        }
        params
            .iter()
            .zip(raw)
            // SAFETY: each slot was written for the declared argument type
            .map(|(ty, raw)| match unsafe { JValue::from_jni(*raw, *ty) } {
                JValue::Boolean(v) => Value::Boolean(v),
                JValue::Byte(v) => Value::Byte(v),
                JValue::Char(v) => Value::Char(v),
                JValue::Short(v) => Value::Short(v),
                JValue::Int(v) => Value::Int(v),
                JValue::Long(v) => Value::Long(v),
                JValue::Float(v) => Value::Float(v),
                JValue::Double(v) => Value::Double(v),
                JValue::Object(None) => Value::Object(None),
                JValue::Object(Some(obj)) => Value::Object(Some(self.resolve(env, obj, function))),
                JValue::Void => Value::Void,
            })
            .collect()
    }

    /// Run a method body and translate its outcome for the caller
    fn invoke(
        &mut self,
        env: usize,
        this: Option<ObjId>,
        addr: usize,
        args: Vec<Value>,
    ) -> Result<Value, ObjId> {
        let Some(body) = self.heap.methods.get(&addr).map(|m| m.body.clone()) else {
            panic!("JNI ERROR: invalid method ID {addr:#x}");
        };
        let mut ctx = Ctx::new(&mut self.heap, this, &args);
        match body(&mut ctx) {
            Ok(value) => Ok(value),
            Err(Thrown(throwable)) => {
                if let Some(state) = self.envs.get_mut(&env) {
                    state.pending = Some(throwable);
                }
                Err(throwable)
            }
        }
    }

    fn call(
        &mut self,
        env: usize,
        target: CallTarget,
        method: MethodId,
        ret: JavaType,
        args: Option<&[jvalue]>,
        function: &str,
    ) -> JValue {
        self.safepoint();
        let Some(entry) = self.heap.methods.get(&method.addr()) else {
            panic!("JNI ERROR: {function} got invalid method ID {method:?}");
        };
        let (declaring, is_static, params, declared_ret) = (
            entry.class,
            entry.is_static,
            entry.desc.args.clone(),
            entry.desc.ret,
        );
        let (name, sig) = (entry.name.clone(), entry.sig.clone());
        if declared_ret != ret {
            panic!(
                "JNI ERROR: {function} used for {name}{sig} returning {:?}",
                declared_ret
            );
        }

        let (this, addr) = match target {
            CallTarget::Static(class) => {
                if !is_static {
                    panic!("JNI ERROR: {function} used for instance method {name}{sig}");
                }
                if !self.heap.is_subclass(class, declaring) {
                    panic!("JNI ERROR: {function}: {name}{sig} is not a member of the class");
                }
                (None, method.addr())
            }
            CallTarget::Instance(obj) => {
                if is_static || name == "<init>" {
                    panic!("JNI ERROR: {function} used for {name}{sig}");
                }
                let class = self.heap.class_of(obj);
                if !self.heap.is_subclass(class, declaring) {
                    panic!(
                        "JNI ERROR: {function}: receiver {} is not a {}",
                        self.heap.class_name(class),
                        self.heap.class_name(declaring)
                    );
                }
                // Virtual dispatch to the most derived override
                let addr = self
                    .heap
                    .find_method(class, &name, &sig)
                    .unwrap_or(method.addr());
                (Some(obj), addr)
            }
        };

        let args = self.decode_args(env, &params, args, function);
        match self.invoke(env, this, addr, args) {
            Ok(value) => {
                if value.java_type() != ret {
                    panic!("emulated {name}{sig} returned {value:?}");
                }
                self.to_jvalue(env, value)
            }
            Err(_) => ret.default_value(),
        }
    }
}

enum CallTarget {
    Instance(ObjId),
    Static(ClassId),
}

impl NativeInterface for Emulator {
    fn get_env(&self) -> Result<Env, jint> {
        let state = self.state.lock();
        match state.threads.get(&thread::current().id()) {
            Some(addr) => Ok(env_handle(*addr)),
            None => Err(JNI_EDETACHED),
        }
    }

    fn attach_current_thread(&self) -> Result<Env, jint> {
        let mut state = self.state.lock();
        if state.refuse_attach {
            return Err(JNI_ERR);
        }
        let current = thread::current().id();
        if let Some(addr) = state.threads.get(&current) {
            return Ok(env_handle(*addr));
        }
        state.counters.attaches += 1;
        Ok(state.new_env(current, false))
    }

    fn detach_current_thread(&self) -> jint {
        let mut state = self.state.lock();
        let current = thread::current().id();
        let Some(addr) = state.threads.get(&current).copied() else {
            return JNI_EDETACHED;
        };
        if state.envs.get(&addr).is_some_and(|e| e.vm_owned) {
            panic!("JNI ERROR: DetachCurrentThread on a thread owned by the VM");
        }
        state.threads.remove(&current);
        state.envs.remove(&addr);
        state
            .refs
            .retain(|_, r| r.kind != RefKind::Local(addr));
        state.counters.detaches += 1;
        JNI_OK
    }

    fn find_class(&self, env: Env, name: &str) -> Option<ObjectRef> {
        let mut state = self.state.lock();
        let env = state.check_env(env, "FindClass", false);
        state.counters.class_lookups += 1;
        let found = if name.contains('.') {
            None
        } else {
            state.heap.class_by_name(name)
        };
        match found {
            Some(class) => {
                let object = state.heap.class_object(class);
                Some(state.new_local(env, object))
            }
            None => {
                state.throw(env, "java/lang/NoClassDefFoundError", name);
                None
            }
        }
    }

    fn get_object_class(&self, env: Env, obj: ObjectRef) -> Option<ObjectRef> {
        let mut state = self.state.lock();
        let env = state.check_env(env, "GetObjectClass", false);
        let id = state.resolve(env, obj, "GetObjectClass");
        let class = state.heap.class_of(id);
        let object = state.heap.class_object(class);
        Some(state.new_local(env, object))
    }

    fn get_method_id(
        &self,
        env: Env,
        class: ObjectRef,
        name: &str,
        sig: &str,
    ) -> Option<MethodId> {
        let mut state = self.state.lock();
        let env = state.check_env(env, "GetMethodID", false);
        state.counters.method_lookups += 1;
        let class = state.class_id(env, class, "GetMethodID");
        match state.heap.find_method(class, name, sig) {
            // SAFETY: emulator handles are opaque and never dereferenced
            Some(addr) => unsafe { MethodId::from_raw(ptr::without_provenance_mut(addr)) },
            None => {
                state.throw(env, "java/lang/NoSuchMethodError", &format!("{name}{sig}"));
                None
            }
        }
    }

    fn get_static_method_id(
        &self,
        env: Env,
        class: ObjectRef,
        name: &str,
        sig: &str,
    ) -> Option<MethodId> {
        let mut state = self.state.lock();
        let env = state.check_env(env, "GetStaticMethodID", false);
        state.counters.method_lookups += 1;
        let class = state.class_id(env, class, "GetStaticMethodID");
        match state.heap.find_static(class, name, sig) {
            // SAFETY: emulator handles are opaque and never dereferenced
            Some(addr) => unsafe { MethodId::from_raw(ptr::without_provenance_mut(addr)) },
            None => {
                state.throw(env, "java/lang/NoSuchMethodError", &format!("{name}{sig}"));
                None
            }
        }
    }

    fn get_field_id(&self, env: Env, class: ObjectRef, name: &str, sig: &str) -> Option<FieldId> {
        let mut state = self.state.lock();
        let env = state.check_env(env, "GetFieldID", false);
        state.counters.field_lookups += 1;
        let class = state.class_id(env, class, "GetFieldID");
        match state.heap.find_field(class, name, sig) {
            // SAFETY: emulator handles are opaque and never dereferenced
            Some(addr) => unsafe { FieldId::from_raw(ptr::without_provenance_mut(addr)) },
            None => {
                state.throw(env, "java/lang/NoSuchFieldError", name);
                None
            }
        }
    }

    fn new_object(
        &self,
        env: Env,
        class: ObjectRef,
        ctor: MethodId,
        args: Option<&[jvalue]>,
    ) -> Option<ObjectRef> {
        let mut state = self.state.lock();
        let env = state.check_env(env, "NewObjectA", false);
        state.safepoint();
        let class = state.class_id(env, class, "NewObjectA");
        let Some(entry) = state.heap.methods.get(&ctor.addr()) else {
            panic!("JNI ERROR: NewObjectA got invalid method ID {ctor:?}");
        };
        if entry.name != "<init>" || entry.class != class {
            panic!("JNI ERROR: NewObjectA with a method that is not a constructor of the class");
        }
        let params = entry.desc.args.clone();
        let args = state.decode_args(env, &params, args, "NewObjectA");
        let obj = state.heap.alloc(class, Payload::Plain);
        match state.invoke(env, Some(obj), ctor.addr(), args) {
            Ok(_) => Some(state.new_local(env, obj)),
            Err(_) => None,
        }
    }

    fn call_method(
        &self,
        env: Env,
        obj: ObjectRef,
        method: MethodId,
        ret: JavaType,
        args: Option<&[jvalue]>,
    ) -> JValue {
        let mut state = self.state.lock();
        let env = state.check_env(env, "CallMethodA", false);
        let target = state.resolve(env, obj, "CallMethodA");
        state.call(env, CallTarget::Instance(target), method, ret, args, "CallMethodA")
    }

    fn call_static_method(
        &self,
        env: Env,
        class: ObjectRef,
        method: MethodId,
        ret: JavaType,
        args: Option<&[jvalue]>,
    ) -> JValue {
        let mut state = self.state.lock();
        let env = state.check_env(env, "CallStaticMethodA", false);
        let class = state.class_id(env, class, "CallStaticMethodA");
        state.call(
            env,
            CallTarget::Static(class),
            method,
            ret,
            args,
            "CallStaticMethodA",
        )
    }

    fn get_field(&self, env: Env, obj: ObjectRef, field: FieldId, ty: JavaType) -> JValue {
        let mut state = self.state.lock();
        let env = state.check_env(env, "GetField", false);
        let target = state.resolve(env, obj, "GetField");
        let Some(entry) = state.heap.fields.get(&field.addr()) else {
            panic!("JNI ERROR: GetField got invalid field ID {field:?}");
        };
        if entry.ty != ty {
            panic!("JNI ERROR: Get{ty:?}Field used for a field of kind {:?}", entry.ty);
        }
        let declaring = entry.class;
        let class = state.heap.class_of(target);
        if !state.heap.is_subclass(class, declaring) {
            panic!("JNI ERROR: GetField on an object without that field");
        }
        let value = state
            .heap
            .object(target)
            .fields
            .get(&field.addr())
            .copied()
            .unwrap_or_else(|| Value::default_for(ty));
        state.to_jvalue(env, value)
    }

    fn exception_check(&self, env: Env) -> bool {
        let state = self.state.lock();
        let env = state.check_env(env, "ExceptionCheck", true);
        state.envs.get(&env).is_some_and(|e| e.pending.is_some())
    }

    fn exception_occurred(&self, env: Env) -> Option<ObjectRef> {
        let mut state = self.state.lock();
        let env = state.check_env(env, "ExceptionOccurred", true);
        let pending = state.envs.get(&env).and_then(|e| e.pending)?;
        Some(state.new_local(env, pending))
    }

    fn exception_clear(&self, env: Env) {
        let mut state = self.state.lock();
        let env = state.check_env(env, "ExceptionClear", true);
        if let Some(e) = state.envs.get_mut(&env) {
            e.pending = None;
        }
    }

    fn exception_describe(&self, env: Env) {
        let mut state = self.state.lock();
        let env = state.check_env(env, "ExceptionDescribe", true);
        state.counters.describes += 1;
        // Describing clears the pending exception, as in JNI
        if let Some(pending) = state.envs.get_mut(&env).and_then(|e| e.pending.take()) {
            let class = state.heap.class_name(state.heap.class_of(pending));
            tracing::debug!(exception = %class, "emulated VM describing exception");
        }
    }

    fn throw_new(&self, env: Env, class: ObjectRef, message: &str) -> jint {
        let mut state = self.state.lock();
        let env = state.check_env(env, "ThrowNew", false);
        let class = state.class_id(env, class, "ThrowNew");
        let throwable = state.heap.class_by_name("java/lang/Throwable");
        if throwable.is_none_or(|t| !state.heap.is_subclass(class, t)) {
            return JNI_ERR;
        }
        let obj = state.heap.alloc(
            class,
            Payload::Throwable {
                message: Some(message.to_string()),
            },
        );
        if let Some(e) = state.envs.get_mut(&env) {
            e.pending = Some(obj);
        }
        JNI_OK
    }

    fn new_global_ref(&self, env: Env, obj: ObjectRef) -> Option<ObjectRef> {
        let mut state = self.state.lock();
        let env = state.check_env(env, "NewGlobalRef", false);
        let target = state.resolve(env, obj, "NewGlobalRef");
        let addr = state.heap.next_addr();
        state.refs.insert(
            addr,
            RefEntry {
                target,
                kind: RefKind::Global,
            },
        );
        Some(object_handle(addr))
    }

    fn new_local_ref(&self, env: Env, obj: ObjectRef) -> Option<ObjectRef> {
        let mut state = self.state.lock();
        let env = state.check_env(env, "NewLocalRef", false);
        let target = state.resolve(env, obj, "NewLocalRef");
        Some(state.new_local(env, target))
    }

    fn delete_global_ref(&self, env: Env, obj: ObjectRef) {
        let mut state = self.state.lock();
        state.check_env(env, "DeleteGlobalRef", true);
        match state.refs.get(&obj.addr()).map(|r| r.kind) {
            Some(RefKind::Global) => {
                state.refs.remove(&obj.addr());
            }
            Some(RefKind::Local(_)) => {
                panic!("JNI ERROR: DeleteGlobalRef on local reference {obj:?}")
            }
            None => panic!("JNI ERROR: DeleteGlobalRef on invalid or deleted reference {obj:?}"),
        }
    }

    fn delete_local_ref(&self, env: Env, obj: ObjectRef) {
        let mut state = self.state.lock();
        let env = state.check_env(env, "DeleteLocalRef", true);
        match state.refs.get(&obj.addr()).map(|r| r.kind) {
            Some(RefKind::Local(owner)) if owner == env => {
                state.refs.remove(&obj.addr());
                if let Some(e) = state.envs.get_mut(&env) {
                    e.locals -= 1;
                }
            }
            Some(_) => panic!("JNI ERROR: DeleteLocalRef on a reference it does not own {obj:?}"),
            None => panic!("JNI ERROR: DeleteLocalRef on invalid or deleted reference {obj:?}"),
        }
    }

    fn new_string(&self, env: Env, chars: &[u16]) -> Option<ObjectRef> {
        let mut state = self.state.lock();
        let env = state.check_env(env, "NewString", false);
        state.safepoint();
        let obj = state
            .heap
            .alloc_named("java/lang/String", Payload::Str(chars.to_vec()));
        Some(state.new_local(env, obj))
    }

    fn get_string_chars(&self, env: Env, string: ObjectRef) -> Option<Vec<u16>> {
        let state = self.state.lock();
        let env = state.check_env(env, "GetStringRegion", false);
        let id = state.resolve(env, string, "GetStringRegion");
        match state.heap.payload(id) {
            Payload::Str(units) => Some(units.clone()),
            _ => panic!("JNI ERROR: GetStringRegion on a non-string {string:?}"),
        }
    }

    fn new_byte_array(&self, env: Env, bytes: &[u8]) -> Option<ObjectRef> {
        let mut state = self.state.lock();
        let env = state.check_env(env, "NewByteArray", false);
        state.safepoint();
        let obj = state
            .heap
            .alloc_named("[B", Payload::ByteArray(bytes.to_vec()));
        Some(state.new_local(env, obj))
    }

    fn get_byte_array(&self, env: Env, array: ObjectRef) -> Option<Vec<u8>> {
        let state = self.state.lock();
        let env = state.check_env(env, "GetByteArrayRegion", false);
        let id = state.resolve(env, array, "GetByteArrayRegion");
        match state.heap.payload(id) {
            Payload::ByteArray(bytes) => Some(bytes.clone()),
            _ => panic!("JNI ERROR: GetByteArrayRegion on a non-array {array:?}"),
        }
    }
}

#[cfg(test)]
mod tests;
