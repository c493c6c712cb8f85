//! Shared setup for the integration tests

#![allow(dead_code)]

use javelin_core::javelin_sys::emulator::Emulator;
use javelin_core::javelin_sys::{
    Env, FieldId, JValue, JavaType, MethodId, NativeInterface, ObjectRef, jint, jvalue,
};
use javelin_core::{Bridge, BridgeConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

/// Log to the test writer, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fresh bridge over a fresh emulated VM
pub fn bridge() -> (Arc<Emulator>, Bridge) {
    bridge_with(BridgeConfig::default())
}

pub fn bridge_with(config: BridgeConfig) -> (Arc<Emulator>, Bridge) {
    init_tracing();
    let vm = Arc::new(Emulator::new());
    let bridge = Bridge::new(vm.clone(), config);
    (vm, bridge)
}

/// Same as [`bridge`], shareable across threads
pub fn shared_bridge() -> (Arc<Emulator>, Arc<Bridge>) {
    let (vm, bridge) = bridge();
    (vm, Arc::new(bridge))
}

/// An emulated VM whose allocations can be made to fail the way a real one
/// does when the heap is exhausted: null result, `OutOfMemoryError` pending
pub struct StarvedVm {
    pub vm: Arc<Emulator>,
    pub fail_strings: AtomicBool,
    pub fail_arrays: AtomicBool,
    pub fail_globals: AtomicBool,
}

impl StarvedVm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            vm: Arc::new(Emulator::new()),
            fail_strings: AtomicBool::new(false),
            fail_arrays: AtomicBool::new(false),
            fail_globals: AtomicBool::new(false),
        })
    }

    fn out_of_memory(&self, env: Env) -> Option<ObjectRef> {
        let class = self.vm.find_class(env, "java/lang/OutOfMemoryError")?;
        self.vm.throw_new(env, class, "Java heap space");
        self.vm.delete_local_ref(env, class);
        None
    }
}

/// A bridge over a [`StarvedVm`]
pub fn starved_bridge() -> (Arc<StarvedVm>, Bridge) {
    init_tracing();
    let vm = StarvedVm::new();
    let bridge = Bridge::new(vm.clone(), BridgeConfig::default());
    (vm, bridge)
}

impl NativeInterface for StarvedVm {
    fn get_env(&self) -> Result<Env, jint> {
        self.vm.get_env()
    }

    fn attach_current_thread(&self) -> Result<Env, jint> {
        self.vm.attach_current_thread()
    }

    fn detach_current_thread(&self) -> jint {
        self.vm.detach_current_thread()
    }

    fn find_class(&self, env: Env, name: &str) -> Option<ObjectRef> {
        self.vm.find_class(env, name)
    }

    fn get_object_class(&self, env: Env, obj: ObjectRef) -> Option<ObjectRef> {
        self.vm.get_object_class(env, obj)
    }

    fn get_method_id(&self, env: Env, class: ObjectRef, name: &str, sig: &str) -> Option<MethodId> {
        self.vm.get_method_id(env, class, name, sig)
    }

    fn get_static_method_id(
        &self,
        env: Env,
        class: ObjectRef,
        name: &str,
        sig: &str,
    ) -> Option<MethodId> {
        self.vm.get_static_method_id(env, class, name, sig)
    }

    fn get_field_id(&self, env: Env, class: ObjectRef, name: &str, sig: &str) -> Option<FieldId> {
        self.vm.get_field_id(env, class, name, sig)
    }

    fn new_object(
        &self,
        env: Env,
        class: ObjectRef,
        ctor: MethodId,
        args: Option<&[jvalue]>,
    ) -> Option<ObjectRef> {
        self.vm.new_object(env, class, ctor, args)
    }

    fn call_method(
        &self,
        env: Env,
        obj: ObjectRef,
        method: MethodId,
        ret: JavaType,
        args: Option<&[jvalue]>,
    ) -> JValue {
        self.vm.call_method(env, obj, method, ret, args)
    }

    fn call_static_method(
        &self,
        env: Env,
        class: ObjectRef,
        method: MethodId,
        ret: JavaType,
        args: Option<&[jvalue]>,
    ) -> JValue {
        self.vm.call_static_method(env, class, method, ret, args)
    }

    fn get_field(&self, env: Env, obj: ObjectRef, field: FieldId, ty: JavaType) -> JValue {
        self.vm.get_field(env, obj, field, ty)
    }

    fn exception_check(&self, env: Env) -> bool {
        self.vm.exception_check(env)
    }

    fn exception_occurred(&self, env: Env) -> Option<ObjectRef> {
        self.vm.exception_occurred(env)
    }

    fn exception_clear(&self, env: Env) {
        self.vm.exception_clear(env)
    }

    fn exception_describe(&self, env: Env) {
        self.vm.exception_describe(env)
    }

    fn throw_new(&self, env: Env, class: ObjectRef, message: &str) -> jint {
        self.vm.throw_new(env, class, message)
    }

    fn new_global_ref(&self, env: Env, obj: ObjectRef) -> Option<ObjectRef> {
        if self.fail_globals.load(Ordering::SeqCst) {
            return self.out_of_memory(env);
        }
        self.vm.new_global_ref(env, obj)
    }

    fn new_local_ref(&self, env: Env, obj: ObjectRef) -> Option<ObjectRef> {
        self.vm.new_local_ref(env, obj)
    }

    fn delete_global_ref(&self, env: Env, obj: ObjectRef) {
        self.vm.delete_global_ref(env, obj)
    }

    fn delete_local_ref(&self, env: Env, obj: ObjectRef) {
        self.vm.delete_local_ref(env, obj)
    }

    fn new_string(&self, env: Env, chars: &[u16]) -> Option<ObjectRef> {
        if self.fail_strings.load(Ordering::SeqCst) {
            return self.out_of_memory(env);
        }
        self.vm.new_string(env, chars)
    }

    fn get_string_chars(&self, env: Env, string: ObjectRef) -> Option<Vec<u16>> {
        self.vm.get_string_chars(env, string)
    }

    fn new_byte_array(&self, env: Env, bytes: &[u8]) -> Option<ObjectRef> {
        if self.fail_arrays.load(Ordering::SeqCst) {
            return self.out_of_memory(env);
        }
        self.vm.new_byte_array(env, bytes)
    }

    fn get_byte_array(&self, env: Env, array: ObjectRef) -> Option<Vec<u8>> {
        self.vm.get_byte_array(env, array)
    }
}
