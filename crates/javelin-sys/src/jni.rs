//! Production [`NativeInterface`] over a real `JavaVM*`

use crate::handle::{Env, FieldId, MethodId, ObjectRef};
use crate::interface::NativeInterface;
use crate::value::{JValue, JavaType};
use jni_sys::{
    JNI_EDETACHED, JNI_ERR, JNI_FALSE, JNI_OK, JNIEnv, JavaVM, jint, jsize, jvalue,
};
use std::ffi::{CString, c_void};
use std::ptr::{self, NonNull};

/// Call a function from the environment's function table
///
/// Evaluates to `None` when the slot is empty, so a truncated table never
/// turns into a null function call.
macro_rules! jni_call {
    ($env:expr, $name:ident $(, $arg:expr)* $(,)?) => {{
        let raw: *mut JNIEnv = $env.as_raw();
        // SAFETY: `Env` only wraps environments handed out by the VM, whose
        // function table stays valid while the thread is attached
        match unsafe { (**raw).$name } {
            Some(f) => Some(unsafe { f(raw $(, $arg)*) }),
            None => {
                tracing::warn!(function = stringify!($name), "JNI function table slot is empty");
                None
            }
        }
    }};
}

/// Same as [`jni_call!`] against the invocation interface of the VM
macro_rules! vm_call {
    ($vm:expr, $name:ident $(, $arg:expr)* $(,)?) => {{
        let raw: *mut JavaVM = $vm.as_ptr();
        // SAFETY: `from_raw` requires a live `JavaVM*`
        match unsafe { (**raw).$name } {
            Some(f) => Some(unsafe { f(raw $(, $arg)*) }),
            None => None,
        }
    }};
}

/// Native interface backed by the JNI function tables of a live VM
pub struct JniNativeInterface {
    vm: NonNull<JavaVM>,
    version: jint,
}

// A JavaVM pointer is valid process-wide and its invocation interface may
// be used from any thread.
unsafe impl Send for JniNativeInterface {}
unsafe impl Sync for JniNativeInterface {}

impl JniNativeInterface {
    /// Wrap the VM handed to `JNI_OnLoad`
    ///
    /// # Safety
    /// `vm` must be null or a valid `JavaVM*` that outlives this value.
    pub unsafe fn from_raw(vm: *mut JavaVM, version: jint) -> Option<Self> {
        NonNull::new(vm).map(|vm| Self { vm, version })
    }

    pub fn as_raw(&self) -> *mut JavaVM {
        self.vm.as_ptr()
    }

    /// JNI version requested from `GetEnv`
    pub fn version(&self) -> jint {
        self.version
    }
}

fn args_ptr(args: Option<&[jvalue]>) -> *const jvalue {
    args.map_or(ptr::null(), <[jvalue]>::as_ptr)
}

/// Names and signatures are plain ASCII; anything with an interior NUL can
/// never match a real member.
fn c_string(s: &str) -> Option<CString> {
    CString::new(s).ok()
}

impl NativeInterface for JniNativeInterface {
    fn get_env(&self) -> Result<Env, jint> {
        let mut raw: *mut c_void = ptr::null_mut();
        match vm_call!(self.vm, GetEnv, &mut raw, self.version) {
            // SAFETY: an environment the VM just filled in
            Some(JNI_OK) => unsafe { Env::from_raw(raw.cast()) }.ok_or(JNI_ERR),
            Some(code) => Err(code),
            None => Err(JNI_EDETACHED),
        }
    }

    fn attach_current_thread(&self) -> Result<Env, jint> {
        let mut raw: *mut c_void = ptr::null_mut();
        match vm_call!(self.vm, AttachCurrentThread, &mut raw, ptr::null_mut()) {
            // SAFETY: an environment the VM just filled in
            Some(JNI_OK) => unsafe { Env::from_raw(raw.cast()) }.ok_or(JNI_ERR),
            Some(code) => Err(code),
            None => Err(JNI_ERR),
        }
    }

    fn detach_current_thread(&self) -> jint {
        vm_call!(self.vm, DetachCurrentThread).unwrap_or(JNI_ERR)
    }

    fn find_class(&self, env: Env, name: &str) -> Option<ObjectRef> {
        let name = c_string(name)?;
        let class = jni_call!(env, FindClass, name.as_ptr())?;
        // SAFETY: a value the VM just returned, null or valid
        unsafe { ObjectRef::from_raw(class) }
    }

    fn get_object_class(&self, env: Env, obj: ObjectRef) -> Option<ObjectRef> {
        let class = jni_call!(env, GetObjectClass, obj.as_raw())?;
        // SAFETY: a value the VM just returned, null or valid
        unsafe { ObjectRef::from_raw(class) }
    }

    fn get_method_id(
        &self,
        env: Env,
        class: ObjectRef,
        name: &str,
        sig: &str,
    ) -> Option<MethodId> {
        let (name, sig) = (c_string(name)?, c_string(sig)?);
        let id = jni_call!(env, GetMethodID, class.as_raw(), name.as_ptr(), sig.as_ptr())?;
        // SAFETY: a value the VM just returned, null or valid
        unsafe { MethodId::from_raw(id) }
    }

    fn get_static_method_id(
        &self,
        env: Env,
        class: ObjectRef,
        name: &str,
        sig: &str,
    ) -> Option<MethodId> {
        let (name, sig) = (c_string(name)?, c_string(sig)?);
        let id = jni_call!(env, GetStaticMethodID, class.as_raw(), name.as_ptr(), sig.as_ptr())?;
        // SAFETY: a value the VM just returned, null or valid
        unsafe { MethodId::from_raw(id) }
    }

    fn get_field_id(&self, env: Env, class: ObjectRef, name: &str, sig: &str) -> Option<FieldId> {
        let (name, sig) = (c_string(name)?, c_string(sig)?);
        let id = jni_call!(env, GetFieldID, class.as_raw(), name.as_ptr(), sig.as_ptr())?;
        // SAFETY: a value the VM just returned, null or valid
        unsafe { FieldId::from_raw(id) }
    }

    fn new_object(
        &self,
        env: Env,
        class: ObjectRef,
        ctor: MethodId,
        args: Option<&[jvalue]>,
    ) -> Option<ObjectRef> {
        let obj = jni_call!(env, NewObjectA, class.as_raw(), ctor.as_raw(), args_ptr(args))?;
        // SAFETY: a value the VM just returned, null or valid
        unsafe { ObjectRef::from_raw(obj) }
    }

    fn call_method(
        &self,
        env: Env,
        obj: ObjectRef,
        method: MethodId,
        ret: JavaType,
        args: Option<&[jvalue]>,
    ) -> JValue {
        let (o, m, a) = (obj.as_raw(), method.as_raw(), args_ptr(args));
        let value = match ret {
            JavaType::Boolean => {
                jni_call!(env, CallBooleanMethodA, o, m, a).map(|v| JValue::Boolean(v != JNI_FALSE))
            }
            JavaType::Byte => jni_call!(env, CallByteMethodA, o, m, a).map(JValue::Byte),
            JavaType::Char => jni_call!(env, CallCharMethodA, o, m, a).map(JValue::Char),
            JavaType::Short => jni_call!(env, CallShortMethodA, o, m, a).map(JValue::Short),
            JavaType::Int => jni_call!(env, CallIntMethodA, o, m, a).map(JValue::Int),
            JavaType::Long => jni_call!(env, CallLongMethodA, o, m, a).map(JValue::Long),
            JavaType::Float => jni_call!(env, CallFloatMethodA, o, m, a).map(JValue::Float),
            JavaType::Double => jni_call!(env, CallDoubleMethodA, o, m, a).map(JValue::Double),
            JavaType::Object => jni_call!(env, CallObjectMethodA, o, m, a)
                // SAFETY: a value the VM just returned, null or valid
                .map(|r| JValue::Object(unsafe { ObjectRef::from_raw(r) })),
            JavaType::Void => jni_call!(env, CallVoidMethodA, o, m, a).map(|()| JValue::Void),
        };
        value.unwrap_or_else(|| ret.default_value())
    }

    fn call_static_method(
        &self,
        env: Env,
        class: ObjectRef,
        method: MethodId,
        ret: JavaType,
        args: Option<&[jvalue]>,
    ) -> JValue {
        let (c, m, a) = (class.as_raw(), method.as_raw(), args_ptr(args));
        let value = match ret {
            JavaType::Boolean => jni_call!(env, CallStaticBooleanMethodA, c, m, a)
                .map(|v| JValue::Boolean(v != JNI_FALSE)),
            JavaType::Byte => jni_call!(env, CallStaticByteMethodA, c, m, a).map(JValue::Byte),
            JavaType::Char => jni_call!(env, CallStaticCharMethodA, c, m, a).map(JValue::Char),
            JavaType::Short => jni_call!(env, CallStaticShortMethodA, c, m, a).map(JValue::Short),
            JavaType::Int => jni_call!(env, CallStaticIntMethodA, c, m, a).map(JValue::Int),
            JavaType::Long => jni_call!(env, CallStaticLongMethodA, c, m, a).map(JValue::Long),
            JavaType::Float => jni_call!(env, CallStaticFloatMethodA, c, m, a).map(JValue::Float),
            JavaType::Double => {
                jni_call!(env, CallStaticDoubleMethodA, c, m, a).map(JValue::Double)
            }
            JavaType::Object => jni_call!(env, CallStaticObjectMethodA, c, m, a)
                // SAFETY: a value the VM just returned, null or valid
                .map(|r| JValue::Object(unsafe { ObjectRef::from_raw(r) })),
            JavaType::Void => {
                jni_call!(env, CallStaticVoidMethodA, c, m, a).map(|()| JValue::Void)
            }
        };
        value.unwrap_or_else(|| ret.default_value())
    }

    fn get_field(&self, env: Env, obj: ObjectRef, field: FieldId, ty: JavaType) -> JValue {
        let (o, f) = (obj.as_raw(), field.as_raw());
        let value = match ty {
            JavaType::Boolean => {
                jni_call!(env, GetBooleanField, o, f).map(|v| JValue::Boolean(v != JNI_FALSE))
            }
            JavaType::Byte => jni_call!(env, GetByteField, o, f).map(JValue::Byte),
            JavaType::Char => jni_call!(env, GetCharField, o, f).map(JValue::Char),
            JavaType::Short => jni_call!(env, GetShortField, o, f).map(JValue::Short),
            JavaType::Int => jni_call!(env, GetIntField, o, f).map(JValue::Int),
            JavaType::Long => jni_call!(env, GetLongField, o, f).map(JValue::Long),
            JavaType::Float => jni_call!(env, GetFloatField, o, f).map(JValue::Float),
            JavaType::Double => jni_call!(env, GetDoubleField, o, f).map(JValue::Double),
            JavaType::Object => jni_call!(env, GetObjectField, o, f)
                // SAFETY: a value the VM just returned, null or valid
                .map(|r| JValue::Object(unsafe { ObjectRef::from_raw(r) })),
            JavaType::Void => Some(JValue::Void),
        };
        value.unwrap_or_else(|| ty.default_value())
    }

    fn exception_check(&self, env: Env) -> bool {
        jni_call!(env, ExceptionCheck).is_some_and(|v| v != JNI_FALSE)
    }

    fn exception_occurred(&self, env: Env) -> Option<ObjectRef> {
        let throwable = jni_call!(env, ExceptionOccurred)?;
        // SAFETY: a value the VM just returned, null or valid
        unsafe { ObjectRef::from_raw(throwable) }
    }

    fn exception_clear(&self, env: Env) {
        jni_call!(env, ExceptionClear);
    }

    fn exception_describe(&self, env: Env) {
        jni_call!(env, ExceptionDescribe);
    }

    fn throw_new(&self, env: Env, class: ObjectRef, message: &str) -> jint {
        // Interior NULs would truncate the message; drop them instead
        let message = CString::new(message.replace('\0', "")).unwrap_or_default();
        jni_call!(env, ThrowNew, class.as_raw(), message.as_ptr()).unwrap_or(JNI_ERR)
    }

    fn new_global_ref(&self, env: Env, obj: ObjectRef) -> Option<ObjectRef> {
        let global = jni_call!(env, NewGlobalRef, obj.as_raw())?;
        // SAFETY: a value the VM just returned, null or valid
        unsafe { ObjectRef::from_raw(global) }
    }

    fn new_local_ref(&self, env: Env, obj: ObjectRef) -> Option<ObjectRef> {
        let local = jni_call!(env, NewLocalRef, obj.as_raw())?;
        // SAFETY: a value the VM just returned, null or valid
        unsafe { ObjectRef::from_raw(local) }
    }

    fn delete_global_ref(&self, env: Env, obj: ObjectRef) {
        jni_call!(env, DeleteGlobalRef, obj.as_raw());
    }

    fn delete_local_ref(&self, env: Env, obj: ObjectRef) {
        jni_call!(env, DeleteLocalRef, obj.as_raw());
    }

    fn new_string(&self, env: Env, chars: &[u16]) -> Option<ObjectRef> {
        let len = jsize::try_from(chars.len()).ok()?;
        let string = jni_call!(env, NewString, chars.as_ptr(), len)?;
        // SAFETY: a value the VM just returned, null or valid
        unsafe { ObjectRef::from_raw(string) }
    }

    fn get_string_chars(&self, env: Env, string: ObjectRef) -> Option<Vec<u16>> {
        let len = jni_call!(env, GetStringLength, string.as_raw())?;
        let mut buf = vec![0u16; usize::try_from(len).ok()?];
        jni_call!(env, GetStringRegion, string.as_raw(), 0, len, buf.as_mut_ptr())?;
        Some(buf)
    }

    fn new_byte_array(&self, env: Env, bytes: &[u8]) -> Option<ObjectRef> {
        let len = jsize::try_from(bytes.len()).ok()?;
        let array = jni_call!(env, NewByteArray, len)?;
        // SAFETY: a value the VM just returned, null or valid
        let array = unsafe { ObjectRef::from_raw(array) }?;
        jni_call!(
            env,
            SetByteArrayRegion,
            array.as_raw(),
            0,
            len,
            bytes.as_ptr().cast()
        )?;
        Some(array)
    }

    fn get_byte_array(&self, env: Env, array: ObjectRef) -> Option<Vec<u8>> {
        let len = jni_call!(env, GetArrayLength, array.as_raw())?;
        let mut buf = vec![0u8; usize::try_from(len).ok()?];
        jni_call!(
            env,
            GetByteArrayRegion,
            array.as_raw(),
            0,
            len,
            buf.as_mut_ptr().cast()
        )?;
        Some(buf)
    }
}
