//! The native invocation seam
//!
//! [`NativeInterface`] is the exact subset of the JNI invoke and function
//! tables the bridge runtime uses. Everything above this trait is VM
//! agnostic: production code plugs in [`crate::JniNativeInterface`], tests
//! plug in the emulator.
//!
//! Methods take an [`Env`] that must belong to the calling thread, and
//! object references that are live in that environment. Implementations
//! report "no result" as `None` and leave any VM exception pending; they
//! never clear exceptions on their own.

use crate::handle::{Env, FieldId, MethodId, ObjectRef};
use crate::value::{JValue, JavaType};
use jni_sys::{jint, jvalue};

pub trait NativeInterface: Send + Sync {
    // Invocation interface

    /// Environment of the calling thread if the VM already knows it
    /// (`GetEnv`); `Err` carries the JNI status code.
    fn get_env(&self) -> Result<Env, jint>;

    /// Attach the calling thread (`AttachCurrentThread`)
    fn attach_current_thread(&self) -> Result<Env, jint>;

    /// Detach the calling thread (`DetachCurrentThread`), returns the status
    fn detach_current_thread(&self) -> jint;

    // Reflection

    /// `FindClass` with a binary name such as `java/lang/String`
    fn find_class(&self, env: Env, name: &str) -> Option<ObjectRef>;

    fn get_object_class(&self, env: Env, obj: ObjectRef) -> Option<ObjectRef>;

    fn get_method_id(&self, env: Env, class: ObjectRef, name: &str, sig: &str)
    -> Option<MethodId>;

    fn get_static_method_id(
        &self,
        env: Env,
        class: ObjectRef,
        name: &str,
        sig: &str,
    ) -> Option<MethodId>;

    fn get_field_id(&self, env: Env, class: ObjectRef, name: &str, sig: &str) -> Option<FieldId>;

    // Invocation
    //
    // `args` is `None` when the call takes no arguments; the JNI `*A`
    // variants then receive a null `jvalue*`.

    /// `NewObjectA`
    fn new_object(
        &self,
        env: Env,
        class: ObjectRef,
        ctor: MethodId,
        args: Option<&[jvalue]>,
    ) -> Option<ObjectRef>;

    /// `Call<Kind>MethodA`, the kind selected by `ret`
    fn call_method(
        &self,
        env: Env,
        obj: ObjectRef,
        method: MethodId,
        ret: JavaType,
        args: Option<&[jvalue]>,
    ) -> JValue;

    /// `CallStatic<Kind>MethodA`, the kind selected by `ret`
    fn call_static_method(
        &self,
        env: Env,
        class: ObjectRef,
        method: MethodId,
        ret: JavaType,
        args: Option<&[jvalue]>,
    ) -> JValue;

    /// `Get<Kind>Field`
    fn get_field(&self, env: Env, obj: ObjectRef, field: FieldId, ty: JavaType) -> JValue;

    // Exceptions

    fn exception_check(&self, env: Env) -> bool;

    fn exception_occurred(&self, env: Env) -> Option<ObjectRef>;

    fn exception_clear(&self, env: Env);

    fn exception_describe(&self, env: Env);

    /// `ThrowNew`, returns the JNI status
    fn throw_new(&self, env: Env, class: ObjectRef, message: &str) -> jint;

    // References

    fn new_global_ref(&self, env: Env, obj: ObjectRef) -> Option<ObjectRef>;

    /// `NewLocalRef`, a reference owned by the current native frame
    fn new_local_ref(&self, env: Env, obj: ObjectRef) -> Option<ObjectRef>;

    fn delete_global_ref(&self, env: Env, obj: ObjectRef);

    fn delete_local_ref(&self, env: Env, obj: ObjectRef);

    // Strings and arrays

    /// `NewString` from UTF-16 code units
    fn new_string(&self, env: Env, chars: &[u16]) -> Option<ObjectRef>;

    /// `GetStringLength` + `GetStringRegion`
    fn get_string_chars(&self, env: Env, string: ObjectRef) -> Option<Vec<u16>>;

    /// `NewByteArray` + `SetByteArrayRegion`
    fn new_byte_array(&self, env: Env, bytes: &[u8]) -> Option<ObjectRef>;

    /// `GetArrayLength` + `GetByteArrayRegion`
    fn get_byte_array(&self, env: Env, array: ObjectRef) -> Option<Vec<u8>>;
}
