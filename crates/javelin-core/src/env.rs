//! The per-thread session type
//!
//! A [`JniEnv`] is what [`Bridge::env`](crate::Bridge::env) hands out: the
//! calling thread's environment bound to the bridge's caches. It is `!Send`
//! and `!Sync`, as is every [`LocalRef`] created through it.

use javelin_sys::{Env, JNI_OK, NativeInterface, ObjectRef};
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::known;
use crate::thread::ThreadKey;
use crate::value::FromForeign;

/// The calling thread's view of the bridge
pub struct JniEnv<'b> {
    bridge: &'b Bridge,
    env: Env,
    thread: ThreadKey,
    /// Marker to make this type !Send + !Sync
    _not_send: PhantomData<*mut ()>,
}

impl std::fmt::Debug for JniEnv<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JniEnv")
            .field("env", &self.env)
            .field("thread", &self.thread)
            .finish()
    }
}

impl<'b> JniEnv<'b> {
    pub(crate) fn new(bridge: &'b Bridge, env: Env, thread: ThreadKey) -> Self {
        Self {
            bridge,
            env,
            thread,
            _not_send: PhantomData,
        }
    }

    pub fn raw(&self) -> Env {
        self.env
    }

    pub fn thread(&self) -> ThreadKey {
        self.thread
    }

    pub fn bridge(&self) -> &'b Bridge {
        self.bridge
    }

    pub(crate) fn native(&self) -> &'b dyn NativeInterface {
        self.bridge.native()
    }

    /// Take ownership of a local reference, deleting it on drop
    pub fn auto_local(&self, obj: ObjectRef) -> LocalRef<'b> {
        LocalRef {
            native: self.native(),
            env: self.env,
            obj,
            _not_send: PhantomData,
        }
    }

    pub fn delete_local_ref(&self, obj: ObjectRef) {
        self.native().delete_local_ref(self.env, obj);
    }

    // Exceptions

    /// Whether the last call on this thread left an exception behind
    pub fn has_pending_exception(&self) -> bool {
        self.bridge.exceptions().has_pending(self.thread)
    }

    /// Move an exception a raw native call left in the VM into the parking
    /// spot of this thread
    pub(crate) fn park_exception(&self) -> bool {
        self.bridge.exceptions().capture(self.env, self.thread)
    }

    /// Drain the exception the last call on this thread raised
    pub fn take_exception(&self) -> Option<LocalRef<'b>> {
        self.bridge
            .exceptions()
            .drain(self.env, self.thread)
            .map(|throwable| self.auto_local(throwable))
    }

    /// Turn a pending exception into [`BridgeError::PendingException`]
    pub fn rethrow(&self) -> BridgeResult<()> {
        let Some(throwable) = self.take_exception() else {
            return Ok(());
        };
        let class = self
            .class_name_of(throwable.as_obj())
            .unwrap_or_else(|_| known::THROWABLE.to_string());
        let message = self.throwable_message(throwable.as_obj());
        Err(BridgeError::PendingException { class, message })
    }

    fn throwable_message(&self, throwable: ObjectRef) -> Option<String> {
        let get_message = self
            .method(known::THROWABLE, "getMessage", "()Ljava/lang/String;")
            .ok()?;
        let message = self.call::<Option<ObjectRef>>(throwable, &get_message, &[]);
        if let Some(nested) = self.take_exception() {
            debug!(?nested, "getMessage raised while rethrowing");
        }
        let message = self.auto_local(message?);
        String::from_foreign(self, message.as_obj()).ok()
    }

    /// Raise a new exception of `class` in the VM (`ThrowNew`)
    ///
    /// The exception stays pending in the VM, for native code called from
    /// Java that is about to return.
    pub fn throw_new(&self, class: &str, message: &str) -> BridgeResult<()> {
        let handle = self.class(class)?;
        self.bridge.exceptions().reset(self.env, self.thread);
        let status = self.native().throw_new(self.env, handle.as_obj(), message);
        if status != JNI_OK {
            return Err(BridgeError::CantCreateObject(class.to_string()));
        }
        Ok(())
    }

    /// Raise a native error in the VM as `java/lang/Exception` with a
    /// `"<Kind>: <detail>"` message
    pub fn throw_error(&self, err: &BridgeError) -> BridgeResult<()> {
        let message = format!("{}: {}", err.error_kind(), err.detail());
        self.throw_new(known::EXCEPTION, &message)
    }

    // Introspection

    /// Binary class name of an object, e.g. `java/lang/String`
    pub fn class_name_of(&self, obj: ObjectRef) -> BridgeResult<String> {
        let class = self
            .native()
            .get_object_class(self.env, obj)
            .ok_or_else(|| BridgeError::conversion("class name", "GetObjectClass returned null"))?;
        let class = self.auto_local(class);
        let get_name = self.method(known::CLASS, "getName", "()Ljava/lang/String;")?;
        let name = self.call::<Option<ObjectRef>>(class.as_obj(), &get_name, &[]);
        if self.take_exception().is_some() {
            return Err(BridgeError::conversion("class name", "Class.getName raised"));
        }
        let name = name
            .map(|name| self.auto_local(name))
            .ok_or_else(|| BridgeError::conversion("class name", "Class.getName returned null"))?;
        Ok(String::from_foreign(self, name.as_obj())?.replace('.', "/"))
    }

    /// Dump the VM's reference tables to the log (Android only)
    ///
    /// Fails with [`BridgeError::ClassNotFound`] on VMs without
    /// `dalvik/system/VMDebug`.
    pub fn dump_reference_tables(&self) -> BridgeResult<()> {
        let class = self.class(known::VM_DEBUG)?;
        let dump = self.static_method(known::VM_DEBUG, "dumpReferenceTables", "()V")?;
        self.call_static_void(&class, &dump, &[]);
        if self.take_exception().is_some() {
            warn!("dumpReferenceTables raised an exception");
        }
        Ok(())
    }
}

/// An owned local reference, deleted when dropped
pub struct LocalRef<'b> {
    native: &'b dyn NativeInterface,
    env: Env,
    obj: ObjectRef,
    _not_send: PhantomData<*mut ()>,
}

impl LocalRef<'_> {
    pub fn as_obj(&self) -> ObjectRef {
        self.obj
    }

    /// Give up ownership without deleting the reference
    pub fn into_raw(self) -> ObjectRef {
        let obj = self.obj;
        std::mem::forget(self);
        obj
    }
}

impl std::fmt::Debug for LocalRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalRef({:?})", self.obj)
    }
}

impl Drop for LocalRef<'_> {
    fn drop(&mut self) {
        self.native.delete_local_ref(self.env, self.obj);
    }
}
