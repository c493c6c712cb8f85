//! The bridge service object and the load hook
//!
//! A [`Bridge`] owns everything that outlives a single call: the
//! environment registry, the handle cache, the pending-exception store and
//! the context class loader. Tests build one per test over an emulated VM;
//! a library loaded by a real VM builds one in `JNI_OnLoad` through
//! [`on_load`] and installs it process-wide.

use javelin_sys::{JNI_ERR, JavaVM, JniNativeInterface, NativeInterface, ObjectRef, jint};
use std::panic::Location;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

use crate::config::{BridgeConfig, ClassLookup};
use crate::env::JniEnv;
use crate::error::{BridgeError, BridgeResult};
use crate::exception::ExceptionBridge;
use crate::handles::{HandleCache, MethodHandle};
use crate::known;
use crate::registry::EnvironmentRegistry;
use crate::thread::ThreadKey;
use crate::value::StructuredCoder;

static GLOBAL: OnceLock<Bridge> = OnceLock::new();

/// The context class loader of the loading thread, held globally
pub(crate) struct ContextLoader {
    loader: ObjectRef,
    load_class: MethodHandle,
}

// `loader` is a global reference, never deleted
unsafe impl Send for ContextLoader {}
unsafe impl Sync for ContextLoader {}

impl ContextLoader {
    pub(crate) fn as_obj(&self) -> ObjectRef {
        self.loader
    }

    pub(crate) fn load_class(&self) -> &MethodHandle {
        &self.load_class
    }
}

pub struct Bridge {
    native: Arc<dyn NativeInterface>,
    config: BridgeConfig,
    registry: EnvironmentRegistry,
    handles: HandleCache,
    exceptions: ExceptionBridge,
    loader: OnceLock<ContextLoader>,
    coder: Option<Arc<dyn StructuredCoder>>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("threads", &self.registry.len())
            .field("handles", &self.handles.stats())
            .field("context_loader", &self.loader.get().is_some())
            .field("coder", &self.coder.is_some())
            .finish()
    }
}

impl Bridge {
    pub fn new(native: Arc<dyn NativeInterface>, config: BridgeConfig) -> Self {
        Self {
            registry: EnvironmentRegistry::new(Arc::clone(&native)),
            exceptions: ExceptionBridge::new(Arc::clone(&native), config.describe_exceptions),
            handles: HandleCache::new(),
            loader: OnceLock::new(),
            coder: None,
            native,
            config,
        }
    }

    /// Install the collaborator behind [`Coded`](crate::value::Coded)
    pub fn with_coder(mut self, coder: Arc<dyn StructuredCoder>) -> Self {
        self.coder = Some(coder);
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn native(&self) -> &dyn NativeInterface {
        &*self.native
    }

    pub fn registry(&self) -> &EnvironmentRegistry {
        &self.registry
    }

    pub fn handles(&self) -> &HandleCache {
        &self.handles
    }

    pub fn exceptions(&self) -> &ExceptionBridge {
        &self.exceptions
    }

    pub fn coder(&self) -> Option<&dyn StructuredCoder> {
        self.coder.as_deref()
    }

    pub(crate) fn context_loader(&self) -> Option<&ContextLoader> {
        self.loader.get()
    }

    /// The calling thread's session, attaching the thread on first use
    #[track_caller]
    pub fn env(&self) -> BridgeResult<JniEnv<'_>> {
        let thread = ThreadKey::current();
        let env = self.registry.environment_for(thread)?;
        Ok(JniEnv::new(self, env, thread))
    }

    /// Register the environment the VM already gave the calling thread
    ///
    /// For threads that entered native code from the VM. The bridge never
    /// detaches them.
    #[track_caller]
    pub fn seed_current_thread(&self) -> BridgeResult<()> {
        let env = self
            .native
            .get_env()
            .map_err(|code| BridgeError::AttachmentFailure {
                code,
                location: Location::caller(),
            })?;
        self.registry.seed(ThreadKey::current(), env);
        Ok(())
    }

    /// Forget the calling thread, detaching it if the bridge attached it
    ///
    /// Hosts call this (or the closure from
    /// [`thread_exit_callback`](Self::thread_exit_callback)) as a native
    /// thread terminates. An undrained exception is discarded.
    pub fn thread_exited(&self) {
        let thread = ThreadKey::current();
        if let Some(env) = self.registry.lookup(thread) {
            self.exceptions.reset(env, thread);
        }
        self.registry.thread_exited(thread);
    }

    pub fn thread_exit_callback(self: &Arc<Self>) -> impl Fn() + Send + Sync + 'static {
        let bridge = Arc::clone(self);
        move || bridge.thread_exited()
    }

    /// Warm the well-known classes and, with
    /// [`ClassLookup::ContextClassLoader`], capture the calling thread's
    /// context class loader
    ///
    /// Must run on a thread whose context class loader sees the
    /// application's classes, normally the one running `JNI_OnLoad`.
    pub fn bootstrap(&self) -> BridgeResult<()> {
        let env = self.env()?;
        if let Err(e) = known::preload(&env) {
            debug!(error = %e, "well-known class unavailable at bootstrap");
        }
        if self.config.class_lookup == ClassLookup::ContextClassLoader {
            self.capture_context_loader(&env)?;
        }
        Ok(())
    }

    fn capture_context_loader(&self, env: &JniEnv<'_>) -> BridgeResult<()> {
        let thread_class = env.class(known::THREAD)?;
        let current = env.static_method(known::THREAD, "currentThread", "()Ljava/lang/Thread;")?;
        let get_loader = env.method(
            known::THREAD,
            "getContextClassLoader",
            "()Ljava/lang/ClassLoader;",
        )?;
        let load_class = env.method(
            known::CLASS_LOADER,
            "loadClass",
            "(Ljava/lang/String;)Ljava/lang/Class;",
        )?;

        let thread = env.call_static::<Option<ObjectRef>>(&thread_class, &current, &[]);
        env.rethrow()?;
        let thread = thread
            .map(|t| env.auto_local(t))
            .ok_or_else(|| BridgeError::config("Thread.currentThread returned null"))?;
        let loader = env.call::<Option<ObjectRef>>(thread.as_obj(), &get_loader, &[]);
        env.rethrow()?;
        let Some(loader) = loader.map(|l| env.auto_local(l)) else {
            warn!("thread has no context class loader, falling back to FindClass");
            return Ok(());
        };
        let global = self
            .native
            .new_global_ref(env.raw(), loader.as_obj())
            .ok_or_else(|| {
                env.park_exception();
                BridgeError::CantCreateObject(known::CLASS_LOADER.to_string())
            })?;

        let captured = ContextLoader {
            loader: global,
            load_class,
        };
        if let Err(extra) = self.loader.set(captured) {
            self.native.delete_global_ref(env.raw(), extra.loader);
            warn!("context class loader already captured");
        } else {
            debug!(loader = ?global, "captured context class loader");
        }
        Ok(())
    }

    /// Make this bridge the process-wide one
    pub fn install(self) -> BridgeResult<&'static Bridge> {
        let mut fresh = false;
        let installed = GLOBAL.get_or_init(|| {
            fresh = true;
            self
        });
        if !fresh {
            return Err(BridgeError::AlreadyInstalled);
        }
        Ok(installed)
    }

    pub fn global() -> Option<&'static Bridge> {
        GLOBAL.get()
    }
}

/// Body of a library's `JNI_OnLoad`
///
/// Wraps the VM, registers the loading thread (which the VM owns), warms the
/// bridge per `config`, installs it process-wide and returns the JNI version
/// to report. Returns `JNI_ERR` after logging if any step fails.
///
/// ```no_run
/// use javelin_core::{BridgeConfig, ClassLookup};
/// use javelin_core::javelin_sys::{JavaVM, jint};
/// use std::ffi::c_void;
///
/// #[unsafe(no_mangle)]
/// pub unsafe extern "system" fn JNI_OnLoad(vm: *mut JavaVM, _reserved: *mut c_void) -> jint {
///     let config = BridgeConfig::new().class_lookup(ClassLookup::ContextClassLoader);
///     unsafe { javelin_core::on_load(vm, config) }
/// }
/// ```
///
/// # Safety
/// `vm` must be the pointer the VM passed to `JNI_OnLoad`, and this must run
/// on the thread the VM called `JNI_OnLoad` on.
pub unsafe fn on_load(vm: *mut JavaVM, config: BridgeConfig) -> jint {
    // SAFETY: forwarded from the caller
    match unsafe { load(vm, config) } {
        Ok(version) => {
            info!(version = format_args!("{version:#x}"), "JNI bridge loaded");
            version
        }
        Err(e) => {
            error!(error = %e, "JNI_OnLoad failed");
            JNI_ERR
        }
    }
}

unsafe fn load(vm: *mut JavaVM, config: BridgeConfig) -> BridgeResult<jint> {
    config.validate()?;
    let version = config.jni_version;
    // SAFETY: `vm` comes straight from the VM's load callback
    let native = unsafe { JniNativeInterface::from_raw(vm, version) }
        .ok_or_else(|| BridgeError::config("JNI_OnLoad received a null JavaVM"))?;
    let bridge = Bridge::new(Arc::new(native), config);
    bridge.seed_current_thread()?;
    bridge.bootstrap()?;
    bridge.install()?;
    Ok(version)
}
