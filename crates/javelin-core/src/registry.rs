//! Per-thread environment tracking
//!
//! Every thread that calls into the VM needs its own `JNIEnv`. The registry
//! looks one up lazily, attaching the thread if the VM does not know it
//! yet, and detaches on thread exit. Threads the VM already owned before
//! the bridge saw them (Java threads calling down into native code, the
//! thread running `JNI_OnLoad`) are recorded as borrowed and never
//! detached by the bridge.

use javelin_sys::{Env, NativeInterface};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{BridgeError, BridgeResult};
use crate::thread::ThreadKey;

struct EnvEntry {
    env: Env,
    /// Attached by the bridge, so the bridge detaches it
    owned: bool,
}

// The map only stores the handle; it is handed back exclusively to the
// thread named by the key.
unsafe impl Send for EnvEntry {}

pub struct EnvironmentRegistry {
    native: Arc<dyn NativeInterface>,
    entries: Mutex<HashMap<ThreadKey, EnvEntry>>,
}

impl EnvironmentRegistry {
    pub fn new(native: Arc<dyn NativeInterface>) -> Self {
        Self {
            native,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Environment of the calling thread, attaching it on first use
    ///
    /// `thread` must be [`ThreadKey::current()`]: attaching always acts on
    /// the calling thread.
    #[track_caller]
    pub fn environment_for(&self, thread: ThreadKey) -> BridgeResult<Env> {
        debug_assert_eq!(thread, ThreadKey::current());

        if let Some(entry) = self.entries.lock().get(&thread) {
            return Ok(entry.env);
        }

        // Only this thread inserts its own key, so the lock can be dropped
        // across the (blocking) attach.
        let (env, owned) = match self.native.get_env() {
            Ok(env) => (env, false),
            Err(_) => match self.native.attach_current_thread() {
                Ok(env) => (env, true),
                Err(code) => {
                    let location = Location::caller();
                    error!(
                        code,
                        file = location.file(),
                        line = location.line(),
                        "failed to attach thread to the VM"
                    );
                    return Err(BridgeError::AttachmentFailure { code, location });
                }
            },
        };

        debug!(?thread, ?env, owned, "registered thread environment");
        self.entries.lock().insert(thread, EnvEntry { env, owned });
        Ok(env)
    }

    /// Record an environment obtained outside the registry, such as the
    /// one handed to the load hook. Seeded environments are borrowed.
    pub fn seed(&self, thread: ThreadKey, env: Env) {
        debug!(?thread, ?env, "seeded thread environment");
        self.entries
            .lock()
            .insert(thread, EnvEntry { env, owned: false });
    }

    /// Environment of `thread` if one is registered, without attaching
    pub fn lookup(&self, thread: ThreadKey) -> Option<Env> {
        self.entries.lock().get(&thread).map(|entry| entry.env)
    }

    /// Forget `thread`, detaching it if the bridge attached it
    ///
    /// Must run on the exiting thread itself.
    pub fn thread_exited(&self, thread: ThreadKey) {
        debug_assert_eq!(thread, ThreadKey::current());
        let Some(entry) = self.entries.lock().remove(&thread) else {
            return;
        };
        if entry.owned {
            let status = self.native.detach_current_thread();
            debug!(?thread, status, "detached thread from the VM");
        } else {
            debug!(?thread, "released borrowed thread environment");
        }
    }

    /// Number of registered threads
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
