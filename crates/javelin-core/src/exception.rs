//! Capture of VM exceptions across the native boundary
//!
//! JNI requires a pending exception to be handled before almost any other
//! call on the same thread. After every native call the bridge moves the
//! throwable out of the VM's exception slot into a per-thread parking spot,
//! leaving the VM clean. The caller decides later whether to inspect it,
//! rethrow it as a [`BridgeError`](crate::BridgeError), or ignore it.
//!
//! Per thread the state is either empty or holds one throwable. A second
//! capture before a drain replaces the first; the replaced reference is
//! released and the discard is logged.

use javelin_sys::{Env, NativeInterface, ObjectRef};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::thread::ThreadKey;

/// A global reference to a throwable, parked for the thread that raised it.
/// Global so it survives the native frame that captured it.
struct Parked(ObjectRef);

// Handed back only to the thread named by its key.
unsafe impl Send for Parked {}

pub struct ExceptionBridge {
    native: Arc<dyn NativeInterface>,
    describe: bool,
    pending: Mutex<HashMap<ThreadKey, Parked>>,
}

impl ExceptionBridge {
    pub fn new(native: Arc<dyn NativeInterface>, describe: bool) -> Self {
        Self {
            native,
            describe,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Move a pending VM exception, if any, into the parking spot of
    /// `thread`. Returns whether one was captured.
    pub fn capture(&self, env: Env, thread: ThreadKey) -> bool {
        if !self.native.exception_check(env) {
            return false;
        }
        let throwable = self.native.exception_occurred(env);
        if self.describe {
            self.native.exception_describe(env);
        }
        self.native.exception_clear(env);

        let Some(throwable) = throwable else {
            return false;
        };
        let global = self.native.new_global_ref(env, throwable);
        self.native.delete_local_ref(env, throwable);
        let Some(global) = global else {
            // NewGlobalRef may raise on its own when the VM is out of memory
            self.native.exception_clear(env);
            warn!(?thread, "VM exception lost, no global reference for it");
            return false;
        };
        debug!(?thread, throwable = ?global, "captured VM exception");
        let older = self.pending.lock().insert(thread, Parked(global));
        if let Some(Parked(older)) = older {
            warn!(
                ?thread,
                discarded = ?older,
                "pending exception overwritten before it was drained"
            );
            self.native.delete_global_ref(env, older);
        }
        true
    }

    /// Take the parked exception of `thread` as a local reference of `env`,
    /// owned by the caller
    pub fn drain(&self, env: Env, thread: ThreadKey) -> Option<ObjectRef> {
        let Parked(global) = self.pending.lock().remove(&thread)?;
        let local = self.native.new_local_ref(env, global);
        self.native.delete_global_ref(env, global);
        if local.is_none() {
            self.native.exception_clear(env);
            warn!(?thread, "parked exception lost, no local reference for it");
        }
        local
    }

    /// Discard a leftover exception of `thread`
    pub fn reset(&self, env: Env, thread: ThreadKey) {
        let leftover = self.pending.lock().remove(&thread);
        if let Some(Parked(leftover)) = leftover {
            warn!(
                ?thread,
                discarded = ?leftover,
                "discarding exception left over from an earlier call"
            );
            self.native.delete_global_ref(env, leftover);
        }
    }

    pub fn has_pending(&self, thread: ThreadKey) -> bool {
        self.pending.lock().contains_key(&thread)
    }
}
