//! Class and member resolution through the handle cache
//!
//! A miss resolves against the VM and publishes the handle; a hit never
//! touches the VM. Failed lookups leave nothing in the cache and nothing
//! pending: the VM's `NoClassDefFoundError`/`NoSuchMethodError` is cleared
//! and reported as [`BridgeError::ClassNotFound`] or
//! [`BridgeError::MemberNotFound`].

use javelin_sys::{DescriptorError, MethodDescriptor, ObjectRef, parse_field_descriptor};
use tracing::{debug, warn};

use crate::config::ClassLookup;
use crate::env::JniEnv;
use crate::error::{BridgeError, BridgeResult};
use crate::handles::{ClassHandle, FieldHandle, MemberKey, MethodHandle, StaticMethodHandle};
use crate::invoke::Arg;

fn method_descriptor(key: &MemberKey, sig: &str) -> BridgeResult<MethodDescriptor> {
    MethodDescriptor::parse(sig).map_err(|source| BridgeError::InvalidDescriptor {
        key: key.to_string(),
        source,
    })
}

impl<'b> JniEnv<'b> {
    /// Drop whatever a failed lookup left pending
    fn clear_lookup_failure(&self) {
        if self.native().exception_check(self.raw()) {
            self.native().exception_clear(self.raw());
        }
        self.bridge().exceptions().reset(self.raw(), self.thread());
    }

    /// Class handle for a binary name such as `java/lang/Integer`
    pub fn class(&self, name: &str) -> BridgeResult<ClassHandle> {
        self.bridge()
            .handles()
            .class_or_resolve(name, || self.resolve_class(name))
    }

    fn resolve_class(&self, name: &str) -> BridgeResult<ClassHandle> {
        let local = match self.bridge().config().class_lookup {
            ClassLookup::ContextClassLoader => match self.bridge().context_loader() {
                Some(loader) => {
                    self.load_with_context_loader(loader.as_obj(), loader.load_class(), name)
                }
                None => {
                    debug!(class = name, "no context class loader captured, using FindClass");
                    self.native().find_class(self.raw(), name)
                }
            },
            ClassLookup::FindClass => self.native().find_class(self.raw(), name),
        };
        let Some(local) = local else {
            self.clear_lookup_failure();
            warn!(class = name, "class lookup failed");
            return Err(BridgeError::ClassNotFound(name.to_string()));
        };

        let global = self.native().new_global_ref(self.raw(), local);
        self.delete_local_ref(local);
        let Some(global) = global else {
            self.clear_lookup_failure();
            warn!(class = name, "no global reference for resolved class");
            return Err(BridgeError::ClassNotFound(name.to_string()));
        };
        debug!(class = name, ?global, "resolved class");
        Ok(ClassHandle::new(global, name))
    }

    fn load_with_context_loader(
        &self,
        loader: ObjectRef,
        load_class: &MethodHandle,
        name: &str,
    ) -> Option<ObjectRef> {
        // ClassLoader.loadClass takes dotted names
        let dotted = name.replace('/', ".");
        let class = self.call::<Option<ObjectRef>>(loader, load_class, &[Arg::Str(&dotted)]);
        if let Some(raised) = self.take_exception() {
            debug!(class = name, ?raised, "loadClass raised");
            return None;
        }
        class
    }

    /// Instance method (or constructor) handle
    pub fn method(&self, class: &str, name: &str, sig: &str) -> BridgeResult<MethodHandle> {
        let handles = self.bridge().handles();
        let key = MemberKey::new(class, name, sig);
        if let Some(hit) = handles.cached_method(&key) {
            return Ok(hit);
        }
        let desc = method_descriptor(&key, sig)?;
        let owner = self.class(class)?;
        handles.method_or_resolve(&key, || {
            match self.native().get_method_id(self.raw(), owner.as_obj(), name, sig) {
                Some(id) => Ok(MethodHandle::new(id, desc.ret, desc.args.len(), &key)),
                None => Err(self.member_not_found(&key)),
            }
        })
    }

    pub fn static_method(
        &self,
        class: &str,
        name: &str,
        sig: &str,
    ) -> BridgeResult<StaticMethodHandle> {
        let handles = self.bridge().handles();
        let key = MemberKey::new(class, name, sig);
        if let Some(hit) = handles.cached_static_method(&key) {
            return Ok(hit);
        }
        let desc = method_descriptor(&key, sig)?;
        let owner = self.class(class)?;
        handles.static_method_or_resolve(&key, || {
            match self
                .native()
                .get_static_method_id(self.raw(), owner.as_obj(), name, sig)
            {
                Some(id) => Ok(StaticMethodHandle::new(id, desc.ret, desc.args.len(), &key)),
                None => Err(self.member_not_found(&key)),
            }
        })
    }

    pub fn field(&self, class: &str, name: &str, sig: &str) -> BridgeResult<FieldHandle> {
        let handles = self.bridge().handles();
        let key = MemberKey::new(class, name, sig);
        if let Some(hit) = handles.cached_field(&key) {
            return Ok(hit);
        }
        let ty = parse_field_descriptor(sig).map_err(|source| BridgeError::InvalidDescriptor {
            key: key.to_string(),
            source,
        })?;
        let owner = self.class(class)?;
        handles.field_or_resolve(&key, || {
            match self.native().get_field_id(self.raw(), owner.as_obj(), name, sig) {
                Some(id) => Ok(FieldHandle::new(id, ty, &key)),
                None => Err(self.member_not_found(&key)),
            }
        })
    }

    fn member_not_found(&self, key: &MemberKey) -> BridgeError {
        self.clear_lookup_failure();
        warn!(%key, "member lookup failed");
        BridgeError::MemberNotFound(key.to_string())
    }

    /// `<init>` with the given descriptor, which must return `V`
    pub fn constructor(&self, class: &str, sig: &str) -> BridgeResult<MethodHandle> {
        if !sig.ends_with(")V") {
            return Err(BridgeError::InvalidDescriptor {
                key: MemberKey::new(class, "<init>", sig).to_string(),
                source: DescriptorError::ConstructorReturn(sig.to_string()),
            });
        }
        self.method(class, "<init>", sig)
    }

    pub fn empty_constructor(&self, class: &str) -> BridgeResult<MethodHandle> {
        self.constructor(class, "()V")
    }
}
