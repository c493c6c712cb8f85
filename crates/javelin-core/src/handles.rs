//! Memoized class, method and field handles
//!
//! Reflective lookups (`FindClass`, `GetMethodID`, ...) are slow, and their
//! results stay valid for the lifetime of the VM, so each one is resolved
//! once per key and shared by every thread afterwards.
//!
//! Each kind of handle has its own map and its own resolution lock. A read
//! goes straight to the map; only a miss takes the lock, re-checks, and
//! resolves. The lock serializes resolution of one kind, so N threads
//! missing the same key trigger a single VM lookup. Nothing is evicted.

use dashmap::DashMap;
use javelin_sys::{FieldId, JavaType, MethodId, ObjectRef};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::error::BridgeResult;

/// A resolved class, held as a VM global reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHandle {
    obj: ObjectRef,
    name: Arc<str>,
}

// Global references are valid on every thread until explicitly deleted,
// and cached class handles never are.
unsafe impl Send for ClassHandle {}
unsafe impl Sync for ClassHandle {}

impl ClassHandle {
    pub(crate) fn new(global: ObjectRef, name: &str) -> Self {
        Self {
            obj: global,
            name: name.into(),
        }
    }

    /// The global class reference
    pub fn as_obj(&self) -> ObjectRef {
        self.obj
    }

    /// Binary name, e.g. `java/lang/String`
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A resolved instance method or constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHandle {
    id: MethodId,
    ret: JavaType,
    arity: usize,
    key: Arc<str>,
}

unsafe impl Send for MethodHandle {}
unsafe impl Sync for MethodHandle {}

impl MethodHandle {
    pub(crate) fn new(id: MethodId, ret: JavaType, arity: usize, key: &MemberKey) -> Self {
        Self {
            id,
            ret,
            arity,
            key: key.as_str().into(),
        }
    }

    pub fn id(&self) -> MethodId {
        self.id
    }

    /// Return kind from the descriptor
    pub fn return_type(&self) -> JavaType {
        self.ret
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A resolved static method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticMethodHandle {
    id: MethodId,
    ret: JavaType,
    arity: usize,
    key: Arc<str>,
}

unsafe impl Send for StaticMethodHandle {}
unsafe impl Sync for StaticMethodHandle {}

impl StaticMethodHandle {
    pub(crate) fn new(id: MethodId, ret: JavaType, arity: usize, key: &MemberKey) -> Self {
        Self {
            id,
            ret,
            arity,
            key: key.as_str().into(),
        }
    }

    pub fn id(&self) -> MethodId {
        self.id
    }

    pub fn return_type(&self) -> JavaType {
        self.ret
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A resolved instance field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHandle {
    id: FieldId,
    ty: JavaType,
    key: Arc<str>,
}

unsafe impl Send for FieldHandle {}
unsafe impl Sync for FieldHandle {}

impl FieldHandle {
    pub(crate) fn new(id: FieldId, ty: JavaType, key: &MemberKey) -> Self {
        Self {
            id,
            ty,
            key: key.as_str().into(),
        }
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn field_type(&self) -> JavaType {
        self.ty
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Cache key of a member: `<class>.<name><signature>`
///
/// Member names cannot contain `.`, `;`, `[`, `/` or `(`, and signatures
/// start with `(` or a type character, so distinct triples never produce
/// the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey(String);

impl MemberKey {
    pub fn new(class: &str, name: &str, sig: &str) -> Self {
        Self(format!("{class}.{name}{sig}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entry counts per handle kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub classes: usize,
    pub methods: usize,
    pub static_methods: usize,
    pub fields: usize,
}

#[derive(Default)]
pub struct HandleCache {
    classes: DashMap<String, ClassHandle>,
    methods: DashMap<String, MethodHandle>,
    static_methods: DashMap<String, StaticMethodHandle>,
    fields: DashMap<String, FieldHandle>,
    class_lock: Mutex<()>,
    method_lock: Mutex<()>,
    static_method_lock: Mutex<()>,
    field_lock: Mutex<()>,
}

// Clone out so the shard guard is released before any lock is taken
fn peek<V: Clone>(map: &DashMap<String, V>, key: &str) -> Option<V> {
    map.get(key).map(|entry| entry.value().clone())
}

/// Double-checked lookup: map read, then lock, re-check, resolve, publish
fn memoize<V: Clone>(
    map: &DashMap<String, V>,
    lock: &Mutex<()>,
    key: &str,
    resolve: impl FnOnce() -> BridgeResult<V>,
) -> BridgeResult<V> {
    if let Some(hit) = peek(map, key) {
        return Ok(hit);
    }
    let _guard = lock.lock();
    if let Some(hit) = peek(map, key) {
        return Ok(hit);
    }
    let value = resolve()?;
    map.insert(key.to_string(), value.clone());
    Ok(value)
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn class_or_resolve(
        &self,
        name: &str,
        resolve: impl FnOnce() -> BridgeResult<ClassHandle>,
    ) -> BridgeResult<ClassHandle> {
        memoize(&self.classes, &self.class_lock, name, resolve)
    }

    pub(crate) fn method_or_resolve(
        &self,
        key: &MemberKey,
        resolve: impl FnOnce() -> BridgeResult<MethodHandle>,
    ) -> BridgeResult<MethodHandle> {
        memoize(&self.methods, &self.method_lock, key.as_str(), resolve)
    }

    pub(crate) fn static_method_or_resolve(
        &self,
        key: &MemberKey,
        resolve: impl FnOnce() -> BridgeResult<StaticMethodHandle>,
    ) -> BridgeResult<StaticMethodHandle> {
        memoize(
            &self.static_methods,
            &self.static_method_lock,
            key.as_str(),
            resolve,
        )
    }

    pub(crate) fn field_or_resolve(
        &self,
        key: &MemberKey,
        resolve: impl FnOnce() -> BridgeResult<FieldHandle>,
    ) -> BridgeResult<FieldHandle> {
        memoize(&self.fields, &self.field_lock, key.as_str(), resolve)
    }

    /// Cached class handle without resolving
    pub fn cached_class(&self, name: &str) -> Option<ClassHandle> {
        peek(&self.classes, name)
    }

    pub fn cached_method(&self, key: &MemberKey) -> Option<MethodHandle> {
        peek(&self.methods, key.as_str())
    }

    pub fn cached_static_method(&self, key: &MemberKey) -> Option<StaticMethodHandle> {
        peek(&self.static_methods, key.as_str())
    }

    pub fn cached_field(&self, key: &MemberKey) -> Option<FieldHandle> {
        peek(&self.fields, key.as_str())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            classes: self.classes.len(),
            methods: self.methods.len(),
            static_methods: self.static_methods.len(),
            fields: self.fields.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::ptr;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn fake_class(addr: usize, name: &str) -> ClassHandle {
        let obj = unsafe { ObjectRef::from_raw(ptr::without_provenance_mut(addr)) }.unwrap();
        ClassHandle::new(obj, name)
    }

    fn fake_method(addr: usize, key: &MemberKey) -> MethodHandle {
        let id = unsafe { MethodId::from_raw(ptr::without_provenance_mut(addr)) }.unwrap();
        MethodHandle::new(id, JavaType::Void, 0, key)
    }

    #[test]
    fn test_member_key_format() {
        let key = MemberKey::new("java/lang/Integer", "<init>", "(I)V");
        assert_eq!(key.as_str(), "java/lang/Integer.<init>(I)V");
        assert_ne!(
            MemberKey::new("a/B", "f", "(I)V"),
            MemberKey::new("a/B", "f", "(J)V")
        );
    }

    #[test]
    fn test_resolves_once() {
        let cache = HandleCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let handle = cache
                .class_or_resolve("java/lang/String", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(fake_class(0x10, "java/lang/String"))
                })
                .unwrap();
            assert_eq!(handle.name(), "java/lang/String");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().classes, 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = HandleCache::new();
        let err = cache
            .class_or_resolve("a/Missing", || Err(BridgeError::ClassNotFound("a/Missing".into())))
            .unwrap_err();
        assert!(matches!(err, BridgeError::ClassNotFound(_)));
        assert!(cache.cached_class("a/Missing").is_none());

        let handle = cache
            .class_or_resolve("a/Missing", || Ok(fake_class(0x20, "a/Missing")))
            .unwrap();
        assert_eq!(handle.as_obj().addr(), 0x20);
    }

    #[test]
    fn test_concurrent_resolution_is_single_flight() {
        let cache = HandleCache::new();
        let calls = AtomicUsize::new(0);
        let threads = 8;
        let barrier = Barrier::new(threads);

        let handles: Vec<ClassHandle> = thread::scope(|s| {
            let workers: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache
                            .class_or_resolve("java/lang/Integer", || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(20));
                                Ok(fake_class(0x30, "java/lang/Integer"))
                            })
                            .unwrap()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|h| *h == handles[0]));
    }

    #[test]
    fn test_overloads_do_not_collide() {
        let cache = HandleCache::new();
        let int_key = MemberKey::new("java/lang/Integer", "<init>", "(I)V");
        let str_key = MemberKey::new("java/lang/Integer", "<init>", "(Ljava/lang/String;)V");
        let a = cache
            .method_or_resolve(&int_key, || Ok(fake_method(0x40, &int_key)))
            .unwrap();
        let b = cache
            .method_or_resolve(&str_key, || Ok(fake_method(0x50, &str_key)))
            .unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(cache.stats().methods, 2);
        assert_eq!(b.key(), "java/lang/Integer.<init>(Ljava/lang/String;)V");
    }
}
