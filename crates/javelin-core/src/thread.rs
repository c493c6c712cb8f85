use std::thread::{self, ThreadId};

/// Identity of an OS thread calling into the bridge
///
/// Always queried explicitly with [`ThreadKey::current`]; the bridge keeps
/// per-thread state in shared maps keyed by this value rather than in
/// thread-local storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadKey(ThreadId);

impl ThreadKey {
    pub fn current() -> Self {
        Self(thread::current().id())
    }

    pub fn id(self) -> ThreadId {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_per_thread() {
        let here = ThreadKey::current();
        assert_eq!(here, ThreadKey::current());
        let there = thread::spawn(ThreadKey::current).join().unwrap();
        assert_ne!(here, there);
    }
}
