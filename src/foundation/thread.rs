use std::thread::{self, ThreadId};

/// Records the thread allowed to mutate a structure and asserts on every mutation.
///
/// Calling a mutating operation from any other thread is a programming error and
/// panics in every build profile.
#[derive(Debug, Clone, Copy)]
pub struct OwnerThread {
    owner: ThreadId,
}

impl OwnerThread {
    /// Bind to the calling thread.
    pub fn current() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    pub fn id(&self) -> ThreadId {
        self.owner
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    #[track_caller]
    pub fn assert_current(&self, op: &str) {
        assert!(
            self.is_current(),
            "{op} called from {:?}, but the owner thread is {:?}",
            thread::current().id(),
            self.owner
        );
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/thread.rs"]
mod tests;
