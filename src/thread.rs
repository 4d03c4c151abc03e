//! Spawn-join functionality for benchmark workers.
//!
//! **You may not need to check this if it is OK to run workers with [`std::thread`].**
//!
//! Stores are usually passive, but a store may run its own active threads and want the workers
//! scheduled alongside them (for example on a runtime it controls). Such a store returns its own
//! [`Thread`] from [`KVStore::thread`](crate::KVStore::thread), and its join handle implements
//! [`JoinHandle`].
//!
//! Workers report their results through shared state, so spawned closures have no return value.

/// A join handle returned by a spawn function.
pub trait JoinHandle {
    /// Join the thread, consume the boxed self.
    fn join(self: Box<Self>);
}

/// A thread management abstraction.
pub trait Thread: Send + Sync {
    /// Spawn a new thread using a boxed closure.
    fn spawn(&self, f: Box<dyn FnOnce() + Send>) -> Box<dyn JoinHandle>;

    /// Yield the current thread.
    fn yield_now(&self);

    /// Pin the current thread to a certain CPU core.
    fn pin(&self, core: usize);
}

/// A zero-sized wrapper for [`std::thread`] functions.
#[derive(Clone)]
pub struct DefaultThread;

/// A wrapper for [`std::thread::JoinHandle`].
pub struct DefaultJoinHandle(std::thread::JoinHandle<()>);

impl JoinHandle for DefaultJoinHandle {
    fn join(self: Box<Self>) {
        let handle = self.0;
        assert!(handle.join().is_ok(), "benchmark worker panicked");
    }
}

impl Thread for DefaultThread {
    fn spawn(&self, f: Box<dyn FnOnce() + Send>) -> Box<dyn JoinHandle> {
        let handle = std::thread::spawn(f);
        Box::new(DefaultJoinHandle(handle))
    }

    fn yield_now(&self) {
        std::thread::yield_now();
    }

    /// Pinning is best effort: on platforms without affinity support the thread stays unpinned.
    fn pin(&self, core: usize) {
        let Some(cores) = core_affinity::get_core_ids() else {
            return;
        };
        if cores.is_empty() {
            return;
        }
        core_affinity::set_for_current(cores[core % cores.len()]);
    }
}
