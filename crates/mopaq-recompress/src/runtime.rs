//! Thread and lock capabilities used by the pipeline
//!
//! The pipeline never touches `std::thread` or a mutex type directly. It asks
//! a [`ThreadRuntime`] to spawn and join workers and to create locks, so a
//! platform or a test can swap in its own primitives. Releasing a lock is
//! dropping the guard returned by [`RuntimeLock::acquire`].

use parking_lot::{Mutex, MutexGuard};
use std::ops::DerefMut;
use std::thread::{self, JoinHandle};

/// A lock protecting one value
pub trait RuntimeLock<T>: Send + Sync {
    /// Exclusive access; released on drop
    type Guard<'a>: DerefMut<Target = T>
    where
        Self: 'a;

    /// Block until the lock is held
    fn acquire(&self) -> Self::Guard<'_>;
}

/// Spawn, join and lock creation
pub trait ThreadRuntime: Send + Sync {
    /// Handle of a spawned task
    type Handle;

    /// Lock type handed out by [`Self::create_lock`]
    type Lock<T: Send>: RuntimeLock<T>;

    /// Start `task` on a new thread named `name`
    fn spawn<F>(&self, name: String, task: F) -> std::io::Result<Self::Handle>
    where
        F: FnOnce() + Send + 'static;

    /// Wait for a task; `false` if it panicked
    fn join(&self, handle: Self::Handle) -> bool;

    /// New lock around `value`
    fn create_lock<T: Send>(&self, value: T) -> Self::Lock<T>;
}

impl<T: Send> RuntimeLock<T> for Mutex<T> {
    type Guard<'a>
        = MutexGuard<'a, T>
    where
        Self: 'a;

    fn acquire(&self) -> Self::Guard<'_> {
        self.lock()
    }
}

/// Operating-system threads with `parking_lot` mutexes
#[derive(Debug, Clone, Copy, Default)]
pub struct OsThreads;

impl ThreadRuntime for OsThreads {
    type Handle = JoinHandle<()>;
    type Lock<T: Send> = Mutex<T>;

    fn spawn<F>(&self, name: String, task: F) -> std::io::Result<Self::Handle>
    where
        F: FnOnce() + Send + 'static,
    {
        thread::Builder::new().name(name).spawn(task)
    }

    fn join(&self, handle: Self::Handle) -> bool {
        handle.join().is_ok()
    }

    fn create_lock<T: Send>(&self, value: T) -> Self::Lock<T> {
        Mutex::new(value)
    }
}
