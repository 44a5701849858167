//! Mock lockables and threads driving the notification API, plus a harness
//! that records a scenario into a temporary repository and analyzes it.
//!
//! The event-logging framework is process-wide, so each scenario lives in
//! its own test file.

use d2::{PotentialDeadlock, Repository, SyncSkeleton};
use tempfile::TempDir;

// Not every scenario exercises every mock.
#[allow(dead_code)]
pub mod mock {
    use d2::{LockId, ThreadId};
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::JoinHandle;

    static NEXT_LOCK_ID: AtomicUsize = AtomicUsize::new(1);
    static NEXT_THREAD_ID: AtomicUsize = AtomicUsize::new(1);

    thread_local! {
        // The main thread is thread 0; children are assigned ids at spawn.
        static CURRENT_THREAD: Cell<ThreadId> = const { Cell::new(0) };
    }

    pub fn current_thread() -> ThreadId {
        CURRENT_THREAD.get()
    }

    /// A lockable that only notifies the detector; it provides no actual
    /// mutual exclusion, which keeps scenarios deadlock-free to run.
    #[derive(Debug)]
    pub struct Mutex {
        id: LockId,
    }

    impl Mutex {
        #[allow(clippy::new_without_default)]
        pub fn new() -> Self {
            Mutex {
                id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
            }
        }

        pub fn id(&self) -> LockId {
            self.id
        }

        pub fn lock(&self) {
            d2::notify_acquire(current_thread(), self.id);
        }

        pub fn unlock(&self) {
            d2::notify_release(current_thread(), self.id);
        }
    }

    /// The re-entrant flavor of [`Mutex`].
    #[derive(Debug)]
    pub struct RecursiveMutex {
        id: LockId,
    }

    impl RecursiveMutex {
        #[allow(clippy::new_without_default)]
        pub fn new() -> Self {
            RecursiveMutex {
                id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
            }
        }

        pub fn id(&self) -> LockId {
            self.id
        }

        pub fn lock(&self) {
            d2::notify_recursive_acquire(current_thread(), self.id);
        }

        pub fn unlock(&self) {
            d2::notify_recursive_release(current_thread(), self.id);
        }
    }

    /// A thread wrapper notifying the detector of its start and join.
    pub struct Thread {
        id: ThreadId,
        handle: JoinHandle<()>,
    }

    impl Thread {
        pub fn spawn(f: impl FnOnce() + Send + 'static) -> Thread {
            let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
            // The start is logged before the child can emit any event of
            // its own, so the hop into its first segment comes first in its
            // stream.
            d2::notify_start(current_thread(), id);
            let handle = std::thread::spawn(move || {
                CURRENT_THREAD.set(id);
                f();
            });
            Thread { id, handle }
        }

        pub fn join(self) {
            self.handle.join().expect("mock thread panicked");
            d2::notify_join(current_thread(), self.id);
        }
    }
}

/// Record `scenario` into a fresh repository, then read the repository back
/// and build the skeleton. The repository directory is returned alongside so
/// it outlives the analysis.
#[allow(dead_code)]
pub fn check_scenario(scenario: impl FnOnce()) -> (SyncSkeleton, TempDir) {
    let directory = tempfile::tempdir().expect("unable to create a repository directory");

    d2::set_log_repository(directory.path()).expect("unable to set the repository");
    d2::enable_event_logging();
    scenario();
    d2::disable_event_logging();
    d2::unset_log_repository();

    let repository = Repository::open(directory.path()).expect("unable to reopen the repository");
    let skeleton = SyncSkeleton::from_repository(&repository).expect("analysis failed");
    (skeleton, directory)
}

/// Shorthand for scenarios that only care about the reported deadlocks.
#[allow(dead_code)]
pub fn deadlocks_of(scenario: impl FnOnce()) -> Vec<PotentialDeadlock> {
    let (skeleton, _directory) = check_scenario(scenario);
    skeleton.deadlocks()
}
