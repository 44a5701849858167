//! The process-wide event-logging framework.
//!
//! Notifications are cheap no-ops while logging is disabled, and never
//! propagate failures to the caller: a topology or I/O failure disables
//! logging and is observed through [`is_enabled`]. The `D2_REPOSITORY`
//! environment variable, when set, selects the repository and enables
//! logging the first time the framework is touched.

mod dispatcher;
mod segments;

use crate::core::errors::RuntimeError;
use crate::core::events::{AcquireEvent, Event, JoinEvent, ReleaseEvent, SegmentHopEvent, StartEvent};
use crate::core::types::{AcquireInfo, LockId, ThreadId};
use dispatcher::FilesystemDispatcher;
use segments::SegmentAllocator;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) struct Framework {
    enabled: AtomicBool,
    allocator: SegmentAllocator,
    dispatcher: FilesystemDispatcher,
}

lazy_static::lazy_static! {
    static ref FRAMEWORK: Framework = Framework::bootstrap();
}

impl Framework {
    fn new() -> Self {
        Framework {
            enabled: AtomicBool::new(false),
            allocator: SegmentAllocator::default(),
            dispatcher: FilesystemDispatcher::default(),
        }
    }

    fn bootstrap() -> Self {
        let framework = Framework::new();
        if let Ok(path) = std::env::var("D2_REPOSITORY") {
            if framework.set_repository(Path::new(&path)).is_ok() {
                framework.enable();
            }
        }
        framework
    }

    fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    // The notification fast path; a disabled framework must not allocate.
    fn should_log(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn set_repository(&self, path: &Path) -> Result<(), RuntimeError> {
        self.dispatcher.set_repository(path)
    }

    fn unset_repository(&self) {
        self.dispatcher.unset_repository();
    }

    fn dispatch(&self, event: Event) {
        if self.dispatcher.dispatch(&event).is_err() {
            self.disable();
        }
    }

    fn notify_acquire(&self, thread: ThreadId, lock: LockId, info: AcquireInfo, recursive: bool) {
        if !self.should_log() {
            return;
        }
        let event = AcquireEvent { thread, lock, info };
        self.dispatch(if recursive {
            Event::RecursiveAcquire(event)
        } else {
            Event::Acquire(event)
        });
    }

    fn notify_release(&self, thread: ThreadId, lock: LockId, recursive: bool) {
        if !self.should_log() {
            return;
        }
        let event = ReleaseEvent { thread, lock };
        self.dispatch(if recursive {
            Event::RecursiveRelease(event)
        } else {
            Event::Release(event)
        });
    }

    fn notify_start(&self, parent: ThreadId, child: ThreadId) {
        if !self.should_log() {
            return;
        }
        match self.allocator.on_start(parent, child) {
            Ok(segments) => {
                // The events are dispatched outside of the allocator's mutex.
                self.dispatch(Event::Start(StartEvent {
                    parent: segments.parent,
                    new_parent: segments.new_parent,
                    child: segments.child,
                }));
                self.dispatch(Event::SegmentHop(SegmentHopEvent {
                    thread: parent,
                    segment: segments.new_parent,
                }));
                self.dispatch(Event::SegmentHop(SegmentHopEvent {
                    thread: child,
                    segment: segments.child,
                }));
            }
            Err(_) => self.disable(),
        }
    }

    fn notify_join(&self, parent: ThreadId, child: ThreadId) {
        if !self.should_log() {
            return;
        }
        match self.allocator.on_join(parent, child) {
            Ok(segments) => {
                self.dispatch(Event::Join(JoinEvent {
                    parent: segments.parent,
                    new_parent: segments.new_parent,
                    child: segments.child,
                }));
                self.dispatch(Event::SegmentHop(SegmentHopEvent {
                    thread: parent,
                    segment: segments.new_parent,
                }));
            }
            Err(_) => self.disable(),
        }
    }
}

/// Set the repository into which events are written while logging is
/// enabled, creating the directory if it does not exist.
///
/// The operation is atomic with respect to concurrent notifications.
pub fn set_log_repository(path: impl AsRef<Path>) -> Result<(), RuntimeError> {
    FRAMEWORK.set_repository(path.as_ref())
}

/// Drop the current repository, flushing and closing its streams. Subsequent
/// notifications are discarded until a repository is set again.
pub fn unset_log_repository() {
    FRAMEWORK.unset_repository();
}

/// Enable the logging of events. Idempotent.
pub fn enable_event_logging() {
    FRAMEWORK.enable();
}

/// Disable the logging of events. Idempotent.
pub fn disable_event_logging() {
    FRAMEWORK.disable();
}

/// Whether events are currently being logged.
pub fn is_enabled() -> bool {
    FRAMEWORK.is_enabled()
}

/// Whether the logging of events is currently disabled.
pub fn is_disabled() -> bool {
    !is_enabled()
}

/// Notify the system that `thread` acquired `lock`.
pub fn notify_acquire(thread: ThreadId, lock: LockId) {
    FRAMEWORK.notify_acquire(thread, lock, AcquireInfo::default(), false);
}

/// Notify the system that `thread` acquired `lock`, with diagnostic metadata
/// about the acquisition site.
pub fn notify_acquire_at(thread: ThreadId, lock: LockId, info: AcquireInfo) {
    FRAMEWORK.notify_acquire(thread, lock, info, false);
}

/// Notify the system that `thread` released `lock`.
pub fn notify_release(thread: ThreadId, lock: LockId) {
    FRAMEWORK.notify_release(thread, lock, false);
}

/// Notify the system that `thread` acquired the re-entrant `lock`.
pub fn notify_recursive_acquire(thread: ThreadId, lock: LockId) {
    FRAMEWORK.notify_acquire(thread, lock, AcquireInfo::default(), true);
}

/// Notify the system that `thread` acquired the re-entrant `lock`, with
/// diagnostic metadata about the acquisition site.
pub fn notify_recursive_acquire_at(thread: ThreadId, lock: LockId, info: AcquireInfo) {
    FRAMEWORK.notify_acquire(thread, lock, info, true);
}

/// Notify the system that `thread` released the re-entrant `lock`.
pub fn notify_recursive_release(thread: ThreadId, lock: LockId) {
    FRAMEWORK.notify_release(thread, lock, true);
}

/// Notify the system that `parent` started the thread `child`.
pub fn notify_start(parent: ThreadId, child: ThreadId) {
    FRAMEWORK.notify_start(parent, child);
}

/// Notify the system that `parent` joined the thread `child`.
pub fn notify_join(parent: ThreadId, child: ThreadId) {
    FRAMEWORK.notify_join(parent, child);
}
