//! C API of the d2 event-logging runtime.
//!
//! This module exposes the notification interface with a stable C ABI so
//! instrumented programs written in other languages can produce d2
//! repositories. It mirrors the Rust API in `d2::notify_*`; the analysis
//! side has no C interface, traces are analyzed with the `d2` command-line
//! tool instead.

use crate::core;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};

/// Set the path of the repository into which events are written when
/// logging is enabled. The directory is created if it does not exist.
///
/// # Returns
/// * `0` if the operation succeeded
/// * `1` if the repository could not be created or opened
/// * `-1` if `path` is NULL or not valid UTF-8
///
/// # Safety
/// `path` must be either NULL or a valid null-terminated string that stays
/// alive for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn d2_set_log_repository(path: *const c_char) -> c_int {
    if path.is_null() {
        return -1;
    }
    let path = unsafe { CStr::from_ptr(path) };
    let Ok(path) = path.to_str() else {
        return -1;
    };
    match core::set_log_repository(path) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Drop the current repository, flushing and closing its streams.
///
/// # Safety
/// Safe to call from any thread; provided as `unsafe extern "C"` only
/// because it is part of the FFI surface.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn d2_unset_log_repository() {
    core::unset_log_repository();
}

/// Enable the logging of events. Idempotent.
///
/// # Safety
/// Safe to call from any thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn d2_enable_event_logging() {
    core::enable_event_logging();
}

/// Disable the logging of events. Idempotent.
///
/// # Safety
/// Safe to call from any thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn d2_disable_event_logging() {
    core::disable_event_logging();
}

/// Return `1` if event logging is currently enabled, and `0` otherwise.
///
/// # Safety
/// Safe to call from any thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn d2_is_enabled() -> c_int {
    core::is_enabled() as c_int
}

/// Return `1` if event logging is currently disabled, and `0` otherwise.
///
/// # Safety
/// Safe to call from any thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn d2_is_disabled() -> c_int {
    core::is_disabled() as c_int
}

/// Notify the system of the acquisition of the synchronization object
/// `lock_id` by the thread `thread_id`.
///
/// # Safety
/// Safe to call from any thread; the identifiers are treated as opaque.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn d2_notify_acquire(thread_id: usize, lock_id: usize) {
    core::notify_acquire(thread_id, lock_id);
}

/// Notify the system of the release of the synchronization object `lock_id`
/// by the thread `thread_id`.
///
/// # Safety
/// Safe to call from any thread; the identifiers are treated as opaque.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn d2_notify_release(thread_id: usize, lock_id: usize) {
    core::notify_release(thread_id, lock_id);
}

/// Notify the system of the acquisition of the re-entrant synchronization
/// object `lock_id` by the thread `thread_id`.
///
/// # Safety
/// Safe to call from any thread; the identifiers are treated as opaque.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn d2_notify_recursive_acquire(thread_id: usize, lock_id: usize) {
    core::notify_recursive_acquire(thread_id, lock_id);
}

/// Notify the system of the release of the re-entrant synchronization
/// object `lock_id` by the thread `thread_id`.
///
/// # Safety
/// Safe to call from any thread; the identifiers are treated as opaque.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn d2_notify_recursive_release(thread_id: usize, lock_id: usize) {
    core::notify_recursive_release(thread_id, lock_id);
}

/// Notify the system of the start of a new thread `child_id` by the thread
/// `parent_id`.
///
/// A thread starting itself is an invalid topology: the notification is
/// absorbed and logging is disabled, which `d2_is_enabled` reflects.
///
/// # Safety
/// Safe to call from any thread; the identifiers are treated as opaque.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn d2_notify_start(parent_id: usize, child_id: usize) {
    core::notify_start(parent_id, child_id);
}

/// Notify the system of the join of the thread `child_id` into the thread
/// `parent_id`.
///
/// Joining a thread that was never started, or a thread joining itself, is
/// an invalid topology: the notification is absorbed and logging is
/// disabled, which `d2_is_enabled` reflects.
///
/// # Safety
/// Safe to call from any thread; the identifiers are treated as opaque.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn d2_notify_join(parent_id: usize, child_id: usize) {
    core::notify_join(parent_id, child_id);
}
