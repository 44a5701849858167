//! Re-entrant locks participate in inversions like plain ones, but their
//! nested acquisitions are counted, not re-recorded.

mod common;

use common::mock;
use std::sync::Arc;

#[test]
fn a_recursive_lock_still_forms_an_inversion() {
    let r = Arc::new(mock::RecursiveMutex::new());
    let a = Arc::new(mock::Mutex::new());

    let deadlocks = {
        let r = Arc::clone(&r);
        let a = Arc::clone(&a);
        common::deadlocks_of(move || {
            let t1 = {
                let r = Arc::clone(&r);
                let a = Arc::clone(&a);
                mock::Thread::spawn(move || {
                    a.lock();
                    r.lock();
                    r.unlock();
                    a.unlock();
                })
            };

            r.lock();
            r.lock(); // re-entrant acquisition of the same lock
            a.lock();
            a.unlock();
            r.unlock();
            r.unlock();

            t1.join();
        })
    };

    assert_eq!(deadlocks.len(), 1);

    let report = &deadlocks[0];
    let locks_of = |thread| {
        report
            .threads
            .iter()
            .find(|t| t.thread == thread)
            .unwrap()
            .locks
            .clone()
    };
    assert_eq!(locks_of(0), vec![r.id(), a.id()]);
    assert_eq!(locks_of(1), vec![a.id(), r.id()]);
}
