//! Per-store reentrancy tracking.
//!
//! Every thread currently inside a reducer or a getter's compute function is
//! recorded together with what it is doing. A dispatch that finds its own
//! thread already recorded is a reentrant dispatch and gets rejected. Other
//! threads are unaffected; they serialize on the dispatch lock instead.

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use super::error::Activity;

#[derive(Default)]
pub(crate) struct ReentrancyGuard {
    active: Mutex<HashMap<ThreadId, Activity>>,
}

impl ReentrancyGuard {
    /// What the calling thread is doing inside this store, if anything.
    pub(crate) fn current(&self) -> Option<Activity> {
        self.active.lock().get(&thread::current().id()).cloned()
    }

    /// Marks the calling thread busy until the returned guard drops.
    ///
    /// Nested entries restore the outer activity when they end. The guard
    /// also runs during unwinding, so a panicking reducer leaves the store
    /// usable.
    pub(crate) fn enter(&self, activity: Activity) -> impl Drop + '_ {
        let thread = thread::current().id();
        let previous = self.active.lock().insert(thread, activity);
        scopeguard::guard(previous, move |previous| {
            let mut active = self.active.lock();
            match previous {
                Some(outer) => {
                    active.insert(thread, outer);
                }
                None => {
                    active.remove(&thread);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reducing(action: &'static str) -> Activity {
        Activity::Reducing { action }
    }

    #[test]
    fn idle_thread_has_no_activity() {
        let guard = ReentrancyGuard::default();
        assert_eq!(guard.current(), None);
    }

    #[test]
    fn enter_records_until_drop() {
        let guard = ReentrancyGuard::default();
        {
            let _busy = guard.enter(reducing("incr"));
            assert_eq!(guard.current(), Some(reducing("incr")));
        }
        assert_eq!(guard.current(), None);
    }

    #[test]
    fn nested_enter_restores_outer() {
        let guard = ReentrancyGuard::default();
        let _outer = guard.enter(reducing("incr"));
        {
            let _inner = guard.enter(Activity::Deriving {
                getter: "total".to_string(),
            });
            assert!(matches!(guard.current(), Some(Activity::Deriving { .. })));
        }
        assert_eq!(guard.current(), Some(reducing("incr")));
    }

    #[test]
    fn other_threads_are_not_busy() {
        let guard = std::sync::Arc::new(ReentrancyGuard::default());
        let _busy = guard.enter(reducing("incr"));
        let remote = std::sync::Arc::clone(&guard);
        let seen = std::thread::spawn(move || remote.current())
            .join()
            .unwrap();
        assert_eq!(seen, None);
    }

    #[test]
    fn guard_released_on_panic() {
        let guard = ReentrancyGuard::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _busy = guard.enter(reducing("boom"));
            panic!("reducer failed");
        }));
        assert!(result.is_err());
        assert_eq!(guard.current(), None);
    }
}
