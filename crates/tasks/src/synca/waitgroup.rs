// Implements a completion counter usable across threads.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use super::RunOnDrop;

/// `WaitGroup` counts outstanding workers and lets a coordinator
/// block till every one of them reported completion.
///
/// The count lives behind a [`Mutex`] and waiters sleep on a
/// [`Condvar`] so a waiting coordinator does not burn CPU cycles.
#[derive(Debug, Default)]
pub struct WaitGroup {
    /// The condition variable waiters sleep on till the count drops
    /// to zero.
    event: Condvar,

    /// Number of workers yet to call [`WaitGroup::done`].
    pending: Mutex<usize>,
}

impl WaitGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// add registers `n` more workers to wait for.
    pub fn add(&self, n: usize) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending += n;
    }

    /// done marks one worker as finished, waking all waiters when it
    /// was the last one.
    ///
    /// # Panics
    ///
    /// Calling `done` more times than workers were added is a
    /// programming error and panics.
    pub fn done(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        assert!(*pending > 0, "WaitGroup counter went negative");

        *pending -= 1;
        if *pending == 0 {
            drop(pending);
            self.event.notify_all();
        }
    }

    /// guard returns a [`RunOnDrop`] which calls [`WaitGroup::done`]
    /// when dropped, including while the worker unwinds from a panic.
    pub fn guard(&self) -> RunOnDrop<impl FnOnce() + '_> {
        RunOnDrop::new(move || self.done())
    }

    #[must_use]
    pub fn count(&self) -> usize {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// wait blocks the current thread till the count reaches zero.
    pub fn wait(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while *pending > 0 {
            pending = self
                .event
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// wait_timeout blocks till the count reaches zero or `timeout`
    /// elapses, returning true only if every worker completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let (pending, _) = self
            .event
            .wait_timeout_while(pending, timeout, |pending| *pending > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *pending == 0
    }
}

#[cfg(test)]
mod test_wait_group {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    };

    use ntest::timeout;

    use super::WaitGroup;

    #[test]
    #[timeout(5000)]
    fn wait_returns_once_every_worker_is_done() {
        let group = Arc::new(WaitGroup::new());
        let finished = Arc::new(AtomicUsize::new(0));

        group.add(5);
        for _ in 0..5 {
            let group = group.clone();
            let finished = finished.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                finished.fetch_add(1, Ordering::SeqCst);
                group.done();
            });
        }

        group.wait();
        assert_eq!(finished.load(Ordering::SeqCst), 5);
        assert_eq!(group.count(), 0);
    }

    #[test]
    fn wait_without_workers_does_not_block() {
        let group = WaitGroup::new();
        group.wait();
        assert!(group.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    #[timeout(5000)]
    fn guard_fires_while_unwinding() {
        let group = Arc::new(WaitGroup::new());
        group.add(1);

        let worker_group = group.clone();
        let result = thread::spawn(move || {
            let _done = worker_group.guard();
            panic!("worker failed");
        })
        .join();

        assert!(result.is_err());
        group.wait();
        assert_eq!(group.count(), 0);
    }

    #[test]
    fn wait_timeout_reports_pending_workers() {
        let group = WaitGroup::new();
        group.add(1);
        assert!(!group.wait_timeout(Duration::from_millis(20)));
        group.done();
        assert!(group.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    #[should_panic(expected = "WaitGroup counter went negative")]
    fn done_without_add_panics() {
        WaitGroup::new().done();
    }
}
