// Shared counters safe for simultaneous use from many workers.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc, Mutex, PoisonError,
};
use std::thread;

use serde::{Deserialize, Serialize};

use super::WaitGroup;

/// `SharedCounter` is an integer many workers can bump at once
/// without losing updates. The underlying integer is only ever
/// reachable through [`SharedCounter::value`].
pub trait SharedCounter: Send + Sync {
    fn increment(&self);

    fn value(&self) -> i64;
}

/// `LockedCounter` guards its integer with a [`Mutex`], every
/// read and read-modify-write happens while holding the lock.
#[derive(Debug, Default)]
pub struct LockedCounter {
    value: Mutex<i64>,
}

impl LockedCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SharedCounter for LockedCounter {
    fn increment(&self) {
        // a panic elsewhere cannot leave an i64 half-written, so a
        // poisoned lock is still safe to keep using.
        let mut guard = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += 1;
    }

    fn value(&self) -> i64 {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `AtomicCounter` uses the hardware atomic add, no lock is ever taken.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicI64,
}

impl AtomicCounter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }
}

impl SharedCounter for AtomicCounter {
    #[inline]
    fn increment(&self) {
        self.value.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    fn value(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterStrategy {
    #[default]
    Lock,
    Atomic,
}

impl CounterStrategy {
    #[must_use]
    pub fn build(self) -> Arc<dyn SharedCounter> {
        match self {
            Self::Lock => Arc::new(LockedCounter::new()),
            Self::Atomic => Arc::new(AtomicCounter::new()),
        }
    }
}

impl core::str::FromStr for CounterStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lock" | "mutex" => Ok(Self::Lock),
            "atomic" => Ok(Self::Atomic),
            other => Err(format!("unknown counter strategy: {other}")),
        }
    }
}

impl core::fmt::Display for CounterStrategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Lock => write!(f, "lock"),
            Self::Atomic => write!(f, "atomic"),
        }
    }
}

/// hammer spawns `workers` threads which each call
/// [`SharedCounter::increment`] `increments` times, waits for all of
/// them through a [`WaitGroup`] and returns the final counter value.
///
/// # Errors
///
/// Returns the spawn error when a worker thread could not be created,
/// workers spawned before that point are still waited for.
pub fn hammer(
    counter: &Arc<dyn SharedCounter>,
    workers: usize,
    increments: usize,
) -> std::io::Result<i64> {
    let group = Arc::new(WaitGroup::new());

    for worker_id in 0..workers {
        group.add(1);

        let worker_group = group.clone();
        let worker_counter = counter.clone();
        let spawned = thread::Builder::new()
            .name(format!("ewe-counter-{worker_id}"))
            .spawn(move || {
                let _done = worker_group.guard();
                for _ in 0..increments {
                    worker_counter.increment();
                }
            });

        if let Err(err) = spawned {
            group.done();
            group.wait();
            return Err(err);
        }
    }

    group.wait();

    let value = counter.value();
    tracing::debug!(
        "Counter reached {} after {} workers x {} increments",
        value,
        workers,
        increments
    );
    Ok(value)
}

#[cfg(test)]
mod test_counters {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn locked_counter_loses_no_updates() {
        let counter = CounterStrategy::Lock.build();
        assert_eq!(hammer(&counter, 10, 1000).expect("should spawn"), 10_000);
    }

    #[test]
    fn atomic_counter_loses_no_updates() {
        let counter = CounterStrategy::Atomic.build();
        assert_eq!(hammer(&counter, 10, 1000).expect("should spawn"), 10_000);
    }

    #[test]
    fn zero_workers_or_increments_leave_counter_at_zero() {
        for strategy in [CounterStrategy::Lock, CounterStrategy::Atomic] {
            assert_eq!(hammer(&strategy.build(), 0, 1000).unwrap(), 0);
            assert_eq!(hammer(&strategy.build(), 10, 0).unwrap(), 0);
        }
    }

    #[test]
    fn locked_counter_survives_a_poisoned_lock() {
        let counter = Arc::new(LockedCounter::new());
        counter.increment();

        let poisoner = counter.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.value.lock().unwrap();
            panic!("poison the counter");
        })
        .join();

        counter.increment();
        assert_eq!(counter.value(), 2);
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!("lock".parse::<CounterStrategy>(), Ok(CounterStrategy::Lock));
        assert_eq!("Mutex".parse::<CounterStrategy>(), Ok(CounterStrategy::Lock));
        assert_eq!(
            "atomic".parse::<CounterStrategy>(),
            Ok(CounterStrategy::Atomic)
        );
        assert!("spin".parse::<CounterStrategy>().is_err());
        assert_eq!(CounterStrategy::Atomic.to_string(), "atomic");
    }
}
