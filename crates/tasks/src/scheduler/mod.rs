// Task scheduler fanning independent tasks out to worker threads and
// fanning their results back in through a single result conduit.

mod stats;
mod worker;

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use ewe_channels::ChannelError;

use crate::config::SchedulerConfig;
use crate::errors::{SchedulerError, SchedulerResult};
use crate::synca::{CancellationSignal, WaitGroup};

pub use stats::*;

/// A registered unit of work. Plain tasks ignore the signal.
pub type BoxedTask = Box<dyn FnOnce(&CancellationSignal) + Send + 'static>;

/// `Scheduler` collects tasks and executes all of them concurrently
/// when [`Scheduler::run`] is called.
///
/// Running consumes the scheduler, so tasks can only be added before
/// a run starts and an instance is never run twice.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<BoxedTask>,
    config: SchedulerConfig,
}

impl core::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.tasks.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            tasks: Vec::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// add_task registers a task and returns its submission index, the
    /// key its result is reported under.
    pub fn add_task<F>(&mut self, task: F) -> usize
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_cancellable_task(move |_| task())
    }

    /// add_cancellable_task registers a task which receives the run's
    /// [`CancellationSignal`] and may stop early once it is raised.
    pub fn add_cancellable_task<F>(&mut self, task: F) -> usize
    where
        F: FnOnce(&CancellationSignal) + Send + 'static,
    {
        let id = self.tasks.len();
        self.tasks.push(Box::new(task));
        id
    }

    /// run executes every registered task concurrently and blocks till
    /// all of them finished, returning one [`TaskResult`] per task keyed
    /// by submission index.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::run_with_signal`].
    pub fn run(self) -> SchedulerResult<RunStats> {
        self.run_with_signal(CancellationSignal::new())
    }

    /// run_with_signal is [`Scheduler::run`] with a caller owned
    /// [`CancellationSignal`], raising it makes workers skip tasks they
    /// have not started yet and lets cancellable tasks stop early.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidWorkerCount`] when `max_workers` is 0.
    /// - [`SchedulerError::Spawn`] when a thread could not be created, the
    ///   signal is raised so already spawned workers wind down.
    /// - [`SchedulerError::DeadlineExceeded`] when the configured deadline
    ///   passed first, carrying the results gathered so far. The signal
    ///   is raised and unfinished workers are left to finish detached.
    pub fn run_with_signal(self, signal: CancellationSignal) -> SchedulerResult<RunStats> {
        let Self { tasks, config } = self;
        let expected = tasks.len();

        if config.max_workers == Some(0) {
            return Err(SchedulerError::InvalidWorkerCount);
        }

        if expected == 0 {
            tracing::debug!("No tasks registered, nothing to run");
            return Ok(RunStats::empty());
        }

        let started = Instant::now();

        // sized to hold every result so a worker never blocks publishing
        let (mut results, collector) = ewe_channels::bounded::<TaskResult>(expected);
        let group = Arc::new(WaitGroup::new());

        let spawned = match config.max_workers {
            None => worker::spawn_per_task(tasks, &results, &group, &signal),
            Some(limit) => {
                worker::spawn_pool(tasks, limit.min(expected), &results, &group, &signal)
            }
        }
        .inspect_err(|_| {
            signal.cancel();
        })?;

        tracing::debug!("Spawned {} workers for {} tasks", spawned, expected);

        let coordinator_group = group.clone();
        thread::Builder::new()
            .name(String::from("ewe-coordinator"))
            .spawn(move || {
                coordinator_group.wait();
                results.close();
                tracing::debug!("All workers reported, result conduit closed");
            })
            .inspect_err(|err| {
                tracing::error!("Failed to spawn coordinator: {}", err);
                signal.cancel();
            })?;

        let cutoff = config
            .deadline()
            .map(|deadline| (deadline, started + deadline));

        let mut stats = RunStats::empty();
        loop {
            let received = match cutoff {
                Some((_, at)) => collector.receive_deadline(at),
                None => collector.block_receive(),
            };

            match (received, cutoff) {
                (Ok(result), _) => stats.record(result),
                (Err(ChannelError::Timeout), Some((deadline, _))) if stats.len() < expected => {
                    signal.cancel();
                    stats.finish(started.elapsed());
                    tracing::error!(
                        "Run exceeded its {:?} deadline with {}/{} tasks finished",
                        deadline,
                        stats.len(),
                        expected
                    );
                    return Err(SchedulerError::DeadlineExceeded {
                        deadline,
                        expected,
                        partial: stats,
                    });
                }
                // closed and drained, or every result arrived before the
                // coordinator got to close the conduit
                (Err(_), _) => break,
            }
        }

        stats.finish(started.elapsed());
        tracing::info!(
            "Run finished {} tasks in {:?} ({} not completed)",
            stats.len(),
            stats.elapsed(),
            stats.failures().count()
        );

        Ok(stats)
    }
}
