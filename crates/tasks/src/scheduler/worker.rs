use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use concurrent_queue::ConcurrentQueue;
use ewe_channels::{panic_reason, SendChannel};

use crate::errors::SchedulerResult;
use crate::synca::{CancellationSignal, WaitGroup};

use super::{BoxedTask, TaskOutcome, TaskResult};

pub(crate) type SharedWorkQueue = Arc<ConcurrentQueue<(usize, BoxedTask)>>;

/// execute runs a single task to completion, timing only the task
/// body and capturing a panic as [`TaskOutcome::Panicked`].
///
/// A task picked up after the run was cancelled is not started.
pub(crate) fn execute(id: usize, task: BoxedTask, signal: &CancellationSignal) -> TaskResult {
    if signal.is_cancelled() {
        tracing::debug!("Skipping task {}, run was cancelled", id);
        return TaskResult {
            id,
            duration: Duration::ZERO,
            outcome: TaskOutcome::Cancelled,
        };
    }

    let started = Instant::now();
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| task(signal))) {
        Ok(()) => TaskOutcome::Completed,
        Err(payload) => {
            let reason = panic_reason(&*payload);
            tracing::warn!("Task {} panicked: {}", id, reason);
            TaskOutcome::Panicked(reason)
        }
    };
    let duration = started.elapsed();

    tracing::debug!("Task {} finished in {:?}", id, duration);
    TaskResult {
        id,
        duration,
        outcome,
    }
}

fn publish(results: &SendChannel<TaskResult>, result: TaskResult) {
    let id = result.id;
    if let Err(err) = results.block_send(result) {
        // only happens once the aggregator gave up on the run
        tracing::debug!("Dropping result of task {}: {}", id, err);
    }
}

/// spawn_per_task starts one worker thread per task, the baseline
/// strategy where every task runs fully in parallel.
///
/// Every spawned worker is registered with `group` before it starts.
pub(crate) fn spawn_per_task(
    tasks: Vec<BoxedTask>,
    results: &SendChannel<TaskResult>,
    group: &Arc<WaitGroup>,
    signal: &CancellationSignal,
) -> SchedulerResult<usize> {
    let mut spawned = 0;

    for (id, task) in tasks.into_iter().enumerate() {
        group.add(1);

        let worker_group = group.clone();
        let worker_results = results.clone();
        let worker_signal = signal.clone();

        let handle = thread::Builder::new()
            .name(format!("ewe-task-{id}"))
            .spawn(move || {
                let _done = worker_group.guard();
                let result = execute(id, task, &worker_signal);
                publish(&worker_results, result);
                drop(worker_results);
            });

        if let Err(err) = handle {
            group.done();
            tracing::error!("Failed to spawn worker for task {}: {}", id, err);
            return Err(err.into());
        }
        spawned += 1;
    }

    Ok(spawned)
}

/// spawn_pool starts `workers` threads which drain a shared work queue
/// holding every task, giving a fixed upper bound on parallelism.
pub(crate) fn spawn_pool(
    tasks: Vec<BoxedTask>,
    workers: usize,
    results: &SendChannel<TaskResult>,
    group: &Arc<WaitGroup>,
    signal: &CancellationSignal,
) -> SchedulerResult<usize> {
    let queue: SharedWorkQueue = Arc::new(ConcurrentQueue::bounded(tasks.len().max(1)));
    for job in tasks.into_iter().enumerate() {
        if queue.push(job).is_err() {
            unreachable!("work queue is sized to hold every task");
        }
    }

    // no more work will ever arrive, workers stop once it is drained
    queue.close();

    let mut spawned = 0;
    for worker_id in 0..workers {
        group.add(1);

        let worker_group = group.clone();
        let worker_queue = queue.clone();
        let worker_results = results.clone();
        let worker_signal = signal.clone();

        let handle = thread::Builder::new()
            .name(format!("ewe-pool-{worker_id}"))
            .spawn(move || {
                let _done = worker_group.guard();
                let mut executed = 0usize;
                while let Ok((id, task)) = worker_queue.pop() {
                    let result = execute(id, task, &worker_signal);
                    publish(&worker_results, result);
                    executed += 1;
                }
                drop(worker_results);
                tracing::debug!("Pool worker {} executed {} tasks", worker_id, executed);
            });

        if let Err(err) = handle {
            group.done();
            tracing::error!("Failed to spawn pool worker {}: {}", worker_id, err);
            return Err(err.into());
        }
        spawned += 1;
    }

    Ok(spawned)
}
