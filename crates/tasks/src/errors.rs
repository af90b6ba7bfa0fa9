use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::scheduler::RunStats;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("max_workers must be at least 1")]
    InvalidWorkerCount,

    #[error(
        "run exceeded its {deadline:?} deadline with {} of {expected} tasks finished",
        .partial.len()
    )]
    DeadlineExceeded {
        deadline: Duration,
        expected: usize,
        partial: RunStats,
    },
}

pub type SchedulerResult<T> = anyhow::Result<T, SchedulerError>;
