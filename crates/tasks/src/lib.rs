//! In-process concurrent task execution: synchronized counters, a
//! completion wait group and a scheduler which runs independent tasks
//! on parallel workers and reports per-task timings.
//!
//! ```no_run
//! use std::{thread, time::Duration};
//! use ewe_tasks::scheduler::Scheduler;
//!
//! let mut scheduler = Scheduler::new();
//! for _ in 0..3 {
//!     scheduler.add_task(|| thread::sleep(Duration::from_millis(100)));
//! }
//!
//! let stats = scheduler.run().expect("should run");
//! for (id, duration) in stats.durations() {
//!     println!("task {id}: {duration:?}");
//! }
//! ```

pub mod config;
pub mod errors;
pub mod scheduler;
pub mod synca;

pub use config::{EngineConfig, SchedulerConfig};
pub use errors::{SchedulerError, SchedulerResult};
pub use scheduler::{RunStats, Scheduler, TaskOutcome, TaskResult};
