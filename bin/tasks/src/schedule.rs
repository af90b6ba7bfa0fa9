use std::thread;
use std::time::Duration;

use ewe_tasks::{Scheduler, SchedulerConfig, SchedulerError, TaskOutcome};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("schedule")
            .about("runs sleeping tasks concurrently and reports how long each one took")
            .arg(
                clap::Arg::new("tasks")
                    .long("tasks")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize))
                    .default_value("3"),
            )
            .arg(
                clap::Arg::new("sleep_ms")
                    .long("sleep-ms")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(u64))
                    .default_value("1000"),
            )
            .arg(
                clap::Arg::new("max_workers")
                    .long("max-workers")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                clap::Arg::new("deadline_ms")
                    .long("deadline-ms")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(u64)),
            ),
    )
}

pub fn run(
    args: &clap::ArgMatches,
    defaults: &SchedulerConfig,
) -> std::result::Result<(), BoxedError> {
    let tasks = args
        .get_one::<usize>("tasks")
        .copied()
        .expect("should have tasks");

    let sleep = args
        .get_one::<u64>("sleep_ms")
        .copied()
        .map(Duration::from_millis)
        .expect("should have sleep_ms");

    let mut config = defaults.clone();
    if let Some(workers) = args.get_one::<usize>("max_workers") {
        config = config.with_max_workers(*workers);
    }
    if let Some(deadline) = args.get_one::<u64>("deadline_ms") {
        config = config.with_deadline(Duration::from_millis(*deadline));
    }

    let mut scheduler = Scheduler::with_config(config);
    for _ in 0..tasks {
        scheduler.add_cancellable_task(move |signal| {
            let id = thread::current()
                .name()
                .map(String::from)
                .unwrap_or_default();
            tracing::info!("{} started", id);

            // sleep in slices so a cancelled run ends promptly
            let slice = Duration::from_millis(10);
            let mut remaining = sleep;
            while !remaining.is_zero() && !signal.is_cancelled() {
                let step = remaining.min(slice);
                thread::sleep(step);
                remaining -= step;
            }
            tracing::info!("{} finished", id);
        });
    }

    let stats = match scheduler.run() {
        Ok(stats) => stats,
        Err(SchedulerError::DeadlineExceeded { partial, .. }) => {
            tracing::error!("Deadline hit, {} tasks reported in time", partial.len());
            partial
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Task execution timings:");
    for result in &stats {
        match &result.outcome {
            TaskOutcome::Completed => {
                tracing::info!("task {}: {:?}", result.id, result.duration);
            }
            TaskOutcome::Panicked(reason) => {
                tracing::warn!(
                    "task {} panicked after {:?}: {}",
                    result.id,
                    result.duration,
                    reason
                );
            }
            TaskOutcome::Cancelled => tracing::warn!("task {} was cancelled", result.id),
        }
    }
    tracing::info!(
        "Wall clock {:?} for {:?} of task time",
        stats.elapsed(),
        stats.total_busy()
    );

    Ok(())
}
