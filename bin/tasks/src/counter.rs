use ewe_tasks::config::CounterConfig;
use ewe_tasks::synca::{hammer, CounterStrategy};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("counter")
            .about("hammers a shared counter from many threads and checks no update was lost")
            .arg(
                clap::Arg::new("workers")
                    .long("workers")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                clap::Arg::new("increments")
                    .long("increments")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                clap::Arg::new("strategy")
                    .long("strategy")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(CounterStrategy)),
            ),
    )
}

pub fn run(
    args: &clap::ArgMatches,
    defaults: &CounterConfig,
) -> std::result::Result<(), BoxedError> {
    let workers = args
        .get_one::<usize>("workers")
        .copied()
        .unwrap_or(defaults.workers);

    let increments = args
        .get_one::<usize>("increments")
        .copied()
        .unwrap_or(defaults.increments);

    let strategy = args
        .get_one::<CounterStrategy>("strategy")
        .copied()
        .unwrap_or(defaults.strategy);

    let counter = strategy.build();
    let value = hammer(&counter, workers, increments)?;
    let expected = i64::try_from(workers.saturating_mul(increments))?;

    tracing::info!(
        "Final counter value with {} strategy: {} (expected {}, correct: {})",
        strategy,
        value,
        expected,
        value == expected
    );

    if value != expected {
        return Err(format!("counter lost updates: {value} != {expected}").into());
    }

    Ok(())
}
