mod counter;
mod pipeline;
mod schedule;

use ewe_tasks::EngineConfig;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn load_config(arguments: &clap::ArgMatches) -> std::result::Result<EngineConfig, BoxedError> {
    let config = match arguments.get_one::<String>("config") {
        Some(path) => EngineConfig::from_path(path.as_str())?,
        None => EngineConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn main() -> std::result::Result<(), BoxedError> {
    let commander = schedule::register(pipeline::register(counter::register(
        clap::Command::new("ewe_tasks")
            .about("Runs the ewe_tasks concurrency demos")
            .arg_required_else_help(true)
            .arg(
                clap::Arg::new("config")
                    .long("config")
                    .global(true)
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(String)),
            )
            .arg(
                clap::Arg::new("verbose")
                    .long("verbose")
                    .short('v')
                    .global(true)
                    .action(clap::ArgAction::SetTrue),
            ),
    )));

    let matches = commander.get_matches();

    let level = if matches.get_flag("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("counter", arguments)) => counter::run(arguments, &config.counter)?,
        Some(("pipeline", arguments)) => pipeline::run(arguments, &config.pipeline)?,
        Some(("schedule", arguments)) => schedule::run(arguments, &config.scheduler)?,
        _ => {}
    }

    Ok(())
}
