use ewe_channels::{pipeline, Capacity};
use ewe_tasks::config::PipelineConfig;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("pipeline")
            .about("produces 0..count into a channel and drains it with one or more consumers")
            .arg(
                clap::Arg::new("count")
                    .long("count")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(i64))
                    .default_value("10"),
            )
            .arg(
                clap::Arg::new("capacity")
                    .long("capacity")
                    .help("channel buffer size, 0 makes every send wait for a consumer")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                clap::Arg::new("consumers")
                    .long("consumers")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            ),
    )
}

pub fn run(
    args: &clap::ArgMatches,
    defaults: &PipelineConfig,
) -> std::result::Result<(), BoxedError> {
    let count = args
        .get_one::<i64>("count")
        .copied()
        .expect("should have count");

    let capacity = args
        .get_one::<usize>("capacity")
        .copied()
        .map_or_else(|| defaults.capacity(), Capacity::from);

    let consumers = args
        .get_one::<usize>("consumers")
        .copied()
        .unwrap_or(defaults.consumers);

    tracing::info!(
        "Producing {} values over {:?} to {} consumers",
        count,
        capacity,
        consumers
    );

    let production = pipeline::produce(0..count, capacity)?;
    let (receiver, producer) = production.into_parts();

    let consumed = pipeline::fan_out(receiver, consumers, |consumer_id, value: i64| {
        tracing::info!("consumer {} accepted: {}", consumer_id, value);
        value
    })?
    .join()?;

    let sent = producer.join()?;
    let received: usize = consumed.iter().map(Vec::len).sum();

    for (consumer_id, values) in consumed.iter().enumerate() {
        tracing::info!("consumer {} drained {} values", consumer_id, values.len());
    }
    tracing::info!("Producer sent {}, consumers received {}", sent, received);

    if sent != received {
        return Err(format!("pipeline dropped values: sent {sent}, received {received}").into());
    }

    Ok(())
}
