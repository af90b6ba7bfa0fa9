use std::sync::{Arc, Mutex};
use std::time::Duration;

use ewe_channels::{pipeline, Capacity};
use ewe_tasks::{
    config::EngineConfig,
    synca::{hammer, CounterStrategy, SharedCounter},
    Scheduler, SchedulerConfig,
};
use ntest::timeout;

#[test]
#[timeout(10000)]
fn scheduled_consumers_drain_a_pipeline() {
    let production =
        pipeline::produce(0..100i64, Capacity::Bounded(10)).expect("should spawn producer");
    let (receiver, producer) = production.into_parts();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut scheduler = Scheduler::new();

    for _ in 0..4 {
        let receiver = receiver.clone();
        let seen = seen.clone();
        scheduler.add_task(move || {
            for value in &receiver {
                seen.lock().expect("not poisoned").push(value);
            }
        });
    }
    drop(receiver);

    let stats = scheduler.run().expect("should run");
    assert_eq!(stats.len(), 4);
    assert_eq!(producer.join().expect("producer should finish"), 100);

    let mut values = seen.lock().expect("not poisoned").clone();
    values.sort_unstable();
    assert_eq!(values, (0..100).collect::<Vec<i64>>());
}

#[test]
#[timeout(10000)]
fn counter_strategies_agree_under_the_scheduler() {
    for strategy in [CounterStrategy::Lock, CounterStrategy::Atomic] {
        let counter = strategy.build();
        let mut scheduler =
            Scheduler::with_config(SchedulerConfig::default().with_max_workers(4));

        for _ in 0..10 {
            let counter = counter.clone();
            scheduler.add_task(move || {
                for _ in 0..1000 {
                    counter.increment();
                }
            });
        }

        let stats = scheduler.run().expect("should run");
        assert_eq!(stats.len(), 10);
        assert_eq!(counter.value(), 10_000, "strategy {strategy}");
    }
}

#[test]
fn configured_engine_drives_every_component() {
    let config = EngineConfig::from_toml_str(
        r#"
        [scheduler]
        max_workers = 2
        deadline_ms = 5000

        [pipeline]
        capacity = 4
        consumers = 2

        [counter]
        strategy = "atomic"
        workers = 4
        increments = 250
        "#,
    )
    .expect("should parse");

    let counter = config.counter.strategy.build();
    let total = hammer(&counter, config.counter.workers, config.counter.increments)
        .expect("should spawn");
    assert_eq!(total, 1000);

    let production =
        pipeline::produce(1..=20i64, config.pipeline.capacity()).expect("should spawn producer");
    let consumers = pipeline::fan_out(production.receiver, config.pipeline.consumers, |_, v| v)
        .expect("should spawn consumers");
    let drained: usize = consumers
        .join()
        .expect("consumers should finish")
        .iter()
        .map(Vec::len)
        .sum();
    assert_eq!(drained, 20);

    let mut scheduler = Scheduler::with_config(config.scheduler.clone());
    for _ in 0..3 {
        scheduler.add_task(|| std::thread::sleep(Duration::from_millis(10)));
    }
    assert_eq!(scheduler.run().expect("should run").len(), 3);
}
