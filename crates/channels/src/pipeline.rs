// Producer/consumer pipelines built on top of [`crate::channels`].

use std::any::Any;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::channels::{self, Capacity, ReceiveChannel};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to spawn pipeline thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("producer panicked: {0}")]
    ProducerPanicked(String),

    #[error("consumer {id} panicked: {reason}")]
    ConsumerPanicked { id: usize, reason: String },

    #[error("a pipeline needs at least one consumer")]
    NoConsumers,
}

pub type PipelineResult<T> = anyhow::Result<T, PipelineError>;

/// panic_reason renders a panic payload captured by `join` or
/// `catch_unwind` as text.
#[must_use]
pub fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    String::from("unknown panic payload")
}

/// `ProducerHandle` lets the caller observe the producer's completion
/// instead of leaving it running in the background unobserved.
pub struct ProducerHandle {
    handle: JoinHandle<usize>,
}

impl ProducerHandle {
    /// join blocks till the producer has closed its channel and returns
    /// how many values it sent.
    pub fn join(self) -> PipelineResult<usize> {
        self.handle
            .join()
            .map_err(|payload| PipelineError::ProducerPanicked(panic_reason(&*payload)))
    }
}

pub struct Production<T> {
    pub receiver: ReceiveChannel<T>,
    pub producer: ProducerHandle,
}

impl<T> Production<T> {
    pub fn into_parts(self) -> (ReceiveChannel<T>, ProducerHandle) {
        (self.receiver, self.producer)
    }
}

/// produce spawns a producer thread which sends every value of `values`
/// in order into a new channel of the given capacity and closes the
/// channel after the last send.
///
/// The producer stops early, still closing the channel, when every
/// receiver has been dropped.
pub fn produce<T, I>(values: I, capacity: Capacity) -> PipelineResult<Production<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = T> + Send + 'static,
{
    let (mut sender, receiver) = channels::create::<T>(capacity);

    let handle = thread::Builder::new()
        .name(String::from("ewe-producer"))
        .spawn(move || {
            let mut sent = 0usize;
            for value in values {
                if let Err(err) = sender.send(value) {
                    tracing::warn!("Producer stopping after {} values: {}", sent, err);
                    break;
                }
                sent += 1;
            }

            sender.close();
            tracing::debug!("Producer closed channel after {} values", sent);
            sent
        })?;

    Ok(Production {
        receiver,
        producer: ProducerHandle { handle },
    })
}

/// consume lazily drains the channel, the sequence ends once the
/// channel is closed and every buffered value was yielded.
pub fn consume<T>(receiver: ReceiveChannel<T>) -> impl Iterator<Item = T> {
    receiver.into_iter()
}

/// `ConsumerSet` owns the consumer threads spawned by [`fan_out`].
pub struct ConsumerSet<R> {
    handles: Vec<JoinHandle<Vec<R>>>,
}

impl<R> ConsumerSet<R> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// join waits for every consumer and returns what each one
    /// collected, indexed by consumer id.
    ///
    /// All consumers are joined before a panic is reported, the error
    /// names the lowest consumer id that panicked.
    pub fn join(self) -> PipelineResult<Vec<Vec<R>>> {
        let joined: Vec<_> = self.handles.into_iter().map(JoinHandle::join).collect();

        let mut collected = Vec::with_capacity(joined.len());
        for (id, outcome) in joined.into_iter().enumerate() {
            let items = outcome.map_err(|payload| PipelineError::ConsumerPanicked {
                id,
                reason: panic_reason(&*payload),
            })?;
            collected.push(items);
        }
        Ok(collected)
    }
}

/// fan_out spawns `consumers` threads all draining the same channel.
/// Each value goes to exactly one consumer which maps it through
/// `handler(consumer_id, value)`.
pub fn fan_out<T, R, F>(
    receiver: ReceiveChannel<T>,
    consumers: usize,
    handler: F,
) -> PipelineResult<ConsumerSet<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> R + Send + Sync + 'static,
{
    if consumers == 0 {
        return Err(PipelineError::NoConsumers);
    }

    let handler = Arc::new(handler);
    let mut handles = Vec::with_capacity(consumers);

    for consumer_id in 0..consumers {
        let source = receiver.clone();
        let handler = handler.clone();

        let handle = thread::Builder::new()
            .name(format!("ewe-consumer-{consumer_id}"))
            .spawn(move || {
                let items: Vec<R> = source
                    .into_iter()
                    .map(|value| handler(consumer_id, value))
                    .collect();
                tracing::debug!("Consumer {} drained {} values", consumer_id, items.len());
                items
            })?;

        handles.push(handle);
    }

    Ok(ConsumerSet { handles })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use ntest::timeout;
    use tracing_test::traced_test;

    use super::*;

    #[test]
    #[timeout(5000)]
    fn single_consumer_observes_fifo_order() {
        let production = produce(1..=10i64, Capacity::Rendezvous).expect("should spawn producer");
        let (receiver, producer) = production.into_parts();

        let received: Vec<i64> = consume(receiver).collect();

        assert_eq!(received, (1..=10).collect::<Vec<i64>>());
        assert_eq!(producer.join().expect("producer should finish"), 10);
    }

    #[test]
    #[timeout(5000)]
    fn buffered_producer_is_rate_limited_by_consumer() {
        let production = produce(0..100i64, Capacity::Bounded(10)).expect("should spawn producer");

        let received: Vec<i64> = production.receiver.iter().collect();

        assert_eq!(received.len(), 100);
        assert_eq!(received, (0..100).collect::<Vec<i64>>());
        assert_eq!(production.producer.join().unwrap(), 100);
    }

    #[test]
    #[timeout(10000)]
    #[traced_test]
    fn multiple_consumers_cover_every_value_once() {
        let production = produce(0..100i64, Capacity::Bounded(10)).expect("should spawn producer");
        let (receiver, producer) = production.into_parts();

        let consumers = fan_out(receiver, 4, |_, value: i64| value).expect("should spawn");
        assert_eq!(consumers.len(), 4);

        let per_consumer = consumers.join().expect("consumers should finish");
        assert_eq!(per_consumer.len(), 4);

        let mut all: Vec<i64> = per_consumer.into_iter().flatten().collect();
        all.sort_unstable();

        assert_eq!(all, (0..100).collect::<Vec<i64>>());
        assert_eq!(all.iter().collect::<HashSet<_>>().len(), 100);
        assert_eq!(producer.join().unwrap(), 100);
    }

    #[test]
    fn fan_out_requires_a_consumer() {
        let (_sender, receiver) = channels::unbounded::<i64>();
        assert!(matches!(
            fan_out(receiver, 0, |_, v: i64| v),
            Err(PipelineError::NoConsumers)
        ));
    }

    #[test]
    #[timeout(5000)]
    fn empty_production_closes_immediately() {
        let production =
            produce(Vec::<i64>::new(), Capacity::Unbounded).expect("should spawn producer");
        let (receiver, producer) = production.into_parts();

        assert_eq!(consume(receiver).count(), 0);
        assert_eq!(producer.join().unwrap(), 0);
    }

    #[test]
    #[timeout(5000)]
    fn producer_stops_when_receivers_are_gone() {
        let production = produce(0i64.., Capacity::Bounded(1)).expect("should spawn producer");
        let (receiver, producer) = production.into_parts();

        assert_eq!(receiver.block_receive(), Ok(0));
        drop(receiver);

        let sent = producer.join().expect("producer should stop");
        assert!(sent >= 1);
    }

    #[test]
    #[timeout(5000)]
    fn consumer_panic_is_reported() {
        let production = produce(0..3i64, Capacity::Unbounded).expect("should spawn producer");
        let (receiver, producer) = production.into_parts();

        let consumers = fan_out(receiver, 1, |_, value: i64| {
            assert!(value < 2, "value too large");
            value
        })
        .expect("should spawn");

        let result = consumers.join();
        assert!(matches!(
            result,
            Err(PipelineError::ConsumerPanicked { id: 0, .. })
        ));
        let _ = producer.join();
    }

    #[test]
    #[timeout(5000)]
    fn consumer_panic_waits_for_the_other_consumers() {
        let production = produce(0..2i64, Capacity::Unbounded).expect("should spawn producer");
        let (receiver, producer) = production.into_parts();

        let claimed = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let slow_finished = finished.clone();

        let consumers = fan_out(receiver, 2, move |_, value: i64| {
            assert!(
                !claimed.swap(true, Ordering::SeqCst),
                "second value rejected"
            );
            thread::sleep(Duration::from_millis(200));
            slow_finished.store(true, Ordering::SeqCst);
            value
        })
        .expect("should spawn");

        let result = consumers.join();
        assert!(matches!(result, Err(PipelineError::ConsumerPanicked { .. })));
        assert!(finished.load(Ordering::SeqCst));
        let _ = producer.join();
    }

    #[test]
    fn panic_reason_renders_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new(format!("code {}", 42));
        assert_eq!(panic_reason(&*payload), "code 42");

        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_reason(&*payload), "static message");

        let payload: Box<dyn Any + Send> = Box::new(42usize);
        assert_eq!(panic_reason(&*payload), "unknown panic payload");
    }
}
