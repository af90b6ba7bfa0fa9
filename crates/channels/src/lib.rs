// Crate implementing the Engineering Principles of Channels and Pipelines

pub mod channels;
pub mod pipeline;

pub use channels::{
    bounded, create, rendezvous, unbounded, Capacity, ChannelError, ReceiveChannel, Result,
    SendChannel,
};
pub use pipeline::{
    consume, fan_out, panic_reason, produce, ConsumerSet, PipelineError, PipelineResult,
    ProducerHandle, Production,
};
