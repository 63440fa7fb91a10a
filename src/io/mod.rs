//! Durable-log adapters: the command consumer (C5), the event publisher
//! (C6), and the JSON wire format they share with the outside world.

pub mod consumer;
pub mod publisher;
pub mod wire;

pub use consumer::CommandConsumer;
pub use publisher::EventPublisher;
