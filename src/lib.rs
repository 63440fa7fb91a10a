//! # Matching Engine
//!
//! The core of a centralized exchange: a per-symbol price-time-priority
//! limit order book, a matching engine enforcing time-in-force and
//! self-trade-prevention semantics, and the durable-log plumbing that feeds
//! it commands and fans its events back out to a public market-data
//! projection.
//!
//! ## Architecture
//!
//! ```text
//! command log --> CommandConsumer --> EngineHost (per symbol) --> MatchingEngine
//!                                                                       |
//!                                                                  event channel
//!                                                                       v
//!                                                                EventPublisher --> event log --> Projector --> subscribers
//! ```
//!
//! Every symbol has exactly one logical writer: its [`host::EngineHost`]
//! task. All order book mutation happens on that task, which is what lets
//! [`book::OrderBook`] and [`engine::MatchingEngine`] stay free of internal
//! locking. Everything else in this crate is the asynchronous plumbing
//! around that single-writer core: durable ingestion with at-least-once
//! acknowledgement ([`io::CommandConsumer`]), at-least-once publication with
//! retry ([`io::EventPublisher`]), and a public read-model rebuilt from the
//! published event stream ([`projector`]).
//!
//! ## Modules
//!
//! - [`book`]: price ladder and order book (C1/C2).
//! - [`engine`]: matching engine, commands and events (C3).
//! - [`host`]: per-symbol single-writer task and registry (C4).
//! - [`io`]: durable command consumer, event publisher, wire format (C5/C6).
//! - [`projector`]: public depth/trade/ticker state and subscriber fan-out (C7).
//! - [`control`]: kill-switch and per-symbol trading status.
//! - [`config`]: environment-driven process configuration.
//! - [`error`]: error taxonomy shared across layers.

pub mod book;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod host;
pub mod io;
pub mod projector;

mod clock;

/// Initializes the process-wide `tracing` subscriber from `RUST_LOG`
/// (default `info`). Call once, before spawning any engine host.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
