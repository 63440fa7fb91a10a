//! Error taxonomy. Rejections are plain data carried on [`crate::engine::event::Event`];
//! the error enums here are for conditions a caller or an I/O loop must react to.

use thiserror::Error;

/// Fatal invariant violations. An `EngineError` must never be surfaced as a client
/// rejection — it means the single-writer discipline around an order book has been
/// broken and the owning engine task must abort.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("order {order_id} leaves_qty went negative")]
    NegativeQuantity { order_id: u64 },

    #[error("price level {price} referenced order {order_id} that is not in the arena")]
    OrphanedOrder { order_id: u64, price: u64 },

    #[error("event sequence gap for {symbol}: expected {expected}, got {actual}")]
    SequenceGap {
        symbol: String,
        expected: u64,
        actual: u64,
    },
}

/// Transient or poison conditions on the durable command/event logs.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("durable log unreachable: {0}")]
    Unreachable(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("failed to deserialize message payload: {0}")]
    Deserialize(String),

    #[error("failed to serialize event payload: {0}")]
    Serialize(String),

    #[error("publish retries exhausted for symbol {symbol} after {attempts} attempts")]
    PublishRetryExhausted { symbol: String, attempts: u32 },

    #[error("command channel for symbol {symbol} is closed")]
    ChannelClosed { symbol: String },
}

/// Errors raised by the admin control surface.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("invalid symbol {0:?}: must match [A-Z0-9]{{1,32}}")]
    InvalidSymbol(String),

    #[error("unknown symbol {0:?}")]
    UnknownSymbol(String),
}

/// Errors raised while loading process configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for environment variable {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}
