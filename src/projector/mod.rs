//! Market-data projector (C7): rebuilds public depth/trade/ticker state from
//! the event stream and fans updates out to bounded per-subscriber channels.

mod projector;
mod state;
mod subscriber;

pub use projector::{ProjectionEngine, Projector};
pub use state::{DepthState, Ticker, TradeRecord, TradeRing};
pub use subscriber::{ChannelKind, ChannelName, SubscriberRegistry};
