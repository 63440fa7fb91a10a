//! The price ladder (C1) and per-symbol order book (C2).

mod order_book;
mod price_level;
mod types;

pub use order_book::OrderBook;
pub use price_level::{Arena, Handle, PriceLevel};
pub use types::{Order, OrderType, RejectReason, Side, TimeInForce};
