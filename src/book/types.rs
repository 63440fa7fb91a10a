//! Order-level data types shared by the book, the matching engine and the wire format.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
    PostOnly,
}

/// Stable reason codes surfaced on `ORDER_REJECTED` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    Halted,
    CancelOnly,
    InvalidQty,
    InvalidPrice,
    WouldTake,
    FokUnfillable,
    DuplicateOrder,
    UnknownOrder,
    NotOwner,
}

/// A live order. Owned by the book once accepted; the `price` field doubles as the
/// key used to find the node's price level on cancel/reduce, since the arena node
/// itself does not borrow from the level it lives in (see `book::price_level`).
#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: u64,
    pub client_order_id: Option<String>,
    pub user_id: u64,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub price: u64,
    pub orig_qty: u64,
    pub leaves_qty: u64,
    pub timestamp_ns: u64,
}

impl Order {
    /// `true` once either a MARKET flavor or an IOC/FOK limit has exhausted its
    /// resting eligibility and must not enter the book.
    pub fn must_not_rest(&self) -> bool {
        matches!(self.order_type, OrderType::Market)
            || matches!(self.time_in_force, TimeInForce::Ioc | TimeInForce::Fok)
    }
}
