//! Events emitted by the matching engine. Immutable once produced; `seq`
//! increases by exactly one per emitted event for a symbol and never repeats.

use serde::{Deserialize, Serialize};

use crate::book::{RejectReason, Side};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub symbol: String,
    pub seq: u64,
    pub timestamp_ns: u64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    OrderAccepted {
        order_id: u64,
        user_id: u64,
        side: Side,
        price: u64,
        qty: u64,
    },
    OrderRejected {
        order_id: u64,
        reason: RejectReason,
    },
    OrderCanceled {
        order_id: u64,
        user_id: u64,
        leaves_qty: u64,
    },
    TradeCreated {
        trade_id: u64,
        maker_order_id: u64,
        taker_order_id: u64,
        maker_user_id: u64,
        taker_user_id: u64,
        price: u64,
        qty: u64,
        taker_side: Side,
    },
    OrderPartiallyFilled {
        order_id: u64,
        executed_qty: u64,
        leaves_qty: u64,
    },
    OrderFilled {
        order_id: u64,
    },
}
