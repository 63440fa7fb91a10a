//! Commands accepted by the matching engine, one at a time, from the engine host.

use crate::book::Order;

#[derive(Debug, Clone)]
pub enum Command {
    New(Order),
    Cancel { order_id: u64, user_id: u64 },
}
