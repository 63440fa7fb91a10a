//! Price levels as an intrusive doubly-linked FIFO over a slab arena.
//!
//! Each resident order lives in a `slab::Slab<OrderNode>` keyed by a `usize`
//! handle; the handle is what makes mid-queue cancellation O(1) instead of the
//! O(n) a `VecDeque` of orders would require. A level never owns its orders
//! directly — it only stores the head/tail handles, and each node stores its
//! neighbors. The arena itself lives on the owning `OrderBook`.

use slab::Slab;

use super::types::Order;

pub type Handle = usize;

pub struct OrderNode {
    pub order: Order,
    prev: Option<Handle>,
    next: Option<Handle>,
}

/// Arena shared by every price level of one side of one symbol's book.
pub type Arena = Slab<OrderNode>;

#[derive(Debug, Default)]
pub struct PriceLevel {
    pub price: u64,
    pub total_qty: u64,
    head: Option<Handle>,
    tail: Option<Handle>,
}

impl PriceLevel {
    pub fn new(price: u64) -> Self {
        Self {
            price,
            total_qty: 0,
            head: None,
            tail: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn head(&self) -> Option<Handle> {
        self.head
    }

    /// Push a new resident order to the back of this level's FIFO queue,
    /// returning the arena handle it was stored under.
    pub fn push_back(&mut self, arena: &mut Arena, order: Order) -> Handle {
        self.total_qty += order.leaves_qty;
        let handle = arena.insert(OrderNode {
            order,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => arena[tail].next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        handle
    }

    /// The handle immediately following `handle` in FIFO order, if any.
    pub fn next_of(&self, arena: &Arena, handle: Handle) -> Option<Handle> {
        arena[handle].next
    }

    /// Decrease the resident order's `leaves_qty` by `qty`, keeping the
    /// level's cached total in sync. Does not remove the node even if it
    /// reaches zero — call `remove` for that.
    pub fn fill(&mut self, arena: &mut Arena, handle: Handle, qty: u64) {
        let node = &mut arena[handle];
        node.order.leaves_qty -= qty;
        self.total_qty -= qty;
    }

    /// Unlink and return the order stored at `handle`. The handle is invalid
    /// after this call.
    pub fn remove(&mut self, arena: &mut Arena, handle: Handle) -> Order {
        let node = arena.remove(handle);
        match node.prev {
            Some(prev) => arena[prev].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => arena[next].prev = node.prev,
            None => self.tail = node.prev,
        }
        self.total_qty = self.total_qty.saturating_sub(node.order.leaves_qty);
        node.order
    }

    /// Orders resident at this level, in FIFO order. For depth/snapshot use,
    /// not the matching hot path.
    pub fn iter<'a>(&self, arena: &'a Arena) -> impl Iterator<Item = &'a Order> + 'a {
        let mut cur = self.head;
        std::iter::from_fn(move || {
            let handle = cur?;
            let node = &arena[handle];
            cur = node.next;
            Some(&node.order)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::types::{OrderType, Side, TimeInForce};

    fn order(id: u64, qty: u64) -> Order {
        Order {
            order_id: id,
            client_order_id: None,
            user_id: 1,
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            price: 100,
            orig_qty: qty,
            leaves_qty: qty,
            timestamp_ns: 0,
        }
    }

    #[test]
    fn fifo_order_preserved() {
        let mut arena = Arena::new();
        let mut level = PriceLevel::new(100);
        let a = level.push_back(&mut arena, order(1, 10));
        let _b = level.push_back(&mut arena, order(2, 20));
        let _c = level.push_back(&mut arena, order(3, 5));

        assert_eq!(level.total_qty, 35);
        let ids: Vec<u64> = level.iter(&arena).map(|o| o.order_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        assert_eq!(level.head(), Some(a));
    }

    #[test]
    fn mid_queue_removal_keeps_fifo_for_rest() {
        let mut arena = Arena::new();
        let mut level = PriceLevel::new(100);
        let a = level.push_back(&mut arena, order(1, 10));
        let b = level.push_back(&mut arena, order(2, 20));
        let c = level.push_back(&mut arena, order(3, 5));

        level.remove(&mut arena, b);

        let ids: Vec<u64> = level.iter(&arena).map(|o| o.order_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(level.total_qty, 15);
        assert_eq!(level.head(), Some(a));
        let _ = c;
    }

    #[test]
    fn fill_reduces_total_without_removing() {
        let mut arena = Arena::new();
        let mut level = PriceLevel::new(100);
        let a = level.push_back(&mut arena, order(1, 10));
        level.fill(&mut arena, a, 4);
        assert_eq!(arena[a].order.leaves_qty, 6);
        assert_eq!(level.total_qty, 6);
        assert!(!level.is_empty());
    }
}
