//! Per-symbol order book: sorted price ladders (C1) plus the order index and
//! sequence counter that make up C2. Combined into one type because nothing in
//! this codebase ever uses a ladder without the index that backs cancellation —
//! splitting them would just be two structs passed around together everywhere.

use std::collections::BTreeMap;
use std::collections::HashMap;

use super::price_level::{Arena, Handle, PriceLevel};
use super::types::{Order, RejectReason, Side};

pub struct OrderBook {
    pub symbol: String,
    bids: BTreeMap<u64, PriceLevel>,
    bid_arena: Arena,
    asks: BTreeMap<u64, PriceLevel>,
    ask_arena: Arena,
    orders: HashMap<u64, (Side, Handle)>,
    next_ts: u64,
    pub seq: u64,
    pub next_trade_id: u64,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            bid_arena: Arena::new(),
            asks: BTreeMap::new(),
            ask_arena: Arena::new(),
            orders: HashMap::new(),
            next_ts: 0,
            seq: 0,
            next_trade_id: 0,
        }
    }

    pub fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub fn next_trade_id(&mut self) -> u64 {
        self.next_trade_id += 1;
        self.next_trade_id
    }

    pub fn contains_order(&self, order_id: u64) -> bool {
        self.orders.contains_key(&order_id)
    }

    fn side_mut(&mut self, side: Side) -> (&mut Arena, &mut BTreeMap<u64, PriceLevel>) {
        match side {
            Side::Buy => (&mut self.bid_arena, &mut self.bids),
            Side::Sell => (&mut self.ask_arena, &mut self.asks),
        }
    }

    fn side(&self, side: Side) -> (&Arena, &BTreeMap<u64, PriceLevel>) {
        match side {
            Side::Buy => (&self.bid_arena, &self.bids),
            Side::Sell => (&self.ask_arena, &self.asks),
        }
    }

    /// Insert `order` into the appropriate ladder, assigning `timestamp_ns`.
    /// Fails only when `order_id` is already resident.
    pub fn add(&mut self, mut order: Order) -> Result<(), RejectReason> {
        if self.orders.contains_key(&order.order_id) {
            return Err(RejectReason::DuplicateOrder);
        }
        self.next_ts += 1;
        order.timestamp_ns = self.next_ts;
        let order_id = order.order_id;
        let side = order.side;
        let price = order.price;
        let (arena, levels) = self.side_mut(side);
        let level = levels.entry(price).or_insert_with(|| PriceLevel::new(price));
        let handle = level.push_back(arena, order);
        self.orders.insert(order_id, (side, handle));
        Ok(())
    }

    /// Remove `order_id` from the book entirely, returning it if it was resident.
    pub fn cancel(&mut self, order_id: u64) -> Option<Order> {
        let (side, handle) = self.orders.remove(&order_id)?;
        let (arena, levels) = self.side_mut(side);
        let price = arena[handle].order.price;
        let order = {
            let level = levels.get_mut(&price)?;
            let order = level.remove(arena, handle);
            if level.is_empty() {
                levels.remove(&price);
            }
            order
        };
        Some(order)
    }

    /// Look up the owning `user_id` of a resident order without removing it.
    pub fn owner_of(&self, order_id: u64) -> Option<u64> {
        let (side, handle) = *self.orders.get(&order_id)?;
        let (arena, _) = self.side(side);
        Some(arena[handle].order.user_id)
    }

    pub fn best_bid(&self) -> Option<(u64, u64)> {
        self.bids
            .last_key_value()
            .map(|(&price, level)| (price, level.total_qty))
    }

    pub fn best_ask(&self) -> Option<(u64, u64)> {
        self.asks
            .first_key_value()
            .map(|(&price, level)| (price, level.total_qty))
    }

    pub fn depth(&self, limit: usize) -> (Vec<(u64, u64)>, Vec<(u64, u64)>) {
        let bids = self
            .bids
            .iter()
            .rev()
            .take(limit)
            .map(|(&price, level)| (price, level.total_qty))
            .collect();
        let asks = self
            .asks
            .iter()
            .take(limit)
            .map(|(&price, level)| (price, level.total_qty))
            .collect();
        (bids, asks)
    }

    /// The best resting price on `side`, if any levels remain there.
    pub fn best_price_of(&self, side: Side) -> Option<u64> {
        match side {
            Side::Buy => self.bids.last_key_value().map(|(&p, _)| p),
            Side::Sell => self.asks.first_key_value().map(|(&p, _)| p),
        }
    }

    /// The next price level after `price` on `side`, walking away from the
    /// touch (used to advance a matching or FOK pre-check walk).
    pub fn next_price_after(&self, side: Side, price: u64) -> Option<u64> {
        match side {
            Side::Buy => self
                .bids
                .range(..price)
                .next_back()
                .map(|(&p, _)| p),
            Side::Sell => self
                .asks
                .range((std::ops::Bound::Excluded(price), std::ops::Bound::Unbounded))
                .next()
                .map(|(&p, _)| p),
        }
    }

    pub fn level(&self, side: Side, price: u64) -> Option<&PriceLevel> {
        let (_, levels) = self.side(side);
        levels.get(&price)
    }

    pub fn arena(&self, side: Side) -> &Arena {
        let (arena, _) = self.side(side);
        arena
    }

    /// Fill the resident order at `handle` on `side`'s level `price` by `qty`,
    /// removing the node (and the level, if now empty) when it reaches zero.
    /// Returns the maker's remaining `leaves_qty` and whether it was removed.
    pub fn fill_at(&mut self, side: Side, price: u64, handle: Handle, qty: u64) -> (u64, bool) {
        let (arena, levels) = self.side_mut(side);
        let level = levels.get_mut(&price).expect("level must exist for fill_at");
        level.fill(arena, handle, qty);
        let remaining = arena[handle].order.leaves_qty;
        let removed = if remaining == 0 {
            let order_id = arena[handle].order.order_id;
            level.remove(arena, handle);
            self.orders.remove(&order_id);
            if level.is_empty() {
                levels.remove(&price);
            }
            true
        } else {
            false
        };
        (remaining, removed)
    }

    pub fn maker_order_id_at(&self, side: Side, handle: Handle) -> u64 {
        let (arena, _) = self.side(side);
        arena[handle].order.order_id
    }

    pub fn maker_user_id_at(&self, side: Side, handle: Handle) -> u64 {
        let (arena, _) = self.side(side);
        arena[handle].order.user_id
    }

    pub fn maker_leaves_qty_at(&self, side: Side, handle: Handle) -> u64 {
        let (arena, _) = self.side(side);
        arena[handle].order.leaves_qty
    }

    /// Walk `side`'s level at `price` from its head, returning the handle of
    /// the first resident order not owned by `taker_user_id`, without
    /// mutating anything. `None` means every resident order at this level
    /// belongs to the taker (a self-trade wall).
    pub fn first_non_self_at(&self, side: Side, price: u64, taker_user_id: u64) -> Option<Handle> {
        let (arena, levels) = self.side(side);
        let level = levels.get(&price)?;
        let mut cur = level.head();
        while let Some(handle) = cur {
            if arena[handle].order.user_id != taker_user_id {
                return Some(handle);
            }
            cur = level.next_of(arena, handle);
        }
        None
    }
}
