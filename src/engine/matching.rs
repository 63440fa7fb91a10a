//! Price-time priority matching with self-trade prevention and time-in-force
//! handling (C3). Operates on one symbol's `OrderBook`; never performs I/O and
//! never awaits — all suspension lives above this layer in the engine host.

use crate::book::{Order, OrderBook, OrderType, RejectReason, Side, TimeInForce};
use crate::clock::now_ns;
use crate::control::{ControlPlane, SymbolStatus};

use super::command::Command;
use super::event::{Event, EventKind};

pub struct MatchingEngine {
    pub book: OrderBook,
}

impl MatchingEngine {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            book: OrderBook::new(symbol),
        }
    }

    pub fn apply(&mut self, command: Command, control: &ControlPlane) -> Vec<Event> {
        match command {
            Command::New(order) => self.apply_new(order, control),
            Command::Cancel { order_id, user_id } => self.apply_cancel(order_id, user_id),
        }
    }

    fn emit(&mut self, events: &mut Vec<Event>, kind: EventKind) {
        let seq = self.book.next_seq();
        events.push(Event {
            symbol: self.book.symbol.clone(),
            seq,
            timestamp_ns: now_ns(),
            kind,
        });
    }

    fn reject(&mut self, events: &mut Vec<Event>, order_id: u64, reason: RejectReason) {
        self.emit(events, EventKind::OrderRejected { order_id, reason });
    }

    fn apply_cancel(&mut self, order_id: u64, user_id: u64) -> Vec<Event> {
        let mut events = Vec::new();
        match self.book.owner_of(order_id) {
            None => self.reject(&mut events, order_id, RejectReason::UnknownOrder),
            Some(owner) if owner != user_id => {
                self.reject(&mut events, order_id, RejectReason::NotOwner)
            }
            Some(_) => {
                let order = self
                    .book
                    .cancel(order_id)
                    .expect("owner_of confirmed residency");
                self.emit(
                    &mut events,
                    EventKind::OrderCanceled {
                        order_id,
                        user_id: order.user_id,
                        leaves_qty: order.leaves_qty,
                    },
                );
            }
        }
        events
    }

    fn apply_new(&mut self, mut order: Order, control: &ControlPlane) -> Vec<Event> {
        let mut events = Vec::new();
        let order_id = order.order_id;

        if control.kill_switch_engaged()
            || control.symbol_status(&order.symbol) == SymbolStatus::Halt
        {
            self.reject(&mut events, order_id, RejectReason::Halted);
            return events;
        }
        if control.symbol_status(&order.symbol) == SymbolStatus::CancelOnly {
            self.reject(&mut events, order_id, RejectReason::CancelOnly);
            return events;
        }
        if order.leaves_qty == 0 || order.orig_qty == 0 {
            self.reject(&mut events, order_id, RejectReason::InvalidQty);
            return events;
        }
        match order.order_type {
            OrderType::Limit if order.price == 0 => {
                self.reject(&mut events, order_id, RejectReason::InvalidPrice);
                return events;
            }
            OrderType::Market if order.price != 0 => {
                self.reject(&mut events, order_id, RejectReason::InvalidPrice);
                return events;
            }
            _ => {}
        }
        if self.book.contains_order(order_id) {
            self.reject(&mut events, order_id, RejectReason::DuplicateOrder);
            return events;
        }

        let opposite = order.side.opposite();

        if matches!(order.time_in_force, TimeInForce::Fok)
            && !self.fok_fillable(&order, opposite)
        {
            self.reject(&mut events, order_id, RejectReason::FokUnfillable);
            return events;
        }

        if matches!(order.time_in_force, TimeInForce::PostOnly) {
            let would_cross = match order.side {
                Side::Buy => self
                    .book
                    .best_ask()
                    .is_some_and(|(ask, _)| order.price >= ask),
                Side::Sell => self
                    .book
                    .best_bid()
                    .is_some_and(|(bid, _)| order.price <= bid),
            };
            if would_cross {
                self.reject(&mut events, order_id, RejectReason::WouldTake);
                return events;
            }
        }

        self.emit(
            &mut events,
            EventKind::OrderAccepted {
                order_id,
                user_id: order.user_id,
                side: order.side,
                price: order.price,
                qty: order.orig_qty,
            },
        );

        self.match_loop(&mut order, opposite, &mut events);

        if order.leaves_qty == 0 {
            self.emit(&mut events, EventKind::OrderFilled { order_id });
        } else if order.must_not_rest() {
            self.emit(
                &mut events,
                EventKind::OrderCanceled {
                    order_id,
                    user_id: order.user_id,
                    leaves_qty: order.leaves_qty,
                },
            );
        } else {
            self.book
                .add(order)
                .expect("duplicate order_id already rejected during admission");
        }

        events
    }

    /// Walks the opposite ladder, matching against the first non-self-owned
    /// maker at each acceptable price level. Stops entirely — without
    /// advancing to a further price level — the moment a level's only
    /// remaining residents belong to the taker, per the self-trade rule: a
    /// self-wall blocks, it is never crossed around.
    fn match_loop(&mut self, taker: &mut Order, opposite: Side, events: &mut Vec<Event>) {
        loop {
            if taker.leaves_qty == 0 {
                break;
            }
            let Some(level_price) = self.book.best_price_of(opposite) else {
                break;
            };
            if !price_acceptable(taker, level_price) {
                break;
            }

            let mut blocked = false;
            loop {
                if taker.leaves_qty == 0 {
                    break;
                }
                let Some(maker_handle) =
                    self.book.first_non_self_at(opposite, level_price, taker.user_id)
                else {
                    blocked = true;
                    break;
                };

                let maker_order_id = self.book.maker_order_id_at(opposite, maker_handle);
                let maker_user_id = self.book.maker_user_id_at(opposite, maker_handle);
                let maker_leaves = self.book.maker_leaves_qty_at(opposite, maker_handle);
                let match_qty = taker.leaves_qty.min(maker_leaves);

                let trade_id = self.book.next_trade_id();
                taker.leaves_qty -= match_qty;
                let (maker_remaining, maker_removed) =
                    self.book.fill_at(opposite, level_price, maker_handle, match_qty);

                self.emit(
                    events,
                    EventKind::TradeCreated {
                        trade_id,
                        maker_order_id,
                        taker_order_id: taker.order_id,
                        maker_user_id,
                        taker_user_id: taker.user_id,
                        price: level_price,
                        qty: match_qty,
                        taker_side: taker.side,
                    },
                );

                if maker_removed {
                    self.emit(events, EventKind::OrderFilled { order_id: maker_order_id });
                } else {
                    self.emit(
                        events,
                        EventKind::OrderPartiallyFilled {
                            order_id: maker_order_id,
                            executed_qty: match_qty,
                            leaves_qty: maker_remaining,
                        },
                    );
                }
            }

            if blocked {
                break;
            }
        }
    }

    /// Read-only simulation of `match_loop`'s outcome, used by the FOK
    /// pre-check. Must agree with `match_loop` exactly: a level's non-self
    /// quantity is always fully reachable, but a level with any self-owned
    /// resident order blocks everything beyond it.
    fn fok_fillable(&self, order: &Order, opposite: Side) -> bool {
        let target = order.leaves_qty;
        let mut accumulated: u64 = 0;
        let mut price = self.book.best_price_of(opposite);

        while let Some(level_price) = price {
            if !price_acceptable(order, level_price) {
                break;
            }
            let level = self
                .book
                .level(opposite, level_price)
                .expect("price came from the ladder itself");
            let arena = self.book.arena(opposite);

            let mut has_self = false;
            for resident in level.iter(arena) {
                if resident.user_id == order.user_id {
                    has_self = true;
                } else {
                    accumulated = accumulated.saturating_add(resident.leaves_qty);
                }
            }

            if accumulated >= target {
                return true;
            }
            if has_self {
                break;
            }
            price = self.book.next_price_after(opposite, level_price);
        }

        accumulated >= target
    }
}

fn price_acceptable(taker: &Order, level_price: u64) -> bool {
    if taker.price == 0 {
        return true;
    }
    match taker.side {
        Side::Buy => level_price <= taker.price,
        Side::Sell => level_price >= taker.price,
    }
}
