//! Market-data projector (C7): a separate consumer group over the output
//! stream that rebuilds public depth/trade/ticker state and fans it out to
//! subscribers. Grounded in the same pull-consumer shape as the command
//! consumer, reading the event log instead of the command log and requiring
//! no acknowledgement discipline beyond "don't lose my place" since this is
//! a best-effort live view, not a durable source of truth.

use std::collections::HashMap;
use std::sync::Arc;

use async_nats::jetstream;
use async_nats::jetstream::consumer::pull;
use dashmap::DashMap;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, error, warn};

use crate::book::Side;
use crate::clock::now_ms;
use crate::engine::{Event, EventKind};
use crate::error::IoError;
use crate::io::wire::parse_event;

use super::state::{DepthState, Ticker, TradeRecord, TradeRing};
use super::subscriber::{ChannelKind, ChannelName, SubscriberRegistry};

const DEPTH_PUBLISH_LIMIT: usize = 50;

/// An `ORDER_ACCEPTED` that hasn't yet been resolved: every NEW command emits
/// one regardless of whether the order ends up resting (market/IOC/FOK takers
/// and fully-filled GTC takers never do), so it cannot be added to public
/// depth until its command's outcome is known.
struct PendingAccept {
    order_id: u64,
    side: Side,
    price: u64,
    qty: u64,
}

/// Tracks side/price for each currently-resting order, since `ORDER_CANCELED`
/// only carries `order_id`/`leaves_qty` and the depth side it vacates has to
/// come from somewhere other than the event itself.
#[derive(Default)]
struct SymbolState {
    depth: DepthState,
    trades: TradeRing,
    ticker: Ticker,
    resting: HashMap<u64, (Side, u64)>,
    pending_accept: Option<PendingAccept>,
    /// Set between a `TRADE_CREATED` and its paired maker
    /// `ORDER_FILLED`/`ORDER_PARTIALLY_FILLED`, so that pair is never
    /// mistaken for the start of a new command while `pending_accept` is
    /// still open.
    mid_trade: bool,
}

/// The pure, NATS-free half of the projector: event mutation and subscriber
/// fan-out. Split out from [`Projector`] so the mutation rules are testable
/// without a live broker.
pub struct ProjectionEngine {
    symbols: DashMap<String, SymbolState>,
    subscribers: Arc<SubscriberRegistry>,
}

impl ProjectionEngine {
    pub fn new(subscribers: Arc<SubscriberRegistry>) -> Self {
        Self {
            symbols: DashMap::new(),
            subscribers,
        }
    }

    /// Applies one event's mutation rules to the owning symbol's state, then
    /// publishes the affected channels' updates to their subscribers.
    ///
    /// A command's events are fully emitted, in order, before the next
    /// command's events begin (single-writer-per-symbol upstream), so any
    /// event that is neither a `TRADE_CREATED`/maker-resolution pair nor the
    /// resolution of the currently pending accept marks the start of a new
    /// command. That is the only point at which a still-open
    /// `pending_accept` can be safely promoted to resting depth: the command
    /// that accepted it ended without ever emitting its own
    /// `ORDER_FILLED`/`ORDER_CANCELED`, which only happens when the order
    /// actually rested.
    pub fn apply_event(&self, event: &Event) {
        let mut state = self.symbols.entry(event.symbol.clone()).or_default();

        let resolves_pending = matches!(
            &event.kind,
            EventKind::OrderFilled { order_id } | EventKind::OrderCanceled { order_id, .. }
                if state.pending_accept.as_ref().is_some_and(|p| p.order_id == *order_id)
        );
        let is_continuation = matches!(event.kind, EventKind::TradeCreated { .. })
            || state.mid_trade
            || resolves_pending;

        if !is_continuation {
            if let Some(pending) = state.pending_accept.take() {
                state
                    .depth
                    .add_resting_qty(pending.side, pending.price, pending.qty);
                state.resting.insert(pending.order_id, (pending.side, pending.price));
                self.publish_book(&event.symbol, &state.depth);
            }
        }

        match &event.kind {
            EventKind::OrderAccepted {
                order_id,
                side,
                price,
                qty,
                ..
            } => {
                state.pending_accept = Some(PendingAccept {
                    order_id: *order_id,
                    side: *side,
                    price: *price,
                    qty: *qty,
                });
            }
            EventKind::OrderCanceled {
                order_id,
                leaves_qty,
                ..
            } => {
                if resolves_pending {
                    // Order never rested; the canceled residual was carried
                    // only in the pending accept, never added to depth.
                    state.pending_accept = None;
                } else if let Some((side, price)) = state.resting.remove(order_id) {
                    state.depth.remove_qty(side, price, *leaves_qty);
                }
                state.depth.touch(event.seq);
                self.publish_book(&event.symbol, &state.depth);
            }
            EventKind::TradeCreated {
                trade_id,
                price,
                qty,
                taker_side,
                ..
            } => {
                state.mid_trade = true;
                let maker_side = taker_side.opposite();
                state.depth.remove_qty(maker_side, *price, *qty);
                state.depth.touch(event.seq);
                state.trades.push(TradeRecord {
                    trade_id: *trade_id,
                    price: *price,
                    qty: *qty,
                    taker_side: *taker_side,
                    timestamp_ns: event.timestamp_ns,
                });
                state.ticker.record_trade(*price, *qty, now_ms());

                self.publish_book(&event.symbol, &state.depth);
                self.publish_trade(&event.symbol, &state);
                self.publish_ticker(&event.symbol, state.depth.last_update_id, &state.ticker);
            }
            EventKind::OrderFilled { order_id } => {
                state.mid_trade = false;
                state.resting.remove(order_id);
                if resolves_pending {
                    // Taker's own terminal fill: it traded its full quantity
                    // in the same command that accepted it and never rested.
                    state.pending_accept = None;
                }
            }
            EventKind::OrderPartiallyFilled { .. } => {
                // Maker resolution of the trade just applied above; depth
                // was already adjusted there.
                state.mid_trade = false;
            }
            EventKind::OrderRejected { .. } => {
                // Never touched the book.
            }
        }
    }

    fn publish_book(&self, symbol: &str, depth: &DepthState) {
        let channel = ChannelName {
            symbol: symbol.to_string(),
            kind: ChannelKind::Book,
        };
        let (bids, asks) = depth.snapshot(DEPTH_PUBLISH_LIMIT);
        let payload = json!({
            "channel": channel.to_string(),
            "seq": depth.last_update_id,
            "timestampMs": depth.timestamp_ms,
            "data": { "bids": bids, "asks": asks },
        });
        self.publish_json(&channel, &payload);
    }

    fn publish_trade(&self, symbol: &str, state: &SymbolState) {
        let channel = ChannelName {
            symbol: symbol.to_string(),
            kind: ChannelKind::Trades,
        };
        let recent: Vec<_> = state.trades.recent().collect();
        let payload = json!({
            "channel": channel.to_string(),
            "seq": state.depth.last_update_id,
            "timestampMs": state.depth.timestamp_ms,
            "data": recent,
        });
        self.publish_json(&channel, &payload);
    }

    fn publish_ticker(&self, symbol: &str, seq: u64, ticker: &Ticker) {
        let channel = ChannelName {
            symbol: symbol.to_string(),
            kind: ChannelKind::Ticker,
        };
        let payload = json!({
            "channel": channel.to_string(),
            "seq": seq,
            "timestampMs": now_ms(),
            "data": {
                "open": ticker.open,
                "high": ticker.high,
                "low": ticker.low,
                "last": ticker.last,
                "volume": ticker.volume,
                "quoteVolume": ticker.quote_volume.to_string(),
                "tradeCount": ticker.trade_count,
                "priceChangePct": ticker.price_change_pct(),
            },
        });
        self.publish_json(&channel, &payload);
    }

    fn publish_json(&self, channel: &ChannelName, payload: &serde_json::Value) {
        match serde_json::to_vec(payload) {
            Ok(bytes) => self.subscribers.publish(channel, &bytes),
            Err(e) => error!(error = %e, "failed to serialize market-data update"),
        }
    }

    #[cfg(test)]
    fn depth_snapshot(&self, symbol: &str, limit: usize) -> (Vec<(u64, u64)>, Vec<(u64, u64)>) {
        self.symbols.get(symbol).unwrap().depth.snapshot(limit)
    }
}

/// Owns the durable pull consumer over the event stream and drives events
/// into a [`ProjectionEngine`].
pub struct Projector {
    consumer: jetstream::consumer::Consumer<pull::Config>,
    engine: ProjectionEngine,
}

impl Projector {
    pub async fn new(
        js: &jetstream::Context,
        stream_name: &str,
        durable_name: &str,
        subscribers: Arc<SubscriberRegistry>,
    ) -> Result<Self, IoError> {
        let stream = js
            .get_stream(stream_name)
            .await
            .map_err(|e| IoError::Unreachable(e.to_string()))?;
        let consumer = stream
            .get_or_create_consumer(
                durable_name,
                pull::Config {
                    durable_name: Some(durable_name.to_string()),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| IoError::Unreachable(e.to_string()))?;
        Ok(Self {
            consumer,
            engine: ProjectionEngine::new(subscribers),
        })
    }

    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut messages = match self.consumer.messages().await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "could not open event message stream");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("projector shutting down");
                        return;
                    }
                }
                next = messages.next() => {
                    match next {
                        Some(Ok(message)) => {
                            self.handle_message(&message.payload).await;
                            if let Err(e) = message.ack().await {
                                warn!(error = %e, "failed to ack projector event delivery");
                            }
                        }
                        Some(Err(e)) => warn!(error = %e, "error pulling event message"),
                        None => {
                            warn!("event message stream ended, reconnecting");
                            match self.consumer.messages().await {
                                Ok(fresh) => messages = fresh,
                                Err(e) => error!(error = %e, "failed to reopen event message stream"),
                            }
                        }
                    }
                }
            }
        }
    }

    async fn handle_message(&self, payload: &[u8]) {
        match parse_event(payload) {
            Ok(event) => self.engine.apply_event(&event),
            Err(reason) => warn!(reason = %reason, "malformed event on output stream, skipping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{Order, OrderType, TimeInForce};
    use crate::control::ControlPlane;
    use crate::engine::{Command, MatchingEngine};

    fn limit_order(id: u64, user: u64, side: Side, price: u64, qty: u64) -> Order {
        Order {
            order_id: id,
            client_order_id: None,
            user_id: user,
            symbol: "BTCUSDT".to_string(),
            side,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            price,
            orig_qty: qty,
            leaves_qty: qty,
            timestamp_ns: 0,
        }
    }

    fn replay(engine: &ProjectionEngine, events: Vec<Event>) {
        for event in events {
            engine.apply_event(&event);
        }
    }

    #[test]
    fn fully_filled_taker_never_appears_in_depth() {
        // Mirrors the simple-cross scenario: id1 sells 100 and rests, id2
        // buys 50 and fully fills against it. id2's own ORDER_ACCEPTED must
        // never be mistaken for resting quantity.
        let mut matching = MatchingEngine::new("BTCUSDT");
        let control = ControlPlane::new();
        let engine = ProjectionEngine::new(Arc::new(SubscriberRegistry::new()));

        let events = matching.apply(
            Command::New(limit_order(1, 100, Side::Sell, 50000, 100)),
            &control,
        );
        replay(&engine, events);

        let events = matching.apply(
            Command::New(limit_order(2, 200, Side::Buy, 50000, 50)),
            &control,
        );
        replay(&engine, events);

        let (bids, asks) = engine.depth_snapshot("BTCUSDT", 10);
        assert_eq!(bids, Vec::<(u64, u64)>::new());
        assert_eq!(asks, vec![(50000, 50)]);
    }

    #[test]
    fn market_taker_leaves_no_phantom_depth_at_its_own_price() {
        let mut matching = MatchingEngine::new("BTCUSDT");
        let control = ControlPlane::new();
        let engine = ProjectionEngine::new(Arc::new(SubscriberRegistry::new()));

        let events = matching.apply(
            Command::New(limit_order(1, 100, Side::Sell, 50000, 10)),
            &control,
        );
        replay(&engine, events);

        let market_taker = Order {
            order_id: 2,
            client_order_id: None,
            user_id: 200,
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Ioc,
            price: 0,
            orig_qty: 20,
            leaves_qty: 20,
            timestamp_ns: 0,
        };
        let events = matching.apply(Command::New(market_taker), &control);
        replay(&engine, events);

        // Fully swept the resting ask and canceled its own unfillable
        // residue; price 0 (the market order's wire price) must never show
        // up as a resting bid.
        let (bids, asks) = engine.depth_snapshot("BTCUSDT", 10);
        assert_eq!(bids, Vec::<(u64, u64)>::new());
        assert_eq!(asks, Vec::<(u64, u64)>::new());
    }

    #[test]
    fn canceling_a_just_rested_order_leaves_no_residual_depth() {
        let mut matching = MatchingEngine::new("BTCUSDT");
        let control = ControlPlane::new();
        let engine = ProjectionEngine::new(Arc::new(SubscriberRegistry::new()));

        let events = matching.apply(
            Command::New(limit_order(1, 100, Side::Buy, 50000, 10)),
            &control,
        );
        replay(&engine, events);

        let events = matching.apply(
            Command::Cancel {
                order_id: 1,
                user_id: 100,
            },
            &control,
        );
        replay(&engine, events);

        let (bids, _) = engine.depth_snapshot("BTCUSDT", 10);
        assert_eq!(bids, Vec::<(u64, u64)>::new());
    }

    #[test]
    fn resting_order_is_committed_once_the_next_command_starts() {
        let mut matching = MatchingEngine::new("BTCUSDT");
        let control = ControlPlane::new();
        let engine = ProjectionEngine::new(Arc::new(SubscriberRegistry::new()));

        // Neither id1 nor id2 resolves with its own ORDER_FILLED/
        // ORDER_CANCELED, so each only becomes visible once a later,
        // unrelated command's head event proves its own NEW command ended
        // without it ever coming back as the subject of a terminal event.
        for (id, user, price, qty) in [(1, 100, 49000, 10), (2, 200, 48000, 5), (3, 300, 47000, 3)]
        {
            let events =
                matching.apply(Command::New(limit_order(id, user, Side::Buy, price, qty)), &control);
            replay(&engine, events);
        }

        let (bids, _) = engine.depth_snapshot("BTCUSDT", 10);
        assert_eq!(bids, vec![(49000, 10), (48000, 5)]);
    }

    #[test]
    fn trade_reduces_maker_side_depth() {
        let mut matching = MatchingEngine::new("BTCUSDT");
        let control = ControlPlane::new();
        let engine = ProjectionEngine::new(Arc::new(SubscriberRegistry::new()));

        let events = matching.apply(
            Command::New(limit_order(1, 100, Side::Sell, 50000, 100)),
            &control,
        );
        replay(&engine, events);

        let events = matching.apply(
            Command::New(limit_order(2, 200, Side::Buy, 50000, 40)),
            &control,
        );
        replay(&engine, events);

        assert_eq!(engine.depth_snapshot("BTCUSDT", 10).1, vec![(50000, 60)]);
    }

    #[test]
    fn cancel_touches_seq_without_panicking_on_unseen_symbol() {
        let engine = ProjectionEngine::new(Arc::new(SubscriberRegistry::new()));
        let canceled = Event {
            symbol: "ETHUSDT".into(),
            seq: 1,
            timestamp_ns: 0,
            kind: EventKind::OrderCanceled {
                order_id: 1,
                user_id: 1,
                leaves_qty: 5,
            },
        };
        engine.apply_event(&canceled);
        assert_eq!(engine.depth_snapshot("ETHUSDT", 10), (vec![], vec![]));
    }
}
