//! In-memory public market-data state, rebuilt purely from the engine event
//! stream: depth, recent trades, and a 24-hour rolling ticker.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use crate::book::Side;
use crate::clock::now_ms;

const TRADE_RING_CAPACITY: usize = 1000;
const TICKER_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// Aggregated depth for one symbol, rebuilt from `ORDER_ACCEPTED` /
/// `ORDER_CANCELED` / `TRADE_CREATED` events.
#[derive(Debug, Default, Serialize)]
pub struct DepthState {
    bids: BTreeMap<u64, u64>,
    asks: BTreeMap<u64, u64>,
    pub last_update_id: u64,
    pub timestamp_ms: u64,
}

impl DepthState {
    fn adjust(levels: &mut BTreeMap<u64, u64>, price: u64, delta: i64) {
        let entry = levels.entry(price).or_insert(0);
        *entry = entry.saturating_add_signed(delta);
        if *entry == 0 {
            levels.remove(&price);
        }
    }

    pub fn add_resting_qty(&mut self, side: Side, price: u64, qty: u64) {
        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        Self::adjust(levels, price, qty as i64);
    }

    pub fn remove_qty(&mut self, side: Side, price: u64, qty: u64) {
        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        Self::adjust(levels, price, -(qty as i64));
    }

    pub fn touch(&mut self, seq: u64) {
        self.last_update_id = seq;
        self.timestamp_ms = now_ms();
    }

    pub fn snapshot(&self, limit: usize) -> (Vec<(u64, u64)>, Vec<(u64, u64)>) {
        let bids = self.bids.iter().rev().take(limit).map(|(&p, &q)| (p, q)).collect();
        let asks = self.asks.iter().take(limit).map(|(&p, &q)| (p, q)).collect();
        (bids, asks)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub trade_id: u64,
    pub price: u64,
    pub qty: u64,
    pub taker_side: Side,
    pub timestamp_ns: u64,
}

#[derive(Debug, Default)]
pub struct TradeRing {
    trades: VecDeque<TradeRecord>,
}

impl TradeRing {
    pub fn push(&mut self, record: TradeRecord) {
        if self.trades.len() == TRADE_RING_CAPACITY {
            self.trades.pop_front();
        }
        self.trades.push_back(record);
    }

    pub fn recent(&self) -> impl Iterator<Item = &TradeRecord> {
        self.trades.iter()
    }
}

/// 24-hour rolling ticker using session-window semantics: the window opens
/// on the first trade seen, and resets wholesale on the next trade once 24h
/// have elapsed since that open.
#[derive(Debug, Default, Serialize)]
pub struct Ticker {
    pub open: u64,
    pub high: u64,
    pub low: u64,
    pub last: u64,
    pub volume: u64,
    pub quote_volume: u128,
    pub trade_count: u64,
    #[serde(skip)]
    window_open_ms: u64,
}

impl Ticker {
    pub fn record_trade(&mut self, price: u64, qty: u64, now_ms: u64) {
        let window_active = self.trade_count > 0 && now_ms - self.window_open_ms < TICKER_WINDOW_MS;
        if !window_active {
            self.open = price;
            self.high = price;
            self.low = price;
            self.volume = 0;
            self.quote_volume = 0;
            self.trade_count = 0;
            self.window_open_ms = now_ms;
        }

        self.high = self.high.max(price);
        self.low = if self.trade_count == 0 { price } else { self.low.min(price) };
        self.last = price;
        self.volume = self.volume.saturating_add(qty);
        self.quote_volume = self
            .quote_volume
            .saturating_add((price as u128).saturating_mul(qty as u128));
        self.trade_count += 1;
    }

    /// Formatted percentage change over the window, the only floating value
    /// this system produces anywhere.
    pub fn price_change_pct(&self) -> String {
        if self.open == 0 {
            return "0.00".to_string();
        }
        let change = (self.last as f64 - self.open as f64) / self.open as f64 * 100.0;
        format!("{change:.2}")
    }
}
