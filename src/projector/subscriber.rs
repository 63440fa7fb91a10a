//! Channel naming and subscriber fan-out for the market-data projector.
//! Grounded in the same "bounded per-consumer channel, drop on full" shape
//! the rest of this codebase uses for its outgoing event queues, applied
//! here to many readers instead of one.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::warn;

use crate::control::validate_symbol;
use crate::error::ControlError;

/// The three public channel kinds a client may subscribe to for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Book,
    Trades,
    Ticker,
}

impl ChannelKind {
    fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Book => "book",
            ChannelKind::Trades => "trades",
            ChannelKind::Ticker => "ticker",
        }
    }
}

/// `market.<SYMBOL>.<book|trades|ticker>`, the subscriber-facing channel name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName {
    pub symbol: String,
    pub kind: ChannelKind,
}

impl ChannelName {
    pub fn parse(raw: &str) -> Result<Self, ControlError> {
        let mut parts = raw.splitn(3, '.');
        let (Some("market"), Some(symbol), Some(kind_str)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ControlError::InvalidSymbol(raw.to_string()));
        };
        validate_symbol(symbol)?;
        let kind = match kind_str {
            "book" => ChannelKind::Book,
            "trades" => ChannelKind::Trades,
            "ticker" => ChannelKind::Ticker,
            _ => return Err(ControlError::InvalidSymbol(raw.to_string())),
        };
        Ok(Self {
            symbol: symbol.to_string(),
            kind,
        })
    }

    pub fn to_string(&self) -> String {
        format!("market.{}.{}", self.symbol, self.kind.as_str())
    }
}

/// A single subscriber's bounded inbox. Messages are JSON-encoded update
/// payloads; the content is opaque to the registry.
pub struct Subscriber {
    pub id: u64,
    tx: mpsc::Sender<Vec<u8>>,
}

/// Per-channel list of subscribers, keyed by the full channel name so book,
/// trades and ticker subscriptions for the same symbol are independent.
#[derive(Default)]
pub struct SubscriberRegistry {
    channels: DashMap<String, Vec<Subscriber>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber on `channel` with a bounded inbox of
    /// `capacity` and returns the receiving half.
    pub fn subscribe(&self, channel: &ChannelName, capacity: usize) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(capacity);
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push(Subscriber { id, tx });
        rx
    }

    pub fn unsubscribe(&self, channel: &ChannelName, id: u64) {
        if let Some(mut subscribers) = self.channels.get_mut(&channel.to_string()) {
            subscribers.retain(|s| s.id != id);
        }
    }

    /// Fans `payload` out to every subscriber of `channel`. A subscriber
    /// whose inbox is full has its update dropped rather than blocking the
    /// projector; the gap is observable to that subscriber via `seq`.
    pub fn publish(&self, channel: &ChannelName, payload: &[u8]) {
        let Some(subscribers) = self.channels.get(&channel.to_string()) else {
            return;
        };
        for subscriber in subscribers.iter() {
            if subscriber.tx.try_send(payload.to_vec()).is_err() {
                warn!(
                    channel = %channel.to_string(),
                    subscriber_id = subscriber.id,
                    "slow subscriber, dropping update"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_channel_name() {
        let channel = ChannelName::parse("market.BTCUSDT.book").unwrap();
        assert_eq!(channel.symbol, "BTCUSDT");
        assert_eq!(channel.kind, ChannelKind::Book);
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(ChannelName::parse("market.BTCUSDT.quotes").is_err());
    }

    #[test]
    fn rejects_lowercase_symbol() {
        assert!(ChannelName::parse("market.btcusdt.book").is_err());
    }

    #[tokio::test]
    async fn full_subscriber_inbox_drops_instead_of_blocking() {
        let registry = SubscriberRegistry::new();
        let channel = ChannelName::parse("market.BTCUSDT.trades").unwrap();
        let mut rx = registry.subscribe(&channel, 1);

        registry.publish(&channel, b"first");
        registry.publish(&channel, b"second");

        assert_eq!(rx.recv().await.unwrap(), b"first");
        assert!(rx.try_recv().is_err());
    }
}
