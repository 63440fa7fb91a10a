//! Per-symbol single-writer loop (C4). Owns exactly one `MatchingEngine` and
//! drains a bounded command queue into it, forwarding emitted events onward.
//! Matching itself never suspends; the only await points here are the queue
//! receive and the outgoing send, which is where backpressure from a full
//! event channel propagates back to the command consumer.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::control::ControlPlane;
use crate::engine::{Command, Event, MatchingEngine};
use std::sync::Arc;

pub struct EngineHost {
    symbol: String,
    control: Arc<ControlPlane>,
    commands_rx: mpsc::Receiver<Command>,
    events_tx: mpsc::Sender<Event>,
}

impl EngineHost {
    pub fn new(
        symbol: String,
        control: Arc<ControlPlane>,
        commands_rx: mpsc::Receiver<Command>,
        events_tx: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            symbol,
            control,
            commands_rx,
            events_tx,
        }
    }

    pub async fn run(mut self) {
        let mut engine = MatchingEngine::new(self.symbol.clone());
        debug!(symbol = %self.symbol, "engine host started");

        while let Some(command) = self.commands_rx.recv().await {
            let events = engine.apply(command, &self.control);
            for event in events {
                if self.events_tx.send(event).await.is_err() {
                    warn!(symbol = %self.symbol, "event channel closed, stopping host");
                    return;
                }
            }
        }

        debug!(symbol = %self.symbol, "command queue closed, engine host draining complete");
    }
}
