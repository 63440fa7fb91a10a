//! Engine registry: symbol → host. Many concurrent readers, a rare writer on
//! first sight of a new symbol. Grounded in the same "concurrent map with
//! lazy per-key creation" shape this codebase already uses for its book
//! manager, generalized from one process-wide book to one spawned task per
//! symbol.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::info;

use crate::control::ControlPlane;
use crate::engine::{Command, Event};
use crate::error::IoError;

use super::engine_host::EngineHost;

pub struct EngineHandle {
    pub symbol: String,
    commands_tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    pub async fn submit(&self, command: Command) -> Result<(), IoError> {
        self.commands_tx
            .send(command)
            .await
            .map_err(|_| IoError::ChannelClosed {
                symbol: self.symbol.clone(),
            })
    }
}

pub struct EngineRegistry {
    control: Arc<ControlPlane>,
    engines: DashMap<String, Arc<EngineHandle>>,
    events_tx: mpsc::Sender<Event>,
    command_queue_capacity: usize,
}

impl EngineRegistry {
    pub fn new(
        control: Arc<ControlPlane>,
        events_tx: mpsc::Sender<Event>,
        command_queue_capacity: usize,
    ) -> Self {
        Self {
            control,
            engines: DashMap::new(),
            events_tx,
            command_queue_capacity,
        }
    }

    pub fn symbols(&self) -> Vec<String> {
        self.engines.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Lazily spawns the single-writer task for `symbol` on first sight and
    /// returns a cheap, cloneable handle to it.
    pub fn handle_for(&self, symbol: &str) -> Arc<EngineHandle> {
        if let Some(existing) = self.engines.get(symbol) {
            return existing.clone();
        }
        self.engines
            .entry(symbol.to_string())
            .or_insert_with(|| {
                info!(symbol, "spawning engine host for new symbol");
                let (commands_tx, commands_rx) = mpsc::channel(self.command_queue_capacity);
                let host = EngineHost::new(
                    symbol.to_string(),
                    self.control.clone(),
                    commands_rx,
                    self.events_tx.clone(),
                );
                tokio::spawn(host.run());
                Arc::new(EngineHandle {
                    symbol: symbol.to_string(),
                    commands_tx,
                })
            })
            .clone()
    }

    pub async fn dispatch(&self, symbol: &str, command: Command) -> Result<(), IoError> {
        self.handle_for(symbol).submit(command).await
    }
}
