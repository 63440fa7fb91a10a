//! Command consumer (C5): pulls order commands from a durable JetStream
//! stream, routes each to its symbol's engine host, and only acknowledges
//! once the host has accepted the command onto its bounded queue.
//!
//! Re-claim of stuck messages is delegated to the broker: the pull consumer
//! is configured with an `ack_wait`, so a message whose processing consumer
//! died before acking simply reappears on the same `messages()` stream once
//! the wait elapses — there is no separate claim RPC to make, unlike a
//! client-managed pending-entries list. `scan_pending` below is the
//! observability half of that contract: it surfaces a stall without waiting
//! for an operator to go looking for one.

use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream;
use async_nats::jetstream::consumer::pull;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::error::IoError;
use crate::host::EngineRegistry;
use crate::io::wire::parse_command;

/// How long a delivered-but-unacked message is allowed to sit before the
/// broker treats the consumer as dead and redelivers it.
pub const RECLAIM_IDLE: Duration = Duration::from_secs(30);

/// How often the consumer loop checks for a stalled pending count, purely
/// for logging; redelivery itself is automatic once `RECLAIM_IDLE` elapses.
const SCAN_INTERVAL: Duration = Duration::from_secs(30);

pub struct CommandConsumer {
    consumer: jetstream::consumer::Consumer<pull::Config>,
    registry: Arc<EngineRegistry>,
}

impl CommandConsumer {
    pub async fn new(
        js: &jetstream::Context,
        stream_name: &str,
        durable_name: &str,
        registry: Arc<EngineRegistry>,
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
                    ack_wait: RECLAIM_IDLE,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| IoError::Unreachable(e.to_string()))?;
        Ok(Self { consumer, registry })
    }

    /// Runs until `shutdown` is signalled. Stops reading promptly; in-flight
    /// commands already dispatched to an engine host are left to finish
    /// there, and no further deliveries are acknowledged after the signal.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut messages = match self.consumer.messages().await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "could not open command message stream");
                return;
            }
        };
        let mut scan_tick = tokio::time::interval(SCAN_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("command consumer shutting down");
                        return;
                    }
                }
                _ = scan_tick.tick() => {
                    self.scan_pending().await;
                }
                next = messages.next() => {
                    match next {
                        Some(Ok(message)) => self.handle_message(message).await,
                        Some(Err(e)) => warn!(error = %e, "error pulling command message"),
                        None => {
                            warn!("command message stream ended, reconnecting");
                            match self.consumer.messages().await {
                                Ok(fresh) => messages = fresh,
                                Err(e) => {
                                    error!(error = %e, "failed to reopen command message stream");
                                    tokio::time::sleep(Duration::from_millis(500)).await;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    async fn scan_pending(&self) {
        match self.consumer.info().await {
            Ok(info) => {
                if info.num_ack_pending > 0 {
                    info!(
                        pending = info.num_ack_pending,
                        waiting = info.num_pending,
                        "command consumer has unacked deliveries in flight"
                    );
                }
            }
            Err(e) => warn!(error = %e, "failed to read consumer info for pending scan"),
        }
    }

    async fn handle_message(&self, message: jetstream::Message) {
        let (symbol, command) = match parse_command(&message.payload) {
            Ok(parsed) => parsed,
            Err(reason) => {
                error!(reason = %reason, "poison command message, acking and dropping");
                if let Err(e) = message.ack().await {
                    warn!(error = %e, "failed to ack poison message");
                }
                return;
            }
        };

        match self.registry.dispatch(&symbol, command).await {
            Ok(()) => {
                if let Err(e) = message.ack().await {
                    warn!(error = %e, symbol, "failed to ack after successful dispatch");
                }
            }
            Err(e) => {
                warn!(error = %e, symbol, "failed to enqueue command, leaving unacked for redelivery");
            }
        }
    }
}
