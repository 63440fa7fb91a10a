//! Event publisher (C6): at-least-once publish of engine events onto the
//! durable output stream, retrying transient failures with exponential
//! backoff. Grounded in the same retry shape this codebase already uses for
//! its own NATS publisher, generalized to the 200ms→2s backoff and the
//! never-drop contract this system requires: a stuck publish retries
//! indefinitely (until cancelled), which backpressures the engine hosts and,
//! transitively, the command consumer — so the publisher is never the place
//! where an event can be silently lost.

use std::time::Duration;

use async_nats::jetstream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::engine::Event;
use crate::io::wire::event_to_bytes;

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(200);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);

pub struct EventPublisher {
    js: jetstream::Context,
    subject_prefix: String,
}

impl EventPublisher {
    pub fn new(js: jetstream::Context, subject_prefix: impl Into<String>) -> Self {
        Self {
            js,
            subject_prefix: subject_prefix.into(),
        }
    }

    /// Drains `events_rx` until it closes or `shutdown` fires. A single task
    /// processes every event strictly in arrival order, which is what keeps
    /// per-symbol ordering intact without needing a writer pool.
    pub async fn run(&self, mut events_rx: mpsc::Receiver<Event>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("event publisher shutting down");
                        return;
                    }
                }
                maybe_event = events_rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            if self.publish_with_retry(&event, &mut shutdown).await.is_err() {
                                debug!("publish loop aborted by shutdown signal");
                                return;
                            }
                        }
                        None => {
                            debug!("event publisher stopped: upstream channel closed");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Returns `Err(())` only when cancelled mid-retry; a transient failure
    /// never completes this function without either succeeding or being
    /// cancelled, by design.
    async fn publish_with_retry(
        &self,
        event: &Event,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), ()> {
        let subject = format!("{}.{}", self.subject_prefix, event.symbol);
        let payload =
            event_to_bytes(event).expect("event must always serialize: a malformed output payload is a fatal programmer error");

        let mut delay = INITIAL_RETRY_DELAY;
        loop {
            if *shutdown.borrow() {
                return Err(());
            }

            match self.js.publish(subject.clone(), payload.clone().into()).await {
                Ok(ack) => match ack.await {
                    Ok(_) => return Ok(()),
                    Err(e) => warn!(error = %e, subject, "publish ack not confirmed, retrying"),
                },
                Err(e) => warn!(
                    error = %e,
                    subject,
                    delay_ms = delay.as_millis() as u64,
                    "transient publish error, retrying"
                ),
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Err(());
                    }
                }
            }
            delay = (delay * 2).min(MAX_RETRY_DELAY);
        }
    }
}
