//! Notification boundary.
//!
//! The scanner hands each detected policy event, together with the snapshot
//! refreshed for it, to a [`NotificationSink`]. Sinks never fail the caller:
//! delivery problems are logged and dropped.

pub mod render;

use crate::config::DisplayConfig;
use crate::epoch::EpochSnapshot;
use crate::scanner::{DetectedEvent, PolicyEvent, PolicyEventKind};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Receives policy events after their snapshot has been refreshed.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: &PolicyEvent, snapshot: &EpochSnapshot);
}

impl<S: NotificationSink + ?Sized> NotificationSink for Arc<S> {
    fn emit(&self, event: &PolicyEvent, snapshot: &EpochSnapshot) {
        (**self).emit(event, snapshot)
    }
}

impl NotificationSink for Vec<Box<dyn NotificationSink>> {
    fn emit(&self, event: &PolicyEvent, snapshot: &EpochSnapshot) {
        for sink in self {
            sink.emit(event, snapshot);
        }
    }
}

/// Writes events to the structured log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn emit(&self, event: &PolicyEvent, snapshot: &EpochSnapshot) {
        match &event.kind {
            PolicyEventKind::SeigniorageDistributed { seigniorage } => info!(
                block = event.block_number,
                tx = %event.tx_hash,
                epoch = snapshot.epoch,
                seigniorage = %seigniorage,
                mode = %snapshot.mode(),
                yield_per_share = ?snapshot.yield_per_share(),
                "seigniorage distributed"
            ),
            PolicyEventKind::NoOpEpoch => info!(
                block = event.block_number,
                tx = %event.tx_hash,
                epoch = snapshot.epoch,
                mode = %snapshot.mode(),
                "epoch advanced without seigniorage"
            ),
        }
    }
}

/// Forwards events to an in-process consumer.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<DetectedEvent>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DetectedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn emit(&self, event: &PolicyEvent, snapshot: &EpochSnapshot) {
        let detected = DetectedEvent {
            event: event.clone(),
            snapshot: Arc::new(snapshot.clone()),
        };
        if self.tx.send(detected).is_err() {
            debug!(block = event.block_number, "notification receiver dropped");
        }
    }
}

/// Posts a Discord-style `{"content": ...}` message per event.
///
/// Each post runs on its own task so a slow endpoint never holds up the
/// scan loop. Must be used from inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    display: DisplayConfig,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, display: DisplayConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            display,
        })
    }

    pub fn payload(&self, event: &PolicyEvent, snapshot: &EpochSnapshot) -> serde_json::Value {
        serde_json::json!({
            "content": render::event_message(event, snapshot, &self.display),
        })
    }
}

impl NotificationSink for WebhookSink {
    fn emit(&self, event: &PolicyEvent, snapshot: &EpochSnapshot) {
        let body = self.payload(event, snapshot);
        let client = self.client.clone();
        let url = self.url.clone();
        let block = event.block_number;

        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(block, "webhook delivered");
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let text = resp.text().await.unwrap_or_default();
                    warn!(block, status, body = %text, "webhook rejected notification");
                }
                Err(e) => warn!(block, error = %e, "webhook post failed"),
            }
        });
    }
}
