//! Drives the periodic snapshot refresh and the block scan.
//!
//! Two independent loops share one reader and one parameter cache:
//!
//! - **refresh**: every `refresh_rate`, rebuild the [`EpochSnapshot`] and publish it
//! - **scan**: every `scan_interval`, advance the block cursor and hand each
//!   detected policy event (with the snapshot taken for it) to the sink
//!
//! Snapshots are published whole through a `watch` channel. Readers never
//! observe a partially updated snapshot, and an older snapshot never replaces
//! a newer one.

use crate::config::Runtime;
use crate::epoch::{self, EpochSnapshot, RefreshError};
use crate::notify::NotificationSink;
use crate::onchain::ChainReader;
use crate::protocol::ProtocolParameters;
use crate::scanner::{BlockRangeScanner, ScanCursor, ScanError};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub type SnapshotReceiver = watch::Receiver<Option<Arc<EpochSnapshot>>>;

pub struct EpochMonitor<R, S> {
    reader: Arc<R>,
    params: Arc<ProtocolParameters>,
    sink: S,
    scanner: BlockRangeScanner,
    refresh_rate: Duration,
    scan_interval: Duration,
    snapshot_tx: watch::Sender<Option<Arc<EpochSnapshot>>>,
}

impl<R: ChainReader, S: NotificationSink> EpochMonitor<R, S> {
    pub fn new(reader: Arc<R>, params: Arc<ProtocolParameters>, sink: S, runtime: &Runtime) -> Self {
        let (snapshot_tx, _) = watch::channel(None);
        Self {
            reader,
            params,
            sink,
            scanner: BlockRangeScanner::new(runtime.max_range_size),
            refresh_rate: runtime.refresh_rate,
            scan_interval: runtime.scan_interval,
            snapshot_tx,
        }
    }

    /// Watch the latest published snapshot.
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.snapshot_tx.subscribe()
    }

    pub fn latest(&self) -> Option<Arc<EpochSnapshot>> {
        self.snapshot_tx.borrow().clone()
    }

    fn publish(&self, snapshot: Arc<EpochSnapshot>) {
        self.snapshot_tx.send_if_modified(|current| {
            let stale = current
                .as_ref()
                .map_or(false, |c| c.taken_at > snapshot.taken_at);
            if stale {
                return false;
            }
            *current = Some(snapshot.clone());
            true
        });
    }

    /// Rebuild and publish the snapshot once.
    pub async fn refresh_once(&self) -> Result<Arc<EpochSnapshot>, RefreshError> {
        let snapshot = Arc::new(epoch::refresh(self.reader.as_ref(), &self.params).await?);
        self.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Run one scan step, starting the cursor at the current head on first use.
    ///
    /// Returns the number of events handed to the sink.
    pub async fn scan_once(&self, cursor: &mut Option<ScanCursor>) -> Result<usize, ScanError> {
        if cursor.is_none() {
            let head = self.reader.block_number().await?;
            info!(head = head, "scan cursor starts at chain head");
            *cursor = Some(ScanCursor::new(head));
            return Ok(0);
        }
        let Some(cursor) = cursor.as_mut() else {
            return Ok(0);
        };

        let detected = self
            .scanner
            .scan_step(self.reader.as_ref(), cursor, &self.params)
            .await?;

        for d in &detected {
            self.publish(d.snapshot.clone());
            self.sink.emit(&d.event, &d.snapshot);
        }
        Ok(detected.len())
    }

    /// Run both loops until `shutdown` flips to `true`.
    ///
    /// An in-flight refresh or scan step always completes before its loop exits.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        info!(
            refresh_secs = self.refresh_rate.as_secs(),
            scan_secs = self.scan_interval.as_secs(),
            max_range = self.scanner.max_range_size(),
            "epoch monitor started"
        );
        tokio::join!(
            self.refresh_loop(shutdown.clone()),
            self.scan_loop(None, shutdown),
        );
        info!("epoch monitor stopped");
    }

    async fn refresh_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.refresh_rate);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => break,
                _ = ticker.tick() => {}
            }

            match self.refresh_once().await {
                Ok(s) => debug!(
                    epoch = s.epoch,
                    mode = %s.mode(),
                    price = %s.reference_price,
                    eta = %s.eta,
                    "snapshot refreshed"
                ),
                Err(e) => warn!(error = %e, "snapshot refresh failed, keeping previous"),
            }
        }
    }

    async fn scan_loop(&self, mut cursor: Option<ScanCursor>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => break,
                _ = ticker.tick() => {}
            }

            match self.scan_once(&mut cursor).await {
                Ok(n) if n > 0 => debug!(events = n, "scan step emitted events"),
                Ok(_) => {}
                Err(e) => warn!(
                    error = %e,
                    cursor = ?cursor.map(|c| c.last_scanned_block()),
                    "scan step failed, will retry range"
                ),
            }
        }
    }
}
