//! Post-commit notification.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::ScanReport;

/// Notified after a scan cycle commits its results.
pub trait ScanObserver: Send + Sync {
    fn on_commit(&self, report: &ScanReport);
}

/// Fans each committed report out over a broadcast channel.
///
/// Slow subscribers lag and drop old reports rather than block the scanner.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Arc<ScanReport>>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ScanReport>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ScanObserver for BroadcastNotifier {
    fn on_commit(&self, report: &ScanReport) {
        // No subscribers is fine.
        let delivered = self.tx.send(Arc::new(report.clone())).unwrap_or(0);
        debug!(
            scan_id = %report.scan_id,
            subscribers = delivered,
            "Broadcast scan report"
        );
    }
}
