use std::sync::Arc;
use log::info;
use tokio::sync::watch;

use crate::device::scan::ScanController;
use crate::device::types::ConnectionStatus;

/// Live indicator of the link to the selected sensor.
///
/// Transitions are driven entirely by the connection service; there are no
/// timers in here. Every call publishes exactly once, even when the status
/// does not change.
#[derive(Clone)]
pub struct ConnectionMonitor {
    status: Arc<watch::Sender<ConnectionStatus>>,
    scan: ScanController,
}

impl ConnectionMonitor {
    pub fn new(scan: ScanController) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::NotConnected);
        ConnectionMonitor { status: Arc::new(status), scan }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    fn publish(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        info!("Connection status {:?} -> {:?}", previous, status);
    }

    pub fn set_connecting(&self) {
        self.publish(ConnectionStatus::Connecting);
    }

    /// Also stops any scan that is still running.
    pub async fn set_connected(&self) {
        self.publish(ConnectionStatus::Connected);
        self.scan.stop_scan().await;
    }

    pub fn set_connection_failed(&self) {
        self.publish(ConnectionStatus::ConnectionFailed);
    }

    pub fn set_disconnected(&self) {
        self.publish(ConnectionStatus::Disconnected);
    }

    pub fn reset(&self) {
        self.publish(ConnectionStatus::NotConnected);
    }
}
