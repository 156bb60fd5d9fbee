use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::device::types::{Permission, ScanEvent};
use crate::error::DeviceError;

/// The capabilities the scan controller needs from the platform's BLE stack.
///
/// Implementations must tolerate `stop_scan` being called when no scan is
/// running.
#[async_trait]
pub trait BlePlatform: Send + Sync {
    /// Checks, without prompting, whether the given permission is granted.
    async fn has_permission(&self, permission: Permission) -> bool;

    /// Starts a scan. Discovery events for this scan are delivered on the
    /// returned stream until the scan is stopped.
    async fn start_scan(&self) -> Result<BoxStream<'static, ScanEvent>, DeviceError>;

    async fn stop_scan(&self) -> Result<(), DeviceError>;
}
