use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::types::Config;
use crate::device::btle::BtlePlatform;
use crate::device::connection::{BtleServiceLauncher, ServiceLauncher};
use crate::device::platform::BlePlatform;
use crate::device::scan::ScanController;
use crate::device::status::ConnectionMonitor;

/// Everything the screens talk to, wired together once at startup.
pub struct Services {
    pub platform: Arc<dyn BlePlatform>,
    pub scan: ScanController,
    pub monitor: ConnectionMonitor,
    pub launcher: Arc<dyn ServiceLauncher>,
}

impl Services {
    pub fn btleplug(config: &Config, app_cancel: CancellationToken) -> Self {
        let platform = Arc::new(BtlePlatform::new(config));
        let scan = ScanController::new(platform.clone(), config.scan_timeout());
        let monitor = ConnectionMonitor::new(scan.clone());
        let launcher = Arc::new(BtleServiceLauncher::new(platform.clone(), monitor.clone(), app_cancel));

        Services {
            platform,
            scan,
            monitor,
            launcher,
        }
    }
}
