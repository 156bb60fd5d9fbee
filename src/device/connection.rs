use std::sync::{Arc, Mutex};
use btleplug::api::Peripheral as _;
use btleplug::platform::Peripheral;
use log::{info, warn};
use tokio::spawn;
use tokio_util::sync::CancellationToken;
use tokio::time::{sleep, Duration};

use crate::device::btle::BtlePlatform;
use crate::device::constants::{CONNECT_DEADLINE, IS_CONNECTED_DEADLINE, POLL_DELAY};
use crate::device::status::ConnectionMonitor;
use crate::error::DeviceError;

/// Receives the address of the device the user chose to connect to.
///
/// The screen only hands the address over; whoever implements this owns the
/// connection and reports its progress through a `ConnectionMonitor`.
/// Must be called from within a tokio runtime.
pub trait ServiceLauncher: Send + Sync {
    fn start(&self, address: String);
}

/// Connects to the chosen sensor with btleplug and keeps the connection status current.
pub struct BtleServiceLauncher {
    platform: Arc<BtlePlatform>,
    monitor: ConnectionMonitor,
    // cancelled upon exit
    app_cancel: CancellationToken,
    current: Mutex<Option<CancellationToken>>,
}

impl BtleServiceLauncher {
    pub fn new(platform: Arc<BtlePlatform>, monitor: ConnectionMonitor, app_cancel: CancellationToken) -> Self {
        BtleServiceLauncher {
            platform,
            monitor,
            app_cancel,
            current: Mutex::new(None),
        }
    }
}

impl ServiceLauncher for BtleServiceLauncher {
    fn start(&self, address: String) {
        let cancel = self.app_cancel.child_token();

        // only one sensor at a time
        let previous = self.current.lock()
            .expect("Failed to lock current connection")
            .replace(cancel.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        spawn(run_connection(self.platform.clone(), self.monitor.clone(), cancel, address));
    }
}

async fn connect_peripheral(platform: &BtlePlatform, address: &str) -> Result<Peripheral, DeviceError> {
    let peripheral = platform.find_peripheral(address).await?;

    info!("Connecting to peripheral {}...", address);
    peripheral.connect().await?;
    Ok(peripheral)
}

async fn run_connection(platform: Arc<BtlePlatform>, monitor: ConnectionMonitor, cancel: CancellationToken, address: String) {
    monitor.set_connecting();

    let result = tokio::select! {
        _ = cancel.cancelled() => {
            return;
        }
        _ = sleep(Duration::from_millis(CONNECT_DEADLINE)) => {
            warn!("Connecting to peripheral took too long");
            None
        }
        result = connect_peripheral(&platform, &address) => match result {
            Ok(peripheral) => Some(peripheral),
            Err(err) => {
                warn!("Connecting to peripheral failed: {}", err);
                None
            },
        }
    };

    let peripheral = match result {
        Some(peripheral) => peripheral,
        None => {
            monitor.set_connection_failed();
            return;
        },
    };

    info!("Peripheral {} connected", address);
    monitor.set_connected().await;

    'mainloop: loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Disconnecting from peripheral {}", address);
                if let Err(err) = peripheral.disconnect().await {
                    warn!("Failed to disconnect: {:?}", err);
                }
                // superseded or shutting down; whoever cancelled owns the status now
                return;
            }
            _ = sleep(Duration::from_millis(POLL_DELAY)) => {}
        }

        let still_connected = tokio::select! {
            _ = sleep(Duration::from_millis(IS_CONNECTED_DEADLINE)) => {
                // macOS
                warn!("Checking for connection status took too long");
                false
            }
            result = peripheral.is_connected() => match result {
                Err(err) => {
                    warn!("Error checking for connection state: {:?}", err);
                    false
                },
                Ok(connected) => connected,
            }
        };

        if !still_connected {
            warn!("Connection lost");
            break 'mainloop;
        }
    }

    monitor.set_disconnected();
}
