use async_trait::async_trait;
use btleplug::api::{BDAddr, Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use log::{info, warn};
use tokio::sync::Mutex;

use crate::config::types::Config;
use crate::device::constants::make_heart_rate_service_uuid;
use crate::device::platform::BlePlatform;
use crate::device::types::{DeviceRecord, Permission, ScanEvent};
use crate::error::DeviceError;

/// `BlePlatform` backed by the operating system's BLE stack through btleplug.
///
/// Adapters are acquired on first use; a `PermissionDenied` from the stack at
/// that point is how a missing scan permission shows up on desktop platforms.
pub struct BtlePlatform {
    heart_rate_only: bool,
    show_device_names: bool,
    adapters: Mutex<Option<Vec<Adapter>>>,
}

impl BtlePlatform {
    pub fn new(config: &Config) -> Self {
        BtlePlatform {
            heart_rate_only: config.heart_rate_only,
            show_device_names: config.show_device_names,
            adapters: Mutex::new(None),
        }
    }

    async fn adapters(&self) -> Result<Vec<Adapter>, DeviceError> {
        let mut adapters = self.adapters.lock().await;

        if let Some(adapters) = adapters.as_ref() {
            return Ok(adapters.clone());
        }

        let manager = Manager::new().await?;
        let found = manager.adapters().await?;
        if found.is_empty() {
            return Err(DeviceError::NoAdapter);
        }

        for adapter in &found {
            info!("Using adapter {}", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
        }

        *adapters = Some(found.clone());
        Ok(found)
    }

    fn scan_filter(&self) -> ScanFilter {
        if self.heart_rate_only {
            ScanFilter { services: vec![make_heart_rate_service_uuid()] }
        } else {
            ScanFilter::default()
        }
    }

    /// Looks up a previously discovered peripheral by the address it was reported with.
    pub async fn find_peripheral(&self, address: &str) -> Result<Peripheral, DeviceError> {
        for adapter in self.adapters().await? {
            let peripherals = match adapter.peripherals().await {
                Ok(v) => v,
                Err(err) => {
                    warn!("Failed to query BLE adapter for peripherals: {}", err);
                    continue;
                },
            };

            for peripheral in peripherals {
                if peripheral_address(&peripheral) == address {
                    return Ok(peripheral);
                }
            }
        }

        Err(DeviceError::NotFound { address: address.to_string() })
    }
}

// CoreBluetooth does not expose the hardware address, fall back to the platform id there
fn peripheral_address(peripheral: &Peripheral) -> String {
    let address = peripheral.address();
    if address == BDAddr::from([0u8; 6]) {
        format!("{:?}", peripheral.id())
    } else {
        address.to_string()
    }
}

// Adapters live as long as the process and only report DeviceDiscovered the first time they see a
// peripheral, so a rescan sees sensors it already knows as DeviceUpdated.
fn advertising_peripheral(event: CentralEvent) -> Option<PeripheralId> {
    match event {
        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => Some(id),
        _ => None,
    }
}

async fn discovered_record(adapter: &Adapter, event: CentralEvent) -> Option<DeviceRecord> {
    let id = advertising_peripheral(event)?;

    let peripheral = match adapter.peripheral(&id).await {
        Ok(peripheral) => peripheral,
        Err(err) => {
            warn!("Discovered peripheral {:?} is no longer known to the adapter: {}", id, err);
            return None;
        },
    };

    let (name, rssi) = match peripheral.properties().await {
        Ok(Some(properties)) => (properties.local_name, properties.rssi),
        Ok(None) => (None, None),
        Err(err) => {
            warn!("Could not query peripheral for properties: {:?}", err);
            (None, None)
        },
    };

    Some(DeviceRecord::new(peripheral_address(&peripheral), name, rssi))
}

#[async_trait]
impl BlePlatform for BtlePlatform {
    async fn has_permission(&self, permission: Permission) -> bool {
        match permission {
            Permission::Connect => self.show_device_names,
            Permission::Scan => match self.adapters().await {
                Ok(_) => true,
                Err(err) if err.is_permission_denied() => false,
                // not a permission problem; let start_scan report it
                Err(_) => true,
            },
        }
    }

    async fn start_scan(&self) -> Result<BoxStream<'static, ScanEvent>, DeviceError> {
        let filter = self.scan_filter();
        let mut streams = Vec::new();

        for adapter in self.adapters().await? {
            // subscribe before starting so that no discovery is missed
            let events = adapter.events().await?;
            adapter.start_scan(filter.clone()).await?;

            let discoveries = events.filter_map(move |event| {
                let adapter = adapter.clone();
                async move {
                    discovered_record(&adapter, event).await.map(ScanEvent::Discovered)
                }
            });
            streams.push(discoveries.boxed());
        }

        Ok(stream::select_all(streams).boxed())
    }

    async fn stop_scan(&self) -> Result<(), DeviceError> {
        let adapters = match self.adapters.lock().await.as_ref() {
            // never scanned, nothing to stop
            None => return Ok(()),
            Some(adapters) => adapters.clone(),
        };

        let mut result = Ok(());
        for adapter in adapters {
            if let Err(err) = adapter.stop_scan().await {
                result = Err(err.into());
            }
        }
        result
    }
}
