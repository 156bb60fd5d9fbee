use std::path::PathBuf;
use clap::{Parser, Subcommand};
use log::info;
use tokio_util::sync::CancellationToken;

use crate::config::io::ConfigIO;
use crate::config::types::Config;
use crate::device::constants::UNKNOWN_DEVICE_NAME;
use crate::device::types::{DeviceRecord, Permission};
use crate::error::{AppRunError, DeviceError};
use crate::services::Services;

#[derive(Debug, Parser)]
#[command(version, about = "Find and connect to a BLE heart-rate sensor")]
pub struct Args {
    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a single scan without opening a window and list the sensors found
    Scan,
}

async fn load_config(config_path: Option<PathBuf>) -> Result<Config, AppRunError> {
    let config_io = match config_path {
        Some(path) => ConfigIO::open(&path)?,
        None => ConfigIO::new_sync()?,
    };
    Ok(config_io.read_or_default().await)
}

pub fn format_device(device: &DeviceRecord) -> String {
    let rssi = match device.rssi {
        Some(rssi) => format!("{} dBm", rssi),
        None => "-".to_string(),
    };

    format!(
        "{:<24} {:<32} {}",
        device.address,
        device.name.as_deref().unwrap_or(UNKNOWN_DEVICE_NAME),
        rssi,
    )
}

async fn scan_once(config_path: Option<PathBuf>) -> Result<Vec<DeviceRecord>, AppRunError> {
    let config = load_config(config_path).await?;
    let app_cancel = CancellationToken::new();
    let services = Services::btleplug(&config, app_cancel.clone());

    // the scan itself silently does nothing without permission, so check up front
    if !services.platform.has_permission(Permission::Scan).await {
        return Err(DeviceError::PermissionDenied.into());
    }

    let mut state = services.scan.subscribe();
    services.scan.scan().await;

    let devices = state.wait_for(|state| !state.scanning)
        .await
        .map(|state| state.devices())
        .unwrap_or_default();

    if let Some(code) = services.scan.state().last_failure {
        info!("Scan ended early with platform error code {}", code);
    }

    app_cancel.cancel();
    Ok(devices)
}

pub fn run_scan(config_path: Option<PathBuf>) -> Result<(), AppRunError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|source| AppRunError::Runtime { source })?;
    let devices = runtime.block_on(scan_once(config_path))?;

    if devices.is_empty() {
        println!("No devices found");
    }
    for device in &devices {
        println!("{}", format_device(device));
    }

    Ok(())
}
