use crate::device::registry::DeviceRegistry;

/// One advertising device as reported by the platform during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub address: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

impl DeviceRecord {
    pub fn new(address: impl Into<String>, name: Option<String>, rssi: Option<i16>) -> Self {
        DeviceRecord { address: address.into(), name, rssi }
    }
}

/// Events produced by the platform while a scan is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Discovered(DeviceRecord),
    Failed(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Required to scan at all.
    Scan,
    /// Gates whether advertised device names may be displayed.
    Connect,
}

/// Published by the scan controller. Cloned out to every observer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanState {
    pub scanning: bool,
    pub devices: DeviceRegistry,
    // diagnostic only, the platform failure code of the most recent scan
    pub last_failure: Option<i32>,
    pub(crate) generation: u64,
}

impl ScanState {
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.devices.snapshot()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    NotConnected,
    Connecting,
    Connected,
    ConnectionFailed,
    Disconnected,
}

impl ConnectionStatus {
    pub fn description(&self) -> &'static str {
        match self {
            ConnectionStatus::NotConnected => "Not connected",
            ConnectionStatus::Connecting => "Connecting…",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::ConnectionFailed => "Connection failed",
            ConnectionStatus::Disconnected => "Disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
