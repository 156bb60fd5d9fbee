//! What the connection screen shows, as a plain function of the scan state,
//! the connection status and the user's selection. Kept free of iced types so
//! that it can be tested without a window.

use crate::device::constants::UNKNOWN_DEVICE_NAME;
use crate::device::types::{ConnectionStatus, ScanState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRow {
    pub address: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenView {
    pub status_line: &'static str,
    pub rows: Vec<DeviceRow>,
    // rescan and connect are hidden while scanning
    pub actions_visible: bool,
    pub connect_enabled: bool,
    pub scanning: bool,
}

/// Reaction of the screen to a published connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReaction {
    pub message: &'static str,
    pub navigate_next: bool,
}

pub fn status_line(state: &ScanState) -> &'static str {
    if state.scanning {
        "Scanning..."
    } else if state.devices.is_empty() {
        "No devices found"
    } else {
        "Select a device"
    }
}

pub fn status_reaction(status: ConnectionStatus) -> StatusReaction {
    StatusReaction {
        message: status.description(),
        navigate_next: status == ConnectionStatus::Connected,
    }
}

/// Transient state owned by the screen itself.
#[derive(Debug, Clone, Default)]
pub struct ConnectionScreen {
    selected: Option<String>,
    show_names: bool,
}

impl ConnectionScreen {
    pub fn new(show_names: bool) -> Self {
        ConnectionScreen { selected: None, show_names }
    }

    pub fn set_show_names(&mut self, show_names: bool) {
        self.show_names = show_names;
    }

    pub fn select(&mut self, address: String) {
        self.selected = Some(address);
    }

    pub fn connect_enabled(&self) -> bool {
        self.selected.is_some()
    }

    /// Forgets the selection. The caller starts the new scan afterwards.
    pub fn rescan(&mut self) {
        self.selected = None;
    }

    /// The address to hand to the sensor service, if a device is selected.
    pub fn connect(&self) -> Option<String> {
        self.selected.clone()
    }

    pub fn project(&self, state: &ScanState) -> ScreenView {
        let rows = state.devices
            .iter()
            .map(|device| {
                let label = match (&device.name, self.show_names) {
                    (Some(name), true) => name.clone(),
                    _ => UNKNOWN_DEVICE_NAME.to_string(),
                };

                DeviceRow {
                    address: device.address.clone(),
                    label,
                    selected: self.selected.as_deref() == Some(device.address.as_str()),
                }
            })
            .collect();

        ScreenView {
            status_line: status_line(state),
            rows,
            actions_visible: !state.scanning,
            connect_enabled: self.connect_enabled(),
            scanning: state.scanning,
        }
    }
}
