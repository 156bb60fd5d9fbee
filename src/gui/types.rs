use iced::{Event, window};

use crate::device::types::{ConnectionStatus, ScanState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Connection,
    // shown once the sensor is connected
    Dashboard,
}

#[derive(Debug, Clone)]
pub enum Message {
    EventOccurred(Event),
    PermissionsChecked(bool), // true if device names may be displayed
    ScanStateChanged(ScanState),
    ConnectionStatusChanged(ConnectionStatus),
    SelectDevice(String),
    Rescan,
    Connect,
    ScanComplete(()),
    ServiceStarted(()),
    Back,
    CloseReady(window::Id),
}
