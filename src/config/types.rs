use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::device::constants::SCAN_TIMEOUT;

fn default_scan_timeout_ms() -> u64 {
    SCAN_TIMEOUT
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,
    // only report sensors advertising the Heart Rate service
    #[serde(default = "default_true")]
    pub heart_rate_only: bool,
    #[serde(default = "default_true")]
    pub show_device_names: bool,
}

impl Config {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scan_timeout_ms: SCAN_TIMEOUT,
            heart_rate_only: true,
            show_device_names: true,
        }
    }
}
