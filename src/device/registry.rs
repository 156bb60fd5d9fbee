use indexmap::IndexMap;

use crate::device::types::DeviceRecord;

/// Devices found during the current scan, keyed by address.
///
/// Iteration order is discovery order. The first record seen for an address
/// wins; later advertisements for the same address are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRegistry {
    devices: IndexMap<String, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the record was new.
    pub fn insert(&mut self, record: DeviceRecord) -> bool {
        if self.devices.contains_key(&record.address) {
            return false;
        }

        self.devices.insert(record.address.clone(), record);
        true
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        self.iter().cloned().collect()
    }
}
