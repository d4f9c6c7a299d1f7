//! Device directory: the persisted record of known hardware devices.
//!
//! Thin service over [`DeviceRepository`] that owns the upsert timestamp
//! rules and the peripheral connection-status mutation path driven by
//! stream events.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::model::{ConnectedPeripheral, Device, mark_connection};
use crate::store::DeviceRepository;

#[derive(Clone)]
pub struct DeviceDirectory {
    repository: Arc<dyn DeviceRepository>,
}

impl DeviceDirectory {
    pub fn new(repository: Arc<dyn DeviceRepository>) -> Self {
        Self { repository }
    }

    pub fn find_by_id(&self, device_id: &str) -> Option<Device> {
        self.repository.get(device_id)
    }

    pub fn list(&self) -> Vec<Device> {
        self.repository.list()
    }

    /// Create-or-replace. `created_at` survives from the stored record on
    /// replace; `updated_at` is always refreshed.
    pub fn upsert(&self, mut device: Device) -> Device {
        if let Some(existing) = self.repository.get(&device.id) {
            device.created_at = existing.created_at;
        }
        device.updated_at = Utc::now();
        self.repository.save(device.clone());
        device
    }

    /// Marks one peripheral connected or disconnected on a stored device.
    ///
    /// Returns the persisted device, or `None` when the device is unknown
    /// or the update is a no-op (disconnect for a peripheral that was
    /// never recorded).
    pub fn update_connected_device_status(
        &self,
        device_id: &str,
        peripheral: &ConnectedPeripheral,
        connected: bool,
    ) -> Option<Device> {
        let Some(mut device) = self.repository.get(device_id) else {
            debug!(device = %device_id, "connection status update for unknown device, skipping");
            return None;
        };

        let merged = mark_connection(&device.connected_devices, peripheral, connected)?;
        device.connected_devices = merged;
        Some(self.upsert(device))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::PeripheralType;
    use crate::store::InMemoryDeviceRepository;

    fn directory() -> DeviceDirectory {
        DeviceDirectory::new(Arc::new(InMemoryDeviceRepository::new()))
    }

    fn sensor(pin_nr: i32, hw_address: &str) -> ConnectedPeripheral {
        ConnectedPeripheral {
            kind: PeripheralType::OneWireTemp,
            pin_nr,
            hw_address: hw_address.into(),
            name: None,
            connected: true,
            offset: 0.0,
            device_offset: 0.0,
        }
    }

    #[test]
    fn upsert_preserves_created_at_and_refreshes_updated_at() {
        let directory = directory();
        let first = directory.upsert(Device::new("aaa"));

        let mut replacement = Device::new("aaa");
        replacement.name = Some("kettle".into());
        let second = directory.upsert(replacement);

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.name.as_deref(), Some("kettle"));
    }

    #[test]
    fn connecting_a_new_peripheral_records_it() {
        let directory = directory();
        directory.upsert(Device::new("aaa"));

        let updated = directory
            .update_connected_device_status("aaa", &sensor(17, "0a1b2c"), true)
            .unwrap();

        assert_eq!(updated.connected_devices.len(), 1);
        assert!(updated.connected_devices[0].connected);
        assert_eq!(directory.find_by_id("aaa").unwrap().connected_devices.len(), 1);
    }

    #[test]
    fn disconnect_of_an_unrecorded_peripheral_is_skipped() {
        let directory = directory();
        directory.upsert(Device::new("aaa"));

        let result = directory.update_connected_device_status("aaa", &sensor(17, "0a1b2c"), false);

        assert!(result.is_none());
        assert!(directory.find_by_id("aaa").unwrap().connected_devices.is_empty());
    }

    #[test]
    fn update_for_an_unknown_device_returns_none() {
        let directory = directory();

        let result = directory.update_connected_device_status("ghost", &sensor(17, "00"), true);

        assert!(result.is_none());
    }
}
