//! Persisted device record.
//!
//! Created on first report from the gateway or a cloud refresh, mutated by
//! the reconciler and the refresh worker, never deleted by the core. Most
//! descriptive fields are opaque pass-through cloud metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use oinkbrew_api::DeviceSummary;

use super::peripheral::ConnectedPeripheral;

/// A known controller board and its discovered peripherals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Cloud-assigned identifier (`coreid` in events).
    pub id: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub name: Option<String>,
    pub online: bool,
    pub connected: bool,
    pub last_ip_address: Option<String>,
    pub last_heard: Option<DateTime<Utc>>,
    pub product_id: Option<i64>,
    pub platform_id: Option<i64>,
    pub cellular: bool,
    pub notes: Option<String>,
    pub status: Option<String>,
    pub serial_number: Option<String>,
    pub system_firmware_version: Option<String>,

    /// Shield hardware revision, read from the `ShieldVersion` variable.
    pub shield_version: Option<i64>,

    /// Application firmware build, read from the `Version` variable.
    pub firmware_version: Option<i64>,

    /// Discovered peripherals, maintained by reconciliation.
    pub connected_devices: Vec<ConnectedPeripheral>,

    /// Back-reference to bound configurations (relation only -- the device
    /// does not own the configuration lifecycle).
    #[serde(default)]
    pub configuration_ids: Vec<i64>,
}

impl Device {
    /// Fresh record for a device seen for the first time.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            name: None,
            online: false,
            connected: false,
            last_ip_address: None,
            last_heard: None,
            product_id: None,
            platform_id: None,
            cellular: false,
            notes: None,
            status: None,
            serial_number: None,
            system_firmware_version: None,
            shield_version: None,
            firmware_version: None,
            connected_devices: Vec::new(),
            configuration_ids: Vec::new(),
        }
    }

    /// Merge a cloud listing entry over this record. Summary fields win on
    /// overlaps; locally maintained state (peripherals, versions read from
    /// variables, timestamps) is untouched.
    pub fn apply_summary(&mut self, summary: &DeviceSummary) {
        self.name = summary.name.clone();
        self.online = summary.online;
        self.connected = summary.connected;
        self.last_ip_address = summary.last_ip_address.clone();
        self.last_heard = summary.last_heard;
        self.product_id = summary.product_id;
        self.platform_id = summary.platform_id;
        self.cellular = summary.cellular;
        self.notes = summary.notes.clone();
        self.status = summary.status.clone();
        self.serial_number = summary.serial_number.clone();
        self.system_firmware_version = summary.system_firmware_version.clone();
    }

    /// Find a peripheral by its `(pinNr, hwAddress)` identity.
    pub fn find_peripheral(&self, pin_nr: i32, hw_address: &str) -> Option<&ConnectedPeripheral> {
        self.connected_devices
            .iter()
            .find(|p| p.matches(pin_nr, hw_address))
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str) -> DeviceSummary {
        DeviceSummary {
            id: id.into(),
            name: Some("brewpi".into()),
            last_ip_address: Some("10.0.0.7".into()),
            last_heard: None,
            product_id: Some(6),
            platform_id: None,
            cellular: false,
            notes: None,
            status: Some("normal".into()),
            serial_number: None,
            system_firmware_version: Some("1.5.2".into()),
            online: true,
            connected: true,
        }
    }

    #[test]
    fn summary_wins_on_overlapping_fields() {
        let mut device = Device::new("aaa");
        device.name = Some("old name".into());
        device.online = false;
        device.shield_version = Some(2);

        device.apply_summary(&summary("aaa"));

        assert_eq!(device.name.as_deref(), Some("brewpi"));
        assert!(device.online);
        // Locally maintained fields survive the merge.
        assert_eq!(device.shield_version, Some(2));
    }

    #[test]
    fn find_peripheral_uses_pin_and_address() {
        let mut device = Device::new("aaa");
        device.connected_devices = vec![ConnectedPeripheral {
            kind: crate::model::PeripheralType::OneWireTemp,
            pin_nr: 17,
            hw_address: "0000".into(),
            name: None,
            connected: true,
            offset: 0.7,
            device_offset: 0.0,
        }];

        assert!(device.find_peripheral(17, "0000").is_some());
        assert!(device.find_peripheral(17, "0001").is_none());
        assert!(device.find_peripheral(18, "0000").is_none());
    }
}
