//! Connected peripherals and the reconciliation rules that keep the stored
//! peripheral list in sync with what a board reports.
//!
//! A peripheral's identity is the pair `(pinNr, hwAddress)` -- NOT its type,
//! which can legitimately be rediscovered after a firmware update. Absence
//! from a report means "currently disconnected", never "never existed", so
//! reconciliation only flips the `connected` flag and appends newcomers; it
//! never deletes.

use serde::{Deserialize, Serialize};

/// Hardware attachment kind, as reported by the board firmware.
///
/// The integer values are part of the device protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PeripheralType {
    None = 0,
    /// Digital pin, either on or off.
    DigitalActuator = 1,
    /// Analogue pin, used as PWM actuator.
    PwmActuator = 2,
    /// One-wire temperature sensor.
    OneWireTemp = 3,
}

impl TryFrom<u8> for PeripheralType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::DigitalActuator),
            2 => Ok(Self::PwmActuator),
            3 => Ok(Self::OneWireTemp),
            other => Err(format!("unknown peripheral type {other}")),
        }
    }
}

impl From<PeripheralType> for u8 {
    fn from(value: PeripheralType) -> Self {
        value as u8
    }
}

/// A sensor or actuator wired to a specific pin of a controller board.
///
/// Field names on the wire follow the device protocol (`pinNr`,
/// `hwAddress`, `deviceOffset`); missing optional fields take the
/// protocol defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedPeripheral {
    #[serde(rename = "type")]
    pub kind: PeripheralType,

    #[serde(rename = "pinNr")]
    pub pin_nr: i32,

    /// Bus-level identifier, e.g. a one-wire ROM id.
    #[serde(rename = "hwAddress")]
    pub hw_address: String,

    /// User-assigned display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub connected: bool,

    /// User-configured calibration delta.
    #[serde(default)]
    pub offset: f64,

    /// Last offset value confirmed pushed to the hardware.
    #[serde(rename = "deviceOffset", default)]
    pub device_offset: f64,
}

impl ConnectedPeripheral {
    /// Whether this peripheral occupies the given pin/bus address.
    pub fn matches(&self, pin_nr: i32, hw_address: &str) -> bool {
        self.pin_nr == pin_nr && self.hw_address == hw_address
    }

    /// Identity comparison: same physical attachment point.
    pub fn same_port(&self, other: &Self) -> bool {
        self.matches(other.pin_nr, &other.hw_address)
    }
}

// ── Reconciliation ───────────────────────────────────────────────────

/// Merge a freshly reported peripheral list against the stored list.
///
/// Every stored entry starts as disconnected; entries present in the report
/// are re-marked connected (keeping their stored `offset` and display name,
/// refreshing `device_offset` from the report), and previously unseen
/// entries are appended as connected. Stored order is preserved, newcomers
/// keep report order. Idempotent, and never deletes.
pub fn reconcile(
    stored: &[ConnectedPeripheral],
    reported: &[ConnectedPeripheral],
) -> Vec<ConnectedPeripheral> {
    let mut merged: Vec<ConnectedPeripheral> = stored
        .iter()
        .cloned()
        .map(|mut peripheral| {
            peripheral.connected = false;
            peripheral
        })
        .collect();

    for report in reported {
        match merged.iter_mut().find(|p| p.same_port(report)) {
            Some(existing) => {
                existing.connected = true;
                existing.device_offset = report.device_offset;
            }
            None => {
                let mut newcomer = report.clone();
                newcomer.connected = true;
                merged.push(newcomer);
            }
        }
    }

    merged
}

/// Single-peripheral variant of [`reconcile`]: flip one peripheral's
/// `connected` flag.
///
/// Returns `None` when the peripheral is unknown and the report says
/// "disconnected" -- there is nothing to update, and creating a phantom
/// disconnect record would be wrong. The caller must skip persistence in
/// that case.
pub fn mark_connection(
    stored: &[ConnectedPeripheral],
    peripheral: &ConnectedPeripheral,
    connected: bool,
) -> Option<Vec<ConnectedPeripheral>> {
    let mut merged = stored.to_vec();

    match merged.iter_mut().find(|p| p.same_port(peripheral)) {
        Some(existing) => {
            existing.connected = connected;
            existing.device_offset = peripheral.device_offset;
        }
        None if connected => {
            let mut newcomer = peripheral.clone();
            newcomer.connected = true;
            merged.push(newcomer);
        }
        None => return None,
    }

    Some(merged)
}

// ── Tests ────────────────────────────────────────────────────────────
