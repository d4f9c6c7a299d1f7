//! Device refresh worker.
//!
//! Pulls the full device listing from the cloud and writes it through the
//! device directory. Invoked by an external scheduler (periodic or on
//! demand); it does not own a timer itself.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use oinkbrew_api::DeviceSummary;

use crate::directory::DeviceDirectory;
use crate::error::CoreError;
use crate::gateway::CloudGateway;
use crate::model::{ConnectedPeripheral, Device, reconcile};

/// Shield hardware revision, exposed by the firmware as a cloud variable.
const VAR_SHIELD_VERSION: &str = "ShieldVersion";
/// Application firmware build number.
const VAR_FIRMWARE_VERSION: &str = "Version";
/// JSON array of currently attached peripherals.
const VAR_DEVICES: &str = "Devices";

pub struct DeviceRefreshWorker<G: CloudGateway> {
    gateway: Arc<G>,
    directory: DeviceDirectory,
}

impl<G: CloudGateway> DeviceRefreshWorker<G> {
    pub fn new(gateway: Arc<G>, directory: DeviceDirectory) -> Self {
        Self { gateway, directory }
    }

    /// Refreshes every listed device.
    ///
    /// A failing device is logged and skipped so the rest of the listing
    /// still lands; the error surfaces to the scheduler afterwards.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let summaries = self.gateway.list_devices().await;
        debug!(devices = summaries.len(), "refreshing device directory");

        let mut failed = 0usize;
        for summary in &summaries {
            if let Err(e) = self.refresh_one(summary).await {
                error!(device = %summary.id, error = %e, "device refresh failed");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(CoreError::Gateway {
                message: format!("{failed} of {} devices failed to refresh", summaries.len()),
            });
        }
        Ok(())
    }

    /// Merge one listing entry over the stored record and persist it.
    ///
    /// Connected devices additionally report their firmware versions and
    /// attached peripherals through cloud variables; the peripheral list is
    /// reconciled against the stored one instead of replacing it.
    async fn refresh_one(&self, summary: &DeviceSummary) -> Result<(), CoreError> {
        let mut device = self
            .directory
            .find_by_id(&summary.id)
            .unwrap_or_else(|| Device::new(summary.id.clone()));
        device.apply_summary(summary);

        if summary.connected {
            let (shield, firmware, peripherals) = tokio::join!(
                self.gateway.get_variable(&summary.id, VAR_SHIELD_VERSION),
                self.gateway.get_variable(&summary.id, VAR_FIRMWARE_VERSION),
                self.gateway.get_variable(&summary.id, VAR_DEVICES),
            );

            device.shield_version = integer_variable(&shield);
            device.firmware_version = integer_variable(&firmware);

            let reported = parse_peripherals(&peripherals)?;
            device.connected_devices = reconcile(&device.connected_devices, &reported);
        }

        self.directory.upsert(device);
        Ok(())
    }
}

/// Cloud variables come back as JSON numbers or numeric strings depending
/// on firmware age.
fn integer_variable(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The `Devices` variable is either a JSON array or a string holding one.
fn parse_peripherals(value: &Value) -> Result<Vec<ConnectedPeripheral>, CoreError> {
    let malformed = |message: String| CoreError::MalformedPayload {
        topic: VAR_DEVICES.to_owned(),
        message,
    };

    match value {
        Value::Array(_) => {
            serde_json::from_value(value.clone()).map_err(|e| malformed(e.to_string()))
        }
        Value::String(s) => serde_json::from_str(s).map_err(|e| malformed(e.to_string())),
        other => Err(malformed(format!("unexpected variable shape: {other}"))),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
