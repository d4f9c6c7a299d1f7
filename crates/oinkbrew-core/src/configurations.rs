//! Configuration store: routing of sensor readings into the per-bucket
//! sensor-data maps of matching configurations.
//!
//! CRUD on configurations happens outside the core; this service reads
//! them, mutates only the sensor-data map, and fans aggregated readings
//! out on a broadcast channel for downstream consumers.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::model::{Configuration, SensorDataEvent, SensorReading, SensorValue};
use crate::store::{ConfigurationRepository, DeviceRepository};

/// Buffered aggregated-event capacity. Slow receivers lag and resync
/// rather than stall the event loop.
const SENSOR_EVENT_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct ConfigurationStore {
    configurations: Arc<dyn ConfigurationRepository>,
    devices: Arc<dyn DeviceRepository>,
    sensor_events: broadcast::Sender<SensorDataEvent>,
}

impl ConfigurationStore {
    pub fn new(
        configurations: Arc<dyn ConfigurationRepository>,
        devices: Arc<dyn DeviceRepository>,
    ) -> Self {
        let (sensor_events, _) = broadcast::channel(SENSOR_EVENT_CAPACITY);
        Self {
            configurations,
            devices,
            sensor_events,
        }
    }

    /// Aggregated sensor-data events, one per affected configuration per
    /// processed values payload.
    pub fn subscribe_sensor_events(&self) -> broadcast::Receiver<SensorDataEvent> {
        self.sensor_events.subscribe()
    }

    pub fn find(&self, configuration_id: i64) -> Option<Configuration> {
        self.configurations.get(configuration_id)
    }

    /// All configurations with the given archival status.
    pub fn find_all(&self, archived: bool) -> Vec<Configuration> {
        self.configurations
            .list()
            .into_iter()
            .filter(|c| c.archived == archived)
            .collect()
    }

    /// Every configuration bound to a device, archived ones included.
    /// Archival filtering is the caller's concern.
    pub fn find_by_device(&self, device_id: &str) -> Vec<Configuration> {
        self.configurations
            .list()
            .into_iter()
            .filter(|c| c.device_id == device_id)
            .collect()
    }

    /// Next free configuration id.
    pub fn next_id(&self) -> i64 {
        self.configurations.next_id()
    }

    /// Routes one values payload into every active configuration of the
    /// device whose bound peripherals match a reading.
    ///
    /// Readings accumulate per bucket key. Each affected configuration is
    /// persisted and one [`SensorDataEvent`] carrying its bucket's readings
    /// is broadcast.
    pub fn record_sensor_values(
        &self,
        bucket_key: &str,
        device_id: &str,
        readings: &[SensorValue],
    ) {
        let device = self.devices.get(device_id);

        for mut configuration in self.configurations.list_active_for_device(device_id) {
            let matched: Vec<SensorReading> = readings
                .iter()
                .filter(|reading| {
                    configuration.has_connected_device(reading.pin_nr, &reading.hw_address)
                })
                .map(|reading| SensorReading {
                    name: self.display_name(device.as_ref(), reading),
                    value: reading.value,
                })
                .collect();

            if matched.is_empty() {
                continue;
            }

            let bucket = configuration
                .sensor_data
                .entry(bucket_key.to_owned())
                .or_default();
            bucket.extend(matched);
            let sensor_data = bucket.clone();
            configuration.updated_at = Utc::now();

            let event = SensorDataEvent {
                published_at: bucket_key.to_owned(),
                configuration_id: configuration.id,
                sensor_data,
            };

            if let Err(e) = self.configurations.save(configuration) {
                error!(error = %e, "failed to persist sensor data");
                continue;
            }
            debug!(
                configuration = event.configuration_id,
                bucket = %bucket_key,
                readings = event.sensor_data.len(),
                "sensor data recorded"
            );
            // No receivers is fine; the channel just drops the event.
            let _ = self.sensor_events.send(event);
        }
    }

    fn display_name(
        &self,
        device: Option<&crate::model::Device>,
        reading: &SensorValue,
    ) -> String {
        device
            .and_then(|d| d.find_peripheral(reading.pin_nr, &reading.hw_address))
            .and_then(|p| p.name.clone())
            .unwrap_or_else(|| format!("{}/{}", reading.pin_nr, reading.hw_address))
    }
}

// ── Tests ────────────────────────────────────────────────────────────
