//! DashMap-backed repositories.
//!
//! Lock-free readers, per-shard write locks. Values are cloned out so a
//! caller never holds a shard guard across an await point.

use dashmap::DashMap;

use super::{ConfigurationRepository, DeviceRepository, StoreError};
use crate::model::{Configuration, Device};

/// In-memory device repository keyed by cloud device id.
#[derive(Debug, Default)]
pub struct InMemoryDeviceRepository {
    devices: DashMap<String, Device>,
}

impl InMemoryDeviceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceRepository for InMemoryDeviceRepository {
    fn get(&self, device_id: &str) -> Option<Device> {
        self.devices.get(device_id).map(|entry| entry.clone())
    }

    fn list(&self) -> Vec<Device> {
        self.devices.iter().map(|entry| entry.clone()).collect()
    }

    fn save(&self, device: Device) {
        self.devices.insert(device.id.clone(), device);
    }

    fn remove(&self, device_id: &str) -> Option<Device> {
        self.devices.remove(device_id).map(|(_, device)| device)
    }
}

/// In-memory configuration repository keyed by numeric id.
#[derive(Debug, Default)]
pub struct InMemoryConfigurationRepository {
    configurations: DashMap<i64, Configuration>,
}

impl InMemoryConfigurationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigurationRepository for InMemoryConfigurationRepository {
    fn get(&self, configuration_id: i64) -> Option<Configuration> {
        self.configurations
            .get(&configuration_id)
            .map(|entry| entry.clone())
    }

    fn list(&self) -> Vec<Configuration> {
        self.configurations
            .iter()
            .map(|entry| entry.clone())
            .collect()
    }

    fn list_active_for_device(&self, device_id: &str) -> Vec<Configuration> {
        self.configurations
            .iter()
            .filter(|entry| !entry.archived && entry.device_id == device_id)
            .map(|entry| entry.clone())
            .collect()
    }

    fn save(&self, configuration: Configuration) -> Result<(), StoreError> {
        let clash = self.configurations.iter().any(|entry| {
            entry.id != configuration.id && entry.name == configuration.name
        });
        if clash {
            return Err(StoreError::DuplicateName {
                name: configuration.name,
            });
        }
        self.configurations.insert(configuration.id, configuration);
        Ok(())
    }

    fn remove(&self, configuration_id: i64) -> Option<Configuration> {
        self.configurations
            .remove(&configuration_id)
            .map(|(_, configuration)| configuration)
    }

    fn next_id(&self) -> i64 {
        self.configurations
            .iter()
            .map(|entry| entry.id)
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::model::{
        BrewSettings, ConfigurationVariant, ConnectedPeripheral, PeripheralType,
    };

    fn peripheral(pin_nr: i32) -> ConnectedPeripheral {
        ConnectedPeripheral {
            kind: PeripheralType::OneWireTemp,
            pin_nr,
            hw_address: "0000".into(),
            name: None,
            connected: true,
            offset: 0.0,
            device_offset: 0.0,
        }
    }

    fn configuration(id: i64, name: &str, device_id: &str) -> Configuration {
        Configuration {
            id,
            name: name.into(),
            device_id: device_id.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            temperature: 20.0,
            heat_actuator: peripheral(16),
            temp_sensor: peripheral(17),
            heating_period: 5000,
            p: 1.0,
            i: 0.0,
            d: 0.0,
            archived: false,
            sensor_data: BTreeMap::new(),
            variant: ConfigurationVariant::Brew(BrewSettings {
                pump1_actuator: None,
                pump2_actuator: None,
                heater_pwm: 0.0,
                pump1_pwm: 0.0,
                pump2_pwm: 0.0,
            }),
        }
    }

    #[test]
    fn save_rejects_duplicate_names_for_different_ids() {
        let repository = InMemoryConfigurationRepository::new();
        repository.save(configuration(1, "lager", "aaa")).unwrap();

        let rejected = repository.save(configuration(2, "lager", "aaa"));
        assert!(matches!(rejected, Err(StoreError::DuplicateName { .. })));

        // Resaving the same id under its own name is an update, not a clash.
        repository.save(configuration(1, "lager", "bbb")).unwrap();
        assert_eq!(repository.get(1).unwrap().device_id, "bbb");
    }

    #[test]
    fn active_listing_skips_archived_and_other_devices() {
        let repository = InMemoryConfigurationRepository::new();
        repository.save(configuration(1, "a", "dev-1")).unwrap();
        repository.save(configuration(2, "b", "dev-2")).unwrap();
        let mut archived = configuration(3, "c", "dev-1");
        archived.archived = true;
        repository.save(archived).unwrap();

        let active = repository.list_active_for_device("dev-1");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 1);
    }

    #[test]
    fn next_id_is_one_past_the_maximum() {
        let repository = InMemoryConfigurationRepository::new();
        assert_eq!(repository.next_id(), 1);

        repository.save(configuration(5, "a", "dev-1")).unwrap();
        repository.save(configuration(2, "b", "dev-1")).unwrap();
        assert_eq!(repository.next_id(), 6);
    }
}
