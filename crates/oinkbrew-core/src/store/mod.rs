//! Storage abstraction for devices and configurations.
//!
//! Repositories are synchronous and object-safe so sync workers and async
//! tasks can share them behind `Arc<dyn ...>` without pulling in an async
//! runtime at the storage boundary. The in-memory adapters in [`memory`]
//! are the default; a persistent backend only has to implement these two
//! traits.

mod memory;

pub use memory::{InMemoryConfigurationRepository, InMemoryDeviceRepository};

use thiserror::Error;

use crate::model::{Configuration, Device};

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No device with id {device_id}")]
    UnknownDevice { device_id: String },

    #[error("No configuration with id {configuration_id}")]
    UnknownConfiguration { configuration_id: i64 },

    #[error("A configuration named {name:?} already exists")]
    DuplicateName { name: String },
}

/// Device persistence.
pub trait DeviceRepository: Send + Sync {
    fn get(&self, device_id: &str) -> Option<Device>;

    fn list(&self) -> Vec<Device>;

    /// Inserts or fully replaces a device record.
    fn save(&self, device: Device);

    fn remove(&self, device_id: &str) -> Option<Device>;
}

/// Configuration persistence.
pub trait ConfigurationRepository: Send + Sync {
    fn get(&self, configuration_id: i64) -> Option<Configuration>;

    /// All configurations, archived ones included.
    fn list(&self) -> Vec<Configuration>;

    /// Active (non-archived) configurations bound to the given device.
    fn list_active_for_device(&self, device_id: &str) -> Vec<Configuration>;

    /// Inserts or fully replaces a configuration.
    ///
    /// Fails with [`StoreError::DuplicateName`] when another configuration
    /// already uses the same name.
    fn save(&self, configuration: Configuration) -> Result<(), StoreError>;

    fn remove(&self, configuration_id: i64) -> Option<Configuration>;

    /// Next free configuration id, one past the current maximum.
    fn next_id(&self) -> i64;
}
