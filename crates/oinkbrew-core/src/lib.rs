// oinkbrew-core: Event reconciliation and device-state synchronization
// between the Particle cloud and the Oinkbrew backend's device records.

pub mod config;
pub mod configurations;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod listener;
pub mod model;
pub mod refresh;
pub mod store;

#[cfg(test)]
mod test_support;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::SyncConfig;
pub use configurations::ConfigurationStore;
pub use directory::DeviceDirectory;
pub use error::CoreError;
pub use gateway::CloudGateway;
pub use listener::{EventStreamListener, ListenerState};
pub use refresh::DeviceRefreshWorker;
pub use store::{ConfigurationRepository, DeviceRepository, StoreError};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    BrewSettings, Configuration, ConfigurationVariant, ConnectedPeripheral, Device,
    FridgeSettings, PeripheralType, SensorDataEvent, SensorReading, SensorValue,
};
