//! Domain model: devices, their peripherals, and control configurations.

mod configuration;
mod device;
mod peripheral;

pub use configuration::{
    BrewSettings, Configuration, ConfigurationVariant, FridgeSettings, SensorDataEvent,
    SensorReading, SensorValue, TYPE_BREW, TYPE_FRIDGE,
};
pub use device::Device;
pub use peripheral::{ConnectedPeripheral, PeripheralType, mark_connection, reconcile};
