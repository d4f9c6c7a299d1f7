//! Cloud gateway seam.
//!
//! The core never talks HTTP itself; everything goes through
//! [`CloudGateway`]. [`oinkbrew_api::ParticleClient`] is the production
//! implementation, tests substitute a scripted fake.

use oinkbrew_api::{DeviceSummary, EventStream, ParticleClient, UpdateResult, command};
use serde_json::Value;

use crate::error::CoreError;
use crate::model::{Configuration, ConnectedPeripheral};

/// Asynchronous access to the device cloud.
///
/// The degradation contract mirrors the cloud API client: listing and
/// variable reads never fail (they fall back to empty values), function
/// calls report failure in-band, only stream subscription returns a
/// hard error.
pub trait CloudGateway: Send + Sync + 'static {
    fn list_devices(&self) -> impl Future<Output = Vec<DeviceSummary>> + Send;

    fn get_variable(
        &self,
        device_id: &str,
        name: &str,
    ) -> impl Future<Output = Value> + Send;

    fn call_function(
        &self,
        device_id: &str,
        name: &str,
        argument: String,
    ) -> impl Future<Output = UpdateResult> + Send;

    fn subscribe(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<EventStream, CoreError>> + Send;
}

impl CloudGateway for ParticleClient {
    async fn list_devices(&self) -> Vec<DeviceSummary> {
        ParticleClient::list_devices(self).await
    }

    async fn get_variable(&self, device_id: &str, name: &str) -> Value {
        ParticleClient::get_variable(self, device_id, name).await
    }

    async fn call_function(&self, device_id: &str, name: &str, argument: String) -> UpdateResult {
        ParticleClient::call_function(self, device_id, name, argument).await
    }

    async fn subscribe(&self, topic: &str) -> Result<EventStream, CoreError> {
        Ok(ParticleClient::subscribe(self, topic).await?)
    }
}

// ── Firmware command helpers ─────────────────────────────────────────

/// Pushes a sensor offset to the board owning the peripheral.
pub async fn send_offset<G: CloudGateway>(
    gateway: &G,
    device_id: &str,
    peripheral: &ConnectedPeripheral,
) -> UpdateResult {
    let argument = command::offset_argument(
        peripheral.pin_nr,
        &peripheral.hw_address,
        peripheral.offset,
    );
    gateway
        .call_function(device_id, command::SET_CONFIG_FUNCTION, argument)
        .await
}

/// Pushes a full control configuration to its device.
pub async fn send_configuration<G: CloudGateway>(
    gateway: &G,
    configuration: &Configuration,
) -> UpdateResult {
    let argument = command::configuration_argument(configuration.to_command_data());
    gateway
        .call_function(
            &configuration.device_id,
            command::SET_CONFIG_FUNCTION,
            argument,
        )
        .await
}

/// Tells a device to forget a configuration.
pub async fn remove_configuration<G: CloudGateway>(
    gateway: &G,
    device_id: &str,
    configuration_id: i64,
) -> UpdateResult {
    gateway
        .call_function(
            device_id,
            command::SET_CONFIG_FUNCTION,
            command::remove_argument(configuration_id),
        )
        .await
}

/// Asks a device to restart its firmware.
pub async fn restart_device<G: CloudGateway>(gateway: &G, device_id: &str) -> UpdateResult {
    gateway
        .call_function(
            device_id,
            command::SET_CONFIG_FUNCTION,
            command::restart_argument(),
        )
        .await
}
