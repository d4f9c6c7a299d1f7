//! Environment-driven configuration.
//!
//! Everything the sync core needs to reach the cloud comes from
//! `OINKBREW_`-prefixed environment variables, e.g. `OINKBREW_CLIENT_ID`
//! and `OINKBREW_CLIENT_SECRET`.

use std::time::Duration;

use figment::{Figment, providers::Env};
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use oinkbrew_api::{ParticleConfig, transport::TransportConfig};

use crate::error::CoreError;

const ENV_PREFIX: &str = "OINKBREW_";

/// Cloud sync settings.
#[derive(Debug, Deserialize)]
pub struct SyncConfig {
    /// Cloud API root.
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// OAuth client id.
    pub client_id: String,

    /// OAuth client secret. Never logged or re-serialized.
    pub client_secret: SecretString,

    /// Event subscription scope (`"mine"` or a single device id).
    #[serde(default = "default_device_scope")]
    pub device_scope: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> Url {
    Url::parse("https://api.particle.io").expect("static URL")
}
fn default_device_scope() -> String {
    oinkbrew_api::DEVICE_SCOPE_MINE.into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_connect_timeout_secs() -> u64 {
    10
}

impl SyncConfig {
    /// Load from `OINKBREW_`-prefixed environment variables.
    pub fn from_env() -> Result<Self, CoreError> {
        Figment::new()
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| CoreError::Config {
                message: e.to_string(),
            })
    }

    /// Translate into the gateway client's connection settings.
    pub fn into_particle_config(self) -> ParticleConfig {
        ParticleConfig {
            base_url: self.base_url,
            client_id: self.client_id,
            client_secret: self.client_secret,
            device_scope: self.device_scope,
            transport: TransportConfig {
                timeout: Duration::from_secs(self.timeout_secs),
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            },
        }
    }
}
