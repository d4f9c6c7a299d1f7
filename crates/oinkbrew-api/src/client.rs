//! Particle cloud HTTP client.
//!
//! Wraps the four cloud operations the backend needs -- device listing,
//! variable reads, function invocation, and the event stream subscription --
//! behind a single authenticated client. Login happens lazily on first use
//! and is shared between concurrent callers; a failed login is retried by
//! the next caller instead of being cached.

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, error};
use url::Url;

use crate::error::Error;
use crate::events::{EventData, into_event_stream};
use crate::transport::TransportConfig;
use crate::types::{DeviceSummary, UpdateResult};

/// Ordered event sequence produced by [`ParticleClient::subscribe`].
///
/// Terminates with a single `Err` when the underlying transport drops.
/// Reconnecting is the consumer's responsibility.
pub type EventStream = futures_util::stream::BoxStream<'static, Result<EventData, Error>>;

/// Device scope for event subscriptions: all devices owned by the account.
pub const DEVICE_SCOPE_MINE: &str = "mine";

// ── Configuration ────────────────────────────────────────────────────

/// Connection settings for the Particle cloud.
#[derive(Debug, Clone)]
pub struct ParticleConfig {
    /// Cloud API root, e.g. `https://api.particle.io`.
    pub base_url: Url,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: SecretString,
    /// Device scope for event subscriptions (`"mine"` or a device id).
    pub device_scope: String,
    /// Transport tuning.
    pub transport: TransportConfig,
}

// ── Wire bodies ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct VariableResponse {
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct CloudErrorBody {
    #[serde(default)]
    info: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl CloudErrorBody {
    fn message(self) -> String {
        self.info
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| "unknown cloud error".into())
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Authenticated client for the Particle cloud API.
pub struct ParticleClient {
    rest: reqwest::Client,
    stream: reqwest::Client,
    config: ParticleConfig,
    token: OnceCell<String>,
}

impl ParticleClient {
    /// Build a client from configuration. Does not authenticate --
    /// the first operation triggers the login.
    pub fn new(config: ParticleConfig) -> Result<Self, Error> {
        let rest = config.transport.build_rest_client()?;
        let stream = config.transport.build_stream_client()?;

        Ok(Self {
            rest,
            stream,
            config,
            token: OnceCell::new(),
        })
    }

    /// The configured cloud API root.
    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Access token, logging in on first use.
    ///
    /// Concurrent callers share a single in-flight login (first value
    /// wins). A failed login leaves the cell empty, so the next caller
    /// retries instead of inheriting the failure.
    async fn access_token(&self) -> Result<&str, Error> {
        self.token
            .get_or_try_init(|| self.login())
            .await
            .map(String::as_str)
    }

    async fn login(&self) -> Result<String, Error> {
        debug!("logging in to cloud");

        let url = self.url("/oauth/token")?;
        let response = self
            .rest
            .post(url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
            ])
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Authentication {
                message: serde_json::from_str::<CloudErrorBody>(&body)
                    .map(CloudErrorBody::message)
                    .unwrap_or_else(|_| format!("login failed with HTTP {status}")),
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            })?;

        debug!("cloud login successful");
        Ok(token.access_token)
    }

    // ── Device listing ───────────────────────────────────────────────

    /// List all devices registered to the account.
    ///
    /// Degrades to an empty list on any failure -- callers treat the
    /// listing as best-effort and reconcile whatever arrives.
    pub async fn list_devices(&self) -> Vec<DeviceSummary> {
        match self.try_list_devices().await {
            Ok(devices) => {
                debug!(count = devices.len(), "retrieved devices from cloud");
                devices
            }
            Err(e) => {
                error!(error = %e, "could not list devices");
                Vec::new()
            }
        }
    }

    async fn try_list_devices(&self) -> Result<Vec<DeviceSummary>, Error> {
        let token = self.access_token().await?;
        let url = self.url("/v1/devices")?;

        let response = self
            .rest
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_json(response).await
    }

    // ── Variable reads ───────────────────────────────────────────────

    /// Read a named cloud variable from a device.
    ///
    /// Returns the raw `result` value (string or object). Degrades to an
    /// empty string on any failure.
    pub async fn get_variable(&self, device_id: &str, name: &str) -> Value {
        match self.try_get_variable(device_id, name).await {
            Ok(value) => {
                debug!(device = %device_id, variable = %name, "retrieved variable");
                value
            }
            Err(e) => {
                error!(error = %e, device = %device_id, variable = %name, "could not get variable");
                Value::String(String::new())
            }
        }
    }

    async fn try_get_variable(&self, device_id: &str, name: &str) -> Result<Value, Error> {
        let token = self.access_token().await?;
        let url = self.url(&format!("/v1/devices/{device_id}/{name}"))?;

        let response = self
            .rest
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(Error::Transport)?;

        let body: VariableResponse = Self::parse_json(response).await?;
        Ok(body.result)
    }

    // ── Function invocation ──────────────────────────────────────────

    /// Invoke a remote function on a device.
    ///
    /// Never returns `Err`: failures are folded into the result value so
    /// callers can decide whether an unsuccessful push matters.
    pub async fn call_function(
        &self,
        device_id: &str,
        name: &str,
        argument: String,
    ) -> UpdateResult {
        match self.try_call_function(device_id, name, argument).await {
            Ok(()) => UpdateResult::success(),
            Err(e) => {
                error!(error = %e, device = %device_id, function = %name, "function call failed");
                UpdateResult::failure(e.status_code(), e.to_string())
            }
        }
    }

    async fn try_call_function(
        &self,
        device_id: &str,
        name: &str,
        argument: String,
    ) -> Result<(), Error> {
        let token = self.access_token().await?;
        let url = self.url(&format!("/v1/devices/{device_id}/{name}"))?;

        let response = self
            .rest
            .post(url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "arg": argument }))
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::Cloud {
            status_code: status.as_u16(),
            info: serde_json::from_str::<CloudErrorBody>(&body)
                .map(CloudErrorBody::message)
                .unwrap_or_else(|_| format!("HTTP {status}")),
        })
    }

    // ── Event subscription ───────────────────────────────────────────

    /// Subscribe to the event stream for a topic prefix.
    ///
    /// The returned stream preserves publish order and ends (with a final
    /// `Err` on transport failure) when the connection drops. It never
    /// reconnects by itself.
    pub async fn subscribe(&self, topic: &str) -> Result<EventStream, Error> {
        let token = self.access_token().await?.to_owned();
        let url = self.subscription_url(topic)?;

        debug!(url = %url, "subscribing to event stream");

        let response = self
            .stream
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::EventStream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::EventStream(format!(
                "subscription rejected with HTTP {status}"
            )));
        }

        Ok(into_event_stream(response).boxed())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        self.config.base_url.join(path).map_err(Error::InvalidUrl)
    }

    fn subscription_url(&self, topic: &str) -> Result<Url, Error> {
        let path = if self.config.device_scope == DEVICE_SCOPE_MINE {
            format!("/v1/devices/events/{topic}")
        } else {
            format!("/v1/devices/{}/events/{topic}", self.config.device_scope)
        };
        self.url(&path)
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, Error> {
        let status = response.status();
        let body = response.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Cloud {
                status_code: status.as_u16(),
                info: serde_json::from_str::<CloudErrorBody>(&body)
                    .map(CloudErrorBody::message)
                    .unwrap_or_else(|_| format!("HTTP {status}")),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}
