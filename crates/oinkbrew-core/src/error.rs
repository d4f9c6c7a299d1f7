// ── Core error types ──
//
// Domain-facing errors from oinkbrew-core. Consumers never see raw HTTP
// status codes or transport failures directly; the `From<oinkbrew_api::Error>`
// impl translates gateway-layer errors into domain-appropriate variants.

use thiserror::Error;

use crate::store::StoreError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Gateway errors ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Event stream dropped: {reason}")]
    StreamDropped { reason: String },

    #[error("Gateway error: {message}")]
    Gateway { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("Malformed event payload for {topic}: {message}")]
    MalformedPayload { topic: String, message: String },

    // ── Storage errors ───────────────────────────────────────────────
    #[error(transparent)]
    Store(#[from] StoreError),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from gateway-layer errors ─────────────────────────────

impl From<oinkbrew_api::Error> for CoreError {
    fn from(err: oinkbrew_api::Error) -> Self {
        match err {
            oinkbrew_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            oinkbrew_api::Error::EventStream(reason) => CoreError::StreamDropped { reason },
            other => CoreError::Gateway {
                message: other.to_string(),
            },
        }
    }
}
