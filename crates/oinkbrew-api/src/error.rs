use thiserror::Error;

/// Top-level error type for the `oinkbrew-api` crate.
///
/// Covers every failure mode across the gateway surface: authentication,
/// HTTP transport, structured cloud API errors, the SSE event stream, and
/// payload deserialization. `oinkbrew-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// OAuth token request failed (bad credentials, cloud outage, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Cloud API ───────────────────────────────────────────────────
    /// Structured error from the cloud API (`{error, info}` body).
    #[error("Cloud API error (HTTP {status_code}): {info}")]
    Cloud { status_code: u16, info: String },

    // ── Event stream ────────────────────────────────────────────────
    /// The SSE event stream dropped or could not be established.
    #[error("Event stream error: {0}")]
    EventStream(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::EventStream(_) => true,
            _ => false,
        }
    }

    /// The HTTP status code behind this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Cloud { status_code, .. } => Some(*status_code),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
