// Shared transport configuration for building `reqwest::Client` instances.
//
// The REST surface and the SSE event stream need different timeout
// behavior (a read timeout would kill an idle event stream), so both are
// derived from the same config here instead of duplicating builder logic.

use std::time::Duration;

use crate::error::Error;

const USER_AGENT: &str = concat!("oinkbrew-cloud-sync/", env!("CARGO_PKG_VERSION"));

/// Transport tuning for the cloud HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout for REST calls.
    pub timeout: Duration,
    /// TCP connect timeout, shared by REST and SSE clients.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build the client used for REST calls (login, listing, variables,
    /// function invocations).
    pub fn build_rest_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(Error::Transport)
    }

    /// Build the client used for the SSE event stream.
    ///
    /// No request timeout: the connection is expected to stay open
    /// indefinitely and only carries traffic when devices publish.
    pub fn build_stream_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(Error::Transport)
    }
}
