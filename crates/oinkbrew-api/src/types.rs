// Wire types for the cloud device listing and function invocation.
//
// `DeviceSummary` mirrors the fields the cloud returns from `GET /v1/devices`.
// Everything beyond the identity fields is treated as opaque pass-through
// metadata; the backend never interprets it, only persists it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry from the cloud device listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    /// Cloud-assigned controller board identifier (`coreid` in events).
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub last_ip_address: Option<String>,

    #[serde(default)]
    pub last_heard: Option<DateTime<Utc>>,

    #[serde(default)]
    pub product_id: Option<i64>,

    #[serde(default)]
    pub platform_id: Option<i64>,

    #[serde(default)]
    pub cellular: bool,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub serial_number: Option<String>,

    #[serde(default)]
    pub system_firmware_version: Option<String>,

    /// Whether the board has a cloud session right now.
    #[serde(default)]
    pub online: bool,

    /// Whether the board's network link is up.
    #[serde(default)]
    pub connected: bool,
}

/// Outcome of a remote function invocation.
///
/// Function calls never surface as `Err` -- the cloud answers with either a
/// return value or a structured failure, and callers decide what to do with
/// an unsuccessful result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    pub is_successful: bool,
    pub error_code: Option<u16>,
    pub info: Option<String>,
}

impl UpdateResult {
    pub fn success() -> Self {
        Self {
            is_successful: true,
            error_code: None,
            info: None,
        }
    }

    pub fn failure(error_code: Option<u16>, info: impl Into<String>) -> Self {
        Self {
            is_successful: false,
            error_code,
            info: Some(info.into()),
        }
    }
}
