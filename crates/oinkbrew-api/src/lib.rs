// oinkbrew-api: Async client for the Particle cloud surface the Oinkbrew
// backend consumes (REST + SSE event stream).

pub mod client;
pub mod command;
pub mod error;
pub mod events;
pub mod transport;
pub mod types;

pub use client::{DEVICE_SCOPE_MINE, EventStream, ParticleClient, ParticleConfig};
pub use error::Error;
pub use events::EventData;
pub use types::{DeviceSummary, UpdateResult};
