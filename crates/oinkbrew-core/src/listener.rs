//! Event stream listener.
//!
//! Owns the long-lived subscription to the cloud event bus, retries on
//! stream failure with a fixed bounded backoff, classifies events by
//! topic, and drives the device directory and configuration store in
//! response. Events are dispatched one at a time in arrival order; a slow
//! handler delays later events, which is the intended backpressure point.

use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use futures_util::StreamExt;
use futures_util::future::join_all;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use oinkbrew_api::EventData;

use crate::configurations::ConfigurationStore;
use crate::directory::DeviceDirectory;
use crate::error::CoreError;
use crate::gateway::{CloudGateway, send_configuration, send_offset};
use crate::model::{ConnectedPeripheral, PeripheralType, SensorValue};

/// Root topic the subscription covers; the per-event topics below all
/// arrive through it.
pub const ROOT_TOPIC: &str = "oinkbrew";

pub const TOPIC_START: &str = "oinkbrew/start";
pub const TOPIC_DEVICES_NEW: &str = "oinkbrew/devices/new";
pub const TOPIC_DEVICES_REMOVE: &str = "oinkbrew/devices/remove";
pub const TOPIC_DEVICE_VALUES: &str = "oinkbrew/device/values";

const RETRY_DELAY: Duration = Duration::from_millis(750);
const MAX_RETRIES: u32 = 3;

// ── ListenerState ────────────────────────────────────────────────────

/// Subscription lifecycle, observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Subscribing,
    Streaming,
    Backoff { attempts_left: u32 },
    /// Retries exhausted. Requires a fresh [`bootstrap`](EventStreamListener::bootstrap).
    GivenUp,
}

impl ListenerState {
    fn is_active(&self) -> bool {
        matches!(
            self,
            ListenerState::Subscribing | ListenerState::Streaming | ListenerState::Backoff { .. }
        )
    }
}

// ── EventStreamListener ──────────────────────────────────────────────

/// Cheaply cloneable via `Arc`; exactly one subscription task runs per
/// listener at a time.
pub struct EventStreamListener<G: CloudGateway> {
    inner: Arc<ListenerInner<G>>,
}

impl<G: CloudGateway> Clone for EventStreamListener<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ListenerInner<G> {
    gateway: Arc<G>,
    directory: DeviceDirectory,
    configurations: ConfigurationStore,
    state: watch::Sender<ListenerState>,
    cancel: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<G: CloudGateway> EventStreamListener<G> {
    pub fn new(
        gateway: Arc<G>,
        directory: DeviceDirectory,
        configurations: ConfigurationStore,
    ) -> Self {
        let (state, _) = watch::channel(ListenerState::Idle);
        Self {
            inner: Arc::new(ListenerInner {
                gateway,
                directory,
                configurations,
                state,
                cancel: Mutex::new(None),
                task: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to listener state changes.
    pub fn state(&self) -> watch::Receiver<ListenerState> {
        self.inner.state.subscribe()
    }

    /// Starts the subscription task with a fresh retry budget.
    ///
    /// Idempotent while a subscription is live: calling again during
    /// `Subscribing`/`Streaming`/`Backoff` is a no-op. From `Idle` or
    /// `GivenUp` it starts over.
    pub async fn bootstrap(&self) {
        let mut task = self.inner.task.lock().await;
        if self.inner.state.borrow().is_active() {
            debug!("listener already running, bootstrap ignored");
            return;
        }

        // Claim the active state before the task is scheduled so a
        // concurrent bootstrap observes it.
        let _ = self.inner.state.send(ListenerState::Subscribing);
        let cancel = CancellationToken::new();
        *self.inner.cancel.lock().await = Some(cancel.clone());

        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(subscription_task(inner, cancel)));
        info!("event stream listener started");
    }

    /// Cancels the active subscription and any pending backoff timer.
    /// Idempotent no-op when nothing is running.
    pub async fn shutdown(&self) {
        if let Some(cancel) = self.inner.cancel.lock().await.take() {
            cancel.cancel();
        }
        if let Some(task) = self.inner.task.lock().await.take() {
            let _ = task.await;
        }
        let _ = self.inner.state.send(ListenerState::Idle);
        debug!("event stream listener stopped");
    }
}

// ── Subscription task ────────────────────────────────────────────────

async fn subscription_task<G: CloudGateway>(
    inner: Arc<ListenerInner<G>>,
    cancel: CancellationToken,
) {
    let mut attempts_left = MAX_RETRIES;

    loop {
        let _ = inner.state.send(ListenerState::Subscribing);

        let subscribed = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = inner.gateway.subscribe(ROOT_TOPIC) => result,
        };

        match subscribed {
            Ok(mut stream) => {
                let _ = inner.state.send(ListenerState::Streaming);
                info!(topic = ROOT_TOPIC, "event stream connected");

                let reason = loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        item = stream.next() => match item {
                            Some(Ok(event)) => {
                                if let Err(e) = dispatch(&inner, &event).await {
                                    error!(topic = %event.name, error = %e, "event handling failed");
                                }
                            }
                            Some(Err(e)) => break e.to_string(),
                            None => break "event stream ended".to_owned(),
                        },
                    }
                };
                warn!(reason = %reason, "event stream dropped");
            }
            Err(e) => warn!(error = %e, "event stream subscription failed"),
        }

        if attempts_left == 0 {
            error!("giving up on the event stream after repeated failures");
            let _ = inner.state.send(ListenerState::GivenUp);
            return;
        }
        attempts_left -= 1;
        let _ = inner.state.send(ListenerState::Backoff { attempts_left });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(RETRY_DELAY) => {}
        }
    }

    let _ = inner.state.send(ListenerState::Idle);
}

// ── Event dispatch ───────────────────────────────────────────────────

/// Routes one event by topic. Unrecognized topics are ignored so future
/// event types do not break the stream.
async fn dispatch<G: CloudGateway>(
    inner: &ListenerInner<G>,
    event: &EventData,
) -> Result<(), CoreError> {
    match event.name.as_str() {
        TOPIC_START => handle_start(inner, event).await,
        TOPIC_DEVICES_NEW => handle_device_new(inner, event).await,
        TOPIC_DEVICES_REMOVE => handle_device_remove(inner, event),
        TOPIC_DEVICE_VALUES => handle_device_values(inner, event),
        other => {
            debug!(topic = %other, "ignoring unrecognized event topic");
            Ok(())
        }
    }
}

/// A board announced its boot: re-push every active configuration bound
/// to it. Pushes run concurrently and are best-effort.
async fn handle_start<G: CloudGateway>(
    inner: &ListenerInner<G>,
    event: &EventData,
) -> Result<(), CoreError> {
    if inner.directory.find_by_id(&event.core_id).is_none() {
        debug!(device = %event.core_id, "start event from unknown device, skipping");
        return Ok(());
    }

    let active: Vec<_> = inner
        .configurations
        .find_by_device(&event.core_id)
        .into_iter()
        .filter(|c| !c.archived)
        .collect();
    info!(
        device = %event.core_id,
        configurations = active.len(),
        "device started, pushing configurations"
    );

    let pushes = active.iter().map(|configuration| async move {
        let result = send_configuration(inner.gateway.as_ref(), configuration).await;
        if !result.is_successful {
            warn!(
                configuration = configuration.id,
                device = %configuration.device_id,
                info = result.info.as_deref().unwrap_or(""),
                "configuration push failed"
            );
        }
    });
    join_all(pushes).await;
    Ok(())
}

/// A peripheral was attached: record it, and re-push the calibration
/// offset for temperature sensors since the board loses it on reset.
async fn handle_device_new<G: CloudGateway>(
    inner: &ListenerInner<G>,
    event: &EventData,
) -> Result<(), CoreError> {
    let peripheral = parse_peripheral(event)?;

    let Some(device) =
        inner
            .directory
            .update_connected_device_status(&event.core_id, &peripheral, true)
    else {
        return Ok(());
    };

    // Use the stored entry: it carries the user-configured offset even
    // when the report does not.
    let Some(stored) = device.find_peripheral(peripheral.pin_nr, &peripheral.hw_address) else {
        return Ok(());
    };
    if stored.kind == PeripheralType::OneWireTemp && stored.offset != 0.0 {
        let result = send_offset(inner.gateway.as_ref(), &event.core_id, stored).await;
        if result.is_successful {
            debug!(
                device = %event.core_id,
                pin = stored.pin_nr,
                offset = stored.offset,
                "calibration offset pushed"
            );
        } else {
            warn!(
                device = %event.core_id,
                pin = stored.pin_nr,
                info = result.info.as_deref().unwrap_or(""),
                "calibration offset push failed"
            );
        }
    }
    Ok(())
}

/// A peripheral was detached: flip its connected flag, nothing more.
fn handle_device_remove<G: CloudGateway>(
    inner: &ListenerInner<G>,
    event: &EventData,
) -> Result<(), CoreError> {
    let peripheral = parse_peripheral(event)?;
    inner
        .directory
        .update_connected_device_status(&event.core_id, &peripheral, false);
    Ok(())
}

/// Sensor readings: route into matching configurations, bucketed by the
/// event's publish timestamp.
fn handle_device_values<G: CloudGateway>(
    inner: &ListenerInner<G>,
    event: &EventData,
) -> Result<(), CoreError> {
    let readings: Vec<SensorValue> =
        serde_json::from_str(&event.data).map_err(|e| CoreError::MalformedPayload {
            topic: event.name.clone(),
            message: e.to_string(),
        })?;

    let bucket_key = event
        .published_at
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    inner
        .configurations
        .record_sensor_values(&bucket_key, &event.core_id, &readings);
    Ok(())
}

fn parse_peripheral(event: &EventData) -> Result<ConnectedPeripheral, CoreError> {
    serde_json::from_str(&event.data).map_err(|e| CoreError::MalformedPayload {
        topic: event.name.clone(),
        message: e.to_string(),
    })
}

// ── Tests ────────────────────────────────────────────────────────────
