//! Scripted gateway fake shared by the listener and refresh worker tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use futures_util::StreamExt;
use futures_util::stream;
use serde_json::Value;

use oinkbrew_api::{DeviceSummary, EventStream, UpdateResult};

use crate::error::CoreError;
use crate::gateway::CloudGateway;

/// One `subscribe` outcome. Scripts are consumed in order; an exhausted
/// script keeps failing.
pub enum ScriptedStream {
    /// Subscription is rejected outright.
    Fail,
    /// Deliver these events, then stay open forever.
    Events(Vec<oinkbrew_api::EventData>),
    /// Deliver these events, then drop the stream with an error.
    EventsThenError(Vec<oinkbrew_api::EventData>),
}

pub struct RecordedCall {
    pub device_id: String,
    pub name: String,
    pub argument: String,
}

pub struct FakeGateway {
    scripts: Mutex<VecDeque<ScriptedStream>>,
    attempts: AtomicU32,
    calls: Mutex<Vec<RecordedCall>>,
    devices: Mutex<Vec<DeviceSummary>>,
    variables: Mutex<HashMap<(String, String), Value>>,
}

impl FakeGateway {
    pub fn new(scripts: Vec<ScriptedStream>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            attempts: AtomicU32::new(0),
            calls: Mutex::new(Vec::new()),
            devices: Mutex::new(Vec::new()),
            variables: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_devices(&self, devices: Vec<DeviceSummary>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub fn set_variable(&self, device_id: &str, name: &str, value: Value) {
        self.variables
            .lock()
            .unwrap()
            .insert((device_id.to_owned(), name.to_owned()), value);
    }

    pub fn subscribe_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn function_calls(&self) -> Vec<RecordedCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl CloudGateway for FakeGateway {
    async fn list_devices(&self) -> Vec<DeviceSummary> {
        self.devices.lock().unwrap().clone()
    }

    async fn get_variable(&self, device_id: &str, name: &str) -> Value {
        self.variables
            .lock()
            .unwrap()
            .get(&(device_id.to_owned(), name.to_owned()))
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()))
    }

    async fn call_function(&self, device_id: &str, name: &str, argument: String) -> UpdateResult {
        self.calls.lock().unwrap().push(RecordedCall {
            device_id: device_id.to_owned(),
            name: name.to_owned(),
            argument,
        });
        UpdateResult::success()
    }

    async fn subscribe(&self, _topic: &str) -> Result<EventStream, CoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(ScriptedStream::Events(events)) => Ok(stream::iter(events.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
            Some(ScriptedStream::EventsThenError(events)) => Ok(stream::iter(
                events
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(oinkbrew_api::Error::EventStream(
                        "scripted stream drop".to_owned(),
                    )))),
            )
            .boxed()),
            Some(ScriptedStream::Fail) | None => Err(CoreError::StreamDropped {
                reason: "scripted subscription failure".to_owned(),
            }),
        }
    }
}
