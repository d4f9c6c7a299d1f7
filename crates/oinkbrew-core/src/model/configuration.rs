//! Brew and fridge control configurations.
//!
//! A configuration binds a temperature control loop to the peripherals of
//! exactly one device. The two variants share the control-loop base; the
//! variant payload carries what is specific to brewing (pumps, PWM duty
//! cycles) or fridge operation (cooling actuator and timing).
//!
//! The core treats configurations as read-mostly: CRUD happens elsewhere,
//! and the only field the core itself mutates is the time-bucketed
//! sensor-data map.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::peripheral::ConnectedPeripheral;

/// Variant discriminator on the device protocol: 1 = brew, 2 = fridge.
pub const TYPE_BREW: u8 = 1;
pub const TYPE_FRIDGE: u8 = 2;

/// One named sensor reading inside a time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub name: String,
    pub value: f64,
}

/// A raw reading from an `oinkbrew/device/values` payload.
///
/// Boards have been observed to publish `pinNr` as either a number or a
/// string, so deserialization accepts both.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorValue {
    #[serde(rename = "pinNr", deserialize_with = "flexible_pin_nr")]
    pub pin_nr: i32,
    #[serde(rename = "hwAddress")]
    pub hw_address: String,
    pub value: f64,
}

fn flexible_pin_nr<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;

    let raw = Value::deserialize(deserializer)?;
    match raw {
        Value::Number(n) => n
            .as_i64()
            .map(|v| v as i32)
            .ok_or_else(|| D::Error::custom("pinNr is not an integer")),
        Value::String(s) => s
            .parse::<i32>()
            .map_err(|e| D::Error::custom(format!("pinNr: {e}"))),
        other => Err(D::Error::custom(format!("pinNr has type {other:?}"))),
    }
}

/// Aggregated readings for one configuration and one time bucket, emitted
/// to downstream consumers after every processed values event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDataEvent {
    /// ISO-8601 bucket key.
    pub published_at: String,
    pub configuration_id: i64,
    pub sensor_data: Vec<SensorReading>,
}

// ── Configuration ────────────────────────────────────────────────────

/// Brew-specific control parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrewSettings {
    pub pump1_actuator: Option<ConnectedPeripheral>,
    pub pump2_actuator: Option<ConnectedPeripheral>,
    pub heater_pwm: f64,
    pub pump1_pwm: f64,
    pub pump2_pwm: f64,
}

/// Fridge-specific control parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FridgeSettings {
    pub cool_actuator: ConnectedPeripheral,
    pub fan_actuator: Option<ConnectedPeripheral>,
    pub fan_pwm: f64,
    pub cooling_period: i64,
    pub cooling_on_time: i64,
    pub cooling_off_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigurationVariant {
    Brew(BrewSettings),
    Fridge(FridgeSettings),
}

/// A temperature control configuration bound to one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Externally assigned numeric id, unique across configurations.
    pub id: i64,
    /// Unique human-readable name.
    pub name: String,
    /// Identity of the owning device (weak reference by id).
    pub device_id: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Target temperature.
    pub temperature: f64,
    pub heat_actuator: ConnectedPeripheral,
    pub temp_sensor: ConnectedPeripheral,
    pub heating_period: i64,
    pub p: f64,
    pub i: f64,
    pub d: f64,

    /// Archived configurations never receive pushes or sensor data.
    pub archived: bool,

    /// Time-bucketed sensor readings accumulated since last flush,
    /// keyed by ISO-8601 bucket key. The one field the core mutates.
    #[serde(default)]
    pub sensor_data: BTreeMap<String, Vec<SensorReading>>,

    pub variant: ConfigurationVariant,
}

impl Configuration {
    /// Protocol discriminator for this variant.
    pub fn type_tag(&self) -> u8 {
        match self.variant {
            ConfigurationVariant::Brew(_) => TYPE_BREW,
            ConfigurationVariant::Fridge(_) => TYPE_FRIDGE,
        }
    }

    /// Every peripheral this configuration binds, across all roles.
    pub fn bound_peripherals(&self) -> Vec<&ConnectedPeripheral> {
        let mut bound = vec![&self.heat_actuator, &self.temp_sensor];
        match &self.variant {
            ConfigurationVariant::Brew(brew) => {
                bound.extend(brew.pump1_actuator.iter());
                bound.extend(brew.pump2_actuator.iter());
            }
            ConfigurationVariant::Fridge(fridge) => {
                bound.push(&fridge.cool_actuator);
                bound.extend(fridge.fan_actuator.iter());
            }
        }
        bound
    }

    /// Whether any bound peripheral role occupies the given attachment
    /// point. Checks every role, not just the primary sensor.
    pub fn has_connected_device(&self, pin_nr: i32, hw_address: &str) -> bool {
        self.bound_peripherals()
            .iter()
            .any(|p| p.matches(pin_nr, hw_address))
    }

    /// Wire representation for a `setConfig` configuration push.
    ///
    /// Carries the control parameters the firmware needs; persistence-only
    /// fields (timestamps, sensor-data map, archive flag, device relation)
    /// are stripped.
    pub fn to_command_data(&self) -> Value {
        let mut fields = serde_json::Map::new();
        fields.insert("type".into(), json!(self.type_tag()));
        fields.insert("id".into(), json!(self.id));
        fields.insert("name".into(), json!(self.name));
        fields.insert("temperature".into(), json!(self.temperature));
        fields.insert("heatActuator".into(), json!(self.heat_actuator));
        fields.insert("tempSensor".into(), json!(self.temp_sensor));
        fields.insert("heatingPeriod".into(), json!(self.heating_period));
        fields.insert("p".into(), json!(self.p));
        fields.insert("i".into(), json!(self.i));
        fields.insert("d".into(), json!(self.d));

        match &self.variant {
            ConfigurationVariant::Brew(brew) => {
                if let Some(pump1) = &brew.pump1_actuator {
                    fields.insert("pump1Actuator".into(), json!(pump1));
                }
                if let Some(pump2) = &brew.pump2_actuator {
                    fields.insert("pump2Actuator".into(), json!(pump2));
                }
                fields.insert("heaterPwm".into(), json!(brew.heater_pwm));
                fields.insert("pump1Pwm".into(), json!(brew.pump1_pwm));
                fields.insert("pump2Pwm".into(), json!(brew.pump2_pwm));
            }
            ConfigurationVariant::Fridge(fridge) => {
                fields.insert("coolActuator".into(), json!(fridge.cool_actuator));
                if let Some(fan) = &fridge.fan_actuator {
                    fields.insert("fanActuator".into(), json!(fan));
                }
                fields.insert("fanPwm".into(), json!(fridge.fan_pwm));
                fields.insert("coolingPeriod".into(), json!(fridge.cooling_period));
                fields.insert("coolingOnTime".into(), json!(fridge.cooling_on_time));
                fields.insert("coolingOffTime".into(), json!(fridge.cooling_off_time));
            }
        }

        Value::Object(fields)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::PeripheralType;

    fn peripheral(pin_nr: i32, hw_address: &str, kind: PeripheralType) -> ConnectedPeripheral {
        ConnectedPeripheral {
            kind,
            pin_nr,
            hw_address: hw_address.into(),
            name: None,
            connected: true,
            offset: 0.0,
            device_offset: 0.0,
        }
    }

    fn brew(id: i64) -> Configuration {
        Configuration {
            id,
            name: format!("brew {id}"),
            device_id: "aaa".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            temperature: 65.5,
            heat_actuator: peripheral(16, "0000000000000000", PeripheralType::PwmActuator),
            temp_sensor: peripheral(17, "0a1b2c", PeripheralType::OneWireTemp),
            heating_period: 5000,
            p: 80.0,
            i: 0.5,
            d: 2.0,
            archived: false,
            sensor_data: BTreeMap::new(),
            variant: ConfigurationVariant::Brew(BrewSettings {
                pump1_actuator: Some(peripheral(11, "0000000000000000", PeripheralType::DigitalActuator)),
                pump2_actuator: None,
                heater_pwm: 0.0,
                pump1_pwm: 100.0,
                pump2_pwm: 0.0,
            }),
        }
    }

    #[test]
    fn matching_checks_all_bound_roles() {
        let configuration = brew(1);

        assert!(configuration.has_connected_device(17, "0a1b2c")); // temp sensor
        assert!(configuration.has_connected_device(16, "0000000000000000")); // heat actuator
        assert!(configuration.has_connected_device(11, "0000000000000000")); // pump 1
        assert!(!configuration.has_connected_device(12, "0a1b2c"));
    }

    #[test]
    fn command_data_uses_wire_names_and_type_tag() {
        let data = brew(7).to_command_data();

        assert_eq!(data["type"], 1);
        assert_eq!(data["id"], 7);
        assert_eq!(data["tempSensor"]["pinNr"], 17);
        assert_eq!(data["tempSensor"]["hwAddress"], "0a1b2c");
        assert_eq!(data["heatingPeriod"], 5000);
        assert_eq!(data["pump1Pwm"], 100.0);
        // Persistence-only fields are stripped.
        assert!(data.get("sensorData").is_none());
        assert!(data.get("archived").is_none());
        assert!(data.get("device_id").is_none());
    }

    #[test]
    fn fridge_command_data_carries_cooling_parameters() {
        let mut configuration = brew(2);
        configuration.variant = ConfigurationVariant::Fridge(FridgeSettings {
            cool_actuator: peripheral(12, "ffff", PeripheralType::DigitalActuator),
            fan_actuator: None,
            fan_pwm: 0.0,
            cooling_period: 1200,
            cooling_on_time: 300,
            cooling_off_time: 180,
        });

        let data = configuration.to_command_data();

        assert_eq!(data["type"], 2);
        assert_eq!(data["coolActuator"]["pinNr"], 12);
        assert_eq!(data["coolingOnTime"], 300);
        assert!(data.get("fanActuator").is_none());
    }

    #[test]
    fn sensor_values_accept_numeric_and_string_pin_numbers() {
        let values: Vec<SensorValue> = serde_json::from_str(
            r#"[
                {"pinNr": 17, "hwAddress": "aa", "value": 21.5},
                {"pinNr": "18", "hwAddress": "bb", "value": 4.0}
            ]"#,
        )
        .unwrap();

        assert_eq!(values[0].pin_nr, 17);
        assert_eq!(values[1].pin_nr, 18);
    }
}
