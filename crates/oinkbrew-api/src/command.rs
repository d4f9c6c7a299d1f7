// `setConfig` command encoding.
//
// Every outbound instruction to a controller board goes through the single
// `setConfig` cloud function with a `{command: int, data: object}` argument.
// The firmware dispatches on the integer, so the numbers here are part of
// the device protocol and must not change.

use serde_json::{Value, json};

/// Name of the cloud function every command is routed through.
pub const SET_CONFIG_FUNCTION: &str = "setConfig";

/// Firmware command discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConfigCommand {
    /// Push a sensor calibration offset.
    Offset = 1,
    /// Push a full control configuration.
    Configuration = 2,
    /// Remove a control configuration.
    Remove = 3,
    /// Restart the board.
    Restart = 4,
}

/// Build the `setConfig` argument for a sensor calibration offset.
pub fn offset_argument(pin_nr: i32, hw_address: &str, offset: f64) -> String {
    argument(
        ConfigCommand::Offset,
        json!({
            "pinNr": pin_nr,
            "hwAddress": hw_address,
            "offset": offset,
        }),
    )
}

/// Build the `setConfig` argument for a full configuration push.
///
/// `data` is the configuration's wire representation, already stripped of
/// persistence-only fields.
pub fn configuration_argument(data: Value) -> String {
    argument(ConfigCommand::Configuration, data)
}

/// Build the `setConfig` argument for removing a configuration by id.
pub fn remove_argument(configuration_id: i64) -> String {
    argument(ConfigCommand::Remove, json!({ "id": configuration_id }))
}

/// Build the `setConfig` argument for a board restart.
pub fn restart_argument() -> String {
    argument(ConfigCommand::Restart, json!({}))
}

fn argument(command: ConfigCommand, data: Value) -> String {
    json!({
        "command": command as u8,
        "data": data,
    })
    .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn offset_argument_matches_device_protocol() {
        let arg = offset_argument(17, "0000", 0.7);
        let parsed: Value = serde_json::from_str(&arg).unwrap();

        assert_eq!(
            parsed,
            json!({
                "command": 1,
                "data": { "pinNr": 17, "hwAddress": "0000", "offset": 0.7 }
            })
        );
    }

    #[test]
    fn restart_argument_has_empty_data() {
        let parsed: Value = serde_json::from_str(&restart_argument()).unwrap();
        assert_eq!(parsed, json!({ "command": 4, "data": {} }));
    }

    #[test]
    fn remove_argument_carries_configuration_id() {
        let parsed: Value = serde_json::from_str(&remove_argument(2)).unwrap();
        assert_eq!(parsed, json!({ "command": 3, "data": { "id": 2 } }));
    }
}
