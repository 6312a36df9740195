//! Human-readable error descriptions and structured JSON error formatting.

use trak_core::{BuildError, ControlError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingConnector => {
                "What happened: The controller was built without a port connector.\nLikely causes: The serial backend failed to initialize.\nHow to fix: Rebuild with the `hardware` feature or check the simulator setup.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid controller configuration ({msg}).\nLikely causes: Zero intervals or a non-positive travel in the TOML.\nHow to fix: Edit [polling] and [pulse] in the config file, then rerun."
            ),
            BuildError::Spawn(msg) => format!(
                "What happened: The controller worker could not start ({msg}).\nLikely causes: The system is out of threads or memory.\nHow to fix: Close other programs and retry."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<ControlError>() {
        return match ce {
            ControlError::NotConnected => {
                "What happened: The device is not connected.\nLikely causes: The link dropped before the command was sent.\nHow to fix: Check the cable and run `trak check`.".to_string()
            }
            ControlError::LinkUnavailable(msg) => format!(
                "What happened: Could not open the serial link ({msg}).\nLikely causes: Wrong port name, cable unplugged, or the port is held by another program.\nHow to fix: Verify [link].port (or pass --port) and close other serial tools."
            ),
            ControlError::IoFailure(msg) => format!(
                "What happened: The device did not complete the request ({msg}).\nLikely causes: Wrong slave id, baud or parity, or electrical noise on the line.\nHow to fix: Compare [link] settings with the controller panel and retry."
            ),
            ControlError::OutOfRange { field, value } => format!(
                "What happened: {field} = {value} cannot be sent to the device.\nLikely causes: The value does not fit a signed 16-bit register after scaling.\nHow to fix: Use a smaller value (temperature is sent in tenths of a degree)."
            ),
            ControlError::HomingInProgress => {
                "What happened: Motion was refused because homing is running.\nLikely causes: A HOME command has not reached the home sensor yet.\nHow to fix: Wait for homing to finish (`trak home --wait`), then retry.".to_string()
            }
            ControlError::SafetyLocked => {
                "What happened: Commands are locked by the safety interlock.\nLikely causes: Emergency stop pressed or power loss detected.\nHow to fix: Release the emergency stop and restore power, then retry.".to_string()
            }
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("csv must have headers") {
        return format!(
            "Invalid headers in profile CSV. Expected '{}'.",
            trak_config::profiles::HEADERS.join(",")
        );
    }

    if lower.contains("must be") || lower.contains("must not") || lower.contains("parse config") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: A missing or out-of-range value in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Error: {msg}"
    )
}

/// Stable exit codes per controller error; everything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<ControlError>() {
        Some(ControlError::NotConnected) => 3,
        Some(ControlError::LinkUnavailable(_)) => 4,
        Some(ControlError::IoFailure(_)) => 5,
        Some(ControlError::OutOfRange { .. }) => 6,
        Some(ControlError::HomingInProgress) => 7,
        Some(ControlError::SafetyLocked) => 8,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(ce) = err.downcast_ref::<ControlError>() {
        let obj = match ce {
            ControlError::OutOfRange { field, value } => json!({
                "reason": ce.kind(),
                "details": { "field": field, "value": value },
                "message": humanize(err),
            }),
            _ => json!({ "reason": ce.kind(), "message": humanize(err) }),
        };
        return obj.to_string();
    }

    json!({ "reason": "error", "message": humanize(err) }).to_string()
}
