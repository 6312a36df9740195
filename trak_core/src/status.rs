use serde::{Serialize, Serializer};

use crate::error::{ControlError, Result};

/// Result of a dispatcher command as reported to the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    pub success: bool,
    /// Coil state after the command (unchanged on failure).
    pub new_state: bool,
    pub message: String,
    #[serde(serialize_with = "error_kind", skip_serializing_if = "Option::is_none")]
    pub error: Option<ControlError>,
}

fn error_kind<S: Serializer>(e: &Option<ControlError>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match e {
        Some(e) => s.serialize_str(e.kind()),
        None => s.serialize_none(),
    }
}

impl CommandOutcome {
    /// Build an outcome for a toggle; `current` is the coil state after the
    /// attempt, used as `new_state` when it failed.
    pub fn toggle(command: &str, res: Result<bool>, current: bool) -> Self {
        match res {
            Ok(on) => Self {
                success: true,
                new_state: on,
                message: format!("{command} turned {}", if on { "on" } else { "off" }),
                error: None,
            },
            Err(e) => Self::failed(command, e, current),
        }
    }

    /// Build an outcome for a pulse or mode command.
    pub fn executed(command: &str, res: Result<bool>) -> Self {
        match res {
            Ok(state) => Self {
                success: true,
                new_state: state,
                message: format!("{command} executed"),
                error: None,
            },
            Err(e) => Self::failed(command, e, false),
        }
    }

    fn failed(command: &str, e: ControlError, current: bool) -> Self {
        Self {
            success: false,
            new_state: current,
            message: format!("{command} failed: {e}"),
            error: Some(e),
        }
    }

    /// Convert back into a `Result`, for callers that prefer `?`.
    pub fn into_result(self) -> Result<bool> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.new_state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_keeps_current_state() {
        let o = CommandOutcome::toggle("CLAMP", Err(ControlError::NotConnected), true);
        assert!(!o.success);
        assert!(o.new_state);
        assert_eq!(o.message, "CLAMP failed: device not connected");
        assert_eq!(o.into_result(), Err(ControlError::NotConnected));
    }

    #[test]
    fn success_message_names_the_state() {
        let o = CommandOutcome::toggle("HEATER", Ok(true), true);
        assert!(o.success);
        assert_eq!(o.message, "HEATER turned on");
    }
}
