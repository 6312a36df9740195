use thiserror::Error;

/// Failure of a controller operation. Every variant leaves the cached coil
/// state unchanged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("device not connected")]
    NotConnected,
    #[error("link unavailable: {0}")]
    LinkUnavailable(String),
    #[error("i/o failure: {0}")]
    IoFailure(String),
    #[error("{field} = {value} does not fit a signed 16-bit register")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("homing in progress")]
    HomingInProgress,
    #[error("safety interlock active (emergency stop or power loss)")]
    SafetyLocked,
}

impl ControlError {
    /// Stable machine-readable name, used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlError::NotConnected => "not_connected",
            ControlError::LinkUnavailable(_) => "link_unavailable",
            ControlError::IoFailure(_) => "io_failure",
            ControlError::OutOfRange { .. } => "out_of_range",
            ControlError::HomingInProgress => "homing_in_progress",
            ControlError::SafetyLocked => "safety_locked",
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing connector")]
    MissingConnector,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("failed to spawn controller worker: {0}")]
    Spawn(String),
}

pub type Result<T, E = ControlError> = std::result::Result<T, E>;
