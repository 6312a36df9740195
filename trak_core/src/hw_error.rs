//! Maps `Box<dyn Error>` from the bus seam to typed `ControlError`.
//!
//! The traits in `trak_traits` use `Box<dyn Error + Send + Sync>`; this module
//! decides whether such an error means the link is gone, with an optional
//! feature-gated path for `trak_hardware::HwError` downcasting.

use crate::error::ControlError;

/// True when the error means the physical link was lost and the connection
/// must be torn down. Timeouts and malformed responses do not qualify.
pub fn is_link_lost(e: &(dyn std::error::Error + 'static)) -> bool {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<trak_hardware::error::HwError>() {
            return hw.is_link_lost();
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        return !matches!(
            io.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
        );
    }
    false
}

/// Map a failed bus transaction to `ControlError::IoFailure`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ControlError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(trak_hardware::error::HwError::Timeout) =
            e.downcast_ref::<trak_hardware::error::HwError>()
        {
            return ControlError::IoFailure("device did not answer in time".into());
        }
    }
    ControlError::IoFailure(e.to_string())
}
