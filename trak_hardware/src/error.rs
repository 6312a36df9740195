use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("serial port error: {0}")]
    Serial(String),
    #[error("response timeout")]
    Timeout,
    #[error("crc mismatch")]
    Crc,
    #[error("device exception {code:#04x} for function {function:#04x}")]
    Exception { function: u8, code: u8 },
    #[error("malformed frame: {0}")]
    Frame(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl HwError {
    /// True when the error means the physical link is gone (cable pulled, port
    /// removed). Timeouts and protocol-level faults leave the link usable.
    pub fn is_link_lost(&self) -> bool {
        match self {
            HwError::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            HwError::Serial(_) => true,
            HwError::Timeout
            | HwError::Crc
            | HwError::Exception { .. }
            | HwError::Frame(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, HwError>;
