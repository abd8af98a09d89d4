use std::{io, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Device fault {code}: {reason}")]
    Fault { code: String, reason: String },

    #[error("Device does not provide the {0} service")]
    MissingCapability(&'static str),

    #[error("{axis} target {value} is outside [{min}, {max}]")]
    OutOfRange {
        axis: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("Device session is not connected")]
    NotConnected,
}

impl DeviceError {
    pub fn fault(code: impl Into<String>, reason: impl Into<String>) -> Self {
        DeviceError::Fault {
            code: code.into(),
            reason: reason.into(),
        }
    }

    /// Transport-level failures that may succeed when the request is sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeviceError::Timeout(_) | DeviceError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
