use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum SensorError {
    #[error("Input line {line} is already claimed")]
    LineBusy { line: u32 },

    #[error("Failed to configure input line {line}: {reason}")]
    LineConfig { line: u32, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SensorError>;
