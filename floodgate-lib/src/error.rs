use thiserror::Error;

/// Errors that can occur in the admission pipeline
#[derive(Error, Debug)]
pub enum GateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Client key extraction failed: {0}")]
    KeyExtraction(String),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

pub type Result<T> = std::result::Result<T, GateError>;
