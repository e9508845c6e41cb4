use client::error::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read or write a file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to deserialize the configuration file: {0}")]
    ConfigDeserialize(#[source] serde_json::Error),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[source] serde_json::Error),

    #[error("Invalid constraint '{0}', expected COLUMN=VALUE")]
    InvalidConstraint(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}
