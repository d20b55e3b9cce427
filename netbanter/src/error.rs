#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid configuration {0}")]
    ConfigError(#[from] figment::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Malformed event: {0}")]
    MalformedEvent(#[from] serde_json::Error),
    #[error("Custom error: {0}")]
    Custom(String),
}

/// Failure to hand an event to one recipient. Never escapes a broadcast.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbound queue is full")]
    QueueFull,
    #[error("connection is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, Error>;
