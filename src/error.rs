use thiserror::Error;

/// Errors that can occur in data collectors
///
/// Every variant is recoverable: the cycle runner logs it as a warning and moves
/// on to the next collector.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Data source unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Failed to parse output: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors that can occur when delivering alerts
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Invalid mail address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Server rejected message: {0}")]
    Rejected(String),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),
}

/// Fatal errors raised before the collection loop starts
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Required dependency '{dependency}' is unavailable: {reason}")]
    DependencyUnavailable { dependency: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StartupError {
    pub fn dependency(dependency: &str, reason: impl Into<String>) -> Self {
        StartupError::DependencyUnavailable {
            dependency: dependency.to_string(),
            reason: reason.into(),
        }
    }
}
