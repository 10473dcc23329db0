/// Shared error type used across the controller's crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("script sandbox: {0}")]
    Sandbox(String),

    #[error("attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("attribute type not allowed: {0}")]
    AttributeTypeNotAllowed(String),

    #[error("the call to the function \"{0}\" timed out")]
    BridgeTimeout(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
