/// Shared error type used across all tagbridge crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid endpoint address '{address}': {reason}")]
    InvalidEndpoint { address: String, reason: String },

    #[error("config: {0}")]
    Config(String),

    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
