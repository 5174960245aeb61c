use thiserror::Error;

pub type Result<T> = std::result::Result<T, OverpassError>;

#[derive(Debug, Error)]
pub enum OverpassError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl From<reqwest::Error> for OverpassError {
    fn from(err: reqwest::Error) -> Self {
        OverpassError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for OverpassError {
    fn from(err: serde_json::Error) -> Self {
        OverpassError::Parse(err.to_string())
    }
}
