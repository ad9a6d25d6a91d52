use thiserror::Error;

/// Failures inside the resolution pipeline.
///
/// None of these escape the component that hits them: each one is logged
/// and turned into a "not connected", "skip this endpoint" or "cache miss"
/// outcome by the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("server discovery failed: {0}")]
    Discovery(String),

    #[error("request to {endpoint} failed: {reason}")]
    Fetch { endpoint: String, reason: String },

    #[error("unrecognized payload from {endpoint}: {reason}")]
    Parse { endpoint: String, reason: String },

    #[error("history cache unavailable: {0}")]
    Cache(String),
}

impl Error {
    pub(crate) fn fetch(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Error::Fetch {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn parse(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Error::Parse {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::Cache(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Cache(format!("serialization: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
