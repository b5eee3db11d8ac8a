use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Lookup error: {0}")]
    Lookup(String),
    #[error("Invalid gate state: {0}")]
    InvalidState(String),
}

impl From<anyhow::Error> for CacheError {
    fn from(error: anyhow::Error) -> Self {
        CacheError::Lookup(error.to_string())
    }
}
