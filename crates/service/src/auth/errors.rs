use thiserror::Error;

/// Reasons an API key was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("api key header is empty")]
    MissingKey,
    #[error("invalid api key")]
    InvalidKey,
    #[error("key store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AuthError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            AuthError::MissingKey => 1001,
            AuthError::InvalidKey => 1004,
            AuthError::StoreUnavailable(_) => 1200,
        }
    }

    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AuthError::MissingKey => "missing_key",
            AuthError::InvalidKey => "invalid_key",
            AuthError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}
