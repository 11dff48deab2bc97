use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApplyError>;

/// Failure reported by a resource provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Throttling, timeouts and similar; the call may be retried
    #[error("Transient provider error: {0}")]
    Transient(String),

    #[error("Permanent provider error: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Failed to apply {resource}: {source}")]
    Provider {
        resource: String,
        #[source]
        source: ProviderError,
    },

    #[error("Gave up on {resource} after {attempts} attempts: {source}")]
    RetriesExhausted {
        resource: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
