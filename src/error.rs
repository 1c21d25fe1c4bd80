use thiserror::Error;

/// Why a provider produced no usable answer for one query
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Network failure, non-success HTTP status, missing credentials, timeout
    #[error("{provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    /// The upstream answered with a payload we could not read
    #[error("{provider} returned an unexpected payload: {reason}")]
    Schema { provider: String, reason: String },
}

impl ProviderError {
    pub fn unavailable(provider: &str, reason: impl ToString) -> Self {
        ProviderError::Unavailable {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn schema(provider: &str, reason: impl ToString) -> Self {
        ProviderError::Schema {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Map a reqwest failure: decoding problems are schema errors, the rest
    /// are availability errors.
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::schema(provider, err)
        } else {
            Self::unavailable(provider, err)
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Unavailable { .. } => "unavailable",
            ProviderError::Schema { .. } => "schema",
        }
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache row {external_id}: {reason}")]
    CorruptRow { external_id: String, reason: String },
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
