use tracker_store::StoreError;

/// Typed operation outcomes. These are returned, never thrown past the
/// operation boundary; the server maps each variant to a status code.
/// Advisor degradation is deliberately absent; it is absorbed at the
/// gateway and an operation still succeeds.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Short classification string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidState(_) => "invalid_state",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(m) => Self::NotFound(m),
            StoreError::Conflict(m) => Self::InvalidState(m),
            other => Self::Internal(other.to_string()),
        }
    }
}
