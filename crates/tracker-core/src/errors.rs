use std::time::Duration;

/// Errors from the advisory provider. These never cross an operation
/// boundary: the gateway absorbs them and substitutes the per-operation
/// fallback, so this type only feeds logs and degradation counters.
#[derive(Clone, Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("network error: {0}")]
    Network(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no structured payload in response")]
    Unparsable,

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl AdvisorError {
    /// Short classification string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Status { .. } => "status",
            Self::Unparsable => "unparsable",
            Self::Timeout(_) => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings() {
        assert_eq!(AdvisorError::Network("refused".into()).kind(), "network");
        assert_eq!(
            AdvisorError::Status { status: 500, body: "err".into() }.kind(),
            "status"
        );
        assert_eq!(AdvisorError::Unparsable.kind(), "unparsable");
        assert_eq!(AdvisorError::Timeout(Duration::from_secs(20)).kind(), "timeout");
    }

    #[test]
    fn display_includes_status() {
        let e = AdvisorError::Status { status: 429, body: "slow down".into() };
        assert!(e.to_string().contains("429"));
    }
}
