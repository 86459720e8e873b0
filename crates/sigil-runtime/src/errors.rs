//! Engine error types.
//!
//! Only limit, transport, and storage problems are errors here. Recoverable
//! outcomes — tool failures, malformed call payloads — are data
//! (`ToolResult { error: true }`) and never appear in this enum.

use sigil_llm::ProviderError;
use sigil_storage::StoreError;

/// Errors that terminate an engine run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Model provider error (request, streaming, auth, rate limit).
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Persistence failure. Propagated as-is, never swallowed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// The run needed more model round-trips than the configured limit.
    #[error("Iteration limit ({limit}) exceeded")]
    IterationLimit {
        /// The configured `max_iterations`.
        limit: u32,
    },

    /// Resume mode was requested on a transport without persistent-session
    /// support. Raised before any request is sent.
    #[error("Resume mode requires persistent-connection support, which provider {provider} lacks")]
    SessionTransportRequired {
        /// The offending provider's name.
        provider: String,
    },

    /// The persistent connection dropped or a continuation send failed.
    #[error("Transport error: {0}")]
    Transport(#[source] ProviderError),

    /// The run was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal / unexpected error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether the caller can retry the run as-is.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::Cancelled => true,
            Self::Store(_)
            | Self::IterationLimit { .. }
            | Self::SessionTransportRequired { .. }
            | Self::Transport(_)
            | Self::Internal(_) => false,
        }
    }

    /// Error category string for logging.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Provider(_) => "provider",
            Self::Store(_) => "storage",
            Self::IterationLimit { .. } => "iteration_limit",
            Self::SessionTransportRequired { .. } | Self::Transport(_) => "transport",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_limit_display() {
        let err = EngineError::IterationLimit { limit: 3 };
        assert_eq!(err.to_string(), "Iteration limit (3) exceeded");
        assert_eq!(err.category(), "iteration_limit");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn session_transport_display_names_requirement() {
        let err = EngineError::SessionTransportRequired {
            provider: "scripted".into(),
        };
        assert!(err.to_string().contains("persistent-connection support"));
        assert_eq!(err.category(), "transport");
    }

    #[test]
    fn transport_wraps_provider_error() {
        let err = EngineError::Transport(ProviderError::SessionClosed {
            message: "peer reset".into(),
        });
        assert_eq!(err.to_string(), "Transport error: Session closed: peer reset");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn store_errors_are_fatal() {
        let err = EngineError::Store(StoreError::Backend("disk full".into()));
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "storage");
    }

    #[test]
    fn retryable_provider_error_is_recoverable() {
        let err = EngineError::Provider(ProviderError::RateLimited {
            retry_after_ms: 100,
            message: "slow down".into(),
        });
        assert!(err.is_recoverable());
    }
}
