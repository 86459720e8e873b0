//! # Provider Trait
//!
//! Core abstraction for model backends. Every provider implements
//! [`Provider`] to expose the three request shapes the engine uses:
//! one-shot generation, a streamed response (replay mode), and a persistent
//! session fed continuations (resume mode).
//!
//! The streaming methods return a boxed [`Stream`] of text fragments; the
//! runtime's parser consumes fragments incrementally and stops pulling at
//! protocol hardstops, so providers must tolerate their streams being
//! dropped mid-flight.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use sigil_core::messages::Message;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Boxed stream of raw text fragments produced by a model response.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Errors that can occur during provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authentication failed (expired token, invalid key, etc.).
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rate limited by the provider.
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds.
        retry_after_ms: u64,
        /// Error description.
        message: String,
    },

    /// Provider returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Provider-specific error code.
        code: Option<String>,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// The provider's transport cannot hold a persistent bidirectional
    /// session. Resume mode requires one; callers must fail fast on this
    /// rather than degrade to request/response.
    #[error("{provider} does not support persistent sessions")]
    SessionsUnsupported {
        /// Provider name.
        provider: String,
    },

    /// A persistent session dropped or a continuation send failed.
    #[error("Session closed: {message}")]
    SessionClosed {
        /// Error description.
        message: String,
    },

    /// Stream was cancelled.
    #[error("Stream cancelled")]
    Cancelled,

    /// Provider-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ProviderError {
    /// Whether this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::RateLimited { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::Json(_)
            | Self::Auth { .. }
            | Self::SessionsUnsupported { .. }
            | Self::SessionClosed { .. }
            | Self::Cancelled
            | Self::Other { .. } => false,
        }
    }

    /// Extract retry-after delay in milliseconds, if available.
    #[must_use]
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }

    /// Error category string for logging and event emission.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) => "parse",
            Self::Auth { .. } => "auth",
            Self::RateLimited { .. } => "rate_limit",
            Self::Api { .. } => "api",
            Self::SessionsUnsupported { .. } | Self::SessionClosed { .. } => "session",
            Self::Cancelled => "cancelled",
            Self::Other { .. } => "unknown",
        }
    }
}

/// Core model provider trait.
///
/// Implementors must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider identifier (e.g. `"anthropic"`, `"scripted"`).
    fn name(&self) -> &str;

    /// Current model ID.
    fn model(&self) -> &str;

    /// Whether [`connect`](Provider::connect) is backed by a real
    /// persistent bidirectional transport. Resume mode checks this before
    /// sending anything.
    fn supports_sessions(&self) -> bool {
        false
    }

    /// One-shot generation: the full response text in a single value.
    async fn generate(&self, messages: &[Message]) -> ProviderResult<String>;

    /// Stream a response as raw text fragments (replay mode).
    async fn stream(&self, messages: &[Message]) -> ProviderResult<FragmentStream>;

    /// Open a persistent session seeded with the given conversation
    /// (resume mode).
    ///
    /// The default implementation reports
    /// [`ProviderError::SessionsUnsupported`]; only transports that hold a
    /// bidirectional low-latency channel override it.
    async fn connect(&self, messages: &[Message]) -> ProviderResult<Box<dyn ModelSession>> {
        let _ = messages;
        Err(ProviderError::SessionsUnsupported {
            provider: self.name().to_owned(),
        })
    }
}

/// A persistent model session.
///
/// One session spans a whole task: the first [`send`](ModelSession::send)
/// carries the user query, later sends carry tool-result continuations.
/// Every send yields a fresh fragment stream for that response segment.
#[async_trait]
pub trait ModelSession: Send + std::fmt::Debug {
    /// Send text on the session and stream the model's continuation.
    async fn send(&mut self, text: &str) -> ProviderResult<FragmentStream>;

    /// Close the session. Default is a no-op for transports without an
    /// explicit teardown message.
    async fn close(&mut self) -> ProviderResult<()> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
