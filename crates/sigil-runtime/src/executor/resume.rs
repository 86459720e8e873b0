//! Resume executor — one persistent session for the whole task.

use std::sync::Arc;

use async_trait::async_trait;
use sigil_core::messages::Message;
use sigil_llm::{ModelSession, Provider};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::EngineError;
use crate::executor::{ParsedEventStream, TurnExecutor, TurnInput};
use crate::parser::parse_fragments;

/// Stateful executor: opens one [`ModelSession`] on the first turn, seeded
/// with the conversation as it stood before the query, then sends tool
/// results as continuations on the same connection instead of reconnecting.
pub struct ResumeExecutor {
    provider: Arc<dyn Provider>,
    seed: Vec<Message>,
    session: Option<Box<dyn ModelSession>>,
    cancel: CancellationToken,
}

impl ResumeExecutor {
    /// Create a resume executor.
    ///
    /// Fails fast with [`EngineError::SessionTransportRequired`] when the
    /// provider's transport cannot hold a persistent bidirectional session
    /// — before any request is sent, rather than degrading silently.
    pub fn new(
        provider: Arc<dyn Provider>,
        seed: Vec<Message>,
        cancel: CancellationToken,
    ) -> Result<Self, EngineError> {
        if !provider.supports_sessions() {
            return Err(EngineError::SessionTransportRequired {
                provider: provider.name().to_owned(),
            });
        }
        Ok(Self {
            provider,
            seed,
            session: None,
            cancel,
        })
    }
}

#[async_trait]
impl TurnExecutor for ResumeExecutor {
    async fn advance(&mut self, input: TurnInput) -> Result<ParsedEventStream, EngineError> {
        let continuation = matches!(input, TurnInput::ToolResults(_));

        if self.session.is_none() {
            debug!(provider = self.provider.name(), "opening model session");
            let session = self.provider.connect(&self.seed).await?;
            self.session = Some(session);
        }
        let Some(session) = self.session.as_mut() else {
            return Err(EngineError::Internal("session not open".into()));
        };

        debug!(input = input.describe(), "resume turn: sending on session");
        let fragments = session.send(input.text()).await.map_err(|e| {
            if continuation {
                // A failed continuation terminates the stream as a
                // transport error, not a provider request error.
                EngineError::Transport(e)
            } else {
                EngineError::Provider(e)
            }
        })?;

        Ok(Box::pin(parse_fragments(fragments, self.cancel.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_llm::{FragmentStream, ProviderError, ProviderResult};

    struct PlainProvider;

    #[async_trait]
    impl Provider for PlainProvider {
        fn name(&self) -> &str {
            "plain"
        }

        fn model(&self) -> &str {
            "test"
        }

        async fn generate(&self, _messages: &[Message]) -> ProviderResult<String> {
            Ok(String::new())
        }

        async fn stream(&self, _messages: &[Message]) -> ProviderResult<FragmentStream> {
            Err(ProviderError::Other {
                message: "unused".into(),
            })
        }
    }

    #[test]
    fn plain_transport_fails_before_any_request() {
        let err = ResumeExecutor::new(
            Arc::new(PlainProvider),
            Vec::new(),
            CancellationToken::new(),
        )
        .err()
        .expect("must fail fast");
        assert!(matches!(
            err,
            EngineError::SessionTransportRequired { ref provider } if provider == "plain"
        ));
    }
}
