//! Engine entry point — the turn loop as one lazy event stream.
//!
//! [`Engine::run`] drives the whole task: persist the query, issue one
//! model round-trip per turn through the mode's executor, fold parser
//! events through the accumulator, dispatch accumulated calls, feed results
//! back as the next turn's input, and stop at an `§END` boundary or the
//! iteration limit. Every accumulated event is persisted as it is yielded;
//! a storage failure surfaces to the caller immediately.
//!
//! The returned stream is lazy: nothing runs until polled, and dropping it
//! cancels the run at the next suspension point.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use sigil_core::events::{Event, EventPayload};
use sigil_core::messages::{Role, ToolResult, collect_calls, render_assistant_transcript};
use sigil_core::protocol::EventKind;
use sigil_core::tools::ToolRegistry;
use sigil_llm::Provider;
use sigil_storage::{Store, StoreError};
use tracing::{debug, info};
use uuid::Uuid;

use crate::accumulator::Accumulator;
use crate::dispatcher::dispatch;
use crate::errors::EngineError;
use crate::executor::{ReplayExecutor, ResumeExecutor, TurnExecutor, TurnInput};
use crate::turn::IterationState;
use crate::types::{EventStream, Mode, RunRequest};

/// The agent execution engine.
///
/// Holds the collaborators shared by every run: the model provider, the
/// tool registry, and the persistence store. Each [`run`](Engine::run)
/// produces an independent event stream; concurrent runs over different
/// conversation ids need no coordination.
pub struct Engine {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn Store>,
}

impl Engine {
    /// Create an engine over the given collaborators.
    #[must_use]
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            provider,
            tools,
            store,
        }
    }

    /// Execute one task, returning its lazy event stream.
    ///
    /// Consumption may stop early at any point. Recoverable failures (bad
    /// tool arguments, tool exceptions, malformed call JSON) surface to the
    /// *model* as result events; only limit, transport, and storage
    /// failures surface here as `Err` items, which terminate the stream.
    pub fn run(&self, request: RunRequest) -> EventStream {
        let provider = Arc::clone(&self.provider);
        let registry = Arc::clone(&self.tools);
        let store = Arc::clone(&self.store);

        Box::pin(async_stream::stream! {
            let RunRequest {
                query,
                user_id,
                conversation_id,
                mode,
                max_iterations,
                cancel,
            } = request;

            info!(%conversation_id, %mode, max_iterations, "run started");

            if max_iterations == 0 {
                yield Err(EngineError::IterationLimit { limit: 0 });
                return;
            }

            if let Err(e) = store.open_conversation(&conversation_id, &user_id).await {
                yield Err(e.into());
                return;
            }

            // Resume seeds its session with the history as it stood before
            // this query; the query itself goes over the session.
            let seed = if mode == Mode::Resume {
                match store.load_messages(&conversation_id, None).await {
                    Ok(messages) => messages,
                    Err(e) => {
                        yield Err(e.into());
                        return;
                    }
                }
            } else {
                Vec::new()
            };

            if let Err(e) = store
                .save_message(&conversation_id, Role::User, &query, Utc::now())
                .await
            {
                yield Err(e.into());
                return;
            }

            let mut executor: Box<dyn TurnExecutor> = match mode {
                Mode::Replay => Box::new(ReplayExecutor::new(
                    Arc::clone(&provider),
                    Arc::clone(&store),
                    conversation_id.clone(),
                    cancel.clone(),
                )),
                Mode::Resume => {
                    match ResumeExecutor::new(Arc::clone(&provider), seed, cancel.clone()) {
                        Ok(executor) => Box::new(executor),
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            };

            let mut iterations = IterationState::new(mode, max_iterations);
            let mut input = TurnInput::Query(query);

            loop {
                let mut turn_stream = match executor.advance(input).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                let mut acc = Accumulator::new(false);
                let mut turn_events: Vec<Event> = Vec::new();
                let mut ended = false;
                let mut stream_done = false;

                while !stream_done {
                    let completed = match turn_stream.next().await {
                        Some(Ok(raw)) => acc.push(raw),
                        Some(Err(e)) => {
                            yield Err(e);
                            return;
                        }
                        None => {
                            stream_done = true;
                            acc.finish()
                        }
                    };
                    for ev in completed {
                        if let Err(e) =
                            persist_event(store.as_ref(), &conversation_id, &ev).await
                        {
                            yield Err(e);
                            return;
                        }
                        ended |= ev.kind == EventKind::End;
                        turn_events.push(ev.clone());
                        yield Ok(ev);
                    }
                }

                let calls = collect_calls(&turn_events);
                let parse_failures: Vec<String> = turn_events
                    .iter()
                    .filter_map(|ev| match &ev.payload {
                        Some(EventPayload::CallParseFailure { error, .. }) => Some(error.clone()),
                        _ => None,
                    })
                    .collect();

                // Terminal: the model declared the task done, or produced
                // nothing to execute.
                if ended || (calls.is_empty() && parse_failures.is_empty()) {
                    let transcript = render_assistant_transcript(&turn_events, false);
                    if !transcript.is_empty() {
                        if let Err(e) = store
                            .save_message(&conversation_id, Role::Assistant, &transcript, Utc::now())
                            .await
                        {
                            yield Err(e.into());
                            return;
                        }
                    }
                    info!(
                        %conversation_id,
                        turns = iterations.turn_count(),
                        ended,
                        "run complete"
                    );
                    return;
                }

                // The turn invoked tools: the assistant message gains a
                // trailing execute marker before the results are appended.
                let transcript = render_assistant_transcript(&turn_events, true);
                if let Err(e) = store
                    .save_message(&conversation_id, Role::Assistant, &transcript, Utc::now())
                    .await
                {
                    yield Err(e.into());
                    return;
                }

                debug!(
                    %conversation_id,
                    calls = calls.len(),
                    parse_failures = parse_failures.len(),
                    "executing turn's calls"
                );

                let mut results = dispatch(&registry, &calls, &cancel).await;
                for error in parse_failures {
                    results.push((
                        Uuid::now_v7().to_string(),
                        ToolResult::error("call parse failure", error),
                    ));
                }

                for (call_id, result) in &results {
                    for ev in acc.push_result(call_id, result.clone()) {
                        if let Err(e) =
                            persist_event(store.as_ref(), &conversation_id, &ev).await
                        {
                            yield Err(e);
                            return;
                        }
                        yield Ok(ev);
                    }
                    let content = match serde_json::to_string(result) {
                        Ok(content) => content,
                        Err(e) => {
                            yield Err(EngineError::Store(StoreError::Serialization(e)));
                            return;
                        }
                    };
                    if let Err(e) = store
                        .save_message(&conversation_id, Role::Tool, &content, Utc::now())
                        .await
                    {
                        yield Err(e.into());
                        return;
                    }
                }

                // Completed tool-result-to-next-request transition: this is
                // the only place the turn counter moves.
                if let Err(e) = iterations.begin_round_trip() {
                    yield Err(e);
                    return;
                }
                match continuation_text(&results) {
                    Ok(text) => input = TurnInput::ToolResults(text),
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        })
    }
}

/// Persist one accumulated event. Result payloads are stored in their wire
/// form rather than as bare content.
async fn persist_event(
    store: &dyn Store,
    conversation_id: &str,
    ev: &Event,
) -> Result<(), EngineError> {
    let content = match &ev.payload {
        Some(EventPayload::Result { result, .. }) => serde_json::to_string(result)
            .map_err(|e| EngineError::Store(StoreError::Serialization(e)))?,
        _ => ev.content.clone(),
    };
    store
        .save_event(conversation_id, ev.kind, &content, Utc::now())
        .await
        .map_err(EngineError::Store)
}

/// Serialize one turn's results into the continuation text fed back to the
/// model: a JSON array of `{outcome, content, error}` objects in
/// invocation order.
fn continuation_text(results: &[(String, ToolResult)]) -> Result<String, EngineError> {
    let wire: Vec<&ToolResult> = results.iter().map(|(_, result)| result).collect();
    serde_json::to_string(&wire).map_err(|e| EngineError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuation_text_is_a_json_array() {
        let results = vec![
            ("c-1".to_owned(), ToolResult::ok("searched", "3 hits")),
            ("c-2".to_owned(), ToolResult::error("failed", "no such tool")),
        ];
        let text = continuation_text(&results).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["outcome"], "searched");
        assert_eq!(parsed[1]["error"], true);
    }

    #[test]
    fn continuation_text_empty_results() {
        assert_eq!(continuation_text(&[]).unwrap(), "[]");
    }
}
