//! Tool dispatcher — schedules one turn's calls and normalizes outcomes.
//!
//! Scheduling is decided by a pure dependency-risk heuristic over the
//! call-name set: a turn that mixes a filesystem-mutating call with a
//! shell/process-execution call runs strictly in order, because the shell
//! command can only observe the write correctly after it lands. Every other
//! set — including any homogeneous batch of read-only tools — runs
//! concurrently.
//!
//! Failures stay local: an unknown tool name, invalid arguments, or a tool
//! raising mid-execution all become `ToolResult { error: true }` for that
//! one call. Sibling calls are unaffected, and nothing here returns `Err`.

use std::time::Instant;

use futures::future::join_all;
use sigil_core::messages::{Call, ToolResult};
use sigil_core::tools::ToolRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Tool names that mutate the filesystem.
const FILESYSTEM_WRITE_TOOLS: &[&str] = &[
    "write_file",
    "edit_file",
    "append_file",
    "delete_file",
    "move_file",
    "create_directory",
];

/// Tool names that execute shell commands or spawn processes.
const SHELL_TOOLS: &[&str] = &["shell", "bash", "exec", "run_command", "run_process"];

/// Whether a call set must execute sequentially.
///
/// True iff the set contains at least one filesystem-mutating name and at
/// least one shell-execution name — the combination where one call's
/// effect is only observable if the other has already completed. Pure and
/// independent of dispatch mechanics.
#[must_use]
pub fn needs_sequential<'a, I>(names: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let mut has_fs_write = false;
    let mut has_shell = false;
    for name in names {
        if FILESYSTEM_WRITE_TOOLS.contains(&name) {
            has_fs_write = true;
        }
        if SHELL_TOOLS.contains(&name) {
            has_shell = true;
        }
        if has_fs_write && has_shell {
            return true;
        }
    }
    false
}

/// Execute one call, normalizing every failure into an error result.
pub async fn invoke_call(
    registry: &ToolRegistry,
    call: &Call,
    cancel: &CancellationToken,
) -> ToolResult {
    if cancel.is_cancelled() {
        return ToolResult::error("cancelled", "operation cancelled before execution");
    }

    let Some(tool) = registry.get(&call.name) else {
        warn!(tool = %call.name, "tool not found");
        return ToolResult::error(
            format!("tool not found: {}", call.name),
            format!("no registered tool named {:?}", call.name),
        );
    };

    let start = Instant::now();
    debug!(tool = %call.name, call_id = %call.id, "tool execution started");

    let result = match tool.execute(call.args.clone()).await {
        Ok(result) => result,
        Err(e) => ToolResult::error(format!("{} failed", call.name), e.to_string()),
    };

    debug!(
        tool = %call.name,
        call_id = %call.id,
        duration_ms = start.elapsed().as_millis() as u64,
        error = result.error,
        "tool executed"
    );
    result
}

/// Dispatch one turn's calls.
///
/// Returns `(call id, result)` pairs in invocation order. On the
/// concurrent path results may *complete* in any order, but they are
/// re-associated with their originating call by identity before returning,
/// so downstream message order is deterministic.
pub async fn dispatch(
    registry: &ToolRegistry,
    calls: &[Call],
    cancel: &CancellationToken,
) -> Vec<(String, ToolResult)> {
    if calls.is_empty() {
        return Vec::new();
    }

    let sequential = needs_sequential(calls.iter().map(|c| c.name.as_str()));
    debug!(count = calls.len(), sequential, "dispatching calls");

    if sequential {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let result = invoke_call(registry, call, cancel).await;
            results.push((call.id.clone(), result));
        }
        results
    } else {
        join_all(calls.iter().map(|call| async move {
            (call.id.clone(), invoke_call(registry, call, cancel).await)
        }))
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use sigil_core::tools::{Tool, ToolError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn mixed_fs_write_and_shell_is_sequential() {
        assert!(needs_sequential(["write_file", "shell"]));
        assert!(needs_sequential(["bash", "read_file", "edit_file"]));
    }

    #[test]
    fn homogeneous_sets_are_parallel() {
        assert!(!needs_sequential(["read_file", "search", "list_files"]));
        assert!(!needs_sequential(["write_file", "edit_file"]));
        assert!(!needs_sequential(["shell", "bash"]));
        assert!(!needs_sequential([]));
    }

    #[test]
    fn single_calls_are_parallel() {
        assert!(!needs_sequential(["write_file"]));
        assert!(!needs_sequential(["shell"]));
    }

    struct StaticTool {
        name: &'static str,
        reply: &'static str,
        delay_ms: u64,
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(&self, _args: Map<String, Value>) -> Result<ToolResult, ToolError> {
            let _ = self.invocations.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            Ok(ToolResult::ok(self.name, self.reply))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn execute(&self, _args: Map<String, Value>) -> Result<ToolResult, ToolError> {
            Err(ToolError::Failed("disk on fire".into()))
        }
    }

    fn registry_with(tools: Vec<Arc<dyn Tool>>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    fn call(name: &str) -> Call {
        Call::new(name, Map::new())
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_result() {
        let registry = ToolRegistry::new();
        let result = invoke_call(&registry, &call("missing"), &CancellationToken::new()).await;
        assert!(result.error);
        assert!(result.outcome.contains("not found"));
    }

    #[tokio::test]
    async fn tool_failure_becomes_error_result() {
        let registry = registry_with(vec![Arc::new(FailingTool)]);
        let result = invoke_call(&registry, &call("flaky"), &CancellationToken::new()).await;
        assert!(result.error);
        assert_eq!(result.outcome, "flaky failed");
        assert!(result.content.contains("disk on fire"));
    }

    #[tokio::test]
    async fn one_failure_never_aborts_siblings() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let registry = registry_with(vec![
            Arc::new(FailingTool),
            Arc::new(StaticTool {
                name: "search",
                reply: "3 hits",
                delay_ms: 0,
                invocations: invocations.clone(),
            }),
        ]);

        let calls = vec![call("flaky"), call("search")];
        let results = dispatch(&registry, &calls, &CancellationToken::new()).await;

        assert_eq!(results.len(), 2);
        assert!(results[0].1.error);
        assert!(!results[1].1.error);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn parallel_results_keep_invocation_order() {
        let invocations = Arc::new(AtomicUsize::new(0));
        // The slow call is first: if completion order leaked through, the
        // fast call's result would come back first.
        let registry = registry_with(vec![
            Arc::new(StaticTool {
                name: "slow_read",
                reply: "slow",
                delay_ms: 40,
                invocations: invocations.clone(),
            }),
            Arc::new(StaticTool {
                name: "fast_read",
                reply: "fast",
                delay_ms: 0,
                invocations: invocations.clone(),
            }),
        ]);

        let calls = vec![call("slow_read"), call("fast_read")];
        let results = dispatch(&registry, &calls, &CancellationToken::new()).await;

        assert_eq!(results[0].0, calls[0].id);
        assert_eq!(results[0].1.content, "slow");
        assert_eq!(results[1].0, calls[1].id);
        assert_eq!(results[1].1.content, "fast");
    }

    #[tokio::test]
    async fn sequential_dispatch_preserves_order() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let registry = registry_with(vec![
            Arc::new(StaticTool {
                name: "write_file",
                reply: "written",
                delay_ms: 10,
                invocations: invocations.clone(),
            }),
            Arc::new(StaticTool {
                name: "shell",
                reply: "ran",
                delay_ms: 0,
                invocations: invocations.clone(),
            }),
        ]);

        let calls = vec![call("write_file"), call("shell")];
        let results = dispatch(&registry, &calls, &CancellationToken::new()).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].1.content, "written");
        assert_eq!(results[1].1.content, "ran");
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let registry = registry_with(vec![Arc::new(StaticTool {
            name: "search",
            reply: "hits",
            delay_ms: 0,
            invocations: invocations.clone(),
        })]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = invoke_call(&registry, &call("search"), &cancel).await;

        assert!(result.error);
        assert_eq!(result.outcome, "cancelled");
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_call_set_is_noop() {
        let registry = ToolRegistry::new();
        let results = dispatch(&registry, &[], &CancellationToken::new()).await;
        assert!(results.is_empty());
    }
}
