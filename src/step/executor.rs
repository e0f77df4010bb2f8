//! Tool execution with mixed serial/parallel scheduling.
//!
//! Calls are walked in their original order. Parallel-flagged tools launch
//! on worker tasks and may overlap each other; a non-parallel tool waits for
//! every outstanding worker and then runs exclusively. Result messages are
//! flushed strictly in call order regardless of completion order, and every
//! call receives exactly one result even under cancellation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::tools::{Tool, ToolResult};
use crate::types::{
    Delta, Message, Part, ToolCallPart, ToolExecDelta, ToolExecStage, ToolResultMessage,
};

use super::StepEmitter;

const INTERRUPTED_TEXT: &str = "Request interrupted by user for tool use";
const NOT_FOUND_TEXT: &str = "tool not found";

type Catalog = HashMap<String, Arc<dyn Tool>>;

struct ExecState<'a> {
    calls: &'a [ToolCallPart],
    emitter: &'a StepEmitter,
    results: Vec<Option<ToolResult>>,
    messages: Vec<Option<Message>>,
    next_to_emit: usize,
}

impl ExecState<'_> {
    fn record(&mut self, idx: usize, result: ToolResult) {
        if self.results[idx].is_some() {
            return;
        }
        self.results[idx] = Some(result);
        self.flush_in_order();
    }

    /// Emit result `i` only once results `0..i` have been emitted.
    fn flush_in_order(&mut self) {
        while self.next_to_emit < self.calls.len() {
            let idx = self.next_to_emit;
            let Some(result) = &self.results[idx] else {
                break;
            };
            if self.messages[idx].is_none() {
                let message = Message::Tool(ToolResultMessage {
                    call_id: result.call_id.clone(),
                    name: result.name.clone(),
                    is_error: result.is_error,
                    parts: result.parts.clone(),
                    timestamp: Utc::now(),
                    details: result.details.clone(),
                });
                self.emitter.message(&message);
                self.emitter.delta(&Delta::ToolExec(ToolExecDelta {
                    call_id: result.call_id.clone(),
                    name: result.name.clone(),
                    stage: ToolExecStage::End,
                }));
                self.messages[idx] = Some(message);
            }
            self.next_to_emit += 1;
        }
    }

    fn mark_interrupted_from(&mut self, start: usize) {
        for idx in start..self.calls.len() {
            if self.results[idx].is_none() {
                self.results[idx] = Some(interrupted_result(&self.calls[idx]));
            }
        }
        self.flush_in_order();
    }
}

pub(super) async fn execute_tools(
    cancel: &CancellationToken,
    calls: &[ToolCallPart],
    tools: &[Arc<dyn Tool>],
    emitter: &StepEmitter,
) -> Vec<Message> {
    if calls.is_empty() {
        return Vec::new();
    }

    let catalog: Arc<Catalog> = Arc::new(
        tools
            .iter()
            .map(|tool| (tool.spec().name, Arc::clone(tool)))
            .collect(),
    );

    // Cancelling the step cancels in-flight tools through this child token.
    let tool_cancel = cancel.child_token();

    let total = calls.len();
    // Sized to the call count so worker sends never block; completions for
    // an abandoned receiver are simply dropped and covered by the
    // interrupted-result sweep.
    let (tx, mut rx) = mpsc::channel::<(usize, ToolResult)>(total);

    let mut state = ExecState {
        calls,
        emitter,
        results: (0..total).map(|_| None).collect(),
        messages: vec![None; total],
        next_to_emit: 0,
    };
    let mut parallel_flags = vec![false; total];
    let mut running_parallel = 0usize;

    for (idx, call) in calls.iter().enumerate() {
        if cancel.is_cancelled() {
            state.mark_interrupted_from(idx);
            break;
        }

        let parallel = catalog
            .get(&call.name)
            .map(|tool| tool.spec().parallel)
            .unwrap_or(false);

        if !parallel {
            // Exclusivity: wait out every running parallel tool first.
            while running_parallel > 0 {
                if !recv_one(
                    cancel,
                    &tool_cancel,
                    &mut rx,
                    &mut state,
                    &parallel_flags,
                    &mut running_parallel,
                )
                .await
                {
                    break;
                }
            }
            if cancel.is_cancelled() {
                state.record(idx, interrupted_result(call));
                continue;
            }
            emitter.delta(&Delta::ToolExec(ToolExecDelta {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                stage: ToolExecStage::Start,
            }));
            let result = execute_single(&tool_cancel, call, &catalog).await;
            state.record(idx, result);
            continue;
        }

        parallel_flags[idx] = true;
        running_parallel += 1;
        // Emitted from the scheduling loop, not the worker, so no callback
        // can fire after the step returns.
        emitter.delta(&Delta::ToolExec(ToolExecDelta {
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            stage: ToolExecStage::Start,
        }));
        let tx = tx.clone();
        let call = call.clone();
        let catalog = Arc::clone(&catalog);
        let worker_cancel = tool_cancel.clone();
        tokio::spawn(async move {
            let result = execute_single(&worker_cancel, &call, &catalog).await;
            let _ = tx.try_send((idx, result));
        });
    }

    while running_parallel > 0 {
        if !recv_one(
            cancel,
            &tool_cancel,
            &mut rx,
            &mut state,
            &parallel_flags,
            &mut running_parallel,
        )
        .await
        {
            break;
        }
    }

    // Every call gets a result, whatever happened above.
    state.mark_interrupted_from(0);
    state.messages.into_iter().flatten().collect()
}

/// Wait for one worker completion or for cancellation. Returns false when
/// the caller should stop receiving.
async fn recv_one(
    cancel: &CancellationToken,
    tool_cancel: &CancellationToken,
    rx: &mut mpsc::Receiver<(usize, ToolResult)>,
    state: &mut ExecState<'_>,
    parallel_flags: &[bool],
    running_parallel: &mut usize,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => {
            tool_cancel.cancel();
            state.mark_interrupted_from(0);
            false
        }
        completion = rx.recv() => match completion {
            Some((idx, result)) => {
                state.record(idx, result);
                if parallel_flags[idx] {
                    *running_parallel -= 1;
                }
                true
            }
            None => false,
        },
    }
}

async fn execute_single(
    cancel: &CancellationToken,
    call: &ToolCallPart,
    catalog: &Catalog,
) -> ToolResult {
    if cancel.is_cancelled() {
        return interrupted_result(call);
    }
    let Some(tool) = catalog.get(&call.name) else {
        return not_found_result(call);
    };

    match tool.execute(cancel.child_token(), call).await {
        Ok(mut result) => {
            if result.call_id.is_empty() {
                result.call_id = call.call_id.clone();
            }
            if result.name.is_empty() {
                result.name = call.name.clone();
            }
            result
        }
        Err(err) if err.is_interruption() => interrupted_result(call),
        Err(err) => error_result(call, err.to_string()),
    }
}

fn interrupted_result(call: &ToolCallPart) -> ToolResult {
    error_result(call, INTERRUPTED_TEXT)
}

fn not_found_result(call: &ToolCallPart) -> ToolResult {
    error_result(call, NOT_FOUND_TEXT)
}

fn error_result(call: &ToolCallPart, text: impl Into<String>) -> ToolResult {
    ToolResult {
        call_id: call.call_id.clone(),
        name: call.name.clone(),
        is_error: true,
        parts: vec![Part::text(text)],
        details: Default::default(),
    }
}
