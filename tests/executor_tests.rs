//! Tool scheduling: exclusivity, ordering, and cancellation completeness.

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use common::{
    assistant_with_calls, collect_deltas, message_update, tool_result_messages, trace_log,
    trace_span, CancelStepTool, ScriptedProvider, TracingTool,
};
use stride::{step, Delta, StepOptions, StepRequest, Tool, ToolExecStage};

#[tokio::test]
async fn parallel_tools_overlap_and_serial_tool_waits() {
    let log = trace_log();
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(TracingTool::new("search_a", true, 80, log.clone())),
        Arc::new(TracingTool::new("search_b", true, 80, log.clone())),
        Arc::new(TracingTool::new("write", false, 10, log.clone())),
    ];
    let provider = ScriptedProvider::new(vec![message_update(assistant_with_calls(vec![
        ("c1", "search_a", "{}"),
        ("c2", "search_b", "{}"),
        ("c3", "write", "{}"),
    ]))]);
    let mut req = StepRequest::new(Arc::new(provider));
    req.tools = tools;

    let cancel = CancellationToken::new();
    let result = step(&cancel, req, StepOptions::new()).await.expect("step");

    // Result order matches call order regardless of completion order.
    let results = tool_result_messages(&result.messages);
    let ids: Vec<_> = results.iter().map(|r| r.call_id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);

    let (a_start, a_end) = trace_span(&log, "search_a");
    let (b_start, b_end) = trace_span(&log, "search_b");
    let (w_start, _) = trace_span(&log, "write");
    let (a_start, a_end) = (a_start.expect("a start"), a_end.expect("a end"));
    let (b_start, b_end) = (b_start.expect("b start"), b_end.expect("b end"));
    let w_start = w_start.expect("write start");

    // The two searches overlap: each starts before the other finishes.
    assert!(a_start < b_end && b_start < a_end);
    // The serial tool starts strictly after both searches have completed.
    assert!(w_start >= a_end);
    assert!(w_start >= b_end);
}

#[tokio::test]
async fn results_flush_in_call_order_despite_completion_order() {
    let log = trace_log();
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(TracingTool::new("slow", true, 80, log.clone())),
        Arc::new(TracingTool::new("fast", true, 5, log.clone())),
    ];
    let provider = ScriptedProvider::new(vec![message_update(assistant_with_calls(vec![
        ("c1", "slow", "{}"),
        ("c2", "fast", "{}"),
    ]))]);
    let mut req = StepRequest::new(Arc::new(provider));
    req.tools = tools;

    let emitted: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&emitted);
    let opts = StepOptions::new().on_message(move |message| {
        if let stride::Message::Tool(m) = message {
            sink.lock().expect("order lock").push(m.call_id.clone());
        }
    });

    let cancel = CancellationToken::new();
    let result = step(&cancel, req, opts).await.expect("step");

    assert_eq!(
        *emitted.lock().expect("order lock"),
        vec!["c1".to_string(), "c2".to_string()]
    );
    let results = tool_result_messages(&result.messages);
    assert_eq!(results[0].call_id, "c1");
    assert_eq!(results[1].call_id, "c2");

    // The fast tool genuinely finished first.
    let (_, slow_end) = trace_span(&log, "slow");
    let (_, fast_end) = trace_span(&log, "fast");
    assert!(fast_end.expect("fast end") < slow_end.expect("slow end"));
}

#[tokio::test]
async fn unknown_tool_yields_error_result_not_step_failure() {
    let provider = ScriptedProvider::new(vec![message_update(assistant_with_calls(vec![(
        "c1",
        "missing_tool",
        "{}",
    )]))]);
    let req = StepRequest::new(Arc::new(provider));

    let cancel = CancellationToken::new();
    let result = step(&cancel, req, StepOptions::new()).await.expect("step");

    let results = tool_result_messages(&result.messages);
    assert_eq!(results.len(), 1);
    assert!(results[0].is_error);
    assert_eq!(results[0].call_id, "c1");
    assert_eq!(results[0].name, "missing_tool");
    assert_eq!(
        results[0].parts.first().and_then(|p| p.as_text()),
        Some("tool not found")
    );
}

#[tokio::test]
async fn unknown_tools_are_scheduled_as_serial() {
    // An unknown tool must not slip into the parallel phase: it waits for
    // running parallel tools like any non-parallel call.
    let log = trace_log();
    let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(TracingTool::new("search", true, 50, log.clone()))];
    let provider = ScriptedProvider::new(vec![message_update(assistant_with_calls(vec![
        ("c1", "search", "{}"),
        ("c2", "ghost", "{}"),
    ]))]);
    let mut req = StepRequest::new(Arc::new(provider));
    req.tools = tools;

    let cancel = CancellationToken::new();
    let result = step(&cancel, req, StepOptions::new()).await.expect("step");
    let results = tool_result_messages(&result.messages);
    assert_eq!(results.len(), 2);
    assert!(!results[0].is_error);
    assert!(results[1].is_error);
}

#[tokio::test]
async fn cancellation_still_answers_every_call() {
    let log = trace_log();
    let cancel = CancellationToken::new();
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(CancelStepTool::new(cancel.clone())),
        Arc::new(TracingTool::new("search", true, 1_000, log.clone())),
        Arc::new(TracingTool::new("write", false, 1_000, log.clone())),
    ];
    let provider = ScriptedProvider::new(vec![message_update(assistant_with_calls(vec![
        ("c1", "pull_plug", "{}"),
        ("c2", "search", "{}"),
        ("c3", "write", "{}"),
    ]))]);
    let mut req = StepRequest::new(Arc::new(provider));
    req.tools = tools;

    let result = step(&cancel, req, StepOptions::new()).await.expect("step");
    assert!(result.cancelled);

    let results = tool_result_messages(&result.messages);
    assert_eq!(results.len(), 3, "every call gets exactly one result");
    assert_eq!(results[0].call_id, "c1");
    // The canceller itself completed before cancellation took effect.
    assert!(!results[0].is_error);
    for interrupted in &results[1..] {
        assert!(interrupted.is_error);
        assert_eq!(
            interrupted.parts.first().and_then(|p| p.as_text()),
            Some("Request interrupted by user for tool use")
        );
    }
}

#[tokio::test]
async fn exec_deltas_bracket_each_result() {
    let log = trace_log();
    let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(TracingTool::new("write", false, 5, log))];
    let provider = ScriptedProvider::new(vec![message_update(assistant_with_calls(vec![(
        "c1", "write", "{}",
    )]))]);
    let mut req = StepRequest::new(Arc::new(provider));
    req.tools = tools;

    let (deltas, opts) = collect_deltas();
    let cancel = CancellationToken::new();
    step(&cancel, req, opts).await.expect("step");

    let stages: Vec<ToolExecStage> = deltas
        .lock()
        .expect("delta lock")
        .iter()
        .filter_map(|delta| match delta {
            Delta::ToolExec(e) if e.call_id == "c1" => Some(e.stage),
            _ => None,
        })
        .collect();
    assert_eq!(stages, vec![ToolExecStage::Start, ToolExecStage::End]);
}
