//! Request-body construction for chat-completion endpoints.

use serde_json::{json, Value};

use crate::provider::ProviderRequest;
use crate::tools::ToolSpec;
use crate::types::{AssistantMessage, Message, Part, ToolResultMessage, UserMessage};

use super::reasoning::ReasoningHandler;

/// Stand-in content for tool results with no text output; providers reject
/// empty tool messages.
const EMPTY_TOOL_RESULT: &str = "<system-reminder>Tool ran without output or errors</system-reminder>";

/// Build the JSON body for a streaming chat-completion request.
pub(crate) fn build_request_body(
    req: &ProviderRequest,
    handler: &dyn ReasoningHandler,
    target_model: &str,
    use_cache_control: bool,
) -> Value {
    let mut messages: Vec<Value> = Vec::new();

    if !req.system_prompt.is_empty() {
        if use_cache_control {
            messages.push(json!({
                "role": "system",
                "content": [{
                    "type": "text",
                    "text": req.system_prompt,
                    "cache_control": {"type": "ephemeral"},
                }],
            }));
        } else {
            messages.push(json!({"role": "system", "content": req.system_prompt}));
        }
    }

    for msg in &req.history {
        match msg {
            Message::User(m) => messages.push(convert_user_message(m)),
            Message::Assistant(m) => {
                messages.push(convert_assistant_message(m, handler, target_model))
            }
            Message::Tool(m) => messages.push(convert_tool_message(m)),
        }
    }

    if use_cache_control {
        add_cache_control_to_last_message(&mut messages);
    }

    let mut body = json!({
        "messages": messages,
        "stream": true,
        "stream_options": {"include_usage": true},
    });
    let obj = body.as_object_mut().expect("body is an object");

    if !req.tools.is_empty() {
        let tool_defs: Vec<Value> = req.tools.iter().map(convert_tool_spec).collect();
        obj.insert("tools".into(), tool_defs.into());
        obj.insert("tool_choice".into(), json!("auto"));
        obj.insert("parallel_tool_calls".into(), json!(true));
    }

    body
}

fn convert_user_message(msg: &UserMessage) -> Value {
    let mut parts: Vec<Value> = msg
        .parts
        .iter()
        .filter_map(|part| match part {
            Part::Text(p) => Some(json!({"type": "text", "text": p.text})),
            Part::Image(p) => Some(json!({
                "type": "image_url",
                "image_url": {"url": format!("data:{};base64,{}", p.mime_type, p.data_b64)},
            })),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        parts.push(json!({"type": "text", "text": ""}));
    }

    json!({"role": "user", "content": parts})
}

fn convert_assistant_message(
    msg: &AssistantMessage,
    handler: &dyn ReasoningHandler,
    target_model: &str,
) -> Value {
    let mut text_content = String::new();
    let mut thinking_parts = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    for part in &msg.parts {
        match part {
            Part::Text(p) => text_content.push_str(&p.text),
            Part::Thinking(p) => thinking_parts.push(p.clone()),
            Part::ToolCall(p) => tool_calls.push(json!({
                "id": p.call_id,
                "type": "function",
                "function": {"name": p.name, "arguments": p.args_json},
            })),
            Part::Image(_) => {}
        }
    }

    let mut message = serde_json::Map::new();
    message.insert("role".into(), json!("assistant"));

    let mut degraded_thinking = String::new();
    if !thinking_parts.is_empty() {
        let encoded = handler.encode_for_request(&thinking_parts, target_model);
        degraded_thinking = encoded.degraded_text;
        if let Some((key, value)) = encoded.extra {
            message.insert(key, value);
        }
    }

    let full_content = format!("{degraded_thinking}{text_content}");
    if !full_content.is_empty() {
        message.insert("content".into(), json!(full_content));
    }

    if !tool_calls.is_empty() {
        message.insert("tool_calls".into(), tool_calls.into());
    }

    Value::Object(message)
}

fn convert_tool_message(msg: &ToolResultMessage) -> Value {
    let mut content = String::new();
    for part in &msg.parts {
        if let Part::Text(p) = part {
            content.push_str(&p.text);
        }
    }
    if content.is_empty() {
        content.push_str(EMPTY_TOOL_RESULT);
    }
    json!({"role": "tool", "tool_call_id": msg.call_id, "content": content})
}

fn convert_tool_spec(spec: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.parameters,
        },
    })
}

/// Mark the last user or tool message as a prompt-cache boundary. Only user
/// messages carry content arrays in our encoding, so only they receive the
/// marker; a trailing tool message ends the scan unmarked.
fn add_cache_control_to_last_message(messages: &mut [Value]) {
    for msg in messages.iter_mut().rev() {
        let role = msg.get("role").and_then(Value::as_str).unwrap_or_default();
        match role {
            "user" => {
                if let Some(parts) = msg.get_mut("content").and_then(Value::as_array_mut) {
                    for part in parts.iter_mut().rev() {
                        if part.get("type").and_then(Value::as_str) == Some("text") {
                            if let Some(obj) = part.as_object_mut() {
                                obj.insert(
                                    "cache_control".into(),
                                    json!({"type": "ephemeral"}),
                                );
                            }
                            return;
                        }
                    }
                }
                return;
            }
            "tool" => return,
            _ => {}
        }
    }
}
