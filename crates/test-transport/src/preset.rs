//! Builders for the JSON values the agent CLI writes, so scripts read close
//! to what a real session prints.

use serde_json::{Value, json};

const TEST_MODEL: &str = "openrouter,test-model";

/// The `system`/`init` message that opens a session.
pub fn system_init(session_id: &str) -> Value {
    json!({
        "type": "system",
        "subtype": "init",
        "session_id": session_id,
        "model": TEST_MODEL,
        "tools": ["Bash", "Read"],
        "permissionMode": "default"
    })
}

/// An assistant message with a single text block.
pub fn assistant_text(text: &str) -> Value {
    assistant_blocks([text_block(text)])
}

/// An assistant message with the given content blocks.
pub fn assistant_blocks(blocks: impl IntoIterator<Item = Value>) -> Value {
    json!({
        "type": "assistant",
        "message": {
            "role": "assistant",
            "model": TEST_MODEL,
            "content": blocks.into_iter().collect::<Vec<_>>()
        },
        "parent_tool_use_id": null
    })
}

/// A text content block.
pub fn text_block(text: &str) -> Value {
    json!({"type": "text", "text": text})
}

/// A tool call content block.
pub fn tool_use_block(id: &str, name: &str, input: Value) -> Value {
    json!({"type": "tool_use", "id": id, "name": name, "input": input})
}

/// A user message carrying one tool result.
pub fn tool_result(tool_use_id: &str, content: &str) -> Value {
    json!({
        "type": "user",
        "message": {
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
                "is_error": false
            }]
        },
        "parent_tool_use_id": null
    })
}

/// A successful `result` message.
pub fn result_success(session_id: &str, total_cost_usd: Option<f64>) -> Value {
    json!({
        "type": "result",
        "subtype": "success",
        "duration_ms": 1520,
        "duration_api_ms": 1300,
        "is_error": false,
        "num_turns": 1,
        "session_id": session_id,
        "total_cost_usd": total_cost_usd,
        "result": ""
    })
}

/// A failed `result` message with the given error subtype.
pub fn result_error(session_id: &str, subtype: &str) -> Value {
    json!({
        "type": "result",
        "subtype": subtype,
        "duration_ms": 20,
        "duration_api_ms": 0,
        "is_error": true,
        "num_turns": 0,
        "session_id": session_id
    })
}

/// A `can_use_tool` control request from the agent.
pub fn can_use_tool(request_id: &str, tool_name: &str, input: Value) -> Value {
    json!({
        "type": "control_request",
        "request_id": request_id,
        "request": {
            "subtype": "can_use_tool",
            "tool_name": tool_name,
            "input": input,
            "permission_suggestions": [],
            "blocked_path": null
        }
    })
}
