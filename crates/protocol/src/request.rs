use serde_json::{Value, json};

use crate::control::OutgoingControlRequest;

/// The session id used when the caller doesn't pick one.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Makes the line that sends a user prompt.
pub fn user_message_line(prompt: &str, session_id: &str) -> String {
    json!({
        "type": "user",
        "message": {"role": "user", "content": prompt},
        "parent_tool_use_id": null,
        "session_id": session_id,
    })
    .to_string()
}

/// Makes the line that sends a control request.
pub fn control_request_line(
    request_id: &str,
    request: &OutgoingControlRequest,
) -> String {
    json!({
        "type": "control_request",
        "request_id": request_id,
        "request": request.to_value(),
    })
    .to_string()
}

/// Makes the line that answers an agent control request successfully.
pub fn control_success_line(request_id: &str, response: Value) -> String {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "success",
            "request_id": request_id,
            "response": response,
        },
    })
    .to_string()
}

/// Makes the line that answers an agent control request with an error.
pub fn control_error_line(request_id: &str, error: &str) -> String {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "error",
            "request_id": request_id,
            "error": error,
        },
    })
    .to_string()
}
