use serde_json::{Value, json};

use crate::message::{Message, ParseError};
use crate::permission::{PermissionMode, ToolPermissionRequest};

/// Anything the agent may write on its output.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// A session message meant for the user of the client.
    Message(Message),
    /// A control protocol frame, handled by the client itself.
    Control(ControlFrame),
}

/// A control protocol frame sent by the agent.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlFrame {
    /// The agent asks the client something and waits for the answer.
    Request {
        /// Echoed back in the answer.
        request_id: String,
        /// What the agent asks.
        request: IncomingControlRequest,
    },
    /// The agent answers a request sent by the client.
    Response(ControlResponse),
    /// The agent gives up on a request it sent earlier.
    CancelRequest {
        /// The abandoned request.
        request_id: String,
    },
}

/// A control request sent by the agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncomingControlRequest {
    /// Asks whether a tool call may proceed.
    CanUseTool(ToolPermissionRequest),
    /// A request the client can't handle, identified by its subtype.
    Unsupported(String),
}

/// The agent's answer to a client control request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlResponse {
    /// The request being answered.
    pub request_id: String,
    /// The payload on success, or the error message.
    pub outcome: Result<Value, String>,
}

/// A control request sent by the client.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OutgoingControlRequest {
    /// Starts the streaming session.
    Initialize,
    /// Stops the response being generated.
    Interrupt,
    /// Switches the permission mode for the rest of the session.
    SetPermissionMode(PermissionMode),
    /// Switches the model, `None` restores the default one.
    SetModel(Option<String>),
}

impl OutgoingControlRequest {
    /// Returns the subtype of this request.
    #[inline]
    pub fn subtype(&self) -> &'static str {
        match self {
            OutgoingControlRequest::Initialize => "initialize",
            OutgoingControlRequest::Interrupt => "interrupt",
            OutgoingControlRequest::SetPermissionMode(_) => {
                "set_permission_mode"
            }
            OutgoingControlRequest::SetModel(_) => "set_model",
        }
    }

    /// Makes the `request` object of the control request.
    pub fn to_value(&self) -> Value {
        match self {
            OutgoingControlRequest::Initialize => json!({
                "subtype": self.subtype(),
                "hooks": null,
            }),
            OutgoingControlRequest::Interrupt => json!({
                "subtype": self.subtype(),
            }),
            OutgoingControlRequest::SetPermissionMode(mode) => json!({
                "subtype": self.subtype(),
                "mode": mode,
            }),
            OutgoingControlRequest::SetModel(model) => json!({
                "subtype": self.subtype(),
                "model": model,
            }),
        }
    }
}

impl Frame {
    /// Classifies a JSON value read from the agent.
    pub fn from_value(value: Value) -> Result<Self, ParseError> {
        let ty = value.get("type").and_then(Value::as_str);
        match ty {
            Some("control_request") => parse_control_request(&value)
                .map(Frame::Control)
                .ok_or_else(|| invalid("control_request")),
            Some("control_response") => parse_control_response(&value)
                .map(Frame::Control)
                .ok_or_else(|| invalid("control_response")),
            Some("control_cancel_request") => {
                let request_id = value
                    .get("request_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                Ok(Frame::Control(ControlFrame::CancelRequest { request_id }))
            }
            _ => Message::from_value(value).map(Frame::Message),
        }
    }
}

fn invalid(message_type: &str) -> ParseError {
    ParseError::Invalid {
        message_type: message_type.to_owned(),
        reason: "malformed control frame".to_owned(),
    }
}

fn parse_control_request(value: &Value) -> Option<ControlFrame> {
    let request_id = value.get("request_id")?.as_str()?.to_owned();
    let request = value.get("request")?;
    let subtype = request.get("subtype")?.as_str()?;

    let request = if subtype == "can_use_tool" {
        IncomingControlRequest::CanUseTool(ToolPermissionRequest {
            tool_name: request.get("tool_name")?.as_str()?.to_owned(),
            input: request.get("input").cloned().unwrap_or_else(|| json!({})),
            suggestions: request
                .get("permission_suggestions")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            blocked_path: request
                .get("blocked_path")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
        })
    } else {
        IncomingControlRequest::Unsupported(subtype.to_owned())
    };

    Some(ControlFrame::Request {
        request_id,
        request,
    })
}

fn parse_control_response(value: &Value) -> Option<ControlFrame> {
    let response = value.get("response")?;
    let request_id = response.get("request_id")?.as_str()?.to_owned();
    let outcome = match response.get("subtype")?.as_str()? {
        "success" => Ok(response.get("response").cloned().unwrap_or_default()),
        _ => Err(response
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_owned()),
    };
    Some(ControlFrame::Response(ControlResponse {
        request_id,
        outcome,
    }))
}
