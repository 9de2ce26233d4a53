use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// How the agent treats tool calls that need a permission.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Ask for every sensitive tool call.
    #[default]
    Default,
    /// Accept file edits without asking.
    AcceptEdits,
    /// Plan only, don't execute.
    Plan,
    /// Allow everything.
    BypassPermissions,
}

impl PermissionMode {
    /// Returns the name the agent CLI uses for this mode.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::Plan => "plan",
            PermissionMode::BypassPermissions => "bypassPermissions",
        }
    }
}

impl Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request from the agent asking whether a tool may run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolPermissionRequest {
    /// Name of the tool.
    pub tool_name: String,
    /// The input the tool would run with.
    pub input: Value,
    /// Permission updates the agent suggests, passed through untouched.
    pub suggestions: Vec<Value>,
    /// The path that triggered the request, if any.
    pub blocked_path: Option<String>,
}

/// The answer to a [`ToolPermissionRequest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermissionResult {
    /// Let the tool run, optionally with a rewritten input.
    Allow {
        /// Replaces the requested input when set.
        updated_input: Option<Value>,
    },
    /// Refuse the tool call.
    Deny {
        /// Shown to the model.
        message: String,
        /// Stops the whole turn instead of letting the model carry on.
        interrupt: bool,
    },
}

impl PermissionResult {
    /// Allows the call with its original input.
    #[inline]
    pub fn allow() -> Self {
        PermissionResult::Allow {
            updated_input: None,
        }
    }

    /// Denies the call with a message for the model.
    #[inline]
    pub fn deny<S: Into<String>>(message: S) -> Self {
        PermissionResult::Deny {
            message: message.into(),
            interrupt: false,
        }
    }

    /// Makes the control response payload for `request`.
    pub fn to_response(&self, request: &ToolPermissionRequest) -> Value {
        match self {
            PermissionResult::Allow { updated_input } => json!({
                "behavior": "allow",
                "updatedInput": updated_input
                    .as_ref()
                    .unwrap_or(&request.input),
            }),
            PermissionResult::Deny { message, interrupt } => json!({
                "behavior": "deny",
                "message": message,
                "interrupt": interrupt,
            }),
        }
    }
}
