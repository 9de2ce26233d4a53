use std::fmt::{self, Debug};
use std::path::PathBuf;
use std::sync::Arc;

use ccr_agent_protocol::{
    PermissionMode, PermissionResult, ToolPermissionRequest,
};

/// A callback deciding whether a tool call may proceed.
pub type PermissionHandler =
    Arc<dyn Fn(&ToolPermissionRequest) -> PermissionResult + Send + Sync>;

/// Builder for [`AgentOptions`].
#[derive(Clone, Default)]
pub struct AgentOptionsBuilder {
    options: AgentOptions,
}

impl AgentOptionsBuilder {
    /// Creates a builder with the default options.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Launches the agent through `ccr code`, so requests are routed by
    /// the router configuration.
    #[inline]
    pub fn with_ccr(mut self, use_ccr: bool) -> Self {
        self.options.use_ccr = use_ccr;
        self
    }

    /// Sets the path of the `ccr` executable.
    #[inline]
    pub fn with_ccr_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.ccr_path = Some(path.into());
        self
    }

    /// Sets the path of the agent CLI executable.
    #[inline]
    pub fn with_cli_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.cli_path = Some(path.into());
        self
    }

    /// Sets the tools the agent may use without asking.
    #[inline]
    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.allowed_tools =
            tools.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the tools the agent must not use.
    #[inline]
    pub fn with_disallowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.disallowed_tools =
            tools.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the permission mode.
    #[inline]
    pub fn with_permission_mode(mut self, mode: PermissionMode) -> Self {
        self.options.permission_mode = Some(mode);
        self
    }

    /// Replaces the system prompt.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.options.system_prompt = Some(prompt.into());
        self
    }

    /// Appends to the default system prompt.
    #[inline]
    pub fn with_append_system_prompt<S: Into<String>>(
        mut self,
        prompt: S,
    ) -> Self {
        self.options.append_system_prompt = Some(prompt.into());
        self
    }

    /// Sets the model. With `ccr` this is a `provider,model` pair.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.options.model = Some(model.into());
        self
    }

    /// Limits the number of agent turns per query.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.options.max_turns = Some(max_turns);
        self
    }

    /// Continues the most recent conversation.
    #[inline]
    pub fn with_continue_conversation(mut self, enabled: bool) -> Self {
        self.options.continue_conversation = enabled;
        self
    }

    /// Resumes the session with the given id.
    #[inline]
    pub fn with_resume<S: Into<String>>(mut self, session_id: S) -> Self {
        self.options.resume = Some(session_id.into());
        self
    }

    /// Gives the agent access to one more directory.
    #[inline]
    pub fn with_add_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.options.add_dirs.push(dir.into());
        self
    }

    /// Sets the working directory of the agent process.
    #[inline]
    pub fn with_cwd<P: Into<PathBuf>>(mut self, cwd: P) -> Self {
        self.options.cwd = Some(cwd.into());
        self
    }

    /// Sets an environment variable for the agent process.
    #[inline]
    pub fn with_env<K: Into<String>, V: Into<String>>(
        mut self,
        key: K,
        value: V,
    ) -> Self {
        self.options.env.push((key.into(), value.into()));
        self
    }

    /// Asks the agent to also emit partial-message events.
    #[inline]
    pub fn with_partial_messages(mut self, enabled: bool) -> Self {
        self.options.include_partial_messages = enabled;
        self
    }

    /// Routes permission prompts to the given MCP tool.
    #[inline]
    pub fn with_permission_prompt_tool<S: Into<String>>(
        mut self,
        tool: S,
    ) -> Self {
        self.options.permission_prompt_tool = Some(tool.into());
        self
    }

    /// Attaches a callback to be invoked when the agent asks whether a
    /// tool may run.
    #[inline]
    pub fn on_tool_permission(
        mut self,
        handler: impl Fn(&ToolPermissionRequest) -> PermissionResult
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.options.permission_handler = Some(Arc::new(handler));
        self
    }

    /// Builds the options.
    #[inline]
    pub fn build(self) -> AgentOptions {
        self.options
    }
}

impl Debug for AgentOptionsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AgentOptionsBuilder")
            .field(&self.options)
            .finish()
    }
}

/// Options for an agent session.
#[derive(Clone, Default)]
pub struct AgentOptions {
    pub(crate) use_ccr: bool,
    pub(crate) ccr_path: Option<PathBuf>,
    pub(crate) cli_path: Option<PathBuf>,
    pub(crate) allowed_tools: Vec<String>,
    pub(crate) disallowed_tools: Vec<String>,
    pub(crate) permission_mode: Option<PermissionMode>,
    pub(crate) system_prompt: Option<String>,
    pub(crate) append_system_prompt: Option<String>,
    pub(crate) model: Option<String>,
    pub(crate) max_turns: Option<u32>,
    pub(crate) continue_conversation: bool,
    pub(crate) resume: Option<String>,
    pub(crate) add_dirs: Vec<PathBuf>,
    pub(crate) cwd: Option<PathBuf>,
    pub(crate) env: Vec<(String, String)>,
    pub(crate) include_partial_messages: bool,
    pub(crate) permission_prompt_tool: Option<String>,
    pub(crate) permission_handler: Option<PermissionHandler>,
}

impl AgentOptions {
    /// Returns `true` if the agent is launched through `ccr code`.
    #[inline]
    pub fn uses_ccr(&self) -> bool {
        self.use_ccr
    }

    /// Returns the tool-permission callback, if any.
    #[inline]
    pub fn permission_handler(&self) -> Option<&PermissionHandler> {
        self.permission_handler.as_ref()
    }

    /// Makes the arguments passed to the agent CLI.
    pub fn cli_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--output-format".into(),
            "stream-json".into(),
            "--verbose".into(),
        ];

        if let Some(prompt) = &self.system_prompt {
            args.extend(["--system-prompt".into(), prompt.clone()]);
        }
        if let Some(prompt) = &self.append_system_prompt {
            args.extend(["--append-system-prompt".into(), prompt.clone()]);
        }
        if !self.allowed_tools.is_empty() {
            let tools = self.allowed_tools.join(",");
            args.extend(["--allowedTools".into(), tools]);
        }
        if let Some(max_turns) = self.max_turns {
            args.extend(["--max-turns".into(), max_turns.to_string()]);
        }
        if !self.disallowed_tools.is_empty() {
            args.extend([
                "--disallowedTools".into(),
                self.disallowed_tools.join(","),
            ]);
        }
        if let Some(model) = &self.model {
            args.extend(["--model".into(), model.clone()]);
        }

        // A callback needs the prompts to come back over stdio.
        let prompt_tool = self.permission_prompt_tool.clone().or_else(|| {
            self.permission_handler.as_ref().map(|_| "stdio".to_owned())
        });
        if let Some(tool) = prompt_tool {
            args.extend(["--permission-prompt-tool".into(), tool]);
        }
        if let Some(mode) = self.permission_mode {
            args.extend(["--permission-mode".into(), mode.as_str().into()]);
        }
        if self.continue_conversation {
            args.push("--continue".into());
        }
        if let Some(session_id) = &self.resume {
            args.extend(["--resume".into(), session_id.clone()]);
        }
        for dir in &self.add_dirs {
            args.extend(["--add-dir".into(), dir.display().to_string()]);
        }
        if self.include_partial_messages {
            args.push("--include-partial-messages".into());
        }

        args.extend(["--input-format".into(), "stream-json".into()]);
        args
    }
}

impl Debug for AgentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentOptions")
            .field("use_ccr", &self.use_ccr)
            .field("ccr_path", &self.ccr_path)
            .field("cli_path", &self.cli_path)
            .field("allowed_tools", &self.allowed_tools)
            .field("disallowed_tools", &self.disallowed_tools)
            .field("permission_mode", &self.permission_mode)
            .field("model", &self.model)
            .field("max_turns", &self.max_turns)
            .field("cwd", &self.cwd)
            .field(
                "env",
                &self.env.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field(
                "permission_handler",
                &self.permission_handler.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let options = AgentOptionsBuilder::new().with_ccr(true).build();
        assert!(options.uses_ccr());
        assert_eq!(
            options.cli_args(),
            [
                "--output-format",
                "stream-json",
                "--verbose",
                "--input-format",
                "stream-json"
            ]
        );
    }

    #[test]
    fn test_tool_args() {
        let options = AgentOptionsBuilder::new()
            .with_allowed_tools(["Bash", "Read"])
            .with_permission_mode(PermissionMode::AcceptEdits)
            .with_max_turns(3)
            .with_model("deepseek,deepseek-chat")
            .with_add_dir("/tmp/work")
            .build();
        assert_eq!(
            options.cli_args(),
            [
                "--output-format",
                "stream-json",
                "--verbose",
                "--allowedTools",
                "Bash,Read",
                "--max-turns",
                "3",
                "--model",
                "deepseek,deepseek-chat",
                "--permission-mode",
                "acceptEdits",
                "--add-dir",
                "/tmp/work",
                "--input-format",
                "stream-json"
            ]
        );
    }

    #[test]
    fn test_all_args_in_order() {
        let options = AgentOptionsBuilder::new()
            .with_system_prompt("Be brief.")
            .with_append_system_prompt("Answer in English.")
            .with_allowed_tools(["Bash", "Read"])
            .with_max_turns(5)
            .with_disallowed_tools(["Write", "Edit"])
            .with_model("openrouter,anthropic/claude-sonnet-4")
            .with_permission_prompt_tool("mcp__approver__check")
            .with_permission_mode(PermissionMode::Plan)
            .with_continue_conversation(true)
            .with_resume("session-1")
            .with_add_dir("/tmp/a")
            .with_add_dir("/tmp/b")
            .with_partial_messages(true)
            .build();
        assert_eq!(
            options.cli_args(),
            [
                "--output-format",
                "stream-json",
                "--verbose",
                "--system-prompt",
                "Be brief.",
                "--append-system-prompt",
                "Answer in English.",
                "--allowedTools",
                "Bash,Read",
                "--max-turns",
                "5",
                "--disallowedTools",
                "Write,Edit",
                "--model",
                "openrouter,anthropic/claude-sonnet-4",
                "--permission-prompt-tool",
                "mcp__approver__check",
                "--permission-mode",
                "plan",
                "--continue",
                "--resume",
                "session-1",
                "--add-dir",
                "/tmp/a",
                "--add-dir",
                "/tmp/b",
                "--include-partial-messages",
                "--input-format",
                "stream-json"
            ]
        );
    }

    #[test]
    fn test_permission_handler_implies_stdio_prompts() {
        let options = AgentOptionsBuilder::new()
            .on_tool_permission(|_| PermissionResult::allow())
            .build();
        let args = options.cli_args();
        let idx = args
            .iter()
            .position(|arg| arg == "--permission-prompt-tool")
            .unwrap();
        assert_eq!(args[idx + 1], "stdio");
        assert!(options.permission_handler().is_some());

        let options = AgentOptionsBuilder::new()
            .with_permission_prompt_tool("mcp__approver__check")
            .on_tool_permission(|_| PermissionResult::allow())
            .build();
        assert!(
            options
                .cli_args()
                .contains(&"mcp__approver__check".to_owned())
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let options = AgentOptionsBuilder::new()
            .with_env("OPENROUTER_API_KEY", "sk-secret")
            .on_tool_permission(|_| PermissionResult::deny("no"))
            .build();
        let debug = format!("{options:?}");
        assert!(debug.contains("OPENROUTER_API_KEY"));
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<callback>"));
    }
}
