use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use ccr_agent_protocol::{ErrorKind, Transport};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::Error;
use crate::io::{Chunks, JsonLines, LinesError, MAX_LINE_SIZE};
use crate::options::AgentOptions;

const AGENT_CLI: &str = "claude";
const ROUTER_CLI: &str = "ccr";
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

const AGENT_CLI_HINT: &str =
    "Install it with: npm install -g @anthropic-ai/claude-code";
const ROUTER_CLI_HINT: &str =
    "Install it with: npm install -g @musistudio/claude-code-router";

/// A fully resolved command line for the agent process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    /// The executable to run.
    pub program: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Working directory, inherited when unset.
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    /// Resolves the command line for `options`, looking up executables in
    /// `PATH` and the usual global install locations.
    #[inline]
    pub fn from_options(options: &AgentOptions) -> Result<Self, Error> {
        Self::resolve_with(options, find_executable)
    }

    fn resolve_with(
        options: &AgentOptions,
        find: impl Fn(&str) -> Option<PathBuf>,
    ) -> Result<Self, Error> {
        let mut args = options.cli_args();
        let program = if options.use_ccr {
            // `ccr code` starts the router service when needed and forwards
            // the remaining arguments to the agent CLI.
            args.insert(0, "code".to_owned());
            options
                .ccr_path
                .clone()
                .or_else(|| find(ROUTER_CLI))
                .ok_or_else(|| not_found(ROUTER_CLI, ROUTER_CLI_HINT))?
        } else {
            options
                .cli_path
                .clone()
                .or_else(|| find(AGENT_CLI))
                .ok_or_else(|| not_found(AGENT_CLI, AGENT_CLI_HINT))?
        };

        Ok(Self {
            program,
            args,
            env: options.env.clone(),
            cwd: options.cwd.clone(),
        })
    }
}

fn not_found(name: &str, hint: &str) -> Error {
    Error::new(
        format!("`{name}` executable not found. {hint}"),
        ErrorKind::CliNotFound,
    )
}

/// Looks up an executable by name in `PATH`, then in the directories npm,
/// yarn and pip-style installers usually put global binaries in.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let from_path = env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths)
            .map(|dir| dir.join(name))
            .find(|path| is_executable(path))
    });
    from_path.or_else(|| {
        fallback_dirs()
            .into_iter()
            .map(|dir| dir.join(name))
            .find(|path| is_executable(path))
    })
}

fn fallback_dirs() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from("/usr/local/bin")];
    if let Some(home) = dirs::home_dir() {
        let rels =
            [".npm-global/bin", ".local/bin", "node_modules/.bin", ".yarn/bin"];
        candidates.extend(rels.iter().map(|rel| home.join(rel)));
    }
    candidates
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

enum Launch {
    Options(AgentOptions),
    Command(CommandSpec),
}

/// A transport that runs the agent CLI as a child process and exchanges
/// JSON lines over its stdin and stdout.
///
/// The executable is resolved when connecting, so a missing CLI is
/// reported by [`connect`](Transport::connect).
pub struct SubprocessTransport {
    launch: Launch,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<JsonLines>,
    stderr_task: Option<JoinHandle<()>>,
    finished: bool,
}

impl SubprocessTransport {
    /// Creates a transport that launches the agent as `options` describe.
    #[inline]
    pub fn new(options: &AgentOptions) -> Self {
        Self::with_launch(Launch::Options(options.clone()))
    }

    /// Creates a transport that runs the given command as is.
    #[inline]
    pub fn from_command(command: CommandSpec) -> Self {
        Self::with_launch(Launch::Command(command))
    }

    fn with_launch(launch: Launch) -> Self {
        Self {
            launch,
            child: None,
            stdin: None,
            stdout: None,
            stderr_task: None,
            finished: false,
        }
    }

    async fn check_exit_status(&mut self) -> Result<(), Error> {
        let Some(child) = &mut self.child else {
            return Ok(());
        };
        let status = match timeout(CLOSE_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                return Err(Error::new(
                    format!("failed to wait for the agent process: {err}"),
                    ErrorKind::Process,
                ));
            }
            // Output is closed but the process lingers, `close` deals
            // with it.
            Err(_) => return Ok(()),
        };
        if !status.success() {
            return Err(Error::new(
                format!("agent process exited with {status}"),
                ErrorKind::Process,
            ));
        }
        Ok(())
    }
}

impl Transport for SubprocessTransport {
    type Error = Error;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if self.child.is_some() {
            return Ok(());
        }

        let spec = match &self.launch {
            Launch::Options(options) => CommandSpec::from_options(options)?,
            Launch::Command(spec) => spec.clone(),
        };
        debug!("starting agent: {} {:?}", spec.program.display(), spec.args);

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|err| {
            let kind = if err.kind() == io::ErrorKind::NotFound {
                ErrorKind::CliNotFound
            } else {
                ErrorKind::Connection
            };
            Error::new(
                format!("failed to start {}: {err}", spec.program.display()),
                kind,
            )
        })?;

        let pipes = (child.stdin.take(), child.stdout.take());
        let (Some(stdin), Some(stdout)) = pipes else {
            return Err(Error::new(
                "agent process has no stdio pipes",
                ErrorKind::Connection,
            ));
        };
        if let Some(stderr) = child.stderr.take() {
            self.stderr_task = Some(tokio::spawn(forward_stderr(stderr)));
        }

        info!("agent process started (pid {:?})", child.id());
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stdout = Some(JsonLines::new(Chunks::from_stdout(stdout)));
        self.finished = false;
        Ok(())
    }

    async fn write_line(&mut self, line: String) -> Result<(), Self::Error> {
        let Some(stdin) = &mut self.stdin else {
            return Err(Error::new(
                "agent process is not running",
                ErrorKind::NotConnected,
            ));
        };
        trace!("writing line: {line}");

        let result = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;
        result.map_err(|err| {
            Error::new(
                format!("failed to write to the agent process: {err}"),
                ErrorKind::Connection,
            )
        })
    }

    async fn read_message(&mut self) -> Result<Option<Value>, Self::Error> {
        if self.finished {
            return Ok(None);
        }
        let Some(stdout) = &mut self.stdout else {
            return Err(Error::new(
                "agent process is not running",
                ErrorKind::NotConnected,
            ));
        };

        let next = stdout.next_value().await;
        match next {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => {
                debug!("agent output closed");
                self.finished = true;
                self.check_exit_status().await?;
                Ok(None)
            }
            Err(LinesError::Io(err)) => Err(Error::new(
                format!("failed to read from the agent process: {err}"),
                ErrorKind::Connection,
            )),
            Err(LinesError::InvalidJson(err)) => Err(Error::new(
                format!("failed to decode agent output: {err}"),
                ErrorKind::Decode,
            )),
            Err(LinesError::LineTooLong) => Err(Error::new(
                format!("agent output line exceeds {MAX_LINE_SIZE} bytes"),
                ErrorKind::Decode,
            )),
        }
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        // Closing stdin tells the agent there is no more input.
        self.stdin = None;
        self.stdout = None;

        if let Some(mut child) = self.child.take() {
            match timeout(CLOSE_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) => debug!("agent process exited with {status}"),
                Ok(Err(err)) => warn!("failed to wait for the agent: {err}"),
                Err(_) => {
                    warn!("agent process didn't exit in time, killing it");
                    if let Err(err) = child.kill().await {
                        warn!("failed to kill the agent process: {err}");
                    }
                }
            }
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        Ok(())
    }
}

/// Logs the agent's stderr until it is closed.
///
/// The pipe must be drained to the end, the agent dies of `SIGPIPE` on its
/// next write otherwise.
async fn forward_stderr(stderr: ChildStderr) {
    let mut reader = BufReader::new(stderr);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                debug!("agent stderr: {}", text.trim_end());
            }
            Err(err) => {
                warn!("failed to read the agent's stderr: {err}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AgentOptionsBuilder;

    fn fake_find(name: &str) -> Option<PathBuf> {
        Some(PathBuf::from("/opt/bin").join(name))
    }

    #[test]
    fn test_ccr_command() {
        let options = AgentOptionsBuilder::new()
            .with_ccr(true)
            .with_env("DEEPSEEK_API_KEY", "sk-1")
            .build();
        let spec = CommandSpec::resolve_with(&options, fake_find).unwrap();
        assert_eq!(spec.program, PathBuf::from("/opt/bin/ccr"));
        assert_eq!(spec.args[0], "code");
        assert_eq!(spec.args[1..], options.cli_args()[..]);
        assert_eq!(
            spec.env,
            [("DEEPSEEK_API_KEY".to_owned(), "sk-1".to_owned())]
        );
    }

    #[test]
    fn test_direct_command() {
        let options = AgentOptionsBuilder::new().build();
        let spec = CommandSpec::resolve_with(&options, fake_find).unwrap();
        assert_eq!(spec.program, PathBuf::from("/opt/bin/claude"));
        assert_eq!(spec.args, options.cli_args());

        let options = AgentOptionsBuilder::new()
            .with_cli_path("/custom/claude")
            .build();
        let spec = CommandSpec::resolve_with(&options, |_| None).unwrap();
        assert_eq!(spec.program, PathBuf::from("/custom/claude"));
    }

    #[test]
    fn test_missing_cli() {
        let options = AgentOptionsBuilder::new().with_ccr(true).build();
        let err = CommandSpec::resolve_with(&options, |_| None).unwrap_err();
        assert_eq!(
            ccr_agent_protocol::TransportError::kind(&err),
            ErrorKind::CliNotFound
        );
        assert!(err.message().contains("claude-code-router"));
    }

    #[tokio::test]
    async fn test_read_before_connect() {
        let options = AgentOptionsBuilder::new().build();
        let mut transport = SubprocessTransport::new(&options);
        let err = transport.read_message().await.unwrap_err();
        assert_eq!(
            ccr_agent_protocol::TransportError::kind(&err),
            ErrorKind::NotConnected
        );
        transport.close().await.unwrap();
    }
}
