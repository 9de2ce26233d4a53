//! Runs the client against a tiny shell script that speaks the protocol.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ccr_agent_client::protocol::{ErrorKind, Message, TransportError};
use ccr_agent_client::{AgentClient, CommandSpec, SubprocessTransport};

const FAKE_AGENT: &str = r#"#!/bin/sh
echo "Service not running, starting service..."
while IFS= read -r line; do
  case "$line" in
    *'"type":"control_request"'*)
      id=$(printf '%s' "$line" | sed 's/.*"request_id":"\([^"]*\)".*/\1/')
      printf '{"type":"control_response","response":{"subtype":"success","request_id":"%s","response":{}}}\n' "$id"
      ;;
    *'"type":"user"'*)
      printf '{"type":"assistant","message":{"model":"fake","content":[{"type":"text","text":"4"}]},"parent_tool_use_id":null}\n'
      printf '{"type":"result","subtype":"success","duration_ms":3,"duration_api_ms":2,"is_error":false,"num_turns":1,"session_id":"fake-session","total_cost_usd":0.000042}\n'
      ;;
  esac
done
echo "bye" >&2
"#;

/// Answers the handshake only, then ignores its input for good.
const STUBBORN_AGENT: &str = r#"#!/bin/sh
echo $$ > "$PID_FILE"
IFS= read -r line
id=$(printf '%s' "$line" | sed 's/.*"request_id":"\([^"]*\)".*/\1/')
printf '{"type":"control_response","response":{"subtype":"success","request_id":"%s","response":{}}}\n' "$id"
while :; do sleep 1; done
"#;

fn write_script(name: &str, body: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join(format!("ccr-agent-client-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

// Scripts are run through `sh` rather than executed directly, so a script
// being written by one test can't make another test's spawn fail with
// "text file busy".
fn command(script: PathBuf) -> CommandSpec {
    CommandSpec {
        program: PathBuf::from("/bin/sh"),
        args: vec![script.display().to_string()],
        env: vec![],
        cwd: None,
    }
}

#[tokio::test]
async fn test_round_trip_with_process() {
    let script = write_script("fake-agent.sh", FAKE_AGENT);
    let transport = SubprocessTransport::from_command(command(script));
    let mut client = AgentClient::with_transport(transport, None);
    client.connect().await.unwrap();

    client.query("What is 2 + 2? Answer briefly.").await.unwrap();
    let mut texts = Vec::new();
    let mut session_id = None;
    let mut response = client.receive_response();
    while let Some(msg) = response.next_message().await.unwrap() {
        match msg {
            Message::Assistant(msg) => {
                texts.extend(msg.texts().map(ToOwned::to_owned));
            }
            Message::Result(result) => session_id = Some(result.session_id),
            _ => {}
        }
    }
    assert_eq!(texts, ["4"]);
    assert_eq!(session_id.as_deref(), Some("fake-session"));

    client.disconnect().await.unwrap();
}

fn is_alive(pid: &str) -> bool {
    std::process::Command::new("kill")
        .args(["-0", pid])
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn test_failing_process() {
    let script = write_script(
        "broken-agent.sh",
        "#!/bin/sh\nIFS= read -r line\nexit 3\n",
    );
    let transport = SubprocessTransport::from_command(command(script));
    let mut client = AgentClient::with_transport(transport, None);
    let err = client.connect().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Process);
    assert!(err.message().contains("exit status: 3"), "{}", err.message());
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_survives_binary_stderr() {
    let noisy = FAKE_AGENT.replacen(
        "#!/bin/sh\n",
        "#!/bin/sh\nprintf '\\377\\n' >&2\nsleep 0.3\n\
         echo 'Service started' >&2\n",
        1,
    );
    let script = write_script("noisy-agent.sh", &noisy);
    let transport = SubprocessTransport::from_command(command(script));
    let mut client = AgentClient::with_transport(transport, None);
    client.connect().await.unwrap();

    // Still alive after writing more to stderr.
    tokio::time::sleep(Duration::from_millis(500)).await;
    client.query("What is 2 + 2?").await.unwrap();
    let mut texts = Vec::new();
    let mut response = client.receive_response();
    while let Some(msg) = response.next_message().await.unwrap() {
        if let Message::Assistant(msg) = msg {
            texts.extend(msg.texts().map(ToOwned::to_owned));
        }
    }
    assert_eq!(texts, ["4"]);
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_kills_lingering_process() {
    let script = write_script("stubborn-agent.sh", STUBBORN_AGENT);
    let pid_file = script.with_extension("pid");
    let mut spec = command(script);
    let pid_env = ("PID_FILE".to_owned(), pid_file.display().to_string());
    spec.env.push(pid_env);
    let transport = SubprocessTransport::from_command(spec);
    let mut client = AgentClient::with_transport(transport, None);
    client.connect().await.unwrap();

    let pid = read_pid(&pid_file);
    assert!(is_alive(&pid));

    tokio::time::timeout(Duration::from_secs(15), client.disconnect())
        .await
        .expect("disconnect hangs")
        .unwrap();
    assert!(!client.is_connected());
    assert!(!is_alive(&pid));
}

fn read_pid(path: &Path) -> String {
    fs::read_to_string(path).unwrap().trim().to_owned()
}

#[tokio::test]
async fn test_missing_program() {
    let transport = SubprocessTransport::from_command(CommandSpec {
        program: PathBuf::from("/nonexistent/ccr-agent-client/claude"),
        args: vec![],
        env: vec![],
        cwd: None,
    });
    let mut client = AgentClient::with_transport(transport, None);
    let err = client.connect().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CliNotFound);
}
