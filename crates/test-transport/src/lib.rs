//! A scripted in-memory transport for testing purpose.

pub mod preset;

use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ccr_agent_protocol::{ErrorKind, Transport, TransportError};
use serde_json::{Value, json};
use tokio::time::sleep;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl TransportError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Debug, Default)]
struct JournalState {
    lines: Vec<Value>,
    closed: bool,
}

/// A shared view of everything the client wrote to a [`ScriptedTransport`].
///
/// The journal stays readable after the transport has been moved into a
/// client.
#[derive(Clone, Debug, Default)]
pub struct Journal(Arc<Mutex<JournalState>>);

impl Journal {
    fn state(&self) -> MutexGuard<'_, JournalState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns all written lines, parsed.
    pub fn lines(&self) -> Vec<Value> {
        self.state().lines.clone()
    }

    /// Returns the prompts of the user messages, in order.
    pub fn user_prompts(&self) -> Vec<String> {
        self.lines_of_type("user")
            .iter()
            .filter_map(|line| line["message"]["content"].as_str())
            .map(ToOwned::to_owned)
            .collect()
    }

    /// Returns the subtypes of the control requests, in order.
    pub fn control_request_subtypes(&self) -> Vec<String> {
        self.lines_of_type("control_request")
            .iter()
            .filter_map(|line| line["request"]["subtype"].as_str())
            .map(ToOwned::to_owned)
            .collect()
    }

    /// Returns the `response` objects the client answered agent control
    /// requests with.
    pub fn control_responses(&self) -> Vec<Value> {
        self.lines_of_type("control_response")
            .into_iter()
            .map(|line| line["response"].clone())
            .collect()
    }

    /// Returns `true` once the transport has been closed.
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn lines_of_type(&self, ty: &str) -> Vec<Value> {
        self.state()
            .lines
            .iter()
            .filter(|line| line["type"] == ty)
            .cloned()
            .collect()
    }
}

/// A local fake agent for testing purpose.
///
/// Before connecting, you need to setup the script, which is how the agent
/// should answer each user message. Every user message written to the
/// transport releases the next scripted turn. Control requests written by
/// the client are answered right away with a success response, unless a
/// failure has been registered for their subtype.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Default)]
pub struct ScriptedTransport {
    turns: VecDeque<Vec<Value>>,
    inbox: VecDeque<Value>,
    journal: Journal,
    connected: bool,
    fail_connect: bool,
    control_failures: HashMap<String, String>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    /// Adds the messages the agent writes after the next user message.
    #[inline]
    pub fn add_turn(&mut self, messages: impl IntoIterator<Item = Value>) {
        self.turns.push_back(messages.into_iter().collect());
    }

    /// Makes [`connect`](Transport::connect) fail as if the CLI were not
    /// installed.
    #[inline]
    pub fn fail_on_connect(&mut self) {
        self.fail_connect = true;
    }

    /// Makes control requests with `subtype` fail with `error`.
    #[inline]
    pub fn fail_control_request(&mut self, subtype: &str, error: &str) {
        self.control_failures
            .insert(subtype.to_owned(), error.to_owned());
    }

    /// Delays every read by `duration`.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns the journal of written lines.
    #[inline]
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn answer_control_request(&mut self, line: &Value) {
        let request_id = line["request_id"].as_str().unwrap_or_default();
        let subtype = line["request"]["subtype"].as_str().unwrap_or_default();

        let response = match self.control_failures.get(subtype) {
            Some(error) => json!({
                "subtype": "error",
                "request_id": request_id,
                "error": error
            }),
            None => {
                let payload = if subtype == "initialize" {
                    json!({"commands": [], "output_style": "default"})
                } else {
                    json!({})
                };
                json!({
                    "subtype": "success",
                    "request_id": request_id,
                    "response": payload
                })
            }
        };
        self.inbox.push_back(json!({
            "type": "control_response",
            "response": response
        }));
    }
}

impl Debug for ScriptedTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("turns_left", &self.turns.len())
            .field("inbox", &self.inbox.len())
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

impl Transport for ScriptedTransport {
    type Error = crate::Error;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if self.fail_connect {
            return Err(Error {
                message: "scripted CLI is not installed",
                kind: ErrorKind::CliNotFound,
            });
        }
        self.connected = true;
        Ok(())
    }

    async fn write_line(&mut self, line: String) -> Result<(), Self::Error> {
        if !self.connected {
            return Err(Error {
                message: "not connected",
                kind: ErrorKind::NotConnected,
            });
        }
        let Ok(value) = serde_json::from_str::<Value>(&line) else {
            return Err(Error {
                message: "client wrote invalid JSON",
                kind: ErrorKind::Decode,
            });
        };
        self.journal.state().lines.push(value.clone());

        match value["type"].as_str() {
            Some("user") => {
                let Some(turn) = self.turns.pop_front() else {
                    return Err(Error {
                        message: "not enough turns",
                        kind: ErrorKind::Process,
                    });
                };
                self.inbox.extend(turn);
            }
            Some("control_request") => self.answer_control_request(&value),
            _ => {}
        }
        Ok(())
    }

    async fn read_message(&mut self) -> Result<Option<Value>, Self::Error> {
        if !self.connected {
            return Err(Error {
                message: "not connected",
                kind: ErrorKind::NotConnected,
            });
        }
        if let Some(delay) = self.delay {
            sleep(delay).await;
        }
        Ok(self.inbox.pop_front())
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.connected = false;
        self.journal.state().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::*;

    #[tokio::test]
    async fn test_turns_follow_user_messages() {
        let mut transport = ScriptedTransport::default();
        transport.add_turn([assistant_text("4"), result_success("s1", None)]);
        let journal = transport.journal();

        transport.connect().await.unwrap();
        assert_eq!(transport.read_message().await.unwrap(), None);

        let line = json!({
            "type": "user",
            "message": {"role": "user", "content": "What is 2 + 2?"}
        });
        transport.write_line(line.to_string()).await.unwrap();
        let first = transport.read_message().await.unwrap().unwrap();
        assert_eq!(first["type"], "assistant");
        let second = transport.read_message().await.unwrap().unwrap();
        assert_eq!(second["type"], "result");
        assert_eq!(transport.read_message().await.unwrap(), None);

        assert_eq!(journal.user_prompts(), ["What is 2 + 2?"]);
        let err = transport.write_line(line.to_string()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Process);

        transport.close().await.unwrap();
        assert!(journal.is_closed());
    }

    #[tokio::test]
    async fn test_control_requests_are_answered() {
        let mut transport = ScriptedTransport::default();
        transport.fail_control_request("interrupt", "nothing to interrupt");
        transport.connect().await.unwrap();

        let init = json!({
            "type": "control_request",
            "request_id": "req_1",
            "request": {"subtype": "initialize"}
        });
        transport.write_line(init.to_string()).await.unwrap();
        let resp = transport.read_message().await.unwrap().unwrap();
        assert_eq!(resp["response"]["subtype"], "success");
        assert_eq!(resp["response"]["request_id"], "req_1");

        let interrupt = json!({
            "type": "control_request",
            "request_id": "req_2",
            "request": {"subtype": "interrupt"}
        });
        transport.write_line(interrupt.to_string()).await.unwrap();
        let resp = transport.read_message().await.unwrap().unwrap();
        assert_eq!(resp["response"]["subtype"], "error");
        assert_eq!(resp["response"]["error"], "nothing to interrupt");

        assert_eq!(
            transport.journal().control_request_subtypes(),
            ["initialize", "interrupt"]
        );
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let mut transport = ScriptedTransport::default();
        transport.fail_on_connect();
        let err = transport.connect().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CliNotFound);
        assert_eq!(
            transport.read_message().await.unwrap_err().kind(),
            ErrorKind::NotConnected
        );
    }
}
