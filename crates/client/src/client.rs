use std::collections::VecDeque;
use std::time::Duration;

use ccr_agent_protocol::{
    ControlFrame, DEFAULT_SESSION_ID, ErrorKind, Frame,
    IncomingControlRequest, Message, OutgoingControlRequest, PermissionMode,
    Transport, control_error_line, control_request_line,
    control_success_line, user_message_line,
};
use serde_json::Value;
use tokio::time::timeout;

use crate::error::Error;
use crate::options::{AgentOptions, PermissionHandler};
use crate::subprocess::SubprocessTransport;

const CONTROL_TIMEOUT: Duration = Duration::from_secs(60);

/// A conversation session with the agent.
///
/// The client owns a transport and speaks the streaming protocol over it:
/// it sends prompts, hands out the messages the agent produces, and answers
/// the control requests the agent sends along the way. The conversation
/// context lives in the agent process, so every query on the same client
/// continues the same conversation.
///
/// The client is driven by its caller. Nothing runs in the background, and
/// the agent is only read from while a method is being awaited.
pub struct AgentClient<T: Transport = SubprocessTransport> {
    transport: T,
    permission_handler: Option<PermissionHandler>,
    // Messages read while waiting for a control response.
    pending: VecDeque<Message>,
    next_request_id: u64,
    connected: bool,
    server_info: Option<Value>,
}

impl AgentClient<SubprocessTransport> {
    /// Creates a client that launches the agent process as `options`
    /// describe. The process is started by [`connect`](Self::connect).
    pub fn from_options(options: AgentOptions) -> Self {
        let transport = SubprocessTransport::new(&options);
        let handler = options.permission_handler().cloned();
        Self::with_transport(transport, handler)
    }
}

impl<T: Transport> AgentClient<T> {
    /// Creates a client on top of an arbitrary transport.
    #[inline]
    pub fn with_transport(
        transport: T,
        permission_handler: Option<PermissionHandler>,
    ) -> Self {
        Self {
            transport,
            permission_handler,
            pending: VecDeque::new(),
            next_request_id: 0,
            connected: false,
            server_info: None,
        }
    }

    /// Returns `true` between a successful [`connect`](Self::connect) and
    /// [`disconnect`](Self::disconnect).
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns what the agent reported during the handshake.
    #[inline]
    pub fn server_info(&self) -> Option<&Value> {
        self.server_info.as_ref()
    }

    /// Connects the transport and performs the streaming handshake.
    pub async fn connect(&mut self) -> Result<(), Error> {
        if self.connected {
            return Ok(());
        }
        self.transport.connect().await.map_err(Error::from_transport)?;
        self.connected = true;

        match self
            .send_control_request(OutgoingControlRequest::Initialize)
            .await
        {
            Ok(info) => {
                debug!("session initialized: {info}");
                self.server_info = Some(info);
                Ok(())
            }
            Err(err) => {
                error!("failed to initialize the session: {err}");
                if let Err(close_err) = self.disconnect().await {
                    warn!("failed to close the transport: {close_err}");
                }
                Err(err)
            }
        }
    }

    /// Sends a prompt in the default session.
    #[inline]
    pub async fn query(&mut self, prompt: &str) -> Result<(), Error> {
        self.query_in_session(prompt, DEFAULT_SESSION_ID).await
    }

    /// Sends a prompt in the given session.
    pub async fn query_in_session(
        &mut self,
        prompt: &str,
        session_id: &str,
    ) -> Result<(), Error> {
        self.ensure_connected()?;
        trace!("sending a query in session {session_id}");
        self.write(user_message_line(prompt, session_id)).await
    }

    /// Returns a stream of the messages answering the last query, ending
    /// with (and including) its [`ResultMessage`].
    ///
    /// [`ResultMessage`]: ccr_agent_protocol::ResultMessage
    #[inline]
    pub fn receive_response(&mut self) -> ResponseStream<'_, T> {
        ResponseStream {
            client: self,
            finished: false,
        }
    }

    /// Reads the next message from the agent.
    ///
    /// Control requests from the agent are answered while reading, and
    /// never returned. Returns `Ok(None)` when the agent has closed its
    /// output.
    pub async fn next_message(&mut self) -> Result<Option<Message>, Error> {
        self.ensure_connected()?;
        if let Some(msg) = self.pending.pop_front() {
            return Ok(Some(msg));
        }

        loop {
            let Some(value) = self.read_value().await? else {
                return Ok(None);
            };
            match self.classify(value)? {
                Some(Frame::Message(msg)) => {
                    trace!("got a message: {msg:?}");
                    return Ok(Some(msg));
                }
                Some(Frame::Control(frame)) => {
                    self.handle_control_frame(frame).await?;
                }
                None => {}
            }
        }
    }

    /// Asks the agent to stop the response being generated.
    #[inline]
    pub async fn interrupt(&mut self) -> Result<(), Error> {
        self.send_control_request(OutgoingControlRequest::Interrupt)
            .await
            .map(|_| ())
    }

    /// Switches the permission mode for the rest of the session.
    #[inline]
    pub async fn set_permission_mode(
        &mut self,
        mode: PermissionMode,
    ) -> Result<(), Error> {
        self.send_control_request(OutgoingControlRequest::SetPermissionMode(
            mode,
        ))
        .await
        .map(|_| ())
    }

    /// Switches the model, `None` restores the default one.
    #[inline]
    pub async fn set_model(
        &mut self,
        model: Option<&str>,
    ) -> Result<(), Error> {
        self.send_control_request(OutgoingControlRequest::SetModel(
            model.map(ToOwned::to_owned),
        ))
        .await
        .map(|_| ())
    }

    /// Closes the session. Disconnecting twice is a no-op.
    pub async fn disconnect(&mut self) -> Result<(), Error> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        if !self.pending.is_empty() {
            debug!("dropping {} unread messages", self.pending.len());
            self.pending.clear();
        }
        self.transport.close().await.map_err(Error::from_transport)
    }

    #[inline]
    fn ensure_connected(&self) -> Result<(), Error> {
        if !self.connected {
            return Err(Error::new(
                "not connected, call `connect` first",
                ErrorKind::NotConnected,
            ));
        }
        Ok(())
    }

    #[inline]
    async fn write(&mut self, line: String) -> Result<(), Error> {
        self.transport
            .write_line(line)
            .await
            .map_err(Error::from_transport)
    }

    #[inline]
    async fn read_value(&mut self) -> Result<Option<Value>, Error> {
        self.transport
            .read_message()
            .await
            .map_err(Error::from_transport)
    }

    fn classify(&self, value: Value) -> Result<Option<Frame>, Error> {
        match Frame::from_value(value) {
            Ok(frame) => Ok(Some(frame)),
            Err(err) if err.is_unknown_type() => {
                warn!("skipping a message: {err}");
                Ok(None)
            }
            Err(err) => Err(Error::new(format!("{err}"), ErrorKind::Decode)),
        }
    }

    async fn send_control_request(
        &mut self,
        request: OutgoingControlRequest,
    ) -> Result<Value, Error> {
        self.ensure_connected()?;
        self.next_request_id += 1;
        let request_id =
            format!("req_{}_{:x}", self.next_request_id, std::process::id());
        debug!("sending control request {request_id} ({})", request.subtype());
        self.write(control_request_line(&request_id, &request)).await?;

        match timeout(CONTROL_TIMEOUT, self.wait_control_response(&request_id))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::new(
                format!("control request timed out: {}", request.subtype()),
                ErrorKind::Timeout,
            )),
        }
    }

    async fn wait_control_response(
        &mut self,
        request_id: &str,
    ) -> Result<Value, Error> {
        loop {
            let Some(value) = self.read_value().await? else {
                return Err(Error::new(
                    "agent closed its output before answering a control request",
                    ErrorKind::Protocol,
                ));
            };
            match self.classify(value)? {
                Some(Frame::Control(ControlFrame::Response(resp)))
                    if resp.request_id == request_id =>
                {
                    return resp.outcome.map_err(|err| {
                        Error::new(
                            format!("control request failed: {err}"),
                            ErrorKind::Protocol,
                        )
                    });
                }
                Some(Frame::Message(msg)) => self.pending.push_back(msg),
                Some(Frame::Control(frame)) => {
                    self.handle_control_frame(frame).await?;
                }
                None => {}
            }
        }
    }

    async fn handle_control_frame(
        &mut self,
        frame: ControlFrame,
    ) -> Result<(), Error> {
        match frame {
            ControlFrame::Request {
                request_id,
                request,
            } => self.answer_control_request(&request_id, request).await,
            ControlFrame::Response(resp) => {
                debug!("ignoring control response {}", resp.request_id);
                Ok(())
            }
            ControlFrame::CancelRequest { request_id } => {
                debug!("agent cancelled control request {request_id}");
                Ok(())
            }
        }
    }

    async fn answer_control_request(
        &mut self,
        request_id: &str,
        request: IncomingControlRequest,
    ) -> Result<(), Error> {
        let line = match request {
            IncomingControlRequest::CanUseTool(req) => {
                match &self.permission_handler {
                    Some(handler) => {
                        let result = handler(&req);
                        debug!(
                            "tool permission for {}: {result:?}",
                            req.tool_name
                        );
                        let response = result.to_response(&req);
                        control_success_line(request_id, response)
                    }
                    None => control_error_line(
                        request_id,
                        "no tool permission callback is configured",
                    ),
                }
            }
            IncomingControlRequest::Unsupported(subtype) => {
                warn!("unsupported control request from the agent: {subtype}");
                control_error_line(
                    request_id,
                    &format!("unsupported control request: {subtype}"),
                )
            }
        };
        self.write(line).await
    }
}

/// The messages answering one query.
///
/// See [`AgentClient::receive_response`].
pub struct ResponseStream<'a, T: Transport> {
    client: &'a mut AgentClient<T>,
    finished: bool,
}

impl<T: Transport> ResponseStream<'_, T> {
    /// Reads the next message of the response. Returns `Ok(None)` after the
    /// result message, or when the agent closed its output early.
    pub async fn next_message(&mut self) -> Result<Option<Message>, Error> {
        if self.finished {
            return Ok(None);
        }
        let msg = self.client.next_message().await?;
        if matches!(msg, None | Some(Message::Result(_))) {
            self.finished = true;
        }
        Ok(msg)
    }
}
