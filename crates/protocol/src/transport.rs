use std::error::Error;

use serde_json::Value;

use crate::error::ErrorKind;

/// The error type for a transport.
pub trait TransportError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A duplex channel of JSON lines between the client and the agent CLI.
///
/// A transport owns whatever resource carries the lines (usually a child
/// process) and knows nothing about the meaning of the values it moves.
/// Callers should call [`connect`](Transport::connect) once before doing
/// anything else, and [`close`](Transport::close) when they are done.
pub trait Transport: Send {
    /// The error type that may be returned by the transport.
    type Error: TransportError;

    /// Opens the underlying channel.
    fn connect(
        &mut self,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Writes one line to the agent. The line must be a single serialized
    /// JSON object without the trailing newline.
    fn write_line(
        &mut self,
        line: String,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Reads the next JSON value written by the agent.
    ///
    /// Returns `Ok(None)` when the agent has closed its output. Calling
    /// this method after that should keep returning `Ok(None)`.
    fn read_message(
        &mut self,
    ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send;

    /// Closes the channel and releases the underlying resource. Closing
    /// an already closed transport is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
