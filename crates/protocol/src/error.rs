use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The agent CLI (or the router wrapping it) could not be located.
    CliNotFound,
    /// Failed to start or talk to the agent process.
    Connection,
    /// The agent process exited abnormally.
    Process,
    /// The agent produced output that could not be decoded.
    Decode,
    /// The agent answered a control request with an error, or sent
    /// something the control protocol doesn't allow.
    Protocol,
    /// The agent didn't answer in time.
    Timeout,
    /// The session is not connected.
    NotConnected,
    /// The router configuration is missing or invalid.
    Config,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::CliNotFound => write!(f, "CLI not found"),
            ErrorKind::Connection => write!(f, "Connection error"),
            ErrorKind::Process => write!(f, "Process error"),
            ErrorKind::Decode => write!(f, "Decode error"),
            ErrorKind::Protocol => write!(f, "Protocol error"),
            ErrorKind::Timeout => write!(f, "Timed out"),
            ErrorKind::NotConnected => write!(f, "Not connected"),
            ErrorKind::Config => write!(f, "Configuration error"),
        }
    }
}
