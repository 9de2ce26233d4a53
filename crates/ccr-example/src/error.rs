use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::io;

/// Error type for the demonstrations.
#[derive(Debug)]
pub enum Error {
    /// The agent session failed.
    Agent(ccr_agent_client::Error),
    /// Writing the output failed.
    Output(io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Agent(err) => write!(f, "{err}"),
            Error::Output(err) => write!(f, "failed to write output: {err}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Agent(err) => Some(err),
            Error::Output(err) => Some(err),
        }
    }
}

impl From<ccr_agent_client::Error> for Error {
    #[inline]
    fn from(err: ccr_agent_client::Error) -> Self {
        Error::Agent(err)
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(err: io::Error) -> Self {
        Error::Output(err)
    }
}
