//! Wire types for talking to the agent CLI in streaming JSON mode.
//!
//! The agent CLI (optionally launched through `ccr code`) reads one JSON
//! object per line on its stdin and writes one JSON object per line on its
//! stdout. This crate describes those objects and the transport contract
//! that moves them around, without doing any I/O on its own.
//!
//! Types here don't define any behavior beyond conversions between the
//! typed representation and JSON values.

#![deny(missing_docs)]

mod control;
mod error;
mod message;
mod permission;
mod request;
mod transport;

pub use control::*;
pub use error::*;
pub use message::*;
pub use permission::*;
pub use request::*;
pub use transport::*;
