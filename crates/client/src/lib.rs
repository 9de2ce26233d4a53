//! A client for running the agent CLI behind the `ccr` router.
//!
//! The agent runs as a child process (`ccr code ...` when routing is
//! enabled, the agent CLI directly otherwise) and talks newline-delimited
//! JSON over its stdio. [`AgentClient`] drives one conversation over that
//! channel: it sends prompts, yields the streamed messages, and answers the
//! agent's control requests.
//!
//! ```no_run
//! use ccr_agent_client::protocol::Message;
//! use ccr_agent_client::{AgentClient, AgentOptionsBuilder};
//!
//! # async fn run() -> Result<(), ccr_agent_client::Error> {
//! let options = AgentOptionsBuilder::new().with_ccr(true).build();
//! let mut client = AgentClient::from_options(options);
//! client.connect().await?;
//! client.query("What is 2 + 2?").await?;
//!
//! let mut response = client.receive_response();
//! while let Some(msg) = response.next_message().await? {
//!     if let Message::Assistant(msg) = msg {
//!         msg.texts().for_each(|text| println!("{text}"));
//!     }
//! }
//! client.disconnect().await
//! # }
//! ```

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod client;
mod error;
mod io;
mod options;
pub mod router;
mod subprocess;

pub use client::{AgentClient, ResponseStream};
pub use error::Error;
pub use options::{AgentOptions, AgentOptionsBuilder, PermissionHandler};
pub use subprocess::{CommandSpec, SubprocessTransport, find_executable};

/// Re-exports of [`ccr_agent_protocol`] crate.
pub mod protocol {
    pub use ccr_agent_protocol::*;
}
