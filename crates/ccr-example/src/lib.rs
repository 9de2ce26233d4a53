//! Demonstrates running agent sessions through the `ccr` router.
//!
//! The binary checks the router configuration, then runs a few short
//! sessions and prints what the agent answers. The pieces live in this
//! library so they can be driven by a scripted transport in tests.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod demos;
mod error;
pub mod setup;

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use ccr_agent_client::protocol::Transport;
use ccr_agent_client::router::RouterHome;
use ccr_agent_client::{AgentClient, AgentOptions};
use indicatif::{ProgressBar, ProgressStyle};

pub use error::Error;

/// Runs the whole example: checks the router setup, then the demos in
/// sessions made by `open`.
///
/// Agent failures are printed to `out` with the troubleshooting list and
/// are not returned. Only failures to write `out` are.
pub async fn run<T, F>(
    home: &RouterHome,
    sample: &Path,
    open: F,
    out: &mut impl Write,
) -> io::Result<()>
where
    T: Transport,
    F: FnMut(AgentOptions) -> AgentClient<T>,
{
    run_steps(home, sample, open, out).await?;
    out.flush()
}

async fn run_steps<T, F>(
    home: &RouterHome,
    sample: &Path,
    open: F,
    out: &mut impl Write,
) -> io::Result<()>
where
    T: Transport,
    F: FnMut(AgentOptions) -> AgentClient<T>,
{
    writeln!(out, "Using ccr config from: {}\n", home.dir().display())?;
    if !setup::check_router_config(home, sample, out)? {
        return Ok(());
    }

    let progress_bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {wide_msg}") {
        progress_bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    progress_bar.set_message("Checking the router...");
    progress_bar.enable_steady_tick(Duration::from_millis(100));
    setup::report_router(home).await;
    progress_bar.finish_and_clear();

    match demos::run_all(open, out).await {
        Ok(()) => Ok(()),
        Err(Error::Output(err)) => Err(err),
        Err(err) => setup::print_failure(&err, out),
    }
}
