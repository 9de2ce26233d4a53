//! Checks the router setup before any session starts.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ccr_agent_client::router::{self, RouterHome, RouterStatus};
use owo_colors::{OwoColorize, Stream, Style};

/// Returns the sample router config shipped with the sources.
pub fn bundled_sample_config() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("ccr-config")
        .join("config.json")
}

/// Checks that the router config exists, printing a hint when it doesn't.
///
/// Returns `false` if the config is missing and the sessions should not
/// run.
pub fn check_router_config(
    home: &RouterHome,
    sample: &Path,
    out: &mut impl Write,
) -> io::Result<bool> {
    if home.has_config() {
        return Ok(true);
    }

    let config_path = home.config_path();
    let label = "Warning:".if_supports_color(Stream::Stdout, |text| {
        text.style(Style::new().yellow().bold())
    });
    writeln!(
        out,
        "{label} Config file not found at {}",
        config_path.display()
    )?;
    if sample.is_file() {
        writeln!(
            out,
            "Copy the sample: cp {} {}",
            sample.display(),
            config_path.display()
        )?;
    } else {
        writeln!(out, "Please create the config file first.")?;
    }
    Ok(false)
}

/// Logs what the router config contains and whether the service is up.
///
/// Nothing here is fatal: `ccr code` reports its own errors and starts
/// the service when needed.
pub async fn report_router(home: &RouterHome) -> Option<RouterStatus> {
    let config = match home.load_config() {
        Ok(config) => config,
        Err(err) => {
            warn!("{err}");
            return None;
        }
    };

    let providers: Vec<&str> =
        config.providers.iter().map(|p| p.name.as_str()).collect();
    info!(
        "router providers: {providers:?}, default route: {:?}",
        config.routes.default
    );
    for name in config.unresolved_env_vars() {
        warn!("router config references ${name}, which is not set");
    }

    let endpoint = config.endpoint();
    let status = router::probe(&endpoint).await;
    match status {
        RouterStatus::Running => info!("router is running at {endpoint}"),
        RouterStatus::NotRunning => {
            info!("router is not running at {endpoint}, it starts on demand")
        }
    }
    Some(status)
}

/// Prints the failure with the usual setup mistakes.
pub fn print_failure(
    err: &impl std::fmt::Display,
    out: &mut impl Write,
) -> io::Result<()> {
    let label = "Error:".if_supports_color(Stream::Stdout, |text| {
        text.style(Style::new().red().bold())
    });
    writeln!(out, "{label} {err}")?;
    writeln!(out, "\nMake sure:")?;
    writeln!(
        out,
        "1. ccr is installed: npm install -g @musistudio/claude-code-router"
    )?;
    writeln!(
        out,
        "2. claude CLI is installed: npm install -g @anthropic-ai/claude-code"
    )?;
    writeln!(out, "3. API keys are set in environment variables")
}
