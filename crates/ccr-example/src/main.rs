//! Runs the demonstrations against the agent CLI behind `ccr`.

#[macro_use]
extern crate tracing;

use std::io;

use ccr_agent_client::AgentClient;
use ccr_agent_client::router::RouterHome;
use ccr_example::setup;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Some(home) = RouterHome::locate() else {
        eprintln!("Cannot locate the home directory");
        return;
    };

    let sample = setup::bundled_sample_config();
    let open = AgentClient::from_options;
    if let Err(err) =
        ccr_example::run(&home, &sample, open, &mut io::stdout()).await
    {
        error!("failed to write output: {err}");
    }
}
