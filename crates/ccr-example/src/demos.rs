//! The sessions the example runs.

use std::io::Write;

use ccr_agent_client::protocol::{Message, PermissionMode, Transport};
use ccr_agent_client::{AgentClient, AgentOptions, AgentOptionsBuilder};
use owo_colors::{OwoColorize, Stream, Style};

use crate::Error;

/// How much of the first conversation turn is printed.
const PREVIEW_CHARS: usize = 100;

/// One demonstration, run in its own session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Demo {
    /// A single question.
    BasicQuery,
    /// Two turns relying on the conversation context.
    Conversation,
    /// A question the agent answers by running a tool.
    WithTools,
}

impl Demo {
    /// All demonstrations, in the order they run.
    pub const ALL: [Demo; 3] =
        [Demo::BasicQuery, Demo::Conversation, Demo::WithTools];

    /// Returns the title printed before the demonstration.
    #[inline]
    pub fn title(&self) -> &'static str {
        match self {
            Demo::BasicQuery => "Basic Query Example",
            Demo::Conversation => "Conversation Example",
            Demo::WithTools => "Tools Example",
        }
    }

    /// Returns the session options of the demonstration.
    pub fn options(&self) -> AgentOptions {
        let builder = AgentOptionsBuilder::new().with_ccr(true);
        match self {
            Demo::BasicQuery | Demo::Conversation => builder.build(),
            Demo::WithTools => builder
                .with_allowed_tools(["Bash", "Read"])
                .with_permission_mode(PermissionMode::AcceptEdits)
                .build(),
        }
    }

    /// Runs the demonstration on a connected client.
    pub async fn run<T: Transport>(
        &self,
        client: &mut AgentClient<T>,
        out: &mut impl Write,
    ) -> Result<(), Error> {
        match self {
            Demo::BasicQuery => basic_query(client, out).await,
            Demo::Conversation => conversation(client, out).await,
            Demo::WithTools => with_tools(client, out).await,
        }
    }
}

/// Runs every demonstration, each in a session made by `open`.
///
/// Stops at the first failure. The failing session is still disconnected.
pub async fn run_all<T, F>(
    mut open: F,
    out: &mut impl Write,
) -> Result<(), Error>
where
    T: Transport,
    F: FnMut(AgentOptions) -> AgentClient<T>,
{
    for (idx, demo) in Demo::ALL.iter().enumerate() {
        let leading = if idx == 0 { "" } else { "\n" };
        let title = format!("=== {} ===", demo.title());
        let title = title.if_supports_color(Stream::Stdout, |text| {
            text.style(Style::new().bright_cyan().bold())
        });
        writeln!(out, "{leading}{title}\n")?;

        let client = open(demo.options());
        run_session(*demo, client, out).await?;
    }
    Ok(())
}

async fn run_session<T: Transport>(
    demo: Demo,
    mut client: AgentClient<T>,
    out: &mut impl Write,
) -> Result<(), Error> {
    info!("starting {demo:?}");
    client.connect().await?;
    let result = demo.run(&mut client, out).await;
    let closed = client.disconnect().await;
    result?;
    closed.map_err(Error::from)
}

async fn basic_query<T: Transport>(
    client: &mut AgentClient<T>,
    out: &mut impl Write,
) -> Result<(), Error> {
    client.query("What is 2 + 2? Answer briefly.").await?;

    let mut response = client.receive_response();
    while let Some(msg) = response.next_message().await? {
        match msg {
            Message::Assistant(msg) => {
                for text in msg.texts() {
                    writeln!(out, "Response: {text}")?;
                }
            }
            Message::Result(result) => {
                writeln!(out, "\nSession ID: {}", result.session_id)?;
                if let Some(cost) =
                    result.total_cost_usd.filter(|cost| *cost != 0.0)
                {
                    writeln!(out, "Cost: ${cost:.6}")?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

async fn conversation<T: Transport>(
    client: &mut AgentClient<T>,
    out: &mut impl Write,
) -> Result<(), Error> {
    client.query("Remember this number: 42").await?;
    let mut response = client.receive_response();
    while let Some(msg) = response.next_message().await? {
        if let Message::Assistant(msg) = msg {
            for text in msg.texts() {
                writeln!(out, "Turn 1: {}...", preview(text, PREVIEW_CHARS))?;
            }
        }
    }

    // The agent process keeps the context of the first turn.
    client.query("What number did I ask you to remember?").await?;
    let mut response = client.receive_response();
    while let Some(msg) = response.next_message().await? {
        if let Message::Assistant(msg) = msg {
            for text in msg.texts() {
                writeln!(out, "Turn 2: {text}")?;
            }
        }
    }
    Ok(())
}

async fn with_tools<T: Transport>(
    client: &mut AgentClient<T>,
    out: &mut impl Write,
) -> Result<(), Error> {
    client
        .query("What is the current directory? Use bash to find out.")
        .await?;

    let mut response = client.receive_response();
    while let Some(msg) = response.next_message().await? {
        if let Message::Assistant(msg) = msg {
            for text in msg.texts() {
                writeln!(out, "Response: {text}")?;
            }
        }
    }
    Ok(())
}

/// Returns the first `max_chars` characters of `text`.
fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
