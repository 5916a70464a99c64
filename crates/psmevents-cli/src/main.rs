//! psmevents
//!
//! Prints PSM object events from a capture (file or stdin) or from a live
//! JSON-RPC connection, showing `object.updated` events as diffs.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use tokio::io::AsyncRead;
use tracing::info;

use psmevents_cli::connection::LiveConnection;
use psmevents_cli::render::{self, EventPrinter};
use psmevents_core::config::{Settings, load_config};
use psmevents_core::PeekingDecoder;

const EXAMPLES: &str = "\
When no address is given, events are read from --input or stdin.

Examples:
  psmevents < events.json                # parse and clarify events from a capture file
  psmevents --diff=false 192.0.2.23:3994 # connect to PSM at 192.0.2.23, subscribe to events";

#[derive(Parser, Debug)]
#[command(name = "psmevents")]
#[command(version, about = "Print and diff PSM object events", after_help = EXAMPLES)]
struct Args {
    /// PSM JSON-RPC address (host or host:port, default port 3994)
    addr: Option<String>,

    /// Capture file to read when no address is given (default: stdin)
    #[arg(short, long, conflicts_with = "addr")]
    input: Option<PathBuf>,

    /// Use diff for object.updated events
    #[arg(long, value_name = "BOOL", action = ArgAction::Set, num_args = 0..=1,
          require_equals = true, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    diff: Option<bool>,

    /// Number of lines in diff context
    #[arg(long, value_name = "LINES")]
    diff_context: Option<usize>,

    /// Subscribe to session events
    #[arg(long, value_name = "BOOL", action = ArgAction::Set, num_args = 0..=1,
          require_equals = true, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    sessions: Option<bool>,

    /// Subscribe to subscriber events
    #[arg(long, value_name = "BOOL", action = ArgAction::Set, num_args = 0..=1,
          require_equals = true, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    subscribers: Option<bool>,

    /// Subscribe to group events
    #[arg(long, value_name = "BOOL", action = ArgAction::Set, num_args = 0..=1,
          require_equals = true, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    groups: Option<bool>,

    /// Settings file (default: <config dir>/psmevents/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level filter (e.g. "warn", "info", "debug")
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Args {
    /// Command-line flags win over every other settings source.
    fn apply(&self, settings: &mut Settings) {
        if let Some(diff) = self.diff {
            settings.render.diff = diff;
        }
        if let Some(lines) = self.diff_context {
            settings.render.diff_context = lines;
        }
        if let Some(on) = self.sessions {
            settings.subscriptions.sessions = on;
        }
        if let Some(on) = self.subscribers {
            settings.subscriptions.subscribers = on;
        }
        if let Some(on) = self.groups {
            settings.subscriptions.groups = on;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.log_json {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = load_config(args.config.as_deref())?;
    args.apply(&mut settings);

    let log_filter = format!("psmevents={}", settings.logging.level);
    psmevents_core::tracing_init::init_tracing(&log_filter, settings.logging.json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        live = args.addr.is_some(),
        diff = settings.render.diff,
        diff_context = settings.render.diff_context,
        "Starting psmevents"
    );

    let mut out = io::stdout().lock();

    if let Some(addr) = &args.addr {
        let mut conn = LiveConnection::connect(addr).await?;
        info!(addr = conn.addr(), "Connected");
        conn.subscribe(&settings.subscriptions, &mut out).await?;
        print_events(conn.decoder_mut(), &settings, true, out).await?;
    } else if let Some(path) = &args.input {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        print_events(&mut PeekingDecoder::new(file), &settings, false, out).await?;
    } else {
        let stdin = tokio::io::stdin();
        print_events(&mut PeekingDecoder::new(stdin), &settings, false, out).await?;
    }

    Ok(())
}

async fn print_events<R, W>(
    decoder: &mut PeekingDecoder<R>,
    settings: &Settings,
    timestamps: bool,
    out: W,
) -> anyhow::Result<u64>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    let mut printer = EventPrinter::new(out, settings.render.clone(), timestamps);
    Ok(render::run(decoder, &mut printer).await?)
}
