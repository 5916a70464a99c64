//! Event printing.
//!
//! Each decoded value is either one event (an object) or a batch of events
//! (an array of objects). Every event gets a numbered header and is printed
//! as a diff when it is a diffable update, or as indented JSON otherwise.

use std::io::{self, Write};

use serde_json::Value;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use psmevents_core::config::RenderConfig;
use psmevents_core::{PeekingDecoder, render_diff};

/// Errors that stop the event loop.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Stream(#[from] psmevents_core::Error),

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Writes events to an output sink.
pub struct EventPrinter<W> {
    out: W,
    config: RenderConfig,
    /// Stamp headers with the local time (live mode only).
    timestamps: bool,
    next_index: u64,
}

impl<W: Write> EventPrinter<W> {
    pub const fn new(out: W, config: RenderConfig, timestamps: bool) -> Self {
        Self {
            out,
            config,
            timestamps,
            next_index: 0,
        }
    }

    /// Number of events printed so far.
    pub const fn events_printed(&self) -> u64 {
        self.next_index
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print one decoded value: an event or a batch of events.
    pub fn print_value(&mut self, value: &Value) -> io::Result<()> {
        match value {
            Value::Array(batch) => {
                debug!(len = batch.len(), "Printing event batch");
                for event in batch {
                    if event.is_object() {
                        self.print_event(event)?;
                    } else {
                        warn!(?event, "Batch element is not an event");
                        writeln!(self.out, "Not an event?")?;
                    }
                }
            }
            Value::Object(_) => self.print_event(value)?,
            other => debug!(value = ?other, "Ignoring value that is neither event nor batch"),
        }
        Ok(())
    }

    fn print_event(&mut self, event: &Value) -> io::Result<()> {
        self.print_header()?;
        if self.config.diff {
            match render_diff(event, self.config.diff_context) {
                Ok(diff) => {
                    writeln!(self.out, "{diff}")?;
                    self.next_index += 1;
                    return Ok(());
                }
                Err(reason) => debug!(%reason, index = self.next_index, "Printing event in full"),
            }
        }
        self.print_json(event)?;
        self.next_index += 1;
        Ok(())
    }

    fn print_header(&mut self) -> io::Result<()> {
        if self.timestamps {
            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f %z");
            writeln!(self.out, "*** Event {} at {now} ***\n", self.next_index)
        } else {
            writeln!(self.out, "*** Event {} ***\n", self.next_index)
        }
    }

    fn print_json(&mut self, event: &Value) -> io::Result<()> {
        let text = serde_json::to_string_pretty(event).map_err(io::Error::other)?;
        writeln!(self.out, "{text}\n")
    }
}

/// Print every value from `decoder` until the stream ends.
///
/// Returns the number of events printed.
pub async fn run<R, W>(
    decoder: &mut PeekingDecoder<R>,
    printer: &mut EventPrinter<W>,
) -> Result<u64, RenderError>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    while let Some(value) = decoder.decode_next().await? {
        printer.print_value(&value)?;
        printer.out.flush()?;
    }
    info!(events = printer.events_printed(), "End of event stream");
    Ok(printer.events_printed())
}
