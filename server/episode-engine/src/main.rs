//! Binary entrypoint: read log lines from stdin, write JSON lines to stdout.
//!
//! Each input line is either an InboundRecord (JSON) or a syslog-style text
//! line. The whole input is one scan window. Output lines are:
//! - An ErrorOutput for every input line that fails to parse (written as read)
//! - An EpisodeReport for every episode with at least one event
//! - A final SummaryOutput with the scan counters
//!
//! Diagnostics go to stderr through tracing; RUST_LOG overrides the filter.

use episode_engine::types::{ErrorOutput, SummaryOutput};
use episode_engine::{Engine, EngineError};
use std::io::{self, BufRead, Write};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "episode_engine=info".into()))
    .with(fmt::layer().with_writer(io::stderr))
    .init();

  let engine = match Engine::with_defaults() {
    Ok(e) => e,
    Err(e) => {
      tracing::error!(error = %e, "failed to build engine");
      std::process::exit(1);
    }
  };

  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());
  let mut records = Vec::new();

  for (idx, line) in stdin.lock().lines().enumerate() {
    let line = match line {
      Ok(l) => l,
      Err(e) => {
        tracing::error!(error = %e, "read error");
        std::process::exit(1);
      }
    };

    // Skip blank lines.
    if line.trim().is_empty() {
      continue;
    }

    match engine.parse_line(&line) {
      Ok(record) => records.push(record),
      Err(e) => {
        let err = match &e {
          EngineError::Validation { field, reason } => {
            ErrorOutput::new(reason.clone()).with_field(field.clone())
          }
          _ => ErrorOutput::new(e.to_string()),
        };
        emit(&mut out, &err.at_line(idx + 1));
      }
    }
  }

  let scan = engine.process(records);
  for episode in scan.with_events() {
    emit(&mut out, &episode.report());
  }
  emit(&mut out, &SummaryOutput { summary: scan.stats });

  let _ = out.flush();
}

fn emit<W: Write, T: serde::Serialize>(out: &mut W, value: &T) {
  let _ = serde_json::to_writer(&mut *out, value);
  let _ = writeln!(out);
}
