//! Core types for the episode engine (JSON contracts + internal models).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::events::{ActiveJob, DebugInfo, ExceptionEvent, Request, Response};
use crate::stats::ScanStats;

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what the caller sends)
// ---------------------------------------------------------------------------

/// One log event as exported by the log aggregation service. Unknown fields are silently ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundRecord {
  pub received_at: String,
  #[serde(alias = "app")]
  pub source_name: String,
  #[serde(alias = "process")]
  pub program: String,
  pub message: String,
}

// ---------------------------------------------------------------------------
// Internal normalized types
// ---------------------------------------------------------------------------

/// A raw log entry reduced to what the grouper needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
  pub received_at: DateTime<Utc>,
  pub app: String,
  pub process: String,
  /// Trimmed message text. May span several physical lines.
  pub message: String,
}

impl LogRecord {
  pub fn new(
    received_at: DateTime<Utc>,
    app: impl Into<String>,
    process: impl Into<String>,
    message: impl Into<String>,
  ) -> Self {
    Self {
      received_at,
      app: app.into(),
      process: process.into(),
      message: message.into().trim().to_string(),
    }
  }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Symbolic kind of a classified line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
  Started,
  Processing,
  CsrfFail,
  FilterChainRedirect,
  Redirected,
  Completed,
  ExceptionTrace,
  JobStart,
  JobFinish,
  JobError,
  HerokuAddonInfo,
  HerokuDynoInfo,
  HerokuMemoryStat,
  RouterInfo,
  RouterError,
  ExceptionStart,
  Unknown,
}

impl Kind {
  /// Kinds that always open a fresh episode.
  pub const BOUNDARIES: [Kind; 2] = [Kind::Started, Kind::JobStart];

  pub fn is_boundary(self) -> bool {
    Self::BOUNDARIES.contains(&self)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Started => "started",
      Self::Processing => "processing",
      Self::CsrfFail => "csrf_fail",
      Self::FilterChainRedirect => "filter_chain_redirect",
      Self::Redirected => "redirected",
      Self::Completed => "completed",
      Self::ExceptionTrace => "exception_trace",
      Self::JobStart => "job_start",
      Self::JobFinish => "job_finish",
      Self::JobError => "job_error",
      Self::HerokuAddonInfo => "heroku_addon_info",
      Self::HerokuDynoInfo => "heroku_dyno_info",
      Self::HerokuMemoryStat => "heroku_memory_stat",
      Self::RouterInfo => "router_info",
      Self::RouterError => "router_error",
      Self::ExceptionStart => "exception_start",
      Self::Unknown => "unknown",
    }
  }
}

impl fmt::Display for Kind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Named captures of a successful match. Groups that did not participate are absent.
pub type Captures = HashMap<String, String>;

/// Result of classifying one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
  pub kind: Kind,
  pub captures: Captures,
}

impl Classification {
  pub fn unknown() -> Self {
    Self {
      kind: Kind::Unknown,
      captures: Captures::new(),
    }
  }

  pub fn is_unknown(&self) -> bool {
    self.kind == Kind::Unknown
  }
}

/// A record together with its resolved classification.
#[derive(Debug, Clone)]
pub struct ClassifiedLine {
  pub record: LogRecord,
  pub kind: Kind,
  pub captures: Captures,
}

impl ClassifiedLine {
  pub fn new(record: LogRecord, classification: Classification) -> Self {
    Self {
      record,
      kind: classification.kind,
      captures: classification.captures,
    }
  }

  /// Capture by name; empty captures count as missing.
  pub fn capture(&self, name: &str) -> Option<&str> {
    self
      .captures
      .get(name)
      .map(String::as_str)
      .filter(|v| !v.is_empty())
  }

  pub fn owned_capture(&self, name: &str) -> Option<String> {
    self.capture(name).map(str::to_string)
  }
}

// ---------------------------------------------------------------------------
// Output types (JSON contract: what we emit)
// ---------------------------------------------------------------------------

/// One episode with its derived events, as written by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeReport {
  pub episode_id: String,
  pub app: String,
  pub process: String,
  pub first_seen: String,
  pub last_seen: String,
  pub line_count: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub request: Option<Request>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub response: Option<Response>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exception: Option<ExceptionEvent>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub active_job: Option<ActiveJob>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub debug_info: Option<DebugInfo>,
}

/// Trailer line written once the scan window has been processed.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutput {
  pub summary: ScanStats,
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for invalid input lines.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub line: Option<usize>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
      line: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }

  pub fn at_line(mut self, line: usize) -> Self {
    self.line = Some(line);
    self
  }
}
