//! Event views derived from an episode's classified lines.
//!
//! Every view is a pure function of the lines. A view whose trigger lines
//! are absent is `None`; a trigger line with empty captures yields a view
//! with those fields missing. Nothing here fails.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;

use crate::config::Config;
use crate::error::EngineError;
use crate::types::{ClassifiedLine, Kind};

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Request {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub method: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ip: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub host: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub controller: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub action: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub started_at: Option<DateTime<Utc>>,
}

/// Where a response sent the client, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Redirect {
  /// A before-action halted the chain and redirected.
  FilterChain { by: String },
  /// A plain redirect to a target URL.
  To { url: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Response {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub code: Option<u16>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  /// Milliseconds, as logged.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub redirect: Option<Redirect>,
  pub csrf_failed: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
  pub file: String,
  pub file_parts: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub line: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub method: Option<String>,
  /// First path segment is the application's source root.
  pub internal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExceptionEvent {
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub exception_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub subtype: Option<String>,
  /// Description from a reverse-proxy error line.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub router_error: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub errored_at: Option<DateTime<Utc>>,
  pub backtrace: Vec<Frame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
  Errored,
  Finished,
  #[serde(rename = "In Progress")]
  InProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobError {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exception: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveJob {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub job: Option<String>,
  pub state: JobState,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<JobError>,
  pub backtrace: Vec<Frame>,
}

/// One `sample#key=value` line from a dyno or add-on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSample {
  pub source: String,
  /// Dyno or add-on identifier named on the line.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resource: Option<String>,
  pub fields: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemorySample {
  pub server: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ram_used: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ram_percent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DebugInfo {
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub dynos: Vec<MetricSample>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub addons: Vec<MetricSample>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub memory: Vec<MemorySample>,
}

// ---------------------------------------------------------------------------
// Projector
// ---------------------------------------------------------------------------

/// Router fields that may fill gaps in a request.
const ROUTER_KINDS: [Kind; 2] = [Kind::RouterInfo, Kind::RouterError];

/// Builds event views. Holds the config and the helper regexes, compiled once per engine.
#[derive(Debug, Clone)]
pub struct Projector {
  config: Config,
  subtype: Regex,
  sample: Regex,
}

impl Projector {
  pub fn new(config: Config) -> Result<Self, EngineError> {
    Ok(Self {
      config,
      subtype: Regex::new(r"(?P<subtype>.+): (?P<inner>.+)")?,
      sample: Regex::new(r"sample#(?P<key>[^=]*)=(?P<value>\S*)")?,
    })
  }

  pub fn request(&self, lines: &[ClassifiedLine]) -> Option<Request> {
    let started = first(lines, Kind::Started);
    let processing = first(lines, Kind::Processing);
    if started.is_none() && processing.is_none() {
      return None;
    }

    let mut request = Request::default();
    if let Some(line) = started {
      request.method = line.owned_capture("method");
      request.path = line.owned_capture("path");
      request.ip = line.owned_capture("ip");
      request.started_at = Some(line.record.received_at);
    }
    if let Some(line) = processing {
      request.controller = line.owned_capture("controller");
      request.action = line.owned_capture("action");
    }

    for line in ROUTER_KINDS.iter().filter_map(|k| first(lines, *k)) {
      fill(&mut request.method, line, "method");
      fill(&mut request.path, line, "path");
      fill(&mut request.ip, line, "ip");
      fill(&mut request.host, line, "host");
    }

    Some(request)
  }

  pub fn response(&self, lines: &[ClassifiedLine]) -> Option<Response> {
    let filter_chain = first(lines, Kind::FilterChainRedirect);
    let redirected = first(lines, Kind::Redirected);
    let completed = first(lines, Kind::Completed);
    if filter_chain.is_none() && redirected.is_none() && completed.is_none() {
      return None;
    }

    let mut response = Response {
      csrf_failed: csrf_failed(lines),
      ..Response::default()
    };

    if let Some(line) = completed {
      response.code = line.capture("code").and_then(|c| c.parse().ok());
      response.status = line.owned_capture("status");
      response.duration = line.owned_capture("duration");
      response.completed_at = Some(line.record.received_at);
    }

    response.redirect = filter_chain
      .and_then(|l| l.owned_capture("method"))
      .map(|by| Redirect::FilterChain { by })
      .or_else(|| {
        redirected
          .and_then(|l| l.owned_capture("url"))
          .map(|url| Redirect::To { url })
      });

    for line in ROUTER_KINDS.iter().filter_map(|k| first(lines, *k)) {
      if response.code.is_none() {
        response.code = line.capture("code").and_then(|c| c.parse().ok());
      }
      fill(&mut response.duration, line, "duration");
    }

    Some(response)
  }

  pub fn exception(&self, lines: &[ClassifiedLine]) -> Option<ExceptionEvent> {
    let start = first(lines, Kind::ExceptionStart);
    let router_error = first(lines, Kind::RouterError);
    if start.is_none() && router_error.is_none() {
      return None;
    }

    let mut event = ExceptionEvent {
      router_error: router_error.and_then(|l| l.owned_capture("error_description")),
      backtrace: self.backtrace(lines),
      ..ExceptionEvent::default()
    };

    if let Some(line) = start {
      event.exception_type = line.owned_capture("exception");
      event.errored_at = Some(line.record.received_at);

      let message = line.capture("message");
      match message.and_then(|m| self.subtype.captures(m)) {
        Some(caps) => {
          event.subtype = caps.name("subtype").map(|m| m.as_str().trim().to_string());
          event.message = caps.name("inner").map(|m| m.as_str().trim().to_string());
        }
        None => event.message = message.map(str::to_string),
      }
    }

    Some(event)
  }

  pub fn active_job(&self, lines: &[ClassifiedLine]) -> Option<ActiveJob> {
    let start = first(lines, Kind::JobStart);
    let finish = first(lines, Kind::JobFinish);
    let error = first(lines, Kind::JobError);
    let present = [start, finish, error];
    if present.iter().all(Option::is_none) {
      return None;
    }

    let pick = |name: &str| {
      present
        .iter()
        .flatten()
        .find_map(|line| line.owned_capture(name))
    };

    let state = if error.is_some() {
      JobState::Errored
    } else if finish.is_some() {
      JobState::Finished
    } else {
      JobState::InProgress
    };

    Some(ActiveJob {
      id: pick("id"),
      job: pick("job"),
      state,
      error: error.map(|line| JobError {
        exception: line.owned_capture("exception"),
        message: line.owned_capture("message"),
      }),
      backtrace: self.backtrace(lines),
    })
  }

  pub fn debug_info(&self, lines: &[ClassifiedLine], process: &str) -> Option<DebugInfo> {
    let dynos: Vec<MetricSample> = of_kind(lines, Kind::HerokuDynoInfo)
      .map(|l| self.metric_sample(l, "dyno"))
      .collect();
    let addons: Vec<MetricSample> = of_kind(lines, Kind::HerokuAddonInfo)
      .map(|l| self.metric_sample(l, "addon"))
      .collect();
    if dynos.is_empty() && addons.is_empty() {
      return None;
    }

    let server = process.split_once('/').map_or(process, |(_, rest)| rest);
    let memory = of_kind(lines, Kind::HerokuMemoryStat)
      .map(|l| MemorySample {
        server: server.to_string(),
        ram_used: l.owned_capture("ram_used"),
        ram_percent: l.owned_capture("ram_percent"),
      })
      .collect();

    Some(DebugInfo {
      dynos,
      addons,
      memory,
    })
  }

  fn metric_sample(&self, line: &ClassifiedLine, resource: &str) -> MetricSample {
    let fields = line
      .capture("info")
      .map(|info| self.parse_samples(info))
      .unwrap_or_default();
    MetricSample {
      source: line.owned_capture("source").unwrap_or_default(),
      resource: line.owned_capture(resource),
      fields,
    }
  }

  /// `sample#a=1 sample#b=2` → {a: 1, b: 2}, in line order. Later duplicates win.
  pub fn parse_samples(&self, info: &str) -> IndexMap<String, String> {
    self
      .sample
      .captures_iter(info)
      .filter_map(|c| Some((c.name("key")?.as_str().to_string(), c.name("value")?.as_str().to_string())))
      .collect()
  }

  /// Frames from every trace line in the episode, in order.
  pub fn backtrace(&self, lines: &[ClassifiedLine]) -> Vec<Frame> {
    of_kind(lines, Kind::ExceptionTrace)
      .map(|line| self.frame(line))
      .collect()
  }

  fn frame(&self, line: &ClassifiedLine) -> Frame {
    let file_parts: Vec<String> = line
      .capture("file")
      .unwrap_or_default()
      .split('/')
      .filter(|seg| !seg.is_empty())
      .map(str::to_string)
      .collect();
    let internal = file_parts
      .first()
      .is_some_and(|seg| *seg == self.config.app_root_marker);

    Frame {
      file: file_parts.join("/"),
      line: line.capture("line").and_then(|n| n.parse().ok()),
      method: line.owned_capture("method"),
      internal,
      file_parts,
    }
  }
}

pub fn csrf_failed(lines: &[ClassifiedLine]) -> bool {
  lines.iter().any(|l| l.kind == Kind::CsrfFail)
}

fn of_kind(lines: &[ClassifiedLine], kind: Kind) -> impl Iterator<Item = &ClassifiedLine> {
  lines.iter().filter(move |l| l.kind == kind)
}

fn first(lines: &[ClassifiedLine], kind: Kind) -> Option<&ClassifiedLine> {
  of_kind(lines, kind).next()
}

fn fill(slot: &mut Option<String>, line: &ClassifiedLine, name: &str) {
  if slot.is_none() {
    *slot = line.owned_capture(name);
  }
}
