//! A closed episode and its lazily built event views.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;

use crate::events::{self, ActiveJob, DebugInfo, ExceptionEvent, Projector, Request, Response};
use crate::types::{ClassifiedLine, EpisodeReport, Kind};

/// An ordered run of classified lines from one (app, process) partition.
///
/// Lines are fixed at construction. Each view is computed on first access
/// and cached; later calls return the same value.
#[derive(Debug)]
pub struct Episode {
  id: String,
  app: String,
  process: String,
  lines: Vec<ClassifiedLine>,
  projector: Arc<Projector>,
  request: OnceCell<Option<Request>>,
  response: OnceCell<Option<Response>>,
  exception: OnceCell<Option<ExceptionEvent>>,
  active_job: OnceCell<Option<ActiveJob>>,
  debug_info: OnceCell<Option<DebugInfo>>,
}

impl Episode {
  pub fn new(
    id: String,
    app: impl Into<String>,
    process: impl Into<String>,
    lines: Vec<ClassifiedLine>,
    projector: Arc<Projector>,
  ) -> Self {
    Self {
      id,
      app: app.into(),
      process: process.into(),
      lines,
      projector,
      request: OnceCell::new(),
      response: OnceCell::new(),
      exception: OnceCell::new(),
      active_job: OnceCell::new(),
      debug_info: OnceCell::new(),
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn app(&self) -> &str {
    &self.app
  }

  pub fn process(&self) -> &str {
    &self.process
  }

  pub fn lines(&self) -> &[ClassifiedLine] {
    &self.lines
  }

  /// Lines of one kind, in episode order.
  pub fn lines_for(&self, kind: Kind) -> impl Iterator<Item = &ClassifiedLine> {
    self.lines.iter().filter(move |l| l.kind == kind)
  }

  pub fn first_seen(&self) -> Option<DateTime<Utc>> {
    self.lines.first().map(|l| l.record.received_at)
  }

  pub fn last_seen(&self) -> Option<DateTime<Utc>> {
    self.lines.last().map(|l| l.record.received_at)
  }

  pub fn request(&self) -> Option<&Request> {
    self
      .request
      .get_or_init(|| self.projector.request(&self.lines))
      .as_ref()
  }

  pub fn response(&self) -> Option<&Response> {
    self
      .response
      .get_or_init(|| self.projector.response(&self.lines))
      .as_ref()
  }

  pub fn exception(&self) -> Option<&ExceptionEvent> {
    self
      .exception
      .get_or_init(|| self.projector.exception(&self.lines))
      .as_ref()
  }

  pub fn active_job(&self) -> Option<&ActiveJob> {
    self
      .active_job
      .get_or_init(|| self.projector.active_job(&self.lines))
      .as_ref()
  }

  pub fn debug_info(&self) -> Option<&DebugInfo> {
    self
      .debug_info
      .get_or_init(|| self.projector.debug_info(&self.lines, &self.process))
      .as_ref()
  }

  pub fn csrf_failed(&self) -> bool {
    events::csrf_failed(&self.lines)
  }

  /// True when at least one view is present.
  pub fn has_events(&self) -> bool {
    self.request().is_some()
      || self.response().is_some()
      || self.exception().is_some()
      || self.active_job().is_some()
      || self.debug_info().is_some()
  }

  pub fn report(&self) -> EpisodeReport {
    let stamp = |t: Option<DateTime<Utc>>| t.map(|t| t.to_rfc3339()).unwrap_or_default();
    EpisodeReport {
      episode_id: self.id.clone(),
      app: self.app.clone(),
      process: self.process.clone(),
      first_seen: stamp(self.first_seen()),
      last_seen: stamp(self.last_seen()),
      line_count: self.lines.len(),
      request: self.request().cloned(),
      response: self.response().cloned(),
      exception: self.exception().cloned(),
      active_job: self.active_job().cloned(),
      debug_info: self.debug_info().cloned(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::classify::Classifier;
  use crate::config::Config;
  use crate::types::LogRecord;
  use chrono::TimeZone;

  fn episode(msgs: &[&str]) -> Episode {
    let cl = Classifier::standard().unwrap();
    let lines = msgs
      .iter()
      .enumerate()
      .map(|(i, m)| {
        let at = Utc.with_ymd_and_hms(2018, 11, 21, 14, 15, i as u32).unwrap();
        let record = LogRecord::new(at, "cohortflow", "app/web.1", *m);
        let c = cl.classify(&record.message);
        ClassifiedLine::new(record, c)
      })
      .collect();
    let projector = Arc::new(Projector::new(Config::default()).unwrap());
    Episode::new("ep-test".into(), "cohortflow", "app/web.1", lines, projector)
  }

  #[test]
  fn views_are_memoized() {
    let ep = episode(&[r#"Started GET "/x" for 1.2.3.4"#, "Completed 200 OK in 10ms"]);
    let first = ep.request().unwrap() as *const Request;
    let second = ep.request().unwrap() as *const Request;
    assert_eq!(first, second);
    assert_eq!(ep.response().unwrap().code, Some(200));
  }

  #[test]
  fn unknown_only_episode_has_no_events() {
    let ep = episode(&[r#"Parameters: {"locale"=>"en"}"#]);
    assert!(!ep.has_events());
    assert!(!ep.csrf_failed());
    let report = ep.report();
    assert!(report.request.is_none() && report.debug_info.is_none());
    assert_eq!(report.line_count, 1);
  }

  #[test]
  fn report_carries_bounds_and_views() {
    let ep = episode(&[
      r#"Started GET "/x" for 1.2.3.4"#,
      "Processing by FooController#bar as JSON",
      "Completed 200 OK in 10ms",
    ]);
    let report = ep.report();
    assert_eq!(report.episode_id, "ep-test");
    assert_eq!(report.first_seen, "2018-11-21T14:15:00+00:00");
    assert_eq!(report.last_seen, "2018-11-21T14:15:02+00:00");
    assert!(report.request.is_some());
    assert!(report.exception.is_none());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["request"]["controller"], "FooController");
    assert!(json.get("exception").is_none());
  }

  #[test]
  fn lines_for_filters_by_kind() {
    let ep = episode(&[
      "Wrapper (Foo: bar):",
      "app/a.rb:1:in `x'",
      "app/b.rb:2:in `y'",
    ]);
    assert_eq!(ep.lines_for(Kind::ExceptionTrace).count(), 2);
    assert_eq!(ep.exception().unwrap().backtrace.len(), 2);
  }

  #[test]
  fn episode_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Episode>();
  }
}
