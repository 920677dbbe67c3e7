//! Ordered pattern table: (kind, regex) pairs checked top to bottom.
//!
//! Order is load-bearing. A general pattern placed above a specific one
//! silently steals its matches, which is why `exception_start` (it matches
//! almost anything ending in `(...):`) sits at the very bottom.

use regex::Regex;

use crate::error::EngineError;
use crate::types::Kind;

/// Built-in entries, most specific first.
const STANDARD: &[(Kind, &str)] = &[
  (
    Kind::Started,
    r#"Started (?P<method>.+) "(?P<path>.+)" for (?P<ip>\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})"#,
  ),
  (Kind::Processing, r"Processing by (?P<controller>.+)#(?P<action>.+) as"),
  (Kind::CsrfFail, r"Can't verify CSRF token authenticity"),
  (
    Kind::FilterChainRedirect,
    r"Filter chain halted as (?P<method>\S+) rendered or redirected",
  ),
  (Kind::Redirected, r"Redirected to (?P<url>.*)"),
  (
    Kind::Completed,
    r"Completed (?P<code>\d{3}) (?P<status>.+) in (?P<duration>[\d\.,]+)ms",
  ),
  (
    Kind::ExceptionTrace,
    r"(?P<file>[^:\s]+):(?P<line>\d+):in `(?P<method>.+)'\z",
  ),
  (
    Kind::JobStart,
    r"\[ActiveJob\] \[(?P<job>[^\]]+)\] \[(?P<id>[^\]]+)\] Performing ",
  ),
  (
    Kind::JobFinish,
    r"\[ActiveJob\] \[(?P<job>[^\]]+)\] \[(?P<id>[^\]]+)\] Performed ",
  ),
  (
    Kind::JobError,
    r"\[ActiveJob\] \[(?P<job>[^\]]+)\] \[(?P<id>[^\]]+)\] Error performing .* [\d\.]+ms: (?P<exception>\S+) \((?P<message>.+)\):\z",
  ),
  (
    Kind::HerokuAddonInfo,
    r"source=(?P<source>\S+) addon=(?P<addon>\S+) (?P<info>(?:sample#\S+=\S+\s?)*)\z",
  ),
  (
    Kind::HerokuDynoInfo,
    r"source=(?P<source>\S+) dyno=(?P<dyno>\S+) (?P<info>(?:sample#\S+=\S+\s?)*)\z",
  ),
  (
    Kind::HerokuMemoryStat,
    r"Process running mem=(?P<ram_used>.+)\((?P<ram_percent>[\d\.]+)%\)",
  ),
  (
    Kind::RouterInfo,
    r#"at=info method=(?P<method>\S+) path="(?P<path>[^"]+)" host=(?P<host>\S+) request_id=.* fwd="(?P<ip>[^"]+)" dyno=(?P<dyno>\S+) connect=\d+ms service=(?P<duration>[\d\.,]+)ms status=(?P<code>\d+)"#,
  ),
  (
    Kind::RouterError,
    r#"at=error code=(?P<error_code>\S+) desc="(?P<error_description>[^"]+)" method=(?P<method>\S+) path="(?P<path>[^"]+)" host=(?P<host>\S+) request_id=.* fwd="(?P<ip>[^"]+)" dyno=(?P<dyno>\S+) connect=\d+ms service=(?P<duration>[\d\.,]+)ms status=(?P<code>\d+)"#,
  ),
  (
    Kind::ExceptionStart,
    r"(?s)(?P<exception>\S+) \((?P<message>.+)\):\z",
  ),
];

/// One named pattern.
#[derive(Debug, Clone)]
pub struct PatternEntry {
  pub kind: Kind,
  pub regex: Regex,
}

impl PatternEntry {
  pub fn new(kind: Kind, pattern: &str) -> Result<Self, EngineError> {
    if kind == Kind::Unknown {
      return Err(EngineError::validation(
        "kind",
        "`unknown` is reserved for unmatched lines",
      ));
    }
    Ok(Self {
      kind,
      regex: Regex::new(pattern)?,
    })
  }
}

/// Immutable once handed to a `Classifier`; extend it before that.
#[derive(Debug, Clone, Default)]
pub struct PatternTable {
  entries: Vec<PatternEntry>,
}

impl PatternTable {
  pub fn empty() -> Self {
    Self::default()
  }

  /// The built-in table covering web, proxy, job and platform metric lines.
  pub fn standard() -> Result<Self, EngineError> {
    let entries = STANDARD
      .iter()
      .map(|(kind, pattern)| PatternEntry::new(*kind, pattern))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self { entries })
  }

  /// Append an entry at the lowest priority.
  pub fn push(mut self, kind: Kind, pattern: &str) -> Result<Self, EngineError> {
    self.entries.push(PatternEntry::new(kind, pattern)?);
    Ok(self)
  }

  /// Insert an entry directly above the first existing entry of `before`.
  /// Falls back to appending when `before` is not in the table.
  pub fn insert_before(
    mut self,
    before: Kind,
    kind: Kind,
    pattern: &str,
  ) -> Result<Self, EngineError> {
    let entry = PatternEntry::new(kind, pattern)?;
    match self.entries.iter().position(|e| e.kind == before) {
      Some(idx) => self.entries.insert(idx, entry),
      None => self.entries.push(entry),
    }
    Ok(self)
  }

  pub fn entries(&self) -> &[PatternEntry] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
