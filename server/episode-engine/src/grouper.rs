//! Per-partition grouping of classified lines into episodes.
//!
//! A partition is every record sharing one (app, process) key, in arrival
//! order. The grouper keeps two pieces of state: a stash of unmatched message
//! texts, retried as one newline-joined text to recover multi-line messages,
//! and the episode currently being filled.

use tracing::debug;

use crate::classify::Classifier;
use crate::types::{Classification, ClassifiedLine, Kind, LogRecord};

/// How a pushed line got its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
  /// The line matched on its own.
  Matched,
  /// The line completed a multi-line message; `folded` earlier stashed lines were consumed.
  Recovered { folded: usize },
  /// Still unknown; the stash now holds `pending` texts.
  Unresolved { pending: usize },
}

/// Stash-and-retry state machine for one (app, process) partition.
pub struct PartitionGrouper<'c> {
  classifier: &'c Classifier,
  max_stash: usize,
  stash: Vec<String>,
  current: Option<Vec<ClassifiedLine>>,
  closed: Vec<Vec<ClassifiedLine>>,
}

impl<'c> PartitionGrouper<'c> {
  /// `max_stash` bounds the retry window in physical lines (at least one).
  pub fn new(classifier: &'c Classifier, max_stash: usize) -> Self {
    Self {
      classifier,
      max_stash: max_stash.max(1),
      stash: Vec::new(),
      current: None,
      closed: Vec::new(),
    }
  }

  /// Classify and place one record.
  pub fn push(&mut self, record: LogRecord) -> Resolution {
    let (classification, resolution) = self.resolve(&record.message);

    if classification.kind.is_boundary() {
      self.close_current();
    }

    if let Some(last) = self.current.as_ref().and_then(|lines| lines.last()) {
      if record.received_at < last.record.received_at {
        debug!(
          app = %record.app,
          process = %record.process,
          "record received out of order; keeping arrival order"
        );
      }
    }

    self
      .current
      .get_or_insert_with(Vec::new)
      .push(ClassifiedLine::new(record, classification));

    resolution
  }

  fn resolve(&mut self, message: &str) -> (Classification, Resolution) {
    let direct = self.classifier.classify(message);
    if !direct.is_unknown() {
      // A clean match abandons whatever never resolved.
      self.stash.clear();
      return (direct, Resolution::Matched);
    }

    if self.stash.len() >= self.max_stash {
      self.stash.remove(0);
    }
    self.stash.push(message.to_string());
    let retried = self.classifier.classify(&self.stash.join("\n"));
    if retried.is_unknown() {
      return (
        retried,
        Resolution::Unresolved {
          pending: self.stash.len(),
        },
      );
    }

    let folded = self.stash.len() - 1;
    self.stash.clear();
    debug!(kind = %retried.kind, folded, "recovered multi-line message");
    (retried, Resolution::Recovered { folded })
  }

  fn close_current(&mut self) {
    if let Some(lines) = self.current.take() {
      self.closed.push(lines);
    }
  }

  /// Kind of the most recently placed line.
  pub fn last_kind(&self) -> Option<Kind> {
    self
      .current
      .as_ref()
      .and_then(|lines| lines.last())
      .map(|line| line.kind)
  }

  /// Texts waiting for a multi-line retry.
  pub fn pending(&self) -> &[String] {
    &self.stash
  }

  /// Close the window and return the episodes in order.
  pub fn finish(mut self) -> Vec<Vec<ClassifiedLine>> {
    self.close_current();
    self.closed
  }
}
