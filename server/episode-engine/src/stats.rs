//! Per-scan counters: how many lines matched, recovered or stayed unknown.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::grouper::Resolution;
use crate::types::Kind;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
  pub lines: u64,
  /// Lines that matched on their own.
  pub matched: u64,
  /// Lines that completed a multi-line message.
  pub recovered: u64,
  pub unknown: u64,
  pub partitions: u64,
  pub episodes: u64,
  pub by_kind: BTreeMap<Kind, u64>,
}

impl ScanStats {
  /// Count one placed line.
  pub fn record(&mut self, kind: Kind, resolution: Resolution) {
    self.lines += 1;
    match resolution {
      Resolution::Matched => self.matched += 1,
      Resolution::Recovered { .. } => self.recovered += 1,
      Resolution::Unresolved { .. } => self.unknown += 1,
    }
    *self.by_kind.entry(kind).or_insert(0) += 1;
  }

  /// Share of lines that ended up with a known kind, 0.0 for an empty scan.
  pub fn match_rate(&self) -> f64 {
    if self.lines == 0 {
      return 0.0;
    }
    (self.matched + self.recovered) as f64 / self.lines as f64
  }
}
