//! Line classification against an ordered pattern table.

use crate::error::EngineError;
use crate::patterns::PatternTable;
use crate::types::{Captures, Classification};

/// Applies a pattern table to message texts. First match wins.
#[derive(Debug, Clone)]
pub struct Classifier {
  table: PatternTable,
}

impl Classifier {
  pub fn new(table: PatternTable) -> Self {
    Self { table }
  }

  pub fn standard() -> Result<Self, EngineError> {
    Ok(Self::new(PatternTable::standard()?))
  }

  /// Classify one text. Total: an unmatched text yields `Kind::Unknown` with no captures.
  pub fn classify(&self, text: &str) -> Classification {
    for entry in self.table.entries() {
      let Some(caps) = entry.regex.captures(text) else {
        continue;
      };

      let captures: Captures = entry
        .regex
        .capture_names()
        .flatten()
        .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
        .collect();

      return Classification {
        kind: entry.kind,
        captures,
      };
    }

    Classification::unknown()
  }
}
