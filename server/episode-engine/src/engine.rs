//! Core engine: partitions records, runs the groupers, builds episodes.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::classify::Classifier;
use crate::config::Config;
use crate::episode::Episode;
use crate::error::EngineError;
use crate::events::Projector;
use crate::fingerprint;
use crate::grouper::PartitionGrouper;
use crate::normalize;
use crate::patterns::PatternTable;
use crate::stats::ScanStats;
use crate::types::{InboundRecord, LogRecord};

/// Result of one scan window.
#[derive(Debug)]
pub struct Scan {
  /// Partitions in first-appearance order, episodes in arrival order within each.
  pub episodes: Vec<Episode>,
  pub stats: ScanStats,
}

impl Scan {
  /// Episodes that produced at least one event view.
  pub fn with_events(&self) -> impl Iterator<Item = &Episode> {
    self.episodes.iter().filter(|e| e.has_events())
  }
}

/// The episode engine. Holds no state between scans.
#[derive(Debug, Clone)]
pub struct Engine {
  config: Config,
  classifier: Classifier,
  projector: Arc<Projector>,
}

impl Engine {
  pub fn new(config: Config) -> Result<Self, EngineError> {
    Self::with_table(config, PatternTable::standard()?)
  }

  pub fn with_defaults() -> Result<Self, EngineError> {
    Self::new(Config::default())
  }

  /// Engine over a caller-built pattern table.
  pub fn with_table(config: Config, table: PatternTable) -> Result<Self, EngineError> {
    let projector = Arc::new(Projector::new(config.clone())?);
    Ok(Self {
      config,
      classifier: Classifier::new(table),
      projector,
    })
  }

  /// Parse one input line: a JSON record when it starts with `{`, otherwise syslog text.
  pub fn parse_line(&self, line: &str) -> Result<LogRecord, EngineError> {
    let line = line.trim();
    if line.starts_with('{') {
      let raw: InboundRecord = serde_json::from_str(line)?;
      normalize::normalize(&raw, &self.config)
    } else {
      normalize::parse_syslog_line(line, &self.config)
    }
  }

  /// Normalize every record, failing on the first invalid one, then process.
  pub fn compile(&self, raw: &[InboundRecord]) -> Result<Scan, EngineError> {
    let records = raw
      .iter()
      .map(|r| normalize::normalize(r, &self.config))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(self.process(records))
  }

  /// Group one window of records into episodes.
  pub fn process<I>(&self, records: I) -> Scan
  where
    I: IntoIterator<Item = LogRecord>,
  {
    let mut partitions: IndexMap<(String, String), Vec<LogRecord>> = IndexMap::new();
    for record in records {
      partitions
        .entry((record.app.clone(), record.process.clone()))
        .or_default()
        .push(record);
    }

    let mut stats = ScanStats {
      partitions: partitions.len() as u64,
      ..ScanStats::default()
    };
    let mut episodes = Vec::new();

    for ((app, process), records) in partitions {
      let mut grouper = PartitionGrouper::new(&self.classifier, self.config.max_stash_lines);
      for record in records {
        let resolution = grouper.push(record);
        if let Some(kind) = grouper.last_kind() {
          stats.record(kind, resolution);
        }
      }
      if !grouper.pending().is_empty() {
        debug!(%app, %process, pending = grouper.pending().len(), "unresolved lines at end of window");
      }

      for (index, lines) in grouper.finish().into_iter().enumerate() {
        let Some(first_seen) = lines.first().map(|l| l.record.received_at) else {
          continue;
        };
        let id = fingerprint::episode_id(&app, &process, &first_seen, index, self.config.episode_id_len);
        episodes.push(Episode::new(id, app.as_str(), process.as_str(), lines, Arc::clone(&self.projector)));
      }
    }

    stats.episodes = episodes.len() as u64;
    info!(
      lines = stats.lines,
      matched = stats.matched,
      recovered = stats.recovered,
      unknown = stats.unknown,
      partitions = stats.partitions,
      episodes = stats.episodes,
      match_rate = stats.match_rate(),
      "scan complete"
    );

    Scan { episodes, stats }
  }
}
