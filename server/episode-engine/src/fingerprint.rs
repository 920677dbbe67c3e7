//! Stable episode identifiers.

use chrono::{DateTime, Utc};

/// Id for the `index`-th episode of an (app, process) partition.
///
/// Hashes the partition key, the first line's timestamp and the index with
/// blake3, so re-running the same input yields the same ids. `len` hex chars
/// are kept (clamped to 8..=64).
pub fn episode_id(
  app: &str,
  process: &str,
  first_seen: &DateTime<Utc>,
  index: usize,
  len: usize,
) -> String {
  let mut hasher = blake3::Hasher::new();
  hasher.update(app.as_bytes());
  hasher.update(b"|");
  hasher.update(process.as_bytes());
  hasher.update(b"|");
  hasher.update(first_seen.to_rfc3339().as_bytes());
  hasher.update(b"|");
  hasher.update(&(index as u64).to_le_bytes());

  let hex = hasher.finalize().to_hex();
  let len = len.clamp(8, hex.len());
  format!("ep-{}", &hex[..len])
}
