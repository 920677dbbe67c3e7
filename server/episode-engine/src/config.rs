//! Engine configuration with sane defaults.

/// Tunables for normalization and the event projections.
#[derive(Debug, Clone)]
pub struct Config {
  /// First path segment that marks a backtrace frame as application code.
  pub app_root_marker: String,
  /// Program name the reverse proxy logs under.
  pub router_program: String,
  /// Prefix applied to a proxy line's `dyno=` value when rewriting its process.
  pub router_process_prefix: String,
  /// Year for syslog-style timestamps, which carry none. `None` = current UTC year.
  pub syslog_year: Option<i32>,
  /// Hex chars of the blake3 digest kept in episode ids.
  pub episode_id_len: usize,
  /// Most unmatched physical lines retried together as one message. The oldest is dropped first.
  pub max_stash_lines: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      app_root_marker: "app".to_string(),
      router_program: "heroku/router".to_string(),
      router_process_prefix: "app/".to_string(),
      syslog_year: None,
      episode_id_len: 16,
      max_stash_lines: 64,
    }
  }
}
