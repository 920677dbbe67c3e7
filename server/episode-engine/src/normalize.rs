//! Normalize inbound records (JSON export or syslog text) into `LogRecord`s.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};

use crate::config::Config;
use crate::error::EngineError;
use crate::types::{InboundRecord, LogRecord};

/// Width of the `Nov 21 14:15:00` prefix on syslog lines.
const SYSLOG_STAMP_LEN: usize = 15;

/// Validate an inbound record and reduce it to a `LogRecord`.
pub fn normalize(raw: &InboundRecord, config: &Config) -> Result<LogRecord, EngineError> {
  let received_at: DateTime<Utc> = DateTime::parse_from_rfc3339(raw.received_at.trim())
    .map_err(|e| EngineError::validation("received_at", &format!("invalid RFC3339: {}", e)))?
    .with_timezone(&Utc);

  if raw.source_name.trim().is_empty() {
    return Err(EngineError::validation("source_name", "must not be empty"));
  }
  if raw.program.trim().is_empty() {
    return Err(EngineError::validation("program", "must not be empty"));
  }

  Ok(build(
    received_at,
    raw.source_name.trim(),
    raw.program.trim(),
    &raw.message,
    config,
  ))
}

/// Parse one `Mon DD HH:MM:SS app program: message` line.
pub fn parse_syslog_line(line: &str, config: &Config) -> Result<LogRecord, EngineError> {
  let stamp = line
    .get(..SYSLOG_STAMP_LEN)
    .filter(|s| s.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == ':'))
    .ok_or_else(|| EngineError::parse("syslog line: missing timestamp"))?;

  let year = config.syslog_year.unwrap_or_else(|| Utc::now().year());
  let received_at = NaiveDateTime::parse_from_str(&format!("{} {}", year, stamp), "%Y %b %e %H:%M:%S")
    .map_err(|e| EngineError::parse(format!("syslog line: bad timestamp {:?}: {}", stamp, e)))?
    .and_utc();

  let rest = line[SYSLOG_STAMP_LEN..]
    .strip_prefix(' ')
    .ok_or_else(|| EngineError::parse("syslog line: missing app"))?;
  let (app, rest) = rest
    .split_once(' ')
    .filter(|(app, _)| !app.is_empty())
    .ok_or_else(|| EngineError::parse("syslog line: missing app"))?;
  let (program, message) = rest
    .split_once(": ")
    .filter(|(program, _)| !program.is_empty() && !program.contains(':'))
    .ok_or_else(|| EngineError::parse("syslog line: missing program"))?;

  Ok(build(received_at, app, program, message, config))
}

fn build(
  received_at: DateTime<Utc>,
  app: &str,
  program: &str,
  message: &str,
  config: &Config,
) -> LogRecord {
  let process = router_process(program, message, config).unwrap_or_else(|| program.to_string());
  LogRecord::new(received_at, app, process, message)
}

/// Proxy lines are filed under the dyno that served them, so they land in
/// the same partition as that dyno's application lines.
fn router_process(program: &str, message: &str, config: &Config) -> Option<String> {
  if program != config.router_program {
    return None;
  }
  let dyno = message
    .split_whitespace()
    .find_map(|token| token.strip_prefix("dyno="))
    .filter(|d| !d.is_empty())?;
  Some(format!("{}{}", config.router_process_prefix, dyno))
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn inbound(received_at: &str, app: &str, program: &str, message: &str) -> InboundRecord {
    InboundRecord {
      received_at: received_at.into(),
      source_name: app.into(),
      program: program.into(),
      message: message.into(),
    }
  }

  #[test]
  fn valid_record_normalizes() {
    let r = normalize(
      &inbound("2018-11-21T14:14:52+11:00", "cohortflow", "app/web.1", "  Completed 200 OK in 3ms "),
      &Config::default(),
    )
    .unwrap();
    assert_eq!(r.received_at, Utc.with_ymd_and_hms(2018, 11, 21, 3, 14, 52).unwrap());
    assert_eq!(r.app, "cohortflow");
    assert_eq!(r.process, "app/web.1");
    assert_eq!(r.message, "Completed 200 OK in 3ms");
  }

  #[test]
  fn bad_timestamp_names_the_field() {
    let err = normalize(&inbound("yesterday", "a", "p", "m"), &Config::default()).unwrap_err();
    match err {
      EngineError::Validation { field, .. } => assert_eq!(field, "received_at"),
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn empty_app_or_program_rejected() {
    let cfg = Config::default();
    assert!(normalize(&inbound("2018-11-21T14:14:52Z", "", "p", "m"), &cfg).is_err());
    assert!(normalize(&inbound("2018-11-21T14:14:52Z", "a", " ", "m"), &cfg).is_err());
  }

  #[test]
  fn empty_message_is_allowed() {
    let r = normalize(&inbound("2018-11-21T14:14:52Z", "a", "p", ""), &Config::default()).unwrap();
    assert_eq!(r.message, "");
  }

  #[test]
  fn router_record_moves_to_its_dyno() {
    let r = normalize(
      &inbound(
        "2018-11-21T14:14:52Z",
        "cohortflow",
        "heroku/router",
        r#"at=info method=GET path="/" host=cohortflow.com request_id=1 fwd="1.2.3.4" dyno=web.4 connect=0ms service=17ms status=200 bytes=912 protocol=https"#,
      ),
      &Config::default(),
    )
    .unwrap();
    assert_eq!(r.process, "app/web.4");
  }

  #[test]
  fn router_record_without_dyno_keeps_program() {
    let r = normalize(
      &inbound("2018-11-21T14:14:52Z", "cohortflow", "heroku/router", "at=info sock=client"),
      &Config::default(),
    )
    .unwrap();
    assert_eq!(r.process, "heroku/router");
  }

  #[test]
  fn dyno_field_outside_router_is_ignored() {
    let r = normalize(
      &inbound(
        "2018-11-21T14:14:52Z",
        "cohortflow",
        "heroku/web.2",
        "source=web.2 dyno=heroku.27066801.eb55 sample#load_avg_1m=0.01",
      ),
      &Config::default(),
    )
    .unwrap();
    assert_eq!(r.process, "heroku/web.2");
  }

  #[test]
  fn syslog_line_parses() {
    let cfg = Config {
      syslog_year: Some(2018),
      ..Config::default()
    };
    let r = parse_syslog_line(
      "Nov 21 14:15:00 cohortflow app/web.1: Completed 200 OK in 10ms (Views: 0.3ms)",
      &cfg,
    )
    .unwrap();
    assert_eq!(r.received_at, Utc.with_ymd_and_hms(2018, 11, 21, 14, 15, 0).unwrap());
    assert_eq!(r.app, "cohortflow");
    assert_eq!(r.process, "app/web.1");
    assert_eq!(r.message, "Completed 200 OK in 10ms (Views: 0.3ms)");
  }

  #[test]
  fn syslog_router_line_is_rewritten() {
    let cfg = Config {
      syslog_year: Some(2018),
      ..Config::default()
    };
    let r = parse_syslog_line(
      r#"Nov 21 14:15:00 cohortflow heroku/router: at=info method=GET path="/x" host=cohortflow.com request_id=7c16 fwd="139.194.38.153" dyno=web.4 connect=0ms service=17ms status=200 bytes=912 protocol=https"#,
      &cfg,
    )
    .unwrap();
    assert_eq!(r.process, "app/web.4");
  }

  #[test]
  fn syslog_garbage_is_a_parse_error() {
    let cfg = Config::default();
    assert!(matches!(
      parse_syslog_line("hello", &cfg),
      Err(EngineError::Parse(_))
    ));
    assert!(matches!(
      parse_syslog_line("Nov 21 14:15:00 cohortflow", &cfg),
      Err(EngineError::Parse(_))
    ));
    assert!(matches!(
      parse_syslog_line("Xyz 99 14:15:00 cohortflow app/web.1: hi", &cfg),
      Err(EngineError::Parse(_))
    ));
  }
}
