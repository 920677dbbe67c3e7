//! Episode Engine: deterministic log line classification and grouping.
//!
//! Classifies application, proxy, job and platform log lines against an
//! ordered pattern table, groups them per (app, process) into episodes
//! (recovering messages split across several lines), and exposes each
//! episode as request / response / exception / job / debug views.
//!
//! No DB, no network; pure computation over one window of records.

pub mod classify;
pub mod config;
pub mod engine;
pub mod episode;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod grouper;
pub mod normalize;
pub mod patterns;
pub mod stats;
pub mod types;

pub use classify::Classifier;
pub use config::Config;
pub use engine::{Engine, Scan};
pub use episode::Episode;
pub use error::EngineError;
pub use patterns::PatternTable;
pub use types::{InboundRecord, Kind, LogRecord};
