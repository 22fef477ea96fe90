//! Structured logging for the collision subsystem.
//!
//! `tracing` events are emitted throughout the crate (map open, tile decode,
//! dropped records, watcher invalidations). Hosts that already install a
//! subscriber can ignore this module; standalone tools call `init_tracing`
//! once at startup.
//!
//! ```text
//! RUST_LOG set?  ── yes ──► EnvFilter from RUST_LOG
//!      │
//!      no
//!      ▼
//! TracingConfig::to_env_filter_string()
//!   "info,collision_core::cache=info,collision_core::format=warn,..."
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

pub const ENV_LOG_LEVEL: &str = "COLLISION_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub default_level: LogLevel,
    pub module_filters: Vec<(String, LogLevel)>,
    pub show_thread_ids: bool,
    pub show_targets: bool,
    pub show_file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            module_filters: vec![
                ("collision_core::cache".to_string(), LogLevel::Info),
                ("collision_core::format".to_string(), LogLevel::Warn),
                ("collision_core::index".to_string(), LogLevel::Info),
                ("collision_core::watch".to_string(), LogLevel::Info),
            ],
            show_thread_ids: false,
            show_targets: true,
            show_file_line: false,
        }
    }
}

impl TracingConfig {
    /// Default config with `COLLISION_LOG_LEVEL` applied as the base level.
    /// An unrecognised value leaves the default in place.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(level) = std::env::var(ENV_LOG_LEVEL)
            .ok()
            .and_then(|raw| raw.parse().ok())
        {
            config.default_level = level;
        }
        config
    }

    pub fn to_env_filter_string(&self) -> String {
        let mut parts = vec![self.default_level.as_str().to_string()];
        for (module, level) in &self.module_filters {
            parts.push(format!("{}={}", module, level.as_str()));
        }
        parts.join(",")
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

static TRACING_INIT: Once = Once::new();

pub fn init_tracing_default() {
    init_tracing(&TracingConfig::from_env());
}

/// Install the global fmt subscriber. First call wins; later calls and an
/// already installed subscriber are both ignored.
pub fn init_tracing(config: &TracingConfig) {
    let config = config.clone();
    TRACING_INIT.call_once(move || {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.to_env_filter_string()));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.show_targets)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .compact();

        let _ = subscriber.try_init();
    });
}

/// Entered span around a query or batch; its close is timed by the subscriber
pub struct TimingSpan {
    _span: tracing::span::EnteredSpan,
}

impl TimingSpan {
    pub fn new(name: &str) -> Self {
        let span = tracing::info_span!("collision_op", name = name);
        Self {
            _span: span.entered(),
        }
    }
}
