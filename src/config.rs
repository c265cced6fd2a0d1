//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, state::boundary::DEFAULT_INTERVAL_SECS};

/// Which value the rendered label shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LabelMode {
    /// Count down towards zero
    #[default]
    Remaining,
    /// Count up from zero
    Elapsed,
}

/// Notification backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum NotifierKind {
    /// Write notifications to the log
    #[default]
    Log,
    /// Show desktop notifications through notify-send
    Desktop,
}

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "interval-timer")]
#[command(about = "A drift-compensated interval-training timer with an HTTP control surface")]
#[command(version = "1.0.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Length of one work/rest phase in seconds
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_SECS)]
    pub interval_secs: u64,

    /// Shortest session that can be started, in minutes
    #[arg(long, default_value = "5")]
    pub min_minutes: u64,

    /// Longest session that can be started, in minutes
    #[arg(long, default_value = "120")]
    pub max_minutes: u64,

    /// Render frames per second for the time label
    #[arg(long, default_value = "60")]
    pub fps: u32,

    /// What the time label counts
    #[arg(long, value_enum, default_value_t = LabelMode::Remaining)]
    pub label_mode: LabelMode,

    /// File used to persist the session across restarts (in-memory if unset)
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Notification backend
    #[arg(long, value_enum, default_value_t = NotifierKind::Log)]
    pub notifier: NotifierKind,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Engine settings carried by this configuration
    pub fn engine(&self) -> Result<EngineConfig, ConfigError> {
        let engine = EngineConfig {
            interval_secs: self.interval_secs.max(1),
            min_minutes: self.min_minutes,
            max_minutes: self.max_minutes,
            frames_per_second: self.fps.max(1),
            label_mode: self.label_mode,
        };
        engine.validate()?;
        Ok(engine)
    }
}

/// Settings consumed by the timer engine itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub interval_secs: u64,
    pub min_minutes: u64,
    pub max_minutes: u64,
    pub frames_per_second: u32,
    pub label_mode: LabelMode,
}

impl EngineConfig {
    /// Check that every duration in the session range is representable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_minutes == 0 {
            return Err(ConfigError::ZeroMinimum);
        }
        if self.min_minutes > self.max_minutes {
            return Err(ConfigError::InvertedRange {
                min: self.min_minutes,
                max: self.max_minutes,
            });
        }
        if self.max_minutes.checked_mul(60_000).is_none() {
            return Err(ConfigError::MaximumTooLarge(self.max_minutes));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            min_minutes: 5,
            max_minutes: 120,
            frames_per_second: 60,
            label_mode: LabelMode::Remaining,
        }
    }
}
