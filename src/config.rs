use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use thiserror::Error;
use crate::acquisition::{ChannelIdentifier, EmitMode, LineFormat, SessionSettings};
use crate::recorder::Persistence;
/// One simulated sample per hour at the slowest.
const MAX_SIM_PERIOD_MS: u64 = 3_600_000;
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
/// Where lines come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Serial,
    /// In-process stand-in for the sensor board; no hardware needed.
    Simulated,
}
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub port: String,
    pub baud_rate: u32,
    pub identifier1: String,
    pub identifier2: String,
    pub csv_path: PathBuf,
    /// Seconds between plot refreshes.
    pub pacing_interval: f64,
    pub persistence: Persistence,
    pub emit_mode: EmitMode,
    pub history_limit: Option<usize>,
    pub line_format: LineFormat,
    pub read_timeout_ms: u64,
    pub source: SourceKind,
    pub sim_period_ms: u64,
    pub sim_seed: Option<u64>,
    pub plot_window_secs: f64,
    /// PNG written with the final plot when a session closes. Defaults to
    /// `csv_path` with a `.png` extension.
    pub plot_path: Option<PathBuf>,
    /// Set to false to skip the final PNG altogether.
    pub save_plot: bool,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            port: "COM4".to_string(),
            baud_rate: 9600,
            identifier1: "A2:".to_string(),
            identifier2: "A3:".to_string(),
            csv_path: PathBuf::from("sensor_data.csv"),
            pacing_interval: 1.0,
            persistence: Persistence::Append,
            emit_mode: EmitMode::History,
            history_limit: None,
            line_format: LineFormat::Single,
            read_timeout_ms: 100,
            source: SourceKind::Serial,
            sim_period_ms: 1000,
            sim_seed: None,
            plot_window_secs: 60.0,
            plot_path: None,
            save_plot: true,
        }
    }
}
impl Config {
    /// Reads a TOML file, or JSON when the extension is `.json`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&text)?)
        } else {
            Self::from_toml_str(&text)
        }
    }
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.identifier1.is_empty() || self.identifier2.is_empty() {
            return invalid("identifier1 and identifier2 must not be empty".into());
        }
        if self.identifier1 == self.identifier2 {
            return invalid(format!(
                "identifier1 and identifier2 must differ (both {:?})",
                self.identifier1
            ));
        }
        if self.baud_rate == 0 {
            return invalid("baud_rate must be greater than zero".into());
        }
        if Duration::try_from_secs_f64(self.pacing_interval).is_err() {
            return invalid(format!(
                "pacing_interval must be a non-negative number of seconds, got {}",
                self.pacing_interval
            ));
        }
        if self.history_limit == Some(0) {
            return invalid("history_limit must be at least 1 when set".into());
        }
        if self.read_timeout_ms == 0 {
            return invalid("read_timeout_ms must be greater than zero".into());
        }
        if !self.plot_window_secs.is_finite() || self.plot_window_secs <= 0.0 {
            return invalid("plot_window_secs must be positive".into());
        }
        if self.sim_period_ms > MAX_SIM_PERIOD_MS {
            return invalid(format!(
                "sim_period_ms must be at most {MAX_SIM_PERIOD_MS}, got {}",
                self.sim_period_ms
            ));
        }
        Ok(())
    }
    pub fn identifiers(&self) -> [ChannelIdentifier; 2] {
        [
            ChannelIdentifier::new(self.identifier1.clone()),
            ChannelIdentifier::new(self.identifier2.clone()),
        ]
    }
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            identifiers: self.identifiers(),
            line_format: self.line_format,
            emit_mode: self.emit_mode,
            history_limit: self.history_limit,
            persistence: self.persistence,
            csv_path: self.csv_path.clone(),
        }
    }
    pub fn final_plot_path(&self) -> Option<PathBuf> {
        if !self.save_plot {
            return None;
        }
        Some(
            self.plot_path
                .clone()
                .unwrap_or_else(|| self.csv_path.with_extension("png")),
        )
    }
    /// Zero (render every batch) when `pacing_interval` has not been validated.
    pub fn pacing(&self) -> Duration {
        Duration::try_from_secs_f64(self.pacing_interval).unwrap_or_default()
    }
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
    pub fn sim_period(&self) -> Duration {
        Duration::from_millis(self.sim_period_ms)
    }
}
