//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the tide-config.toml file.
//! It provides a centralized way to configure the station to predict for, the nodal
//! correction strategy and other prediction defaults. Command-line flags override
//! anything set here.

use crate::nodal::Strategy;
use crate::prediction::{ExtremeLabels, PredictionOptions, DEFAULT_TIME_FIDELITY_SECS};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "tide-config.toml";

/// Application configuration loaded from tide-config.toml
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Prediction defaults
    #[serde(default)]
    pub prediction: PredictionConfig,
    /// Station selection
    #[serde(default)]
    pub station: StationConfig,
}

/// Prediction defaults
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Nodal correction strategy (`iho` or `schureman`)
    pub strategy: Strategy,
    /// Timeline sampling interval in seconds
    pub time_fidelity_secs: i64,
    /// Constant added to every level
    pub offset: f64,
    /// Span length in hours when no end time is given
    pub span_hours: i64,
    pub high_label: String,
    pub low_label: String,
}

/// Station files
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StationConfig {
    /// Station JSON file
    pub path: Option<PathBuf>,
    /// Reference station JSON file, needed when `path` is a subordinate station
    pub reference: Option<PathBuf>,
    /// Datum from the station's `datums` table to shift levels by (e.g. "MSL")
    pub datum: Option<String>,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        let labels = ExtremeLabels::default();
        PredictionConfig {
            strategy: Strategy::Iho,
            time_fidelity_secs: DEFAULT_TIME_FIDELITY_SECS,
            offset: 0.0,
            span_hours: 24,
            high_label: labels.high,
            low_label: labels.low,
        }
    }
}

impl PredictionConfig {
    pub fn options(&self) -> PredictionOptions {
        PredictionOptions {
            time_fidelity: Duration::seconds(self.time_fidelity_secs),
            strategy: self.strategy,
            offset: self.offset,
        }
    }

    pub fn labels(&self) -> ExtremeLabels {
        ExtremeLabels {
            high: self.high_label.clone(),
            low: self.low_label.clone(),
        }
    }
}

impl Config {
    /// Load configuration from tide-config.toml file
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), strategy = %config.prediction.strategy, "loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), "invalid config file format: {e}; using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save configuration to `path`
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }
}
