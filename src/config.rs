//! Monitor configuration using Figment.
//!
//! Configuration is loaded from:
//! 1. a TOML file (`config/monitor.toml` by default)
//! 2. environment variables prefixed with `DAQ_MONITOR_`
//!
//! # Example
//! ```no_run
//! use daq_monitor::config::MonitorConfig;
//!
//! let config = MonitorConfig::load()?;
//! println!("Application: {}", config.application.name);
//! # Ok::<(), daq_monitor::error::MonitorError>(())
//! ```

use crate::error::{MonitorError, MonitorResult};
use crate::rules::{RuleDefinition, RuleRegistry};
use crate::tracing_setup::OutputFormat;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Top-level monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Text monitor settings
    #[serde(default)]
    pub monitor: TextMonitorConfig,
    /// Shared rule definitions, referenced by id from saved states
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Log span open/close events
    #[serde(default)]
    pub log_span_events: bool,
}

/// Text monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextMonitorConfig {
    /// Open the monitor window when a measurement starts
    #[serde(default = "default_auto_show")]
    pub auto_show: bool,
    /// Ids of the shared rules installed on a new monitor
    #[serde(default)]
    pub default_rules: Vec<String>,
    /// File the monitor state is saved to
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

// Default value functions
fn default_name() -> String {
    "DAQ Text Monitor".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_auto_show() -> bool {
    true
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_span_events: false,
        }
    }
}

impl Default for TextMonitorConfig {
    fn default() -> Self {
        Self {
            auto_show: default_auto_show(),
            default_rules: Vec::new(),
            state_file: None,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from config/monitor.toml and environment variables
    ///
    /// Environment variables can override configuration with prefix DAQ_MONITOR_
    /// Example: DAQ_MONITOR_APPLICATION__LOG_LEVEL=debug
    pub fn load() -> MonitorResult<Self> {
        Self::load_from("config/monitor.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> MonitorResult<Self> {
        let config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DAQ_MONITOR_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> MonitorResult<()> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(MonitorError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        self.application.log_format.parse::<OutputFormat>()?;

        // Validate shared rule ids are unique and their types known
        let registry = RuleRegistry::new();
        let mut ids = HashSet::new();
        for rule in &self.rules {
            if !ids.insert(rule.id.as_str()) {
                return Err(MonitorError::Configuration(format!(
                    "Duplicate rule ID: {}",
                    rule.id
                )));
            }
            registry.create(rule).map_err(|e| {
                MonitorError::Configuration(format!("Rule '{}' is invalid: {e}", rule.id))
            })?;
        }

        // Validate default rules reference shared rules
        for id in &self.monitor.default_rules {
            if !ids.contains(id.as_str()) {
                return Err(MonitorError::Configuration(format!(
                    "Default rule '{id}' is not a shared rule"
                )));
            }
        }

        Ok(())
    }
}
