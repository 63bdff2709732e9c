//! # DAQ Text Monitor Library
//!
//! This crate implements the text monitor of the measurement application: a live display
//! that follows the values a running measurement writes into its database, recomputes
//! the entries depending on them, and saves/restores its own display configuration.
//!
//! ## Crate Structure
//!
//! - **`config`**: `MonitorConfig`, loaded from TOML files and environment variables.
//! - **`database`**: The `DatabaseNews` notifications a measurement emits and helpers to
//!   render database values.
//! - **`error`**: The `MonitorError` enum used across the crate.
//! - **`monitor`**: `TextMonitor` and its parts: entries, observable sections, the
//!   dependency index, the entry store, state persistence and the async driver.
//! - **`rules`**: The `Rule` trait, the built-in reject/format rules and the registry
//!   used to rebuild rules from persisted state.
//! - **`tracing_setup`**: Structured logging initialisation.
//!
//! ## Example
//!
//! ```rust
//! use daq_monitor::database::DatabaseNews;
//! use daq_monitor::monitor::TextMonitor;
//!
//! let mut monitor = TextMonitor::default();
//! monitor.handle_database_change(DatabaseNews::added("root/T", 3.0))?;
//! assert_eq!(monitor.displayed_values(), vec![("T", "3.0")]);
//!
//! monitor.process_news("root/T", serde_json::json!(3.5));
//! assert_eq!(monitor.displayed_values(), vec![("T", "3.5")]);
//! # Ok::<(), daq_monitor::error::MonitorError>(())
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod monitor;
pub mod rules;
pub mod tracing_setup;

pub use error::{MonitorError, MonitorResult};
pub use monitor::TextMonitor;
