//! Custom error types for the monitor.
//!
//! This module defines the primary error type, `MonitorError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the different kinds of errors that can occur, from section-name typos in rule code
//! to malformed persisted state.
//!
//! ## Error Hierarchy
//!
//! - **`InvalidSection`**: A section name other than `displayed`, `undisplayed` or `hidden`
//!   was supplied. Only aborts the call that received it.
//! - **`DependencyNotRegistered`**: The dependency index was asked to forget an updater it
//!   never recorded. This signals a logic fault in the caller, not a user-facing condition.
//! - **`UnknownEntry`**: An `EntryId` that does not belong to the store was used.
//! - **`UnknownRuleType`** / **`UnknownSharedRule`**: Rule reconstruction failed. During a
//!   state import these are logged and the offending rule is skipped.
//! - **`State`**: The persisted mapping is structurally wrong (missing key, bad list literal).
//! - **`Serialization`**, **`Io`**, **`TomlDecode`**, **`TomlEncode`**: Wrapped errors from
//!   the underlying libraries when reading or writing state files.
//! - **`Config`** / **`Configuration`**: Loading errors from figment and semantic errors
//!   found by `MonitorConfig::validate`.
//!
//! By using `#[from]`, `MonitorError` can be created from the underlying error types,
//! so the `?` operator works across the crate.

use crate::monitor::entry::EntryId;
use thiserror::Error;

/// Convenience alias for results using the monitor error type.
pub type MonitorResult<T> = std::result::Result<T, MonitorError>;

#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Section must be one of: displayed, undisplayed, hidden, not '{0}'")]
    InvalidSection(String),

    #[error("No updater registered for dependency '{path}' (logic fault)")]
    DependencyNotRegistered { path: String },

    #[error("Unknown monitor entry: {0}")]
    UnknownEntry(EntryId),

    #[error("Rule type '{0}' is not registered")]
    UnknownRuleType(String),

    #[error("Shared rule '{0}' could not be resolved")]
    UnknownSharedRule(String),

    #[error("Invalid rule definition: {0}")]
    InvalidRule(String),

    #[error("Invalid monitor state: {0}")]
    State(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML decoding error: {0}")]
    TomlDecode(#[from] toml::de::Error),

    #[error("TOML encoding error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl From<figment::Error> for MonitorError {
    fn from(value: figment::Error) -> Self {
        MonitorError::Config(Box::new(value))
    }
}
