//! Measurement database notifications.
//!
//! A running measurement writes its values into a hierarchical database where every
//! value lives under a `/`-separated path (e.g. `root/loop/index`). Monitors never read
//! that database directly: they are handed the changes, in the order the writes happened,
//! as [`DatabaseNews`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value stored in the measurement database.
pub type DatabaseValue = serde_json::Value;

/// Snapshot of the last known value of every database path.
pub type DatabaseValues = BTreeMap<String, DatabaseValue>;

/// A structural change of the measurement database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatabaseNews {
    /// A new path appeared, with its initial value.
    Added {
        /// Database path of the new value
        path: String,
        /// Initial value
        value: DatabaseValue,
    },
    /// A path disappeared from the database.
    Removed {
        /// Database path that was removed
        path: String,
    },
}

impl DatabaseNews {
    /// Build an `Added` notification.
    pub fn added(path: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        DatabaseNews::Added {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Build a `Removed` notification.
    pub fn removed(path: impl Into<String>) -> Self {
        DatabaseNews::Removed { path: path.into() }
    }

    /// Path concerned by this notification.
    pub fn path(&self) -> &str {
        match self {
            DatabaseNews::Added { path, .. } | DatabaseNews::Removed { path } => path,
        }
    }
}

/// Render a database value the way it is shown to the user.
///
/// Strings are shown bare, everything else uses its JSON representation
/// (`3.0` stays `3.0`, `true` stays `true`).
pub fn render_value(value: &DatabaseValue) -> String {
    match value {
        DatabaseValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Last segment of a database path, used as the default entry label.
pub fn entry_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}
