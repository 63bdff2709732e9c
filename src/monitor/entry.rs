//! Monitored entries.
//!
//! An entry is the unit shown by the text monitor: a label, the database path it
//! stands for, a formatting template with `{path}` placeholders, and the ordered
//! list of paths whose changes must trigger a recomputation.

use crate::database::{entry_name, render_value, DatabaseValue, DatabaseValues};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an entry inside an [`EntryStore`](super::store::EntryStore).
///
/// Entries are compared by identity, never by path: two entries may share a path
/// (e.g. a default entry and a user entry) and still be distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}

/// Persisted members of an entry.
///
/// This is what custom entries are saved as; the rendered value is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDefinition {
    /// Label shown to the user
    pub name: String,
    /// Path the entry primarily represents
    pub path: String,
    /// Template with `{path}` placeholders
    pub formatting: String,
    /// Paths whose changes trigger a recomputation
    #[serde(default)]
    pub depend_on: Vec<String>,
}

/// A display unit of the text monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredEntry {
    /// Label shown to the user
    pub name: String,
    /// Path the entry primarily represents
    pub path: String,
    /// Template with `{path}` placeholders
    pub formatting: String,
    depend_on: Vec<String>,
    /// Current rendered value
    pub value: String,
}

impl MonitoredEntry {
    /// Create an entry; duplicated dependencies are dropped, order is kept.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        formatting: impl Into<String>,
        depend_on: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut deps: Vec<String> = Vec::new();
        for dep in depend_on {
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        Self {
            name: name.into(),
            path: path.into(),
            formatting: formatting.into(),
            depend_on: deps,
            value: String::new(),
        }
    }

    /// Entry created automatically for a newly observed database path.
    pub fn default_for(path: &str, value: &DatabaseValue) -> Self {
        let mut entry = Self::new(
            entry_name(path),
            path,
            format!("{{{path}}}"),
            [path.to_string()],
        );
        entry.value = render_value(value);
        entry
    }

    /// Rebuild an entry from its persisted members.
    pub fn from_definition(definition: EntryDefinition) -> Self {
        Self::new(
            definition.name,
            definition.path,
            definition.formatting,
            definition.depend_on,
        )
    }

    /// Persisted members of this entry.
    pub fn definition(&self) -> EntryDefinition {
        EntryDefinition {
            name: self.name.clone(),
            path: self.path.clone(),
            formatting: self.formatting.clone(),
            depend_on: self.depend_on.clone(),
        }
    }

    /// Paths this entry depends on, in declaration order.
    pub fn depend_on(&self) -> &[String] {
        &self.depend_on
    }

    /// Whether `path` is one of the dependencies.
    pub fn depends_on(&self, path: &str) -> bool {
        self.depend_on.iter().any(|d| d == path)
    }

    /// Recompute the rendered value from a snapshot of database values.
    ///
    /// Returns `false` and leaves the value untouched when a dependency is
    /// missing from the snapshot.
    pub fn update(&mut self, values: &DatabaseValues) -> bool {
        let mut rendered = self.formatting.clone();
        for dep in &self.depend_on {
            let Some(value) = values.get(dep) else {
                return false;
            };
            rendered = rendered.replace(&format!("{{{dep}}}"), &render_value(value));
        }
        self.value = rendered;
        true
    }
}
