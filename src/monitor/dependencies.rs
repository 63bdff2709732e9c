//! Dependency tracking between database paths and displayed entries.
//!
//! The index answers two questions for the measurement engine and the monitor:
//! - which entries must be recomputed when the value of a path changes (the updaters)
//! - which paths the monitor needs to be notified about at all (the monitored entries)
//!
//! # Architecture
//!
//! - Maintains a map: `path` → ordered list of entry ids (one per displayed entry
//!   depending on the path)
//! - Maintains the ordered list of monitored paths
//! - A path is monitored exactly while its updater list is non-empty
//!
//! # Example
//!
//! ```rust,ignore
//! let mut index = DependencyIndex::new();
//! index.register(temperature_id, &["root/T".to_string()]);
//! assert_eq!(index.monitored_entries(), ["root/T".to_string()]);
//!
//! index.unregister(temperature_id, &["root/T".to_string()])?;
//! assert!(index.monitored_entries().is_empty());
//! ```

use super::entry::EntryId;
use crate::error::{MonitorError, MonitorResult};
use std::collections::HashMap;

/// Updaters and monitored paths of the displayed entries.
#[derive(Debug, Default, Clone)]
pub struct DependencyIndex {
    // Maps path -> ids of the displayed entries to update, in registration order
    updaters: HashMap<String, Vec<EntryId>>,
    monitored: Vec<String>,
}

impl DependencyIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the updater of `id` for every path of `depend_on`.
    ///
    /// Paths seen for the first time are appended to the monitored entries.
    pub fn register(&mut self, id: EntryId, depend_on: &[String]) {
        for dependence in depend_on {
            self.updaters.entry(dependence.clone()).or_default().push(id);

            if !self.monitored.contains(dependence) {
                self.monitored.push(dependence.clone());
            }
        }
    }

    /// Forgets the updater of `id` for every path of `depend_on`.
    ///
    /// A path whose updater list becomes empty stops being monitored.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::DependencyNotRegistered`] when no updater of `id` was
    /// recorded for one of the paths. This is a logic fault of the caller; the paths
    /// processed before the faulty one stay unregistered.
    pub fn unregister(&mut self, id: EntryId, depend_on: &[String]) -> MonitorResult<()> {
        for dependence in depend_on {
            self.unregister_path(id, dependence)?;
        }
        Ok(())
    }

    /// Forgets the updater of `id` for a single path.
    pub fn unregister_path(&mut self, id: EntryId, path: &str) -> MonitorResult<()> {
        let not_registered = || MonitorError::DependencyNotRegistered {
            path: path.to_string(),
        };

        let ids = self.updaters.get_mut(path).ok_or_else(not_registered)?;
        let position = ids.iter().position(|u| *u == id).ok_or_else(not_registered)?;
        ids.remove(position);

        if ids.is_empty() {
            self.updaters.remove(path);
            self.monitored.retain(|p| p != path);
        }
        Ok(())
    }

    /// Drops every updater of `path` and stops monitoring it.
    pub fn drop_path(&mut self, path: &str) {
        self.updaters.remove(path);
        self.monitored.retain(|p| p != path);
    }

    /// Entries to recompute when `path` changes, in registration order.
    pub fn updaters_for(&self, path: &str) -> &[EntryId] {
        self.updaters.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterates over every `(path, updaters)` pair.
    pub fn updaters(&self) -> impl Iterator<Item = (&str, &[EntryId])> {
        self.updaters.iter().map(|(p, ids)| (p.as_str(), ids.as_slice()))
    }

    /// Whether at least one updater is recorded for `path`.
    pub fn has_updaters(&self, path: &str) -> bool {
        self.updaters.contains_key(path)
    }

    /// Paths the monitor needs to observe, in first-registration order.
    pub fn monitored_entries(&self) -> &[String] {
        &self.monitored
    }

    /// Whether `path` is monitored.
    pub fn is_monitored(&self, path: &str) -> bool {
        self.monitored.iter().any(|p| p == path)
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.updaters.clear();
        self.monitored.clear();
    }
}
