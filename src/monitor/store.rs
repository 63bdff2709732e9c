//! Entry store of the text monitor.
//!
//! The store owns every entry the monitor knows about, the three presentation
//! sections, the user-defined (custom) entries, the dependency index and the
//! snapshot of the last known database values.
//!
//! # Membership
//!
//! An entry belongs to at most one section. Custom entries are additionally listed in
//! [`EntryStore::custom_entries`] whatever section holds them, and may sit in no section
//! at all while one of their dependencies is missing from the database. The store does
//! not defend the single-membership rule: `add_entries`, `move_entries` and
//! `remove_entries` are the only mutators and callers must not duplicate entries.
//!
//! Entries in no section that are not custom are dropped after every removal.

use super::dependencies::DependencyIndex;
use super::entry::{EntryId, MonitoredEntry};
use super::section::{EntrySection, Section};
use crate::database::{DatabaseValue, DatabaseValues};
use crate::error::{MonitorError, MonitorResult};
use std::collections::HashMap;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Entries, sections and dependency bookkeeping of a monitor.
#[derive(Debug)]
pub struct EntryStore {
    next_id: u64,
    entries: HashMap<EntryId, MonitoredEntry>,
    displayed: EntrySection,
    undisplayed: EntrySection,
    hidden: EntrySection,
    custom: Vec<EntryId>,
    dependencies: DependencyIndex,
    values: DatabaseValues,
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: HashMap::new(),
            displayed: EntrySection::new(Section::Displayed),
            undisplayed: EntrySection::new(Section::Undisplayed),
            hidden: EntrySection::new(Section::Hidden),
            custom: Vec::new(),
            dependencies: DependencyIndex::new(),
            values: DatabaseValues::new(),
        }
    }

    // =========================================================================
    // Entries
    // =========================================================================

    /// Take ownership of an entry without placing it in a section.
    pub fn insert(&mut self, entry: MonitoredEntry) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, entry);
        id
    }

    /// Take ownership of a user-defined entry.
    ///
    /// The entry is placed in no section; it becomes displayed once all its
    /// dependencies are monitored.
    pub fn insert_custom(&mut self, entry: MonitoredEntry) -> EntryId {
        let id = self.insert(entry);
        self.custom.push(id);
        id
    }

    /// Look an entry up.
    pub fn entry(&self, id: EntryId) -> Option<&MonitoredEntry> {
        self.entries.get(&id)
    }

    /// Ids of the user-defined entries, in creation order.
    pub fn custom_entries(&self) -> &[EntryId] {
        &self.custom
    }

    /// Whether `id` is a user-defined entry.
    pub fn is_custom(&self, id: EntryId) -> bool {
        self.custom.contains(&id)
    }

    /// Section currently holding `id`, if any.
    pub fn locate(&self, id: EntryId) -> Option<Section> {
        Section::ALL
            .into_iter()
            .find(|section| self.section(*section).contains(id))
    }

    /// First entry of `section` representing `path`.
    pub fn find(&self, section: Section, path: &str) -> Option<EntryId> {
        self.entries_in(section)
            .find(|(_, entry)| entry.path == path)
            .map(|(id, _)| id)
    }

    /// First entry of `section` representing `path` that is not user-defined.
    pub fn find_generated(&self, section: Section, path: &str) -> Option<EntryId> {
        self.entries_in(section)
            .find(|(id, entry)| entry.path == path && !self.is_custom(*id))
            .map(|(id, _)| id)
    }

    /// Whether any section holds an entry representing `path`.
    pub fn holds_path(&self, path: &str) -> bool {
        Section::ALL
            .into_iter()
            .any(|section| self.find(section, path).is_some())
    }

    /// Entries of `section` in display order.
    pub fn entries_in(
        &self,
        section: Section,
    ) -> impl Iterator<Item = (EntryId, &MonitoredEntry)> + '_ {
        self.section(section)
            .ids()
            .iter()
            .filter_map(move |id| self.entries.get(id).map(|entry| (*id, entry)))
    }

    /// Paths of the entries of `section`, in display order.
    pub fn paths_in(&self, section: Section) -> Vec<String> {
        self.entries_in(section)
            .map(|(_, entry)| entry.path.clone())
            .collect()
    }

    /// The ordered container backing `section`.
    pub fn section(&self, section: Section) -> &EntrySection {
        match section {
            Section::Displayed => &self.displayed,
            Section::Undisplayed => &self.undisplayed,
            Section::Hidden => &self.hidden,
        }
    }

    /// Subscribe to the committed path lists of `section`.
    pub fn subscribe(&self, section: Section) -> watch::Receiver<Vec<String>> {
        self.section(section).subscribe()
    }

    // =========================================================================
    // Dependencies and values
    // =========================================================================

    /// Updaters and monitored paths of the displayed entries.
    pub fn dependencies(&self) -> &DependencyIndex {
        &self.dependencies
    }

    /// Paths the monitor needs to be notified about.
    pub fn monitored_entries(&self) -> &[String] {
        self.dependencies.monitored_entries()
    }

    /// Last known value of every database path.
    pub fn known_values(&self) -> &DatabaseValues {
        &self.values
    }

    /// Every database path with a known value.
    pub fn known_monitored_entries(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.keys().map(String::as_str)
    }

    /// Whether `path` has a known value.
    pub fn is_known(&self, path: &str) -> bool {
        self.values.contains_key(path)
    }

    /// Record the value of `path` without running any updater.
    pub fn record_value(&mut self, path: impl Into<String>, value: DatabaseValue) {
        self.values.insert(path.into(), value);
    }

    /// Record the value of `path` and recompute every entry depending on it.
    ///
    /// Returns the ids of the recomputed entries, in registration order.
    pub fn update_value(&mut self, path: &str, value: DatabaseValue) -> Vec<EntryId> {
        self.values.insert(path.to_string(), value);

        let updaters = self.dependencies.updaters_for(path).to_vec();
        if updaters.is_empty() {
            trace!(path, "value change without updater");
        }
        for id in &updaters {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.update(&self.values);
            }
        }
        updaters
    }

    pub(crate) fn replace_values(&mut self, values: DatabaseValues) {
        self.values = values;
    }

    // =========================================================================
    // Section mutators
    // =========================================================================

    /// Append entries to `section`.
    ///
    /// Entries added to `displayed` get their updaters registered and their value
    /// refreshed from the known values.
    pub fn add_entries(&mut self, section: Section, ids: &[EntryId]) -> MonitorResult<()> {
        self.check_known(ids)?;

        if section == Section::Displayed {
            for id in ids {
                self.displayed_entry_added(*id);
            }
        }

        let mut content = self.section(section).ids().to_vec();
        content.extend_from_slice(ids);
        self.commit(section, content);
        debug!(%section, count = ids.len(), "entries added");
        Ok(())
    }

    /// Move entries from `origin` to the end of `destination`.
    pub fn move_entries(
        &mut self,
        origin: Section,
        destination: Section,
        ids: &[EntryId],
    ) -> MonitorResult<()> {
        self.check_known(ids)?;

        if origin == Section::Displayed {
            for id in ids {
                self.displayed_entry_removed(*id)?;
            }
        }
        if destination == Section::Displayed {
            for id in ids {
                self.displayed_entry_added(*id);
            }
        }

        let remaining = self
            .section(origin)
            .ids()
            .iter()
            .copied()
            .filter(|id| !ids.contains(id))
            .collect();
        self.commit(origin, remaining);

        let mut content = self.section(destination).ids().to_vec();
        content.extend_from_slice(ids);
        self.commit(destination, content);
        debug!(%origin, %destination, count = ids.len(), "entries moved");
        Ok(())
    }

    /// Remove entries from `section`.
    pub fn remove_entries(&mut self, section: Section, ids: &[EntryId]) -> MonitorResult<()> {
        self.check_known(ids)?;

        if section == Section::Displayed {
            for id in ids {
                self.displayed_entry_removed(*id)?;
            }
        }

        let remaining = self
            .section(section)
            .ids()
            .iter()
            .copied()
            .filter(|id| !ids.contains(id))
            .collect();
        self.commit(section, remaining);
        self.prune();
        debug!(%section, count = ids.len(), "entries removed");
        Ok(())
    }

    // =========================================================================
    // Protocol helpers
    // =========================================================================

    /// Drop every entry depending on `path` and forget the path.
    ///
    /// Entries are filtered out of all three sections without replacement. The
    /// updaters the dropped displayed entries held for their other dependencies are
    /// released; entries that survive are left untouched. Returns the dropped ids.
    pub(crate) fn drop_dependents(&mut self, path: &str) -> MonitorResult<Vec<EntryId>> {
        let mut dropped = Vec::new();

        for section in Section::ALL {
            let (kept, removed): (Vec<EntryId>, Vec<EntryId>) =
                self.section(section).ids().iter().copied().partition(|id| {
                    self.entries
                        .get(id)
                        .map_or(true, |entry| !entry.depends_on(path))
                });
            if removed.is_empty() {
                continue;
            }

            if section == Section::Displayed {
                for id in &removed {
                    let others: Vec<String> = self
                        .entries
                        .get(id)
                        .map(|entry| entry.depend_on())
                        .unwrap_or_default()
                        .iter()
                        .filter(|dep| *dep != path)
                        .cloned()
                        .collect();
                    for dep in &others {
                        self.dependencies.unregister_path(*id, dep)?;
                    }
                }
            }
            self.commit(section, kept);
            dropped.extend(removed);
        }

        self.dependencies.drop_path(path);
        self.values.remove(path);
        self.prune();
        Ok(dropped)
    }

    /// Display the custom entries sitting in no section whose dependencies are
    /// all monitored again. Returns the recovered ids.
    pub(crate) fn recover_custom_entries(&mut self) -> MonitorResult<Vec<EntryId>> {
        let waiting: Vec<EntryId> = self
            .custom
            .iter()
            .copied()
            .filter(|id| self.locate(*id).is_none())
            .collect();

        let mut recovered = Vec::new();
        for id in waiting {
            let ready = self.entries.get(&id).is_some_and(|entry| {
                entry
                    .depend_on()
                    .iter()
                    .all(|dep| self.dependencies.is_monitored(dep))
            });
            if ready {
                self.add_entries(Section::Displayed, &[id])?;
                recovered.push(id);
            }
        }
        Ok(recovered)
    }

    /// Empty the sections, the dependency index and the custom entries.
    ///
    /// Known values are kept. Subscribers see one empty commit per section.
    pub(crate) fn clear(&mut self) {
        for section in Section::ALL {
            self.commit(section, Vec::new());
        }
        self.dependencies.clear();
        self.custom.clear();
        self.entries.clear();
    }

    /// Empty the sections and the dependency index, keeping the custom entries
    /// out of any section.
    pub(crate) fn clear_preserving_custom(&mut self) {
        for section in Section::ALL {
            self.commit(section, Vec::new());
        }
        self.dependencies.clear();
        self.prune();
    }

    /// Replace the three sections at once and rebuild the dependency index from
    /// the displayed entries.
    pub(crate) fn commit_partition(
        &mut self,
        displayed: Vec<EntryId>,
        undisplayed: Vec<EntryId>,
        hidden: Vec<EntryId>,
    ) {
        self.dependencies.clear();
        for id in &displayed {
            self.displayed_entry_added(*id);
        }
        self.commit(Section::Displayed, displayed);
        self.commit(Section::Undisplayed, undisplayed);
        self.commit(Section::Hidden, hidden);
        self.prune();
    }

    // =========================================================================
    // Private API
    // =========================================================================

    fn check_known(&self, ids: &[EntryId]) -> MonitorResult<()> {
        match ids.iter().find(|id| !self.entries.contains_key(*id)) {
            Some(id) => Err(MonitorError::UnknownEntry(*id)),
            None => Ok(()),
        }
    }

    fn displayed_entry_added(&mut self, id: EntryId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            self.dependencies.register(id, entry.depend_on());
            entry.update(&self.values);
        }
    }

    fn displayed_entry_removed(&mut self, id: EntryId) -> MonitorResult<()> {
        let entry = self.entries.get(&id).ok_or(MonitorError::UnknownEntry(id))?;
        self.dependencies.unregister(id, entry.depend_on())
    }

    fn commit(&mut self, section: Section, ids: Vec<EntryId>) {
        let paths = ids
            .iter()
            .filter_map(|id| self.entries.get(id).map(|entry| entry.path.clone()))
            .collect();
        match section {
            Section::Displayed => self.displayed.commit(ids, paths),
            Section::Undisplayed => self.undisplayed.commit(ids, paths),
            Section::Hidden => self.hidden.commit(ids, paths),
        }
    }

    fn prune(&mut self) {
        let Self {
            entries,
            displayed,
            undisplayed,
            hidden,
            custom,
            ..
        } = self;
        entries.retain(|id, _| {
            custom.contains(id)
                || displayed.contains(*id)
                || undisplayed.contains(*id)
                || hidden.contains(*id)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(path: &str, deps: &[&str]) -> MonitoredEntry {
        MonitoredEntry::new(
            path.rsplit('/').next().unwrap_or(path),
            path,
            deps.iter().map(|d| format!("{{{d}}}")).collect::<Vec<_>>().join(" "),
            deps.iter().map(|d| d.to_string()),
        )
    }

    fn assert_partition(store: &EntryStore) {
        for id in store.entries.keys() {
            let count = Section::ALL
                .iter()
                .filter(|s| store.section(**s).contains(*id))
                .count();
            assert!(count <= 1, "{id} is in {count} sections");
        }
    }

    #[test]
    fn test_add_displayed_registers() {
        let mut store = EntryStore::new();
        let a = store.insert(entry("root/a", &["root/a"]));
        let b = store.insert(entry("root/b", &["root/b"]));

        store.add_entries(Section::Displayed, &[a]).unwrap();
        store.add_entries(Section::Undisplayed, &[b]).unwrap();

        assert_eq!(store.monitored_entries(), ["root/a".to_string()]);
        assert_eq!(store.dependencies().updaters_for("root/a"), [a]);
        assert_eq!(store.locate(b), Some(Section::Undisplayed));
        assert_partition(&store);
    }

    #[test]
    fn test_move_between_sections() {
        let mut store = EntryStore::new();
        let a = store.insert(entry("root/a", &["root/a"]));
        store.add_entries(Section::Displayed, &[a]).unwrap();

        store.move_entries(Section::Displayed, Section::Hidden, &[a]).unwrap();
        assert!(store.monitored_entries().is_empty());
        assert_eq!(store.locate(a), Some(Section::Hidden));

        store.move_entries(Section::Hidden, Section::Displayed, &[a]).unwrap();
        assert_eq!(store.monitored_entries(), ["root/a".to_string()]);
        assert_eq!(store.locate(a), Some(Section::Displayed));
        assert_partition(&store);
    }

    #[test]
    fn test_remove_drops_orphans() {
        let mut store = EntryStore::new();
        let a = store.insert(entry("root/a", &["root/a"]));
        let c = store.insert_custom(entry("root/c", &["root/a"]));
        store.add_entries(Section::Displayed, &[a, c]).unwrap();
        assert_eq!(store.dependencies().updaters_for("root/a"), [a, c]);

        store.remove_entries(Section::Displayed, &[a, c]).unwrap();
        assert!(store.entry(a).is_none());
        assert!(store.entry(c).is_some());
        assert!(store.locate(c).is_none());
        assert!(store.monitored_entries().is_empty());
    }

    #[test]
    fn test_unknown_entry_rejected() {
        let mut store = EntryStore::new();
        let err = store
            .add_entries(Section::Displayed, &[EntryId(42)])
            .unwrap_err();
        assert!(matches!(err, MonitorError::UnknownEntry(EntryId(42))));
    }

    #[test]
    fn test_update_value_runs_updaters_in_order() {
        let mut store = EntryStore::new();
        let a = store.insert(entry("root/a", &["root/a"]));
        let sum = store.insert(entry("root/sum", &["root/a", "root/b"]));
        store.record_value("root/b", json!(2));
        store.add_entries(Section::Displayed, &[a, sum]).unwrap();

        let updated = store.update_value("root/a", json!(1));
        assert_eq!(updated, vec![a, sum]);
        assert_eq!(store.entry(a).unwrap().value, "1");
        assert_eq!(store.entry(sum).unwrap().value, "1 2");

        assert!(store.update_value("root/unwatched", json!(0)).is_empty());
        assert!(store.is_known("root/unwatched"));
    }

    #[test]
    fn test_drop_dependents_releases_other_paths() {
        let mut store = EntryStore::new();
        let e1 = store.insert(entry("root/e1", &["a"]));
        let e2 = store.insert(entry("root/e2", &["a", "b"]));
        let e3 = store.insert(entry("root/e3", &["b"]));
        store.add_entries(Section::Displayed, &[e1, e2, e3]).unwrap();

        let dropped = store.drop_dependents("a").unwrap();
        assert_eq!(dropped, vec![e1, e2]);
        assert_eq!(store.section(Section::Displayed).ids(), [e3]);
        assert_eq!(store.monitored_entries(), ["b".to_string()]);
        assert_eq!(store.dependencies().updaters_for("b"), [e3]);
        assert!(!store.dependencies().has_updaters("a"));
    }

    #[tokio::test]
    async fn test_subscribers_see_paths() {
        let mut store = EntryStore::new();
        let mut rx = store.subscribe(Section::Displayed);
        let a = store.insert(entry("root/a", &["root/a"]));
        store.add_entries(Section::Displayed, &[a]).unwrap();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), vec!["root/a".to_string()]);
    }
}
