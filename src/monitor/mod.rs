//! Text monitor.
//!
//! The text monitor shows the values written by a running measurement as text. It is
//! fed two kinds of input:
//!
//! - structural changes of the measurement database ([`DatabaseNews`]), handled by
//!   [`TextMonitor::handle_database_change`] while the measurement is edited
//! - value updates of monitored paths, handled by [`TextMonitor::process_news`] while
//!   the measurement runs
//!
//! # Change handling
//!
//! ```text
//! Added(path, value)                      Removed(path)
//!   │ record value                          │ drop entries depending on path
//!   │ default entry → displayed             │ forget path (monitored, updaters)
//!   │ offer path to every rule              │ forget value
//!   │ re-display waiting custom entries     ▼
//!   ▼
//! ```
//!
//! Removal only prunes: custom entries losing a dependency wait outside of every
//! section and come back on a later `Added` once all their dependencies are monitored.
//!
//! Notifications must be handled one at a time and in the order the database
//! produced them; [`driver::drive`] does that over a channel.

pub mod dependencies;
pub mod driver;
pub mod entry;
pub mod notice;
pub mod section;
pub mod state;
pub mod store;

use crate::config::MonitorConfig;
use crate::database::{DatabaseNews, DatabaseValue, DatabaseValues};
use crate::error::{MonitorError, MonitorResult};
use crate::rules::{Rule, RuleRegistry};
use entry::{EntryId, MonitoredEntry};
use notice::{LogNotices, NoticeSink};
use section::{IntoSection, Section};
use std::sync::Arc;
use store::EntryStore;
use tracing::{debug, info, warn};

/// Identifier of the text monitor kind, persisted with its state.
pub const MONITOR_ID: &str = "daq.text_monitor";

/// Live text display of a measurement database.
#[derive(Debug)]
pub struct TextMonitor {
    store: EntryStore,
    rules: Vec<Box<dyn Rule>>,
    registry: Arc<RuleRegistry>,
    notices: Arc<dyn NoticeSink>,
    auto_show: bool,
}

impl Default for TextMonitor {
    fn default() -> Self {
        Self::new(Arc::new(RuleRegistry::new()))
    }
}

impl TextMonitor {
    /// Create an empty monitor using `registry` to rebuild and persist rules.
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self {
            store: EntryStore::new(),
            rules: Vec::new(),
            registry,
            notices: Arc::new(LogNotices),
            auto_show: true,
        }
    }

    /// Create a monitor from the application configuration.
    ///
    /// Shared rules come from the `[[rules]]` tables and the default rules are
    /// installed in the listed order.
    pub fn from_config(config: &MonitorConfig) -> MonitorResult<Self> {
        let registry = RuleRegistry::new().with_shared_definitions(config.rules.clone());
        let mut monitor = Self::new(Arc::new(registry));
        monitor.auto_show = config.monitor.auto_show;

        for id in &config.monitor.default_rules {
            let definition = monitor
                .registry
                .resolve_shared(id)
                .ok_or_else(|| MonitorError::UnknownSharedRule(id.clone()))?;
            let rule = monitor.registry.create(&definition)?;
            monitor.rules.push(rule);
        }
        Ok(monitor)
    }

    /// Route user-facing notices to `sink`.
    pub fn with_notices(mut self, sink: Arc<dyn NoticeSink>) -> Self {
        self.notices = sink;
        self
    }

    /// Entries, sections and dependency bookkeeping.
    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Registry used to rebuild rules.
    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// Rules applied to every new database path, in application order.
    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    /// Append a rule. It only applies to paths added afterwards.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Remove the rule with the given id, returning it.
    pub fn remove_rule(&mut self, id: &str) -> Option<Box<dyn Rule>> {
        let position = self.rules.iter().position(|rule| rule.id() == id)?;
        Some(self.rules.remove(position))
    }

    /// Whether the monitor window should open when a measurement starts.
    pub fn auto_show(&self) -> bool {
        self.auto_show
    }

    /// Set whether the monitor window should open when a measurement starts.
    pub fn set_auto_show(&mut self, auto_show: bool) {
        self.auto_show = auto_show;
    }

    /// Paths the measurement engine must report value changes for.
    pub fn monitored_entries(&self) -> &[String] {
        self.store.monitored_entries()
    }

    /// Every database path with a known value.
    pub fn known_monitored_entries(&self) -> Vec<&str> {
        self.store.known_monitored_entries().collect()
    }

    /// Rendered `(name, value)` pairs of the displayed entries.
    pub fn displayed_values(&self) -> Vec<(&str, &str)> {
        self.store
            .entries_in(Section::Displayed)
            .map(|(_, entry)| (entry.name.as_str(), entry.value.as_str()))
            .collect()
    }

    // =========================================================================
    // Section mutators
    // =========================================================================

    /// Add entries owned by the store to `section`.
    pub fn add_entries(&mut self, section: impl IntoSection, ids: &[EntryId]) -> MonitorResult<()> {
        let section = section.into_section()?;
        self.store.add_entries(section, ids)
    }

    /// Move entries from `origin` to `destination`.
    pub fn move_entries(
        &mut self,
        origin: impl IntoSection,
        destination: impl IntoSection,
        ids: &[EntryId],
    ) -> MonitorResult<()> {
        let origin = origin.into_section()?;
        let destination = destination.into_section()?;
        self.store.move_entries(origin, destination, ids)
    }

    /// Remove entries from `section`.
    pub fn remove_entries(
        &mut self,
        section: impl IntoSection,
        ids: &[EntryId],
    ) -> MonitorResult<()> {
        let section = section.into_section()?;
        self.store.remove_entries(section, ids)
    }

    /// Register a user-defined entry.
    ///
    /// The entry is displayed right away if all its dependencies are monitored,
    /// otherwise it waits for them.
    pub fn add_custom_entry(&mut self, entry: MonitoredEntry) -> MonitorResult<EntryId> {
        let id = self.store.insert_custom(entry);
        self.store.recover_custom_entries()?;
        Ok(id)
    }

    // =========================================================================
    // Change handling
    // =========================================================================

    /// Record a new value of `path` and recompute the entries depending on it.
    ///
    /// Returns the recomputed entries in registration order.
    pub fn process_news(&mut self, path: &str, value: DatabaseValue) -> Vec<EntryId> {
        self.store.update_value(path, value)
    }

    /// Generate entries for an added database path or prune a removed one.
    pub fn handle_database_change(&mut self, news: DatabaseNews) -> MonitorResult<()> {
        match news {
            DatabaseNews::Added { path, value } => self.database_entry_added(path, value),
            DatabaseNews::Removed { path } => {
                let dropped = self.store.drop_dependents(&path)?;
                debug!(path = %path, dropped = dropped.len(), "database entry removed");
                Ok(())
            }
        }
    }

    /// Rebuild every entry from the rules and the database values.
    ///
    /// Custom entries and rules are preserved. When `entries` is empty the last
    /// known values are replayed.
    pub fn refresh_monitored_entries(&mut self, entries: DatabaseValues) -> MonitorResult<()> {
        if !entries.is_empty() {
            self.store.replace_values(entries);
        }
        let values = self.store.known_values().clone();

        self.store.clear_preserving_custom();
        for (path, value) in values {
            self.database_entry_added(path, value)?;
        }
        info!(
            displayed = self.store.section(Section::Displayed).len(),
            monitored = self.store.monitored_entries().len(),
            "monitor entries refreshed"
        );
        Ok(())
    }

    // =========================================================================
    // Private API
    // =========================================================================

    fn database_entry_added(&mut self, path: String, value: DatabaseValue) -> MonitorResult<()> {
        let entry = MonitoredEntry::default_for(&path, &value);
        self.store.record_value(path.clone(), value);

        let id = self.store.insert(entry);
        self.store.add_entries(Section::Displayed, &[id])?;

        for rule in &self.rules {
            if let Err(e) = rule.try_apply(&path, &mut self.store) {
                warn!(rule = rule.id(), path = %path, error = %e, "rule application failed");
            }
        }

        let recovered = self.store.recover_custom_entries()?;
        if !recovered.is_empty() {
            debug!(path = %path, count = recovered.len(), "custom entries displayed again");
        }
        Ok(())
    }

    /// Forget every entry, rule application result and custom entry.
    fn clear_state(&mut self) {
        self.store.clear();
    }
}
