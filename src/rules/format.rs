//! Rule combining sibling values into a single formatted entry.
//!
//! A loop task typically writes `root/loop_index` and `root/loop_points`. A format rule
//! with suffixes `["index", "points"]`, new entry suffix `progress` and formatting
//! `{0}/{1}` turns them into one `root/loop_progress` entry rendered as `3/10`, and
//! hides the two original entries.

use super::{Rule, RuleDefinition};
use crate::database::entry_name;
use crate::error::MonitorResult;
use crate::monitor::entry::{EntryId, MonitoredEntry};
use crate::monitor::section::Section;
use crate::monitor::store::EntryStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Factory name of [`FormatRule`].
pub const RULE_TYPE: &str = "format";

fn default_hide_entries() -> bool {
    true
}

/// Builds a combined entry once every sibling path `prefix + suffix` is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatRule {
    /// Unique identifier of the rule
    pub id: String,
    /// Human readable description
    #[serde(default)]
    pub description: String,
    /// Path endings of the combined values, `{i}` in the formatting refers to `suffixes[i]`
    pub suffixes: Vec<String>,
    /// Ending of the path of the created entry
    pub new_entry_suffix: String,
    /// Template of the created entry using `{0}`, `{1}`, ... placeholders
    pub new_entry_formatting: String,
    /// Whether the combined entries should be hidden
    #[serde(default = "default_hide_entries")]
    pub hide_entries: bool,
}

impl FormatRule {
    /// Create a rule hiding the combined entries.
    pub fn new(
        id: impl Into<String>,
        suffixes: impl IntoIterator<Item = impl Into<String>>,
        new_entry_suffix: impl Into<String>,
        new_entry_formatting: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            suffixes: suffixes.into_iter().map(Into::into).collect(),
            new_entry_suffix: new_entry_suffix.into(),
            new_entry_formatting: new_entry_formatting.into(),
            hide_entries: true,
        }
    }

    /// Keep the combined entries displayed.
    pub fn keep_entries(mut self) -> Self {
        self.hide_entries = false;
        self
    }

    fn build_entry(&self, prefix: &str, entry_paths: &[String]) -> MonitoredEntry {
        let mut formatting = self.new_entry_formatting.clone();
        for (i, path) in entry_paths.iter().enumerate() {
            formatting = formatting.replace(&format!("{{{i}}}"), &format!("{{{path}}}"));
        }
        let path = format!("{prefix}{}", self.new_entry_suffix);
        MonitoredEntry::new(
            format!("{}{}", entry_name(prefix), self.new_entry_suffix),
            path,
            formatting,
            entry_paths.iter().cloned(),
        )
    }
}

impl Rule for FormatRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn rule_type(&self) -> &'static str {
        RULE_TYPE
    }

    fn definition(&self) -> MonitorResult<RuleDefinition> {
        RuleDefinition::from_rule(RULE_TYPE, self)
    }

    fn try_apply(&self, path: &str, store: &mut EntryStore) -> MonitorResult<()> {
        let Some(prefix) = self
            .suffixes
            .iter()
            .find_map(|suffix| path.strip_suffix(suffix.as_str()))
        else {
            return Ok(());
        };

        let entry_paths: Vec<String> = self
            .suffixes
            .iter()
            .map(|suffix| format!("{prefix}{suffix}"))
            .collect();
        // siblings must already have their entries, the combined one must not exist yet
        let new_path = format!("{prefix}{}", self.new_entry_suffix);
        if store.holds_path(&new_path) || !entry_paths.iter().all(|p| store.holds_path(p)) {
            return Ok(());
        }

        let entry = self.build_entry(prefix, &entry_paths);
        debug!(rule = %self.id, path = %entry.path, "creating formatted entry");
        let id = store.insert(entry);
        store.add_entries(Section::Displayed, &[id])?;

        if self.hide_entries {
            let to_hide: Vec<EntryId> = store
                .entries_in(Section::Displayed)
                .filter(|(id, entry)| entry_paths.contains(&entry.path) && !store.is_custom(*id))
                .map(|(id, _)| id)
                .collect();
            store.move_entries(Section::Displayed, Section::Hidden, &to_hide)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::TextMonitor;
    use serde_json::json;

    fn add_default(store: &mut EntryStore, path: &str, value: serde_json::Value) -> EntryId {
        store.record_value(path, value.clone());
        let id = store.insert(MonitoredEntry::default_for(path, &value));
        store.add_entries(Section::Displayed, &[id]).unwrap();
        id
    }

    fn progress_rule() -> FormatRule {
        FormatRule::new("loop_progress", ["index", "points"], "progress", "{0}/{1}")
    }

    #[test]
    fn test_waits_for_all_siblings() {
        let mut store = EntryStore::new();
        add_default(&mut store, "root/loop_index", json!(3));

        progress_rule().try_apply("root/loop_index", &mut store).unwrap();
        assert_eq!(store.section(Section::Displayed).len(), 1);
        assert!(store.section(Section::Hidden).is_empty());
    }

    #[test]
    fn test_builds_and_hides() {
        let mut store = EntryStore::new();
        let index = add_default(&mut store, "root/loop_index", json!(3));
        let points = add_default(&mut store, "root/loop_points", json!(10));

        progress_rule().try_apply("root/loop_points", &mut store).unwrap();

        let (id, entry) = store.entries_in(Section::Displayed).next().unwrap();
        assert_eq!(entry.name, "loop_progress");
        assert_eq!(entry.path, "root/loop_progress");
        assert_eq!(entry.formatting, "{root/loop_index}/{root/loop_points}");
        assert_eq!(entry.value, "3/10");
        assert_eq!(store.section(Section::Displayed).ids(), [id]);
        assert_eq!(store.section(Section::Hidden).ids(), [index, points]);
        assert_eq!(store.dependencies().updaters_for("root/loop_index"), [id]);
    }

    #[test]
    fn test_keep_entries() {
        let mut store = EntryStore::new();
        add_default(&mut store, "root/loop_index", json!(1));
        add_default(&mut store, "root/loop_points", json!(4));

        progress_rule()
            .keep_entries()
            .try_apply("root/loop_index", &mut store)
            .unwrap();
        assert_eq!(store.section(Section::Displayed).len(), 3);
        assert!(store.section(Section::Hidden).is_empty());
    }

    #[test]
    fn test_single_entry_per_prefix() {
        let mut store = EntryStore::new();
        add_default(&mut store, "root/loop_index", json!(3));
        add_default(&mut store, "root/loop_points", json!(10));

        let rule = progress_rule().keep_entries();
        rule.try_apply("root/loop_index", &mut store).unwrap();
        rule.try_apply("root/loop_points", &mut store).unwrap();

        assert_eq!(
            store.paths_in(Section::Displayed),
            vec!["root/loop_index", "root/loop_points", "root/loop_progress"]
        );
        assert_eq!(store.dependencies().updaters_for("root/loop_index").len(), 2);
    }

    #[test]
    fn test_known_values_without_entries_are_not_combined() {
        let mut store = EntryStore::new();
        store.record_value("root/loop_points", json!(10));
        add_default(&mut store, "root/loop_index", json!(3));

        progress_rule().try_apply("root/loop_index", &mut store).unwrap();
        assert_eq!(store.paths_in(Section::Displayed), vec!["root/loop_index"]);
    }

    #[test]
    fn test_refresh_builds_one_combined_entry() {
        let mut monitor = TextMonitor::default();
        monitor.add_rule(Box::new(progress_rule()));

        let values = [
            ("root/loop_index".to_string(), json!(1)),
            ("root/loop_points".to_string(), json!(3)),
        ]
        .into_iter()
        .collect();
        monitor.refresh_monitored_entries(values).unwrap();

        let store = monitor.store();
        assert_eq!(store.paths_in(Section::Displayed), vec!["root/loop_progress"]);
        assert_eq!(
            store.paths_in(Section::Hidden),
            vec!["root/loop_index", "root/loop_points"]
        );
        assert_eq!(store.dependencies().updaters_for("root/loop_index").len(), 1);
        assert_eq!(monitor.displayed_values(), vec![("loop_progress", "1/3")]);
    }

    #[test]
    fn test_hide_entries_defaults_to_true() {
        let definition = RuleDefinition::new("p", "format")
            .with_param("suffixes", json!(["a", "b"]))
            .with_param("new_entry_suffix", json!("ab"))
            .with_param("new_entry_formatting", json!("{0}{1}"));
        let rule: FormatRule = definition.to_rule().unwrap();
        assert!(rule.hide_entries);
    }
}
