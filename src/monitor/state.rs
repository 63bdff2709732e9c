//! Persistence of the monitor state.
//!
//! The state of a text monitor is written as a flat `key → string` mapping so it can
//! live in any textual preference store:
//!
//! | key                          | value                                                   |
//! |------------------------------|---------------------------------------------------------|
//! | `monitor_id`, `auto_show`    | scalar members of the monitor                           |
//! | `custom_<i>`                 | JSON object with the members of the i-th custom entry   |
//! | `rule_<i>`                   | shared rule id, or JSON definition of a local rule      |
//! | `displayed`, `undisplayed`, `hidden` | JSON list of the paths held by the section      |
//!
//! Restoring a state rebuilds the rules and custom entries, replays the database
//! values, then dispatches the resulting entries to the sections they were saved in.
//! Entries the saved lists do not mention are displayed and reported through the
//! monitor's [`NoticeSink`](super::notice::NoticeSink).

use super::entry::{EntryDefinition, EntryId, MonitoredEntry};
use super::section::Section;
use super::{TextMonitor, MONITOR_ID};
use crate::database::DatabaseValues;
use crate::error::{MonitorError, MonitorResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Flat persisted form of a monitor.
pub type MonitorState = BTreeMap<String, String>;

const MONITOR_ID_KEY: &str = "monitor_id";
const AUTO_SHOW_KEY: &str = "auto_show";
const CUSTOM_PREFIX: &str = "custom_";
const RULE_PREFIX: &str = "rule_";

/// Encode an ordered list of paths as a list literal.
pub fn encode_paths(paths: &[String]) -> MonitorResult<String> {
    Ok(serde_json::to_string(paths)?)
}

/// Decode a list literal written by [`encode_paths`].
///
/// Only a list of strings is accepted; anything else is a [`MonitorError::State`].
pub fn decode_paths(text: &str) -> MonitorResult<Vec<String>> {
    serde_json::from_str(text)
        .map_err(|e| MonitorError::State(format!("invalid path list {text:?}: {e}")))
}

/// Write a monitor state to a TOML file.
pub fn save_state(path: &Path, state: &MonitorState) -> MonitorResult<()> {
    let text = toml::to_string_pretty(state)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    Ok(())
}

/// Read a monitor state from a TOML file.
pub fn load_state(path: &Path) -> MonitorResult<MonitorState> {
    let text = fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

/// Values of the `<prefix>*` keys: numbered keys by index, then the others by name.
fn indexed_values<'a>(state: &'a MonitorState, prefix: &str) -> Vec<(&'a str, &'a str)> {
    let mut found: Vec<(Option<usize>, &str, &str)> = state
        .iter()
        .filter_map(|(key, value)| {
            let index = key.strip_prefix(prefix)?.parse().ok();
            Some((index, key.as_str(), value.as_str()))
        })
        .collect();
    found.sort_by_key(|(index, key, _)| (index.is_none(), *index, *key));
    found
        .into_iter()
        .map(|(_, key, value)| (key, value))
        .collect()
}

fn saved_paths(state: &MonitorState, section: Section) -> MonitorResult<Vec<String>> {
    let text = state
        .get(section.as_str())
        .ok_or_else(|| MonitorError::State(format!("missing '{section}' entry list")))?;
    decode_paths(text)
}

impl TextMonitor {
    /// Write the monitor state as a flat mapping.
    pub fn export_state(&self) -> MonitorResult<MonitorState> {
        let mut state = MonitorState::new();
        state.insert(MONITOR_ID_KEY.to_string(), MONITOR_ID.to_string());
        state.insert(AUTO_SHOW_KEY.to_string(), self.auto_show.to_string());

        for (i, id) in self.store.custom_entries().iter().enumerate() {
            let entry = self.store.entry(*id).ok_or(MonitorError::UnknownEntry(*id))?;
            state.insert(
                format!("{CUSTOM_PREFIX}{i}"),
                serde_json::to_string(&entry.definition())?,
            );
        }

        for (i, rule) in self.rules.iter().enumerate() {
            let value = if self.registry.is_shared(rule.id()) {
                rule.id().to_string()
            } else {
                rule.definition()?.to_json()?
            };
            state.insert(format!("{RULE_PREFIX}{i}"), value);
        }

        for section in Section::ALL {
            state.insert(
                section.as_str().to_string(),
                encode_paths(&self.store.paths_in(section))?,
            );
        }

        Ok(state)
    }

    /// Rebuild the rules and custom entries from `state` and dispatch the entries
    /// generated from `entries` to their saved sections.
    ///
    /// Rules and custom entries that cannot be rebuilt are skipped. Entries absent
    /// from every saved list are displayed and reported as a notice.
    ///
    /// # Errors
    ///
    /// Fails without modifying the monitor when a section list is missing or is not
    /// a list of strings.
    pub fn import_state(&mut self, state: &MonitorState, entries: DatabaseValues) -> MonitorResult<()> {
        let saved = [
            saved_paths(state, Section::Displayed)?,
            saved_paths(state, Section::Undisplayed)?,
            saved_paths(state, Section::Hidden)?,
        ];

        let mut rules = Vec::new();
        for (key, config) in indexed_values(state, RULE_PREFIX) {
            match self.registry.build_rule(config) {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!(key, error = %e, "skipping rule that could not be rebuilt"),
            }
        }

        let mut customs = Vec::new();
        for (key, config) in indexed_values(state, CUSTOM_PREFIX) {
            match serde_json::from_str::<EntryDefinition>(config) {
                Ok(definition) => customs.push(MonitoredEntry::from_definition(definition)),
                Err(e) => warn!(key, error = %e, "skipping custom entry that could not be read"),
            }
        }

        if let Some(auto_show) = state.get(AUTO_SHOW_KEY) {
            match auto_show.parse() {
                Ok(value) => self.auto_show = value,
                Err(_) => warn!(value = %auto_show, "ignoring invalid auto_show"),
            }
        }

        self.rules = rules;
        self.clear_state();
        for entry in customs {
            self.store.insert_custom(entry);
        }
        self.refresh_monitored_entries(entries)?;

        let mut pool: Vec<EntryId> = Vec::new();
        for id in Section::ALL
            .iter()
            .flat_map(|section| self.store.section(*section).ids())
            .chain(self.store.custom_entries())
        {
            if !pool.contains(id) {
                pool.push(*id);
            }
        }

        let mut buckets: [Vec<EntryId>; 3] = Default::default();
        for (bucket, paths) in buckets.iter_mut().zip(&saved) {
            let (claimed, rest): (Vec<EntryId>, Vec<EntryId>) = pool
                .into_iter()
                .partition(|id| {
                    self.entry_path(*id)
                        .is_some_and(|path| paths.iter().any(|saved| saved == path))
                });
            pool = rest;

            let mut claimed = claimed;
            claimed.sort_by_key(|id| {
                self.entry_path(*id)
                    .and_then(|p| paths.iter().position(|saved| saved == p))
                    .unwrap_or(usize::MAX)
            });
            *bucket = claimed;
        }

        let [mut displayed, undisplayed, hidden] = buckets;
        if !pool.is_empty() {
            let names: Vec<&str> = pool
                .iter()
                .filter_map(|id| self.store.entry(*id).map(|entry| entry.name.as_str()))
                .collect();
            self.notices.information(
                "Unhandled entries",
                &format!(
                    "The following entries were not expected from the config: {names:?}. \
                     These entries have been added to the displayed ones."
                ),
            );
            displayed.extend(pool);
        }

        debug!(
            displayed = displayed.len(),
            undisplayed = undisplayed.len(),
            hidden = hidden.len(),
            "dispatching restored entries"
        );
        self.store.commit_partition(displayed, undisplayed, hidden);
        info!(rules = self.rules.len(), "monitor state restored");
        Ok(())
    }

    fn entry_path(&self, id: EntryId) -> Option<&str> {
        self.store.entry(id).map(|entry| entry.path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseNews;
    use crate::monitor::notice::RecordedNotices;
    use crate::rules::{FormatRule, RejectRule, Rule, RuleDefinition, RuleRegistry};
    use serde_json::json;
    use std::sync::Arc;

    fn values(pairs: &[(&str, serde_json::Value)]) -> DatabaseValues {
        pairs
            .iter()
            .map(|(path, value)| (path.to_string(), value.clone()))
            .collect()
    }

    fn feed(monitor: &mut TextMonitor, values: &DatabaseValues) {
        for (path, value) in values {
            monitor
                .handle_database_change(DatabaseNews::added(path.clone(), value.clone()))
                .unwrap();
        }
    }

    #[test]
    fn test_path_list_literal() {
        let paths = vec!["root/a".to_string(), "root/\"quoted\"".to_string()];
        let text = encode_paths(&paths).unwrap();
        assert_eq!(decode_paths(&text).unwrap(), paths);
        assert!(matches!(decode_paths("[1, 2]"), Err(MonitorError::State(_))));
        assert!(matches!(decode_paths("__import__('os')"), Err(MonitorError::State(_))));
    }

    #[test]
    fn test_export_layout() {
        let registry = RuleRegistry::new().with_shared_definitions(vec![RuleDefinition::new(
            "daq.reject_raw",
            "reject",
        )
        .with_param("suffixes", json!(["_raw"]))]);
        let mut monitor = TextMonitor::new(Arc::new(registry));
        monitor.add_rule(Box::new(RejectRule::new("daq.reject_raw", ["_raw"])));
        monitor.add_rule(Box::new(RejectRule::new("local", ["_tmp"])));
        monitor
            .add_custom_entry(MonitoredEntry::new("c", "root/c", "{root/a}", ["root/a".to_string()]))
            .unwrap();
        feed(&mut monitor, &values(&[("root/a", json!(1)), ("root/b_tmp", json!(2))]));

        let state = monitor.export_state().unwrap();
        assert_eq!(state["monitor_id"], MONITOR_ID);
        assert_eq!(state["auto_show"], "true");
        assert_eq!(state["rule_0"], "daq.reject_raw");
        assert!(state["rule_1"].starts_with('{'));
        let custom: EntryDefinition = serde_json::from_str(&state["custom_0"]).unwrap();
        assert_eq!(custom.path, "root/c");
        assert_eq!(decode_paths(&state["displayed"]).unwrap(), vec!["root/a", "root/c"]);
        assert_eq!(decode_paths(&state["undisplayed"]).unwrap(), vec!["root/b_tmp"]);
        assert!(decode_paths(&state["hidden"]).unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_keeps_sections() {
        let live = values(&[
            ("root/loop_index", json!(2)),
            ("root/loop_points", json!(5)),
            ("root/T", json!(3.0)),
        ]);
        let mut monitor = TextMonitor::default();
        monitor.add_rule(Box::new(FormatRule::new(
            "progress",
            ["index", "points"],
            "progress",
            "{0}/{1}",
        )));
        feed(&mut monitor, &live);
        let t = monitor.store().find(Section::Displayed, "root/T").unwrap();
        monitor.move_entries(Section::Displayed, Section::Undisplayed, &[t]).unwrap();

        let before: Vec<Vec<String>> =
            Section::ALL.iter().map(|s| monitor.store().paths_in(*s)).collect();
        let state = monitor.export_state().unwrap();

        let notices = RecordedNotices::new();
        let mut restored = TextMonitor::default().with_notices(Arc::new(notices.clone()));
        restored.import_state(&state, live).unwrap();

        let after: Vec<Vec<String>> =
            Section::ALL.iter().map(|s| restored.store().paths_in(*s)).collect();
        assert_eq!(after, before);
        assert_eq!(restored.rules().len(), 1);
        assert!(notices.take().is_empty());
        assert_eq!(
            restored.monitored_entries(),
            ["root/loop_index".to_string(), "root/loop_points".to_string()]
        );
    }

    #[test]
    fn test_unexpected_entries_are_displayed() {
        let mut state = MonitorState::new();
        state.insert("displayed".into(), r#"["root/a"]"#.into());
        state.insert("undisplayed".into(), "[]".into());
        state.insert("hidden".into(), "[]".into());

        let notices = RecordedNotices::new();
        let mut monitor = TextMonitor::default().with_notices(Arc::new(notices.clone()));
        monitor
            .import_state(&state, values(&[("root/a", json!(1)), ("root/new", json!(2))]))
            .unwrap();

        assert_eq!(monitor.store().paths_in(Section::Displayed), vec!["root/a", "root/new"]);
        let notices = notices.take();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].0, "Unhandled entries");
        assert!(notices[0].1.contains("new"));
        assert_eq!(
            monitor.monitored_entries(),
            ["root/a".to_string(), "root/new".to_string()]
        );
    }

    #[test]
    fn test_broken_items_are_skipped() {
        let mut state = MonitorState::new();
        state.insert("displayed".into(), r#"["root/a"]"#.into());
        state.insert("undisplayed".into(), "[]".into());
        state.insert("hidden".into(), "[]".into());
        state.insert("rule_0".into(), "daq.not_shared".into());
        state.insert("rule_1".into(), r#"{"id": "x", "rule_type": "teleport"}"#.into());
        let local = RejectRule::new("ok", ["_raw"]).definition().unwrap();
        state.insert("rule_2".into(), local.to_json().unwrap());
        state.insert("custom_0".into(), "not json".into());
        state.insert("auto_show".into(), "false".into());

        let mut monitor = TextMonitor::default();
        monitor
            .import_state(&state, values(&[("root/a", json!(1))]))
            .unwrap();

        assert_eq!(monitor.rules().len(), 1);
        assert_eq!(monitor.rules()[0].id(), "ok");
        assert!(monitor.store().custom_entries().is_empty());
        assert!(!monitor.auto_show());
    }

    #[test]
    fn test_missing_list_leaves_monitor_untouched() {
        let mut monitor = TextMonitor::default();
        feed(&mut monitor, &values(&[("root/a", json!(1))]));

        let mut state = MonitorState::new();
        state.insert("displayed".into(), "[]".into());
        state.insert("hidden".into(), "[]".into());
        let err = monitor.import_state(&state, DatabaseValues::new()).unwrap_err();
        assert!(matches!(err, MonitorError::State(_)));
        assert_eq!(monitor.store().paths_in(Section::Displayed), vec!["root/a"]);
    }

    #[test]
    fn test_custom_indices_sorted_numerically() {
        let mut state = MonitorState::new();
        for i in 0..12 {
            let definition = EntryDefinition {
                name: format!("c{i}"),
                path: format!("root/c{i}"),
                formatting: String::new(),
                depend_on: vec![format!("root/missing{i}")],
            };
            state.insert(
                format!("custom_{i}"),
                serde_json::to_string(&definition).unwrap(),
            );
        }
        let keys: Vec<&str> = indexed_values(&state, CUSTOM_PREFIX)
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys[2], "custom_2");
        assert_eq!(keys[11], "custom_11");
    }

    #[test]
    fn test_unnumbered_keys_come_last() {
        let mut state = MonitorState::new();
        state.insert("rule_local".into(), "c".into());
        state.insert("rule_10".into(), "b".into());
        state.insert("rule_2".into(), "a".into());
        state.insert("displayed".into(), "[]".into());

        assert_eq!(
            indexed_values(&state, RULE_PREFIX),
            vec![("rule_2", "a"), ("rule_10", "b"), ("rule_local", "c")]
        );
    }

    #[test]
    fn test_unnumbered_rule_is_imported() {
        let mut state = MonitorState::new();
        state.insert("displayed".into(), "[]".into());
        state.insert("undisplayed".into(), "[]".into());
        state.insert("hidden".into(), "[]".into());
        let local = RejectRule::new("local", ["_raw"]).definition().unwrap();
        state.insert("rule_local".into(), local.to_json().unwrap());

        let mut monitor = TextMonitor::default();
        monitor.import_state(&state, DatabaseValues::new()).unwrap();
        assert_eq!(monitor.rules().len(), 1);
        assert_eq!(monitor.rules()[0].id(), "local");
    }

    #[test]
    fn test_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        let mut monitor = TextMonitor::default();
        feed(&mut monitor, &values(&[("root/a", json!(1))]));

        let state = monitor.export_state().unwrap();
        save_state(&path, &state).unwrap();
        assert_eq!(load_state(&path).unwrap(), state);
    }
}
