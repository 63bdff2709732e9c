//! Rule keeping uninteresting values out of view.

use super::{Rule, RuleDefinition};
use crate::error::MonitorResult;
use crate::monitor::section::Section;
use crate::monitor::store::EntryStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Factory name of [`RejectRule`].
pub const RULE_TYPE: &str = "reject";

/// Moves the default entry of any path ending with one of `suffixes` to the
/// undisplayed section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectRule {
    /// Unique identifier of the rule
    pub id: String,
    /// Human readable description
    #[serde(default)]
    pub description: String,
    /// Path endings to reject
    pub suffixes: Vec<String>,
}

impl RejectRule {
    /// Create a rule rejecting the given suffixes.
    pub fn new(id: impl Into<String>, suffixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            suffixes: suffixes.into_iter().map(Into::into).collect(),
        }
    }
}

impl Rule for RejectRule {
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
        if !self.suffixes.iter().any(|suffix| path.ends_with(suffix.as_str())) {
            return Ok(());
        }

        if let Some(id) = store.find_generated(Section::Displayed, path) {
            debug!(rule = %self.id, path, "rejecting entry");
            store.move_entries(Section::Displayed, Section::Undisplayed, &[id])?;
        }
        Ok(())
    }
}
