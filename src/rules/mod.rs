//! Rules building and rearranging monitor entries.
//!
//! Every time a new database path appears, the monitor first creates a default entry
//! for it and then offers the path to each of its rules. A rule may create new entries
//! (e.g. combine `index` and `points` into a single progress entry) or move existing
//! ones to another section. Rules are opaque to the monitor: it only calls
//! [`Rule::try_apply`].
//!
//! # Persistence
//!
//! Rules are persisted as a [`RuleDefinition`]: an id, the name of the rule type and the
//! type-specific parameters. Definitions contributed by the application (shared rules)
//! are persisted by id only and resolved again on load through the lookup injected in
//! the [`RuleRegistry`].
//!
//! # Example
//!
//! ```rust
//! use daq_monitor::rules::{RuleDefinition, RuleRegistry};
//!
//! let shared = RuleDefinition::new("daq.loop_progress", "format")
//!     .with_param("suffixes", serde_json::json!(["index", "points"]))
//!     .with_param("new_entry_suffix", serde_json::json!("progress"))
//!     .with_param("new_entry_formatting", serde_json::json!("{0}/{1}"));
//!
//! let registry = RuleRegistry::new().with_shared_definitions(vec![shared]);
//! let rule = registry.build_rule("daq.loop_progress").unwrap();
//! assert_eq!(rule.id(), "daq.loop_progress");
//! assert!(registry.is_shared(rule.id()));
//! ```

pub mod format;
pub mod reject;

pub use format::FormatRule;
pub use reject::RejectRule;

use crate::error::{MonitorError, MonitorResult};
use crate::monitor::store::EntryStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

/// Policy reacting to new database paths.
pub trait Rule: Send + Sync + Debug {
    /// Unique identifier of the rule.
    fn id(&self) -> &str;

    /// Name of the factory able to rebuild this rule.
    fn rule_type(&self) -> &'static str;

    /// Persistable form of the rule.
    fn definition(&self) -> MonitorResult<RuleDefinition>;

    /// React to the appearance of `path`, possibly creating or moving entries.
    fn try_apply(&self, path: &str, store: &mut EntryStore) -> MonitorResult<()>;
}

/// Serialized form of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Unique identifier of the rule
    pub id: String,
    /// Name of the factory used to build the rule
    pub rule_type: String,
    /// Human readable description
    #[serde(default)]
    pub description: String,
    /// Type specific parameters
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl RuleDefinition {
    /// Create a definition without parameters.
    pub fn new(id: impl Into<String>, rule_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rule_type: rule_type.into(),
            description: String::new(),
            params: serde_json::Map::new(),
        }
    }

    /// Set a type specific parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Build the definition of a serializable rule.
    pub fn from_rule<R: Serialize>(rule_type: &str, rule: &R) -> MonitorResult<Self> {
        let mut value = serde_json::to_value(rule)?;
        if let serde_json::Value::Object(map) = &mut value {
            map.insert("rule_type".to_string(), rule_type.into());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Deserialize the concrete rule described by this definition.
    pub fn to_rule<R: DeserializeOwned>(&self) -> MonitorResult<R> {
        let value = serde_json::to_value(self)?;
        serde_json::from_value(value)
            .map_err(|e| MonitorError::InvalidRule(format!("{}: {e}", self.id)))
    }

    /// JSON text used in persisted monitor state.
    pub fn to_json(&self) -> MonitorResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

type RuleFactory = Box<dyn Fn(&RuleDefinition) -> MonitorResult<Box<dyn Rule>> + Send + Sync>;
type SharedRuleResolver = Box<dyn Fn(&str) -> Option<RuleDefinition> + Send + Sync>;

/// Named rule factories plus the lookup of shared rule definitions.
pub struct RuleRegistry {
    factories: HashMap<String, RuleFactory>,
    resolve_shared: Option<SharedRuleResolver>,
}

impl Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rule_types", &self.rule_types())
            .field("has_shared_rules", &self.resolve_shared.is_some())
            .finish()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRegistry {
    /// Registry knowing the built-in rule types and no shared rule.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
            resolve_shared: None,
        };

        registry.register(reject::RULE_TYPE, |definition| {
            let rule: RejectRule = definition.to_rule()?;
            Ok(Box::new(rule))
        });
        registry.register(format::RULE_TYPE, |definition| {
            let rule: FormatRule = definition.to_rule()?;
            Ok(Box::new(rule))
        });

        registry
    }

    /// Register (or replace) the factory of a rule type.
    pub fn register<F>(&mut self, rule_type: impl Into<String>, factory: F)
    where
        F: Fn(&RuleDefinition) -> MonitorResult<Box<dyn Rule>> + Send + Sync + 'static,
    {
        self.factories.insert(rule_type.into(), Box::new(factory));
    }

    /// Inject the lookup used to resolve shared rule ids.
    pub fn with_shared_rules<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str) -> Option<RuleDefinition> + Send + Sync + 'static,
    {
        self.resolve_shared = Some(Box::new(resolver));
        self
    }

    /// Use a fixed list of definitions as the shared rules.
    pub fn with_shared_definitions(self, definitions: Vec<RuleDefinition>) -> Self {
        let by_id: HashMap<String, RuleDefinition> = definitions
            .into_iter()
            .map(|definition| (definition.id.clone(), definition))
            .collect();
        self.with_shared_rules(move |id| by_id.get(id).cloned())
    }

    /// Definition of the shared rule `id`, if there is one.
    pub fn resolve_shared(&self, id: &str) -> Option<RuleDefinition> {
        self.resolve_shared.as_ref().and_then(|resolve| resolve(id))
    }

    /// Whether `id` names a shared rule.
    pub fn is_shared(&self, id: &str) -> bool {
        self.resolve_shared(id).is_some()
    }

    /// Known rule type names, sorted.
    pub fn rule_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Build a rule from its definition.
    pub fn create(&self, definition: &RuleDefinition) -> MonitorResult<Box<dyn Rule>> {
        self.factories
            .get(&definition.rule_type)
            .ok_or_else(|| MonitorError::UnknownRuleType(definition.rule_type.clone()))
            .and_then(|factory| factory(definition))
    }

    /// Build a rule from its persisted form: a shared rule id or a JSON definition.
    pub fn build_rule(&self, config: &str) -> MonitorResult<Box<dyn Rule>> {
        let config = config.trim();
        if config.starts_with('{') {
            let definition: RuleDefinition = serde_json::from_str(config)?;
            return self.create(&definition);
        }

        let definition = self
            .resolve_shared(config)
            .ok_or_else(|| MonitorError::UnknownSharedRule(config.to_string()))?;
        self.create(&definition)
    }
}
