//! Configuration store and scoped value resolution.
//!
//! The store is a read-only hierarchical document populated once before a
//! run starts (config file merged with command-line flags) and shared by
//! reference — there is no process-wide configuration singleton. Scenario
//! workers resolve effective values through [`ConfigResolver`], which
//! checks a scenario-scoped key (`<scenario>.<field>`) and falls back to
//! the supplied run-wide default.

use serde_yaml::{Mapping, Value};

/// Hard-coded fallback when neither flag nor file configures a duration.
pub const DEFAULT_DURATION_MINUTES: i64 = 1;
/// Hard-coded fallback for the pause between scenarios.
pub const DEFAULT_COOLDOWN_SECONDS: i64 = 10;
/// Hard-coded fallback attack rate.
pub const DEFAULT_RATE: &str = "1/s";

/// Errors raised while loading configuration input.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("configuration file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Immutable hierarchical key/value store with dot-path lookup.
///
/// Keys descend nested mappings: `tests.list-clusters.rate` reads the
/// `rate` entry of the `list-clusters` mapping under `tests`. Lookups
/// never mutate the document.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    root: Value,
}

impl ConfigStore {
    /// Creates an empty store; every lookup falls back to defaults.
    pub fn empty() -> Self {
        Self {
            root: Value::Mapping(Mapping::new()),
        }
    }

    /// Parses a YAML document into a store.
    pub fn from_yaml(document: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_yaml::from_str(document)?;
        Ok(Self::from_value(root))
    }

    /// Wraps an already-parsed document.
    pub fn from_value(root: Value) -> Self {
        match root {
            Value::Mapping(_) => Self { root },
            // Empty files parse to null; treat them as an empty mapping.
            _ => Self::empty(),
        }
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let mut current = &self.root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// True when the store holds no keys at all.
    pub fn is_empty(&self) -> bool {
        self.root.as_mapping().is_none_or(Mapping::is_empty)
    }

    /// Returns true when the key exists at all, even with a null value.
    ///
    /// Scenario enablement relies on this: a bare `list-clusters:` entry
    /// under `tests` marks the scenario enabled without configuring it.
    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// String value at `key`; numbers are coerced to their decimal form.
    pub fn string(&self, key: &str) -> Option<String> {
        match self.lookup(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Integer value at `key`; numeric strings are coerced.
    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.lookup(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the sub-store rooted at `key`, or an empty store.
    pub fn section(&self, key: &str) -> ConfigStore {
        match self.lookup(key) {
            Some(value @ Value::Mapping(_)) => ConfigStore {
                root: value.clone(),
            },
            _ => ConfigStore::empty(),
        }
    }

    /// Inserts a value at a dot path, creating intermediate mappings.
    ///
    /// Used only while assembling the store before a run; the runner and
    /// resolver only ever read.
    pub fn insert(&mut self, key: &str, value: Value) {
        if self.root.as_mapping().is_none() {
            self.root = Value::Mapping(Mapping::new());
        }
        let Some(mut current) = self.root.as_mapping_mut() else {
            return;
        };
        let parts: Vec<&str> = key.split('.').collect();
        for part in &parts[..parts.len() - 1] {
            let entry = current
                .entry(Value::from(*part))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if !entry.is_mapping() {
                *entry = Value::Mapping(Mapping::new());
            }
            let Some(next) = entry.as_mapping_mut() else {
                return;
            };
            current = next;
        }
        current.insert(Value::from(parts[parts.len() - 1]), value);
    }
}

/// Run-wide defaults, resolved once from the root of the store.
#[derive(Debug, Clone)]
pub struct RunDefaults {
    pub duration_minutes: i64,
    pub cooldown_seconds: i64,
    pub rate: String,
    /// Empty string means no ramp configured globally.
    pub ramp_type: String,
    pub start_rate: i64,
    pub end_rate: i64,
    pub ramp_steps: i64,
    pub ramp_duration_minutes: i64,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            duration_minutes: DEFAULT_DURATION_MINUTES,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            rate: DEFAULT_RATE.to_string(),
            ramp_type: String::new(),
            start_rate: 0,
            end_rate: 0,
            ramp_steps: 0,
            ramp_duration_minutes: 0,
        }
    }
}

impl RunDefaults {
    /// Reads the global (unscoped) keys, falling back to the hard-coded
    /// defaults above.
    pub fn from_store(store: &ConfigStore) -> Self {
        Self {
            duration_minutes: store.integer("duration").unwrap_or(DEFAULT_DURATION_MINUTES),
            cooldown_seconds: store.integer("cooldown").unwrap_or(DEFAULT_COOLDOWN_SECONDS),
            rate: store
                .string("rate")
                .unwrap_or_else(|| DEFAULT_RATE.to_string()),
            ramp_type: store.string("ramp-type").unwrap_or_default(),
            start_rate: store.integer("start-rate").unwrap_or(0),
            end_rate: store.integer("end-rate").unwrap_or(0),
            ramp_steps: store.integer("ramp-steps").unwrap_or(0),
            ramp_duration_minutes: store.integer("ramp-duration").unwrap_or(0),
        }
    }
}

/// Scoped value resolution over a scenario configuration section.
pub struct ConfigResolver<'a> {
    store: &'a ConfigStore,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(store: &'a ConfigStore) -> Self {
        Self { store }
    }

    /// Returns the stored string when present and non-empty, otherwise the
    /// supplied default.
    pub fn resolve_string(&self, default: &str, key: &str) -> String {
        match self.store.string(key) {
            Some(value) if !value.is_empty() => value,
            _ => {
                tracing::info!("No value for '{}', using default", key);
                default.to_string()
            }
        }
    }

    /// Returns the stored integer when present and non-zero, otherwise the
    /// supplied default.
    ///
    /// A legitimately configured `0` is indistinguishable from "absent"
    /// and falls back to the default — an accepted limitation.
    pub fn resolve_int(&self, default: i64, key: &str) -> i64 {
        match self.store.integer(key) {
            Some(value) if value != 0 => value,
            _ => {
                tracing::info!("No value for '{}', using default", key);
                default
            }
        }
    }

    /// Gate for building a ramp schedule. Returns false, with a warning,
    /// for any bound the scheduler cannot interpolate over; the caller
    /// must then run the scenario steady-state instead.
    pub fn validate_ramp_config(&self, start_rate: i64, end_rate: i64, steps: i64) -> bool {
        if steps < 2 {
            tracing::warn!("Ramp steps must be 2 or more, ignoring ramp configuration");
            return false;
        }
        if start_rate < 1 {
            tracing::warn!("Ramp start rate must be 1 or more, ignoring ramp configuration");
            return false;
        }
        if end_rate < 1 {
            tracing::warn!("Ramp end rate must be 1 or more, ignoring ramp configuration");
            return false;
        }
        if end_rate <= start_rate {
            tracing::warn!(
                "Ramp end rate must be bigger than the start rate, ignoring ramp configuration"
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ConfigStore {
        ConfigStore::from_yaml(
            r#"
rate: 5/s
duration: 20
tests:
  list-clusters:
    rate: 2/s
    duration: 3
  create-cluster:
  self-access-token:
    duration: 0
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_descends_dot_paths() {
        let store = store();
        assert_eq!(store.string("rate").as_deref(), Some("5/s"));
        assert_eq!(store.string("tests.list-clusters.rate").as_deref(), Some("2/s"));
        assert_eq!(store.integer("tests.list-clusters.duration"), Some(3));
        assert!(store.string("tests.missing.rate").is_none());
    }

    #[test]
    fn test_contains_counts_null_entries() {
        let tests = store().section("tests");
        assert!(tests.contains("list-clusters"));
        assert!(tests.contains("create-cluster"));
        assert!(!tests.contains("all"));
    }

    #[test]
    fn test_section_of_missing_key_is_empty() {
        let section = store().section("nothing-here");
        assert!(!section.contains("anything"));
    }

    #[test]
    fn test_insert_creates_nested_mappings() {
        let mut store = ConfigStore::empty();
        store.insert("tests.quota-cost", Value::Mapping(Mapping::new()));
        store.insert("rate", Value::from("9/s"));
        assert!(store.section("tests").contains("quota-cost"));
        assert_eq!(store.string("rate").as_deref(), Some("9/s"));
    }

    #[test]
    fn test_resolve_string_prefers_scoped_value() {
        let tests = store().section("tests");
        let resolver = ConfigResolver::new(&tests);
        assert_eq!(resolver.resolve_string("5/s", "list-clusters.rate"), "2/s");
        assert_eq!(resolver.resolve_string("5/s", "create-cluster.rate"), "5/s");
    }

    #[test]
    fn test_resolve_int_treats_zero_as_absent() {
        let tests = store().section("tests");
        let resolver = ConfigResolver::new(&tests);
        assert_eq!(resolver.resolve_int(20, "list-clusters.duration"), 3);
        assert_eq!(resolver.resolve_int(20, "create-cluster.duration"), 20);
        // Configured zero is indistinguishable from absent.
        assert_eq!(resolver.resolve_int(20, "self-access-token.duration"), 20);
    }

    #[test]
    fn test_validate_ramp_config_matrix() {
        let empty = ConfigStore::empty();
        let resolver = ConfigResolver::new(&empty);
        assert!(resolver.validate_ramp_config(1, 5, 2));
        assert!(!resolver.validate_ramp_config(5, 5, 2));
        assert!(!resolver.validate_ramp_config(5, 2, 2));
        assert!(!resolver.validate_ramp_config(0, 5, 2));
        assert!(!resolver.validate_ramp_config(1, 5, 1));
    }

    #[test]
    fn test_run_defaults_fall_back_when_unset() {
        let defaults = RunDefaults::from_store(&ConfigStore::empty());
        assert_eq!(defaults.duration_minutes, DEFAULT_DURATION_MINUTES);
        assert_eq!(defaults.cooldown_seconds, DEFAULT_COOLDOWN_SECONDS);
        assert_eq!(defaults.rate, DEFAULT_RATE);
        assert!(defaults.ramp_type.is_empty());
    }

    #[test]
    fn test_run_defaults_read_global_keys() {
        let defaults = RunDefaults::from_store(&store());
        assert_eq!(defaults.duration_minutes, 20);
        assert_eq!(defaults.rate, "5/s");
    }
}
