//! Configuration assembly: YAML file under command-line flags.
//!
//! The file provides the baseline; any flag the user actually passed
//! overrides it. Scenario selection mirrors the same precedence: the
//! `--test-names` flag replaces the file's `tests:` section, and when
//! neither selects anything every scenario is enabled via `tests.all`.

use std::path::Path;

use serde_yaml::{Mapping, Value};
use surge_core::ConfigStore;

use crate::Cli;

pub const DEFAULT_GATEWAY_URL: &str = "https://api.example.com";
pub const DEFAULT_TOKEN_URL: &str =
    "https://sso.example.com/auth/realms/api/protocol/openid-connect/token";
pub const DEFAULT_CLIENT_ID: &str = "cloud-services";
pub const DEFAULT_OUTPUT_PATH: &str = "results";
pub const DEFAULT_CONNECTIONS: usize = 1;

/// Loads the YAML configuration file, or an empty store when the file
/// does not exist.
pub fn load_store(config_file: &Path) -> anyhow::Result<ConfigStore> {
    if !config_file.exists() {
        tracing::debug!(
            "Configuration file {} not found, starting empty",
            config_file.display()
        );
        return Ok(ConfigStore::empty());
    }
    let document = std::fs::read_to_string(config_file)?;
    Ok(ConfigStore::from_yaml(&document)?)
}

/// Writes every flag the user passed into the store, overriding the file.
pub fn apply_flags(store: &mut ConfigStore, cli: &Cli) {
    insert_string(store, "gateway-url", cli.gateway_url.as_deref());
    insert_string(store, "token-url", cli.token_url.as_deref());
    insert_string(store, "token", cli.token.as_deref());
    insert_string(store, "client-id", cli.client_id.as_deref());
    insert_string(store, "client-secret", cli.client_secret.as_deref());
    insert_string(store, "test-id", cli.test_id.as_deref());
    insert_string(
        store,
        "output-path",
        cli.output_path.as_deref().and_then(Path::to_str),
    );
    insert_string(store, "rate", cli.rate.as_deref());
    insert_integer(store, "duration", cli.duration);
    insert_integer(store, "cooldown", cli.cooldown);
    insert_integer(store, "connections", cli.connections.map(|count| count as i64));
}

/// Builds the enabled-scenario section.
///
/// Explicit `--test-names` replace whatever the file selected; when
/// neither flag nor file selects anything, `all` is enabled.
pub fn select_tests(store: &mut ConfigStore, test_names: &[String]) {
    if !test_names.is_empty() {
        store.insert("tests", Value::Mapping(Mapping::new()));
        for name in test_names {
            store.insert(&format!("tests.{name}"), Value::Mapping(Mapping::new()));
        }
        return;
    }
    if store.section("tests").is_empty() {
        store.insert("tests.all", Value::Mapping(Mapping::new()));
    }
}

pub fn string_or(store: &ConfigStore, key: &str, default: &str) -> String {
    store.string(key).unwrap_or_else(|| default.to_string())
}

fn insert_string(store: &mut ConfigStore, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        store.insert(key, Value::from(value));
    }
}

fn insert_integer(store: &mut ConfigStore, key: &str, value: Option<i64>) {
    if let Some(value) = value {
        store.insert(key, Value::from(value));
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("surge").chain(args.iter().copied()))
    }

    #[test]
    fn test_flags_override_file_values() {
        let mut store = ConfigStore::from_yaml("rate: 2/s\nduration: 5\n").unwrap();
        apply_flags(&mut store, &cli(&["--rate", "9/s"]));
        assert_eq!(store.string("rate").as_deref(), Some("9/s"));
        // Flag not passed: the file value stands.
        assert_eq!(store.integer("duration"), Some(5));
    }

    #[test]
    fn test_select_tests_from_flag_replaces_file_selection() {
        let mut store =
            ConfigStore::from_yaml("tests:\n  list-clusters:\n    rate: 1/s\n").unwrap();
        select_tests(
            &mut store,
            &["create-cluster".to_string(), "quota-cost".to_string()],
        );
        let tests = store.section("tests");
        assert!(tests.contains("create-cluster"));
        assert!(tests.contains("quota-cost"));
        assert!(!tests.contains("list-clusters"));
    }

    #[test]
    fn test_select_tests_defaults_to_all() {
        let mut store = ConfigStore::empty();
        select_tests(&mut store, &[]);
        assert!(store.section("tests").contains("all"));
    }

    #[test]
    fn test_select_tests_keeps_file_selection() {
        let mut store = ConfigStore::from_yaml("tests:\n  list-clusters:\n").unwrap();
        select_tests(&mut store, &[]);
        let tests = store.section("tests");
        assert!(tests.contains("list-clusters"));
        assert!(!tests.contains("all"));
    }

    #[test]
    fn test_load_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = load_store(&dir.path().join("config.yaml")).unwrap();
        assert!(store.string("rate").is_none());
    }
}
