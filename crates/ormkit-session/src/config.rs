//! Session configuration loaded from JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use ormkit_core::{ConfigError, Error, Result};
use ormkit_sqlite::SqliteConfig;

/// Declarative session setup, usually read from a JSON document.
///
/// `provider` selects the backend and gates which nested section applies;
/// only `"sqlite"` is recognized. The top-level `verbose` flag is a
/// convenience that also switches on statement logging in the provider
/// section.
///
/// ```json
/// {
///     "provider": "sqlite",
///     "verbose": true,
///     "sqlite": { "databaseName": "app.db", "schemaMode": "update" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub provider: String,
    pub verbose: bool,
    pub sqlite: SqliteConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            verbose: false,
            sqlite: SqliteConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from a JSON document.
    ///
    /// Absent fields fall back to their defaults, so `{}` is a valid
    /// in-memory SQLite setup.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| config_error(format!("invalid session configuration: {err}")))
    }

    /// Read and parse a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            config_error(format!(
                "cannot read configuration file '{}': {err}",
                path.display()
            ))
        })?;
        Self::from_json(&text)
    }
}

fn config_error(message: String) -> Error {
    Error::from(ConfigError { message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormkit_core::ErrorKind;
    use ormkit_sqlite::SchemaMode;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = SessionConfig::from_json("{}").expect("defaults");
        assert_eq!(config.provider, "sqlite");
        assert!(!config.verbose);
        assert_eq!(config.sqlite.database_name, ":memory:");
        assert_eq!(config.sqlite.schema_mode, SchemaMode::Recreate);
    }

    #[test]
    fn test_nested_fields_parse_as_camel_case() {
        let config = SessionConfig::from_json(
            r#"{
                "provider": "sqlite",
                "verbose": true,
                "sqlite": {
                    "databaseName": "app.db",
                    "schemaMode": "validate",
                    "busyTimeoutMs": 250
                }
            }"#,
        )
        .expect("parse");
        assert!(config.verbose);
        assert_eq!(config.sqlite.database_name, "app.db");
        assert_eq!(config.sqlite.schema_mode, SchemaMode::Validate);
        assert_eq!(config.sqlite.busy_timeout_ms, 250);
    }

    #[test]
    fn test_malformed_json_reports_a_configuration_error() {
        let err = SessionConfig::from_json("{ not json").expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::Other);
        assert!(err.to_string().contains("invalid session configuration"));
    }

    #[test]
    fn test_missing_file_reports_its_path() {
        let err = SessionConfig::from_file("/nonexistent/ormkit.json").expect_err("must fail");
        assert!(err.to_string().contains("/nonexistent/ormkit.json"));
    }

    #[test]
    fn test_round_trips_through_serde() {
        let config = SessionConfig {
            provider: "sqlite".to_string(),
            verbose: true,
            sqlite: SqliteConfig::file("towns.db").schema_mode(SchemaMode::Update),
        };
        let json = serde_json::to_string(&config).expect("serialize");
        assert!(json.contains("\"databaseName\":\"towns.db\""));
        assert_eq!(SessionConfig::from_json(&json).expect("parse"), config);
    }
}
