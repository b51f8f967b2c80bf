//! Provider configuration.

use serde::{Deserialize, Serialize};

/// How the provider reconciles entity classes with the database schema
/// the first time each class is touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaMode {
    /// Drop and recreate the table. Existing data is lost.
    #[default]
    Recreate,
    /// Migrate an existing table in place.
    Update,
    /// Check an existing table against the entity class.
    Validate,
    /// Leave the schema alone entirely.
    Bypass,
}

/// Settings of a [`SqliteProvider`](crate::SqliteProvider).
///
/// Deserializes from camelCase keys, so configuration files read
/// `{"databaseName": "app.db", "schemaMode": "bypass"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SqliteConfig {
    /// Path of the database file, or `:memory:`.
    pub database_name: String,
    /// Schema reconciliation mode.
    pub schema_mode: SchemaMode,
    /// Log every generated statement before executing it.
    pub verbose: bool,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_ms: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            database_name: ":memory:".to_string(),
            schema_mode: SchemaMode::default(),
            verbose: false,
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Settings for a file-backed database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            database_name: path.into(),
            ..Self::default()
        }
    }

    /// Settings for an in-memory database.
    #[must_use]
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set the schema reconciliation mode.
    #[must_use]
    pub fn schema_mode(mut self, mode: SchemaMode) -> Self {
        self.schema_mode = mode;
        self
    }

    /// Enable or disable statement logging.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the busy timeout in milliseconds.
    #[must_use]
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}
