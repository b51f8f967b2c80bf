//! The SQLite provider.
//!
//! Owns at most one open [`SqliteConnection`] and reconciles entity
//! schema lazily: each entity class is synchronized once per provider
//! lifetime, the first time a query touches it. The synchronization
//! record is keyed by class name and deliberately survives disconnects,
//! so reconnecting does not recreate tables a second time.

use std::collections::HashSet;

use ormkit_core::{EntityMetadata, Error, Operation, Provider, Query, QueryResult, Result};

use crate::config::SqliteConfig;
use crate::connection::SqliteConnection;
use crate::{schema, statement};

#[derive(Debug)]
pub struct SqliteProvider {
    config: SqliteConfig,
    connection: Option<SqliteConnection>,
    synchronized: HashSet<String>,
}

impl SqliteProvider {
    #[must_use]
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            connection: None,
            synchronized: HashSet::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    fn connection(&self) -> Result<&SqliteConnection> {
        self.connection
            .as_ref()
            .ok_or_else(|| Error::provider("provider is not connected"))
    }

    fn ensure_schema(&mut self, meta: &EntityMetadata) -> Result<()> {
        if self.synchronized.contains(meta.entity()) {
            return Ok(());
        }
        let connection = self.connection()?;
        schema::synchronize(connection, meta, self.config.schema_mode)?;
        self.synchronized.insert(meta.entity().to_string());
        Ok(())
    }
}

impl Provider for SqliteProvider {
    fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }
        let connection = SqliteConnection::open(&self.config)?;
        tracing::debug!(database = %self.config.database_name, "opened database");
        self.connection = Some(connection);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if self.connection.take().is_some() {
            tracing::debug!(database = %self.config.database_name, "closed database");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn execute(&mut self, query: &Query) -> Result<QueryResult> {
        self.connect()?;
        self.ensure_schema(query.relation())?;
        let statement = statement::generate(query)?;
        if self.config.verbose {
            tracing::debug!(
                sql = %statement.sql,
                parameters = statement.parameters.len(),
                "executing statement"
            );
        }
        let connection = self.connection()?;
        match query.operation() {
            Operation::Read => {
                let rows = connection.query(&statement.sql, &statement.parameters)?;
                Ok(QueryResult::from_rows(rows))
            }
            Operation::Create => {
                let (rows_affected, rowid) =
                    connection.execute(&statement.sql, &statement.parameters)?;
                Ok(QueryResult {
                    rows: Vec::new(),
                    rows_affected,
                    last_inserted_id: Some(rowid),
                })
            }
            Operation::Update | Operation::Delete => {
                let (rows_affected, _) =
                    connection.execute(&statement.sql, &statement.parameters)?;
                Ok(QueryResult {
                    rows: Vec::new(),
                    rows_affected,
                    last_inserted_id: None,
                })
            }
        }
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.connect()?;
        self.connection()
            .and_then(SqliteConnection::begin)
            .map_err(|err| transaction_error("Unable to start transaction", &err))
    }

    fn commit_transaction(&mut self) -> Result<()> {
        self.connection()
            .and_then(SqliteConnection::commit)
            .map_err(|err| transaction_error("Unable to commit transaction", &err))
    }

    fn rollback_transaction(&mut self) -> Result<()> {
        self.connection()
            .and_then(SqliteConnection::rollback)
            .map_err(|err| transaction_error("Unable to rollback transaction", &err))
    }

    fn savepoint(&mut self, name: &str) -> Result<()> {
        self.connect()?;
        self.connection()?.savepoint(name)
    }

    fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.connection()?.release_savepoint(name)
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        self.connection()?.rollback_to_savepoint(name)
    }
}

/// Transaction control reports a fixed message; the underlying cause
/// goes to the log, not the caller.
fn transaction_error(message: &str, cause: &Error) -> Error {
    tracing::error!(cause = %cause, "{message}");
    Error::other(message)
}
