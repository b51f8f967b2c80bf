//! A safe, mutex-guarded wrapper around one SQLite database handle.
//!
//! Statements bind named parameters of the `:name` form and results come
//! back as [`Row`] values. Transaction state is tracked on the handle so
//! mismatched begin/commit pairs fail early instead of corrupting state.

// Casts here match the C API's types exactly.
#![allow(clippy::cast_possible_truncation)]

use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::{Arc, Mutex};

use libsqlite3_sys as ffi;
use ormkit_core::{ColumnSet, Error, ProviderError, Result, Row, Value};

use crate::config::SqliteConfig;
use crate::types;

// libsqlite3-sys omits this binding from its generated bindings, but the
// symbol is exported by the SQLite library it links.
unsafe extern "C" {
    fn sqlite3_close_v2(db: *mut ffi::sqlite3) -> c_int;
}

#[derive(Debug)]
struct ConnectionInner {
    db: *mut ffi::sqlite3,
    in_transaction: bool,
}

// SAFETY: the raw handle is opened with SQLITE_OPEN_NOMUTEX and only
// touched while the surrounding mutex is held.
unsafe impl Send for ConnectionInner {}

/// An open SQLite database.
#[derive(Debug)]
pub struct SqliteConnection {
    inner: Mutex<ConnectionInner>,
    database_name: String,
}

// SAFETY: all access to the raw handle goes through the mutex.
unsafe impl Send for SqliteConnection {}
unsafe impl Sync for SqliteConnection {}

/// Owns a prepared statement and finalizes it when dropped, so every
/// early return releases the handle.
struct StatementHandle {
    stmt: *mut ffi::sqlite3_stmt,
}

impl StatementHandle {
    fn raw(&self) -> *mut ffi::sqlite3_stmt {
        self.stmt
    }
}

impl Drop for StatementHandle {
    fn drop(&mut self) {
        // SAFETY: the handle came from a successful sqlite3_prepare_v2.
        unsafe {
            ffi::sqlite3_finalize(self.stmt);
        }
    }
}

impl SqliteConnection {
    /// Open the database named by the configuration, creating the file
    /// when it does not exist yet.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.database_name.as_str()).map_err(|_| {
            Error::provider("database name contains an interior null byte")
        })?;

        let flags = ffi::SQLITE_OPEN_READWRITE
            | ffi::SQLITE_OPEN_CREATE
            | ffi::SQLITE_OPEN_URI
            | ffi::SQLITE_OPEN_NOMUTEX;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        // SAFETY: both pointers are valid and the return code is checked.
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };
        if rc != ffi::SQLITE_OK {
            let message = if db.is_null() {
                "out of memory".to_string()
            } else {
                // SAFETY: db is a valid handle even after a failed open.
                let message = unsafe { last_error_message(db) };
                // SAFETY: a failed open still requires closing the handle.
                unsafe { sqlite3_close_v2(db) };
                message
            };
            return Err(Error::Provider(ProviderError {
                message: format!("unable to open '{}': {message}", config.database_name),
                code: Some(rc),
                statement: None,
            }));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is a valid open handle.
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        Ok(Self {
            inner: Mutex::new(ConnectionInner {
                db,
                in_transaction: false,
            }),
            database_name: config.database_name.clone(),
        })
    }

    /// Name the connection was opened with.
    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Whether a transaction is currently open on this connection.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.inner.lock().unwrap().in_transaction
    }

    /// Execute SQL that takes no parameters and yields no rows.
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let inner = self.inner.lock().unwrap();
        let c_sql = CString::new(sql)
            .map_err(|_| statement_error(sql, "statement contains an interior null byte"))?;

        let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();
        // SAFETY: all pointers are valid; errmsg is freed below when set.
        let rc = unsafe {
            ffi::sqlite3_exec(inner.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg)
        };
        if rc != ffi::SQLITE_OK {
            let message = if errmsg.is_null() {
                // SAFETY: db is valid.
                unsafe { last_error_message(inner.db) }
            } else {
                // SAFETY: sqlite allocated errmsg; it must be freed with sqlite3_free.
                let message = unsafe { CStr::from_ptr(errmsg).to_string_lossy().into_owned() };
                unsafe { ffi::sqlite3_free(errmsg.cast()) };
                message
            };
            return Err(Error::Provider(ProviderError {
                message,
                code: Some(rc),
                statement: Some(sql.to_string()),
            }));
        }
        Ok(())
    }

    /// Run a statement and collect every result row.
    pub fn query(&self, sql: &str, parameters: &[(String, Value)]) -> Result<Vec<Row>> {
        let inner = self.inner.lock().unwrap();
        let stmt = prepare(inner.db, sql)?;
        bind_parameters(inner.db, &stmt, parameters, sql)?;

        // SAFETY: the statement is valid for the lifetime of the handle.
        let count = unsafe { ffi::sqlite3_column_count(stmt.raw()) };
        let mut names = Vec::with_capacity(count as usize);
        for i in 0..count {
            // SAFETY: i is in range.
            let name = unsafe { types::column_name(stmt.raw(), i) }
                .unwrap_or_else(|| format!("column{i}"));
            names.push(name);
        }
        let columns = Arc::new(ColumnSet::new(names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: the statement is valid and fully bound.
            match unsafe { ffi::sqlite3_step(stmt.raw()) } {
                ffi::SQLITE_ROW => {
                    let mut values = Vec::with_capacity(count as usize);
                    for i in 0..count {
                        // SAFETY: the step above returned SQLITE_ROW.
                        values.push(unsafe { types::read_column(stmt.raw(), i) });
                    }
                    rows.push(Row::new(values, Arc::clone(&columns)));
                }
                ffi::SQLITE_DONE => break,
                code => return Err(database_error(inner.db, code, Some(sql))),
            }
        }
        Ok(rows)
    }

    /// Run a statement that yields no rows. Returns the number of rows
    /// it changed and the rowid of the last insert on this connection.
    pub fn execute(&self, sql: &str, parameters: &[(String, Value)]) -> Result<(u64, i64)> {
        let inner = self.inner.lock().unwrap();
        let stmt = prepare(inner.db, sql)?;
        bind_parameters(inner.db, &stmt, parameters, sql)?;

        // SAFETY: the statement is valid and fully bound.
        let rc = unsafe { ffi::sqlite3_step(stmt.raw()) };
        match rc {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
                // SAFETY: db is valid; both calls read connection state.
                let changes = unsafe { ffi::sqlite3_changes(inner.db) };
                let rowid = unsafe { ffi::sqlite3_last_insert_rowid(inner.db) };
                Ok((changes as u64, rowid))
            }
            code => Err(database_error(inner.db, code, Some(sql))),
        }
    }

    /// Start a transaction.
    pub fn begin(&self) -> Result<()> {
        {
            let inner = self.inner.lock().unwrap();
            if inner.in_transaction {
                return Err(Error::provider("already in a transaction"));
            }
        }
        self.execute_raw("BEGIN TRANSACTION")?;
        self.inner.lock().unwrap().in_transaction = true;
        Ok(())
    }

    /// Commit the open transaction.
    pub fn commit(&self) -> Result<()> {
        self.check_in_transaction()?;
        self.execute_raw("COMMIT")?;
        self.inner.lock().unwrap().in_transaction = false;
        Ok(())
    }

    /// Roll back the open transaction.
    pub fn rollback(&self) -> Result<()> {
        self.check_in_transaction()?;
        self.execute_raw("ROLLBACK")?;
        self.inner.lock().unwrap().in_transaction = false;
        Ok(())
    }

    /// Establish a named savepoint.
    pub fn savepoint(&self, name: &str) -> Result<()> {
        check_savepoint_name(name)?;
        self.execute_raw(&format!("SAVEPOINT {name}"))
    }

    /// Release a savepoint, keeping the work done since it.
    pub fn release_savepoint(&self, name: &str) -> Result<()> {
        check_savepoint_name(name)?;
        self.execute_raw(&format!("RELEASE SAVEPOINT {name}"))
    }

    /// Roll back to a savepoint, discarding the work done since it.
    pub fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        check_savepoint_name(name)?;
        self.execute_raw(&format!("ROLLBACK TO SAVEPOINT {name}"))
    }

    fn check_in_transaction(&self) -> Result<()> {
        if self.inner.lock().unwrap().in_transaction {
            Ok(())
        } else {
            Err(Error::provider("not in a transaction"))
        }
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.lock() {
            if !inner.db.is_null() {
                // SAFETY: close_v2 tolerates unfinalized statements and
                // defers the close until they are gone.
                unsafe {
                    sqlite3_close_v2(inner.db);
                }
            }
        }
    }
}

fn prepare(db: *mut ffi::sqlite3, sql: &str) -> Result<StatementHandle> {
    let c_sql = CString::new(sql)
        .map_err(|_| statement_error(sql, "statement contains an interior null byte"))?;
    let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
    // SAFETY: all pointers are valid and the return code is checked.
    let rc = unsafe {
        ffi::sqlite3_prepare_v2(db, c_sql.as_ptr(), -1, &mut stmt, ptr::null_mut())
    };
    if rc != ffi::SQLITE_OK {
        return Err(database_error(db, rc, Some(sql)));
    }
    Ok(StatementHandle { stmt })
}

fn bind_parameters(
    db: *mut ffi::sqlite3,
    stmt: &StatementHandle,
    parameters: &[(String, Value)],
    sql: &str,
) -> Result<()> {
    for (name, value) in parameters {
        let c_name = CString::new(name.as_str())
            .map_err(|_| statement_error(sql, "parameter name contains an interior null byte"))?;
        // SAFETY: the statement and name are valid.
        let index = unsafe { ffi::sqlite3_bind_parameter_index(stmt.raw(), c_name.as_ptr()) };
        if index == 0 {
            return Err(statement_error(
                sql,
                format!("statement has no parameter named '{name}'"),
            ));
        }
        // SAFETY: index came from sqlite3_bind_parameter_index.
        let rc = unsafe { types::bind_value(stmt.raw(), index, value) };
        if rc != ffi::SQLITE_OK {
            return Err(database_error(db, rc, Some(sql)));
        }
    }
    Ok(())
}

/// # Safety
///
/// `db` must be a valid handle.
unsafe fn last_error_message(db: *mut ffi::sqlite3) -> String {
    // SAFETY: errmsg returns a NUL-terminated string owned by sqlite.
    unsafe { CStr::from_ptr(ffi::sqlite3_errmsg(db)).to_string_lossy().into_owned() }
}

fn database_error(db: *mut ffi::sqlite3, code: c_int, sql: Option<&str>) -> Error {
    // SAFETY: db is a valid handle on every call path.
    let message = unsafe { last_error_message(db) };
    Error::Provider(ProviderError {
        message,
        code: Some(code),
        statement: sql.map(str::to_string),
    })
}

fn statement_error(sql: &str, message: impl Into<String>) -> Error {
    Error::Provider(ProviderError {
        message: message.into(),
        code: None,
        statement: Some(sql.to_string()),
    })
}

fn check_savepoint_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::provider(format!("invalid savepoint name '{name}'")))
    }
}
