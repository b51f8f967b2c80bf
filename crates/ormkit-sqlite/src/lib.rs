//! SQLite provider for OrmKit.
//!
//! Implements the [`Provider`](ormkit_core::Provider) trait over a
//! bundled SQLite build. Statement generation is deterministic, schema
//! synchronization runs once per entity class per provider lifetime, and
//! all access to the raw database handle is mutex-guarded.
//!
//! # Type mapping
//!
//! | Data kind                  | SQLite column type |
//! |----------------------------|--------------------|
//! | integers                   | INTEGER            |
//! | floating point             | REAL               |
//! | bool, date, time, datetime | NUMERIC            |
//! | char, text                 | TEXT               |
//! | anything else              | BLOB               |
//!
//! # Example
//!
//! ```
//! use ormkit_core::Provider;
//! use ormkit_sqlite::{SqliteConfig, SqliteProvider};
//!
//! let mut provider = SqliteProvider::new(SqliteConfig::memory());
//! provider.connect().unwrap();
//! assert!(provider.is_connected());
//! ```

// The driver talks to the C library directly.
#![allow(unsafe_code)]

pub mod config;
pub mod connection;
pub mod provider;
pub mod schema;
pub mod statement;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::{SchemaMode, SqliteConfig};
pub use connection::SqliteConnection;
pub use provider::SqliteProvider;
pub use statement::Statement;

/// Version of the linked SQLite library.
#[must_use]
pub fn sqlite_version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a static NUL-terminated string.
    unsafe {
        std::ffi::CStr::from_ptr(libsqlite3_sys::sqlite3_libversion())
            .to_str()
            .unwrap_or("unknown")
    }
}
