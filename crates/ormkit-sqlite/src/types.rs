//! Value encoding between OrmKit values and SQLite storage classes.
//!
//! SQLite stores five classes: INTEGER, REAL, TEXT, BLOB, and NULL.
//! Booleans are stored as 0/1 and temporal values as epoch-relative
//! integers, which NUMERIC column affinity keeps as INTEGER storage, so
//! every value round-trips without loss.

// Casts here match the C API's types exactly.
#![allow(clippy::cast_possible_truncation)]

use std::ffi::{CStr, c_int};

use libsqlite3_sys as ffi;
use ormkit_core::Value;

/// Bind a value to a prepared statement parameter.
///
/// # Safety
///
/// `stmt` must be a valid prepared statement handle and `index` a valid
/// 1-based parameter index.
pub unsafe fn bind_value(stmt: *mut ffi::sqlite3_stmt, index: c_int, value: &Value) -> c_int {
    unsafe {
        match value {
            Value::Null => ffi::sqlite3_bind_null(stmt, index),
            Value::Bool(v) => ffi::sqlite3_bind_int(stmt, index, i32::from(*v)),
            Value::SmallInt(v) => ffi::sqlite3_bind_int(stmt, index, i32::from(*v)),
            Value::Int(v) => ffi::sqlite3_bind_int(stmt, index, *v),
            Value::BigInt(v) => ffi::sqlite3_bind_int64(stmt, index, *v),
            Value::Float(v) => ffi::sqlite3_bind_double(stmt, index, f64::from(*v)),
            Value::Double(v) => ffi::sqlite3_bind_double(stmt, index, *v),
            Value::Text(s) => ffi::sqlite3_bind_text(
                stmt,
                index,
                s.as_ptr().cast(),
                s.len() as c_int,
                ffi::SQLITE_TRANSIENT(),
            ),
            Value::Bytes(b) => ffi::sqlite3_bind_blob(
                stmt,
                index,
                b.as_ptr().cast(),
                b.len() as c_int,
                ffi::SQLITE_TRANSIENT(),
            ),
            Value::Date(days) => ffi::sqlite3_bind_int(stmt, index, *days),
            Value::Time(micros) | Value::DateTime(micros) => {
                ffi::sqlite3_bind_int64(stmt, index, *micros)
            }
        }
    }
}

/// Read one column of the current result row.
///
/// Integer columns come back as the narrowest integer value that holds
/// them, which typed row accessors widen or narrow as requested.
///
/// # Safety
///
/// `stmt` must be a valid prepared statement that has just returned
/// `SQLITE_ROW`, and `index` a valid 0-based column index.
pub unsafe fn read_column(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Value {
    unsafe {
        match ffi::sqlite3_column_type(stmt, index) {
            ffi::SQLITE_INTEGER => {
                let v = ffi::sqlite3_column_int64(stmt, index);
                match i32::try_from(v) {
                    Ok(narrow) => Value::Int(narrow),
                    Err(_) => Value::BigInt(v),
                }
            }
            ffi::SQLITE_FLOAT => Value::Double(ffi::sqlite3_column_double(stmt, index)),
            ffi::SQLITE_TEXT => {
                let ptr = ffi::sqlite3_column_text(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                if ptr.is_null() {
                    Value::Null
                } else {
                    let bytes = std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize);
                    Value::Text(String::from_utf8_lossy(bytes).into_owned())
                }
            }
            ffi::SQLITE_BLOB => {
                let ptr = ffi::sqlite3_column_blob(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                if ptr.is_null() || len == 0 {
                    Value::Bytes(Vec::new())
                } else {
                    let bytes = std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize);
                    Value::Bytes(bytes.to_vec())
                }
            }
            _ => Value::Null,
        }
    }
}

/// Name of one result column.
///
/// # Safety
///
/// `stmt` must be a valid prepared statement and `index` a valid
/// 0-based column index.
pub unsafe fn column_name(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Option<String> {
    unsafe {
        let ptr = ffi::sqlite3_column_name(stmt, index);
        if ptr.is_null() {
            None
        } else {
            CStr::from_ptr(ptr).to_str().ok().map(String::from)
        }
    }
}
