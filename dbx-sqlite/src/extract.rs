use dbx_core::{ColumnType, Error, Result};
use libsqlite3_sys::*;
use std::{
    ffi::{CStr, c_int},
    slice,
};

pub(crate) fn extract_name(statement: *mut sqlite3_stmt, index: c_int) -> Result<String> {
    unsafe {
        let name = sqlite3_column_name(statement, index);
        if name.is_null() {
            return Err(Error::msg(format!("Column {} has no name", index)));
        }
        Ok(CStr::from_ptr(name).to_str()?.into())
    }
}

/// Type of the value in the current row, NULL values fall back to the
/// declared type of the column.
pub(crate) fn extract_type(statement: *mut sqlite3_stmt, index: c_int, on_row: bool) -> ColumnType {
    let storage = if on_row {
        unsafe { sqlite3_column_type(statement, index) }
    } else {
        SQLITE_NULL
    };
    match storage {
        SQLITE_INTEGER => ColumnType::BigInt,
        SQLITE_FLOAT => ColumnType::Double,
        SQLITE_BLOB => ColumnType::Blob,
        SQLITE_TEXT => ColumnType::Clob,
        _ => unsafe {
            let declared = sqlite3_column_decltype(statement, index);
            if declared.is_null() {
                return ColumnType::Unknown;
            }
            declared_type(&CStr::from_ptr(declared).to_string_lossy())
        },
    }
}

pub(crate) fn declared_type(declared: &str) -> ColumnType {
    let declared = declared.trim().to_ascii_uppercase();
    let declared = declared.as_str();
    if declared.contains("DOUBLE") || declared == "FLOAT" || declared == "REAL" {
        ColumnType::Double
    } else if declared.contains("INT") || declared == "BOOLEAN" {
        ColumnType::BigInt
    } else if declared.contains("CHAR") || declared == "CLOB" || declared == "TEXT" {
        ColumnType::Clob
    } else if declared.contains("DATE") || declared.contains("TIME") || declared.contains("DECIMAL")
    {
        ColumnType::Clob
    } else if declared == "BLOB" {
        ColumnType::Blob
    } else {
        ColumnType::Unknown
    }
}

/// Value of the column in the current row, `None` for NULL.
pub(crate) fn extract_value<'s>(statement: *mut sqlite3_stmt, index: c_int) -> Option<&'s [u8]> {
    unsafe {
        if sqlite3_column_type(statement, index) == SQLITE_NULL {
            return None;
        }
        let ptr = sqlite3_column_blob(statement, index) as *const u8;
        let len = sqlite3_column_bytes(statement, index) as usize;
        if ptr.is_null() || len == 0 {
            return Some(&[]);
        }
        Some(slice::from_raw_parts(ptr, len))
    }
}
