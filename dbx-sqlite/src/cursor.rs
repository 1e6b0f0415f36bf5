use crate::{
    CBox, error_message_from_ptr,
    extract::{extract_name, extract_type, extract_value},
};
use dbx_core::{ColumnType, Error, Result, ResultOps, RowStatus};
use libsqlite3_sys::{
    SQLITE_DONE, SQLITE_MISUSE, SQLITE_OK, SQLITE_ROW, sqlite3_column_bytes, sqlite3_column_count,
    sqlite3_db_handle, sqlite3_errmsg, sqlite3_step, sqlite3_stmt,
};
use std::ffi::c_int;

/// Rows of one prepared statement, already stepped once by `result`.
pub struct SqliteCursor {
    statement: CBox<*mut sqlite3_stmt>,
    first: Option<c_int>,
    on_row: bool,
    changes: u64,
    columns: Vec<String>,
}

impl SqliteCursor {
    pub(crate) fn new(statement: CBox<*mut sqlite3_stmt>, first: c_int, changes: u64) -> Result<Self> {
        let count = unsafe { sqlite3_column_count(*statement) };
        let columns = (0..count)
            .map(|i| extract_name(*statement, i))
            .collect::<Result<_>>()?;
        Ok(Self {
            statement,
            first: Some(first),
            on_row: first == SQLITE_ROW,
            changes,
            columns,
        })
    }
}

impl ResultOps for SqliteCursor {
    fn row_fetch(&mut self) -> Result<RowStatus> {
        let rc = match self.first.take() {
            Some(rc) => rc,
            None => unsafe { sqlite3_step(*self.statement) },
        };
        match rc {
            SQLITE_ROW => {
                self.on_row = true;
                Ok(RowStatus::Next)
            }
            SQLITE_DONE | SQLITE_OK | SQLITE_MISUSE => {
                self.on_row = false;
                Ok(RowStatus::Done)
            }
            _ => {
                self.on_row = false;
                let message = unsafe {
                    error_message_from_ptr(sqlite3_errmsg(sqlite3_db_handle(*self.statement)))
                };
                Err(Error::msg(message.to_string()))
            }
        }
    }

    fn rows_affected(&self) -> u64 {
        self.changes
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, pos: usize) -> Option<&str> {
        self.columns.get(pos).map(String::as_str)
    }

    fn column_type(&self, pos: usize) -> Result<ColumnType> {
        Ok(extract_type(*self.statement, pos as c_int, self.on_row))
    }

    fn field_length(&self, pos: usize) -> usize {
        if !self.on_row {
            return 0;
        }
        unsafe { sqlite3_column_bytes(*self.statement, pos as c_int).max(0) as usize }
    }

    fn field_value(&self, pos: usize) -> Option<&[u8]> {
        if !self.on_row {
            return None;
        }
        extract_value(*self.statement, pos as c_int)
    }

    fn finish(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
