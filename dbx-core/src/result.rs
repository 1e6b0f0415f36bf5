use crate::{
    ColumnType, Error, ErrorKind, Handle, LargeObject, Result, ResultOps, RowStatus,
};
use std::fmt::{self, Debug};

/// What [`Handle::result`] produced.
#[derive(Debug)]
pub enum Outcome<'h> {
    /// Every result of the statement was consumed.
    Done,
    /// The backend did not answer in time, call again.
    Timeout,
    /// A statement that returns no rows (DDL, DML, ...).
    NoRows(ResultSet<'h>),
    /// A result with rows to fetch.
    Rows(ResultSet<'h>),
}

impl<'h> Outcome<'h> {
    /// Numeric status: 0 done, 1 rows, 2 no rows, 3 timeout.
    pub fn code(&self) -> i32 {
        match self {
            Outcome::Done => 0,
            Outcome::Rows(..) => 1,
            Outcome::NoRows(..) => 2,
            Outcome::Timeout => 3,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done)
    }

    pub fn into_result_set(self) -> Option<ResultSet<'h>> {
        match self {
            Outcome::NoRows(result) | Outcome::Rows(result) => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowState {
    BeforeFirst,
    OnRow,
    Done,
}

/// One result set of a statement, borrowing its handle until finished.
///
/// Dropping it without calling [`ResultSet::finish`] drains and releases it
/// the same way, errors are only logged.
pub struct ResultSet<'h> {
    handle: &'h mut Handle,
    cursor: Option<Box<dyn ResultOps>>,
    has_rows: bool,
    row: RowState,
}

impl<'h> ResultSet<'h> {
    pub(crate) fn new(handle: &'h mut Handle, cursor: Box<dyn ResultOps>, has_rows: bool) -> Self {
        Self {
            handle,
            cursor: Some(cursor),
            has_rows,
            row: if has_rows {
                RowState::BeforeFirst
            } else {
                RowState::Done
            },
        }
    }

    pub fn handle(&self) -> &Handle {
        &*self.handle
    }

    /// Whether the result carries rows.
    pub fn has_rows(&self) -> bool {
        self.has_rows
    }

    /// Advance to the next row. Once [`RowStatus::Done`] is returned every
    /// further call returns it again without reaching the backend.
    pub fn row_fetch(&mut self) -> Result<RowStatus> {
        if self.row == RowState::Done {
            return Ok(RowStatus::Done);
        }
        let status = self.cursor_mut()?.row_fetch();
        match status {
            Ok(RowStatus::Next) => {
                self.row = RowState::OnRow;
                Ok(RowStatus::Next)
            }
            Ok(RowStatus::Done) => {
                self.row = RowState::Done;
                Ok(RowStatus::Done)
            }
            Err(e) => {
                let error = e.detach();
                log::error!("{:#}", error);
                Err(error)
            }
        }
    }

    pub fn rows_affected(&self) -> u64 {
        self.cursor.as_ref().map(|c| c.rows_affected()).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.cursor.as_ref().map(|c| c.column_count()).unwrap_or(0)
    }

    pub fn column_name(&self, pos: usize) -> Option<&str> {
        if pos >= self.column_count() {
            return None;
        }
        self.cursor.as_ref()?.column_name(pos)
    }

    /// Position of the first column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        (0..self.column_count()).find(|&pos| self.column_name(pos) == Some(name))
    }

    pub fn column_type(&self, pos: usize) -> Result<ColumnType> {
        let count = self.column_count();
        if pos >= count {
            return Err(Error::with_detail(
                ErrorKind::InvalidParam,
                format!("Column {} is out of range, the result has {}", pos, count),
            ));
        }
        self.cursor()?.column_type(pos).map_err(Error::detach)
    }

    /// Length in bytes of the field, 0 for NULL or when no row is current.
    pub fn field_length(&self, pos: usize) -> usize {
        match self.current(pos) {
            Some(cursor) => cursor.field_length(pos),
            None => 0,
        }
    }

    /// Value of the field in the current row. `None` is SQL NULL (or no
    /// current row), an empty slice is an empty value.
    pub fn field_value(&self, pos: usize) -> Option<&[u8]> {
        self.current(pos)?.field_value(pos)
    }

    /// Field as text, `None` for NULL. Invalid UTF-8 is an error.
    pub fn field_str(&self, pos: usize) -> Result<Option<&str>> {
        match self.field_value(pos) {
            Some(value) => Ok(Some(std::str::from_utf8(value)?)),
            None => Ok(None),
        }
    }

    /// Open the large object `locator`, a field value of this result.
    pub fn lo_open(&self, locator: &[u8]) -> Result<LargeObject<'_>> {
        let large_objects = self.handle.ops()?.large_objects().ok_or_else(|| {
            Error::with_detail(
                ErrorKind::NoCapability,
                format!(
                    "Backend `{}` does not support large objects",
                    self.handle.backend_name()
                ),
            )
        })?;
        if locator.is_empty() {
            return Err(Error::with_detail(
                ErrorKind::InvalidParam,
                "The large object locator is empty",
            ));
        }
        let stream = match large_objects.open(self.cursor()?, locator) {
            Ok(stream) => stream,
            Err(e) => {
                let error = e.detach();
                log::error!("{:#}", error);
                return Err(error);
            }
        };
        Ok(LargeObject::new(stream))
    }

    /// Drain the remaining rows and release the result.
    pub fn finish(mut self) -> Result<()> {
        self.close()
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut cursor) = self.cursor.take() else {
            return Ok(());
        };
        if self.row != RowState::Done {
            loop {
                match cursor.row_fetch() {
                    Ok(RowStatus::Next) => {}
                    Ok(RowStatus::Done) => break,
                    Err(e) => {
                        log::warn!("Error while draining the result: {:#}", e);
                        break;
                    }
                }
            }
            self.row = RowState::Done;
        }
        cursor.finish().map_err(Error::detach)
    }

    fn current(&self, pos: usize) -> Option<&dyn ResultOps> {
        let cursor = self.cursor.as_deref()?;
        if self.row != RowState::OnRow || pos >= cursor.column_count() {
            return None;
        }
        Some(cursor)
    }

    fn cursor(&self) -> Result<&dyn ResultOps> {
        self.cursor
            .as_deref()
            .ok_or_else(|| Error::new(ErrorKind::InvalidHandle))
    }

    fn cursor_mut(&mut self) -> Result<&mut Box<dyn ResultOps>> {
        self.cursor
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::InvalidHandle))
    }
}

impl Debug for ResultSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("backend", &self.handle.backend_name())
            .field("has_rows", &self.has_rows)
            .field("row", &self.row)
            .field("columns", &self.column_count())
            .finish()
    }
}

impl Drop for ResultSet<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("Error while dropping the result: {:#}", e);
        }
    }
}
