use crate::{CBox, SqliteCursor, error_message_from_ptr};
use dbx_core::{
    API_VERSION, BackendOutcome, BasicOps, BindMethod, DbOption, Error, ErrorKind, OptionValue,
    Result, Severity, TlsMode, printable_query,
};
use libsqlite3_sys::{
    SQLITE_AUTH, SQLITE_BUSY, SQLITE_CANTOPEN, SQLITE_CORRUPT, SQLITE_DONE, SQLITE_FULL,
    SQLITE_IOERR, SQLITE_NOLFS, SQLITE_NOMEM, SQLITE_NOTADB, SQLITE_OK, SQLITE_OPEN_CREATE,
    SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI, SQLITE_PERM, SQLITE_READONLY, SQLITE_ROW, sqlite3,
    sqlite3_busy_timeout, sqlite3_changes, sqlite3_close, sqlite3_column_count, sqlite3_errcode,
    sqlite3_errmsg, sqlite3_finalize, sqlite3_open_v2, sqlite3_prepare_v2, sqlite3_reset,
    sqlite3_step, sqlite3_stmt, sqlite3_threadsafe,
};
use std::{
    borrow::Cow,
    ffi::{CString, c_char, c_int},
    ptr,
    time::Duration,
};

/// A SQLite database file. SQLite has no server: the host given to `init` is
/// a directory prefix and the database a file name inside it.
pub struct SqliteConnection {
    directory: String,
    // Declared before `connection`, statements are finalized before closing.
    pending: Option<CBox<*mut sqlite3_stmt>>,
    sql: Option<CString>,
    offset: usize,
    connection: CBox<*mut sqlite3>,
    open_error: c_int,
}

impl SqliteConnection {
    pub fn new(directory: Option<&str>) -> Self {
        Self {
            directory: directory.unwrap_or_default().into(),
            pending: None,
            sql: None,
            offset: 0,
            connection: CBox::null(|p| unsafe {
                sqlite3_close(p);
            }),
            open_error: SQLITE_OK,
        }
    }

    /// Full path of `database`.
    pub fn path(&self, database: &str) -> String {
        format!("{}{}", self.directory, database)
    }

    fn backend_error(&self) -> Error {
        let message = unsafe { error_message_from_ptr(sqlite3_errmsg(*self.connection)) };
        Error::msg(message.to_string())
    }

    fn connection(&self) -> Result<*mut sqlite3> {
        if self.connection.is_null() {
            return Err(Error::with_detail(
                ErrorKind::InvalidHandle,
                "The SQLite database is not open",
            ));
        }
        Ok(*self.connection)
    }

    /// Prepare the next statement of the pending text.
    fn prepare_next(&mut self) -> Result<Prepared> {
        let connection = self.connection()?;
        loop {
            let Some(sql) = &self.sql else {
                return Ok(Prepared::Exhausted);
            };
            let rest = &sql.as_bytes()[self.offset..];
            if rest.iter().all(u8::is_ascii_whitespace) {
                self.sql = None;
                return Ok(Prepared::Exhausted);
            }
            let mut statement = CBox::null(|p| unsafe {
                sqlite3_finalize(p);
            });
            let mut tail: *const c_char = ptr::null();
            let rc = unsafe {
                sqlite3_prepare_v2(
                    connection,
                    rest.as_ptr() as *const c_char,
                    rest.len() as c_int,
                    &mut *statement,
                    &mut tail,
                )
            };
            if rc & 0xff == SQLITE_BUSY {
                return Ok(Prepared::Busy);
            }
            if rc != SQLITE_OK {
                let error = self.backend_error().context(format!(
                    "While preparing the query:\n{}",
                    printable_query(rest)
                ));
                self.sql = None;
                return Err(error);
            }
            let consumed = if tail.is_null() {
                rest.len()
            } else {
                unsafe { tail.offset_from(rest.as_ptr() as *const c_char) as usize }
            };
            self.offset += consumed;
            if self.offset >= sql.as_bytes().len() {
                self.sql = None;
            }
            if !statement.is_null() {
                return Ok(Prepared::Statement(statement));
            }
        }
    }
}

enum Prepared {
    Statement(CBox<*mut sqlite3_stmt>),
    Busy,
    Exhausted,
}

impl BasicOps for SqliteConnection {
    fn bind(
        &mut self,
        database: &str,
        _principal: Option<&str>,
        _credential: Option<&str>,
        method: BindMethod,
    ) -> Result<()> {
        if method != BindMethod::Simple {
            return Err(Error::with_detail(
                ErrorKind::NotSupported,
                "SQLite only supports the simple bind method",
            ));
        }
        let path = self.path(database);
        let c_path = CString::new(path.as_str())?;
        let mut connection = CBox::null(|p| unsafe {
            sqlite3_close(p);
        });
        let rc = unsafe {
            sqlite3_open_v2(
                c_path.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE | SQLITE_OPEN_URI,
                ptr::null(),
            )
        };
        if rc != SQLITE_OK {
            self.open_error = rc;
            let message = if connection.is_null() {
                "Unknown error"
            } else {
                unsafe { error_message_from_ptr(sqlite3_errmsg(*connection)) }
            };
            return Err(Error::msg(format!(
                "Could not open the database `{}`: {}",
                path, message
            )));
        }
        log::debug!("Opened SQLite database `{}`", path);
        self.open_error = SQLITE_OK;
        self.connection = connection;
        Ok(())
    }

    fn unbind(&mut self) -> Result<()> {
        self.pending = None;
        self.sql = None;
        self.offset = 0;
        let connection = self.connection()?;
        let rc = unsafe { sqlite3_close(connection) };
        if rc != SQLITE_OK {
            return Err(self.backend_error());
        }
        self.connection.release();
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.connection.is_null() {
            self.unbind()?;
        }
        Ok(())
    }

    fn get_option(&self, option: DbOption) -> Result<OptionValue> {
        Ok(match option {
            DbOption::ApiVersion => OptionValue::Int(API_VERSION),
            DbOption::MultiStatements => OptionValue::Flag(true),
            DbOption::ThreadSafe => OptionValue::Flag(unsafe { sqlite3_threadsafe() } != 0),
            DbOption::Tls => OptionValue::Tls(TlsMode::Never),
            DbOption::PagedResults | DbOption::Compress => OptionValue::Flag(false),
            DbOption::ConnectTimeout => OptionValue::Int(0),
            _ => {
                return Err(Error::with_detail(
                    ErrorKind::InvalidOption,
                    format!("SQLite has no option `{}`", option),
                ));
            }
        })
    }

    fn set_option(&mut self, option: DbOption, value: OptionValue) -> Result<()> {
        match option {
            DbOption::ApiVersion | DbOption::ThreadSafe => {
                return Err(Error::new(ErrorKind::OptionReadOnly));
            }
            DbOption::MultiStatements => {
                if value.as_flag() == Some(true) {
                    return Ok(());
                }
            }
            DbOption::PagedResults
            | DbOption::Compress
            | DbOption::Tls
            | DbOption::ConnectTimeout => {}
            _ => {
                return Err(Error::with_detail(
                    ErrorKind::InvalidOption,
                    format!("SQLite has no option `{}`", option),
                ));
            }
        }
        Err(Error::with_detail(
            ErrorKind::OptionWriteFailed,
            format!("SQLite can't change option `{}` to {:?}", option, value),
        ))
    }

    fn error(&self) -> Cow<'_, str> {
        if !self.connection.is_null() {
            return Cow::Borrowed(unsafe {
                error_message_from_ptr(sqlite3_errmsg(*self.connection))
            });
        }
        match self.open_error {
            SQLITE_CANTOPEN => Cow::Borrowed("Opening database failed"),
            _ => Cow::Borrowed("Unknown error"),
        }
    }

    fn error_type(&self) -> Severity {
        let code = if self.connection.is_null() {
            self.open_error
        } else {
            unsafe { sqlite3_errcode(*self.connection) }
        };
        match code & 0xff {
            SQLITE_OK => Severity::None,
            SQLITE_PERM | SQLITE_NOMEM | SQLITE_READONLY | SQLITE_IOERR | SQLITE_CORRUPT
            | SQLITE_FULL | SQLITE_CANTOPEN | SQLITE_NOLFS | SQLITE_AUTH | SQLITE_NOTADB => {
                Severity::Fatal
            }
            _ => Severity::Recoverable,
        }
    }

    fn query(&mut self, sql: &[u8]) -> Result<()> {
        self.connection()?;
        self.pending = None;
        self.sql = Some(CString::new(sql)?);
        self.offset = 0;
        Ok(())
    }

    fn result(&mut self, timeout: Option<Duration>, _chunk: u64) -> Result<BackendOutcome> {
        let connection = self.connection()?;
        let busy = timeout
            .map(|t| t.as_millis().min(c_int::MAX as u128) as c_int)
            .unwrap_or(c_int::MAX);
        unsafe {
            sqlite3_busy_timeout(connection, busy);
        }
        let statement = match self.pending.take() {
            Some(statement) => statement,
            None => match self.prepare_next()? {
                Prepared::Statement(statement) => statement,
                Prepared::Busy => return Ok(BackendOutcome::Timeout),
                Prepared::Exhausted => return Ok(BackendOutcome::Done),
            },
        };
        let rc = unsafe { sqlite3_step(*statement) };
        match rc & 0xff {
            SQLITE_BUSY => {
                unsafe {
                    sqlite3_reset(*statement);
                }
                self.pending = Some(statement);
                return Ok(BackendOutcome::Timeout);
            }
            SQLITE_ROW | SQLITE_DONE | SQLITE_OK => {}
            _ => {
                let error = self.backend_error();
                // Nothing else of the text runs after a failed statement
                self.sql = None;
                return Err(error);
            }
        }
        let columns = unsafe { sqlite3_column_count(*statement) };
        if columns == 0 {
            let changes = unsafe { sqlite3_changes(connection) }.max(0) as u64;
            return Ok(BackendOutcome::NoRows(Box::new(SqliteCursor::new(
                statement, rc, changes,
            )?)));
        }
        Ok(BackendOutcome::Rows(Box::new(SqliteCursor::new(
            statement, rc, 0,
        )?)))
    }
}
