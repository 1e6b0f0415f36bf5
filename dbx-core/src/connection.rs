use crate::{
    BackendOutcome, BasicOps, BindMethod, Capability, DbOption, Error, ErrorKind, Module,
    OptionValue, Outcome, Registry, Result, ResultSet, Severity, error_message,
    escape_fallback, lib_version, printable_query, statement_slice, write_nul_terminated,
};
use std::{
    borrow::Cow,
    fmt::{self, Debug},
    time::Duration,
};

/// Lifecycle of a [`Handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Backend loaded and initialized, no session yet.
    Initialized,
    /// Session established, statements can be issued.
    Bound,
    /// Session released, the handle can be bound again.
    Unbound,
    /// Every resource released, only errors from now on.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementState {
    Idle,
    Pending,
    Done,
}

struct Session {
    // Declared before `module`, the backend code must outlive its objects.
    ops: Box<dyn BasicOps>,
    module: Module,
}

/// One logical connection to a database through a backend.
///
/// ```rust,ignore
/// let mut handle = Handle::init("sqlite3", Some("/var/lib/app/"), None)?;
/// handle.bind("app.db", None, None, BindMethod::Simple)?;
/// handle.query("SELECT 1")?;
/// while let Outcome::Rows(mut rows) | Outcome::NoRows(mut rows) =
///     handle.result(Some(Duration::from_secs(3)), 0)?
/// {
///     while rows.row_fetch()? == RowStatus::Next {
///         println!("{:?}", rows.field_value(0));
///     }
///     rows.finish()?;
/// }
/// handle.unbind()?;
/// handle.finish()?;
/// ```
pub struct Handle {
    registry: Registry,
    backend: String,
    session: Option<Session>,
    state: ConnectionState,
    statement: StatementState,
}

impl Handle {
    /// Load `backend` through the global registry and initialize a connection object.
    pub fn init(backend: &str, host: Option<&str>, port: Option<&str>) -> Result<Handle> {
        Self::init_with(Registry::global(), backend, host, port)
    }

    pub fn init_with(
        registry: &Registry,
        backend: &str,
        host: Option<&str>,
        port: Option<&str>,
    ) -> Result<Handle> {
        let context = || format!("While initializing backend `{}`", backend);
        let module = registry.open(backend).map_err(|e| e.context(context()))?;
        if let Err(e) = registry.acquire(&module) {
            let error = e.context(context());
            log::error!("{:#}", error);
            if let Err(e) = module.close() {
                log::error!("{:#}", e);
            }
            return Err(error);
        }
        let ops = match module.driver().and_then(|driver| driver.init(host, port)) {
            Ok(ops) => ops,
            Err(e) => {
                let error = e.detach().context(context());
                log::error!("{:#}", error);
                registry.release(&module);
                if let Err(e) = module.close() {
                    log::error!("{:#}", e);
                }
                return Err(error);
            }
        };
        log::debug!("Initialized handle for backend `{}`", backend);
        Ok(Handle {
            registry: registry.clone(),
            backend: backend.into(),
            session: Some(Session { ops, module }),
            state: ConnectionState::Initialized,
            statement: StatementState::Idle,
        })
    }

    pub fn backend_name(&self) -> &str {
        &self.backend
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.session.is_none()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Establish a session with `database`.
    pub fn bind(
        &mut self,
        database: &str,
        principal: Option<&str>,
        credential: Option<&str>,
        method: BindMethod,
    ) -> Result<()> {
        self.require(&[ConnectionState::Initialized, ConnectionState::Unbound])?;
        let ops = self.ops_mut()?;
        if let Err(e) = ops.bind(database, principal, credential, method) {
            let error = e.detach().context(format!("While binding to database `{}`", database));
            log::error!("{:#}", error);
            return Err(error);
        }
        log::debug!("Bound handle of `{}` to `{}`", self.backend, database);
        self.state = ConnectionState::Bound;
        self.statement = StatementState::Idle;
        Ok(())
    }

    pub fn bind_simple(
        &mut self,
        database: &str,
        principal: Option<&str>,
        credential: Option<&str>,
    ) -> Result<()> {
        self.bind(database, principal, credential, BindMethod::Simple)
    }

    /// Release the session, the handle stays usable for another `bind`.
    pub fn unbind(&mut self) -> Result<()> {
        self.require(&[ConnectionState::Bound])?;
        if let Err(e) = self.ops_mut()?.unbind() {
            let error = e.detach();
            log::error!("{:#}", error);
            return Err(error);
        }
        log::debug!("Unbound handle of `{}`", self.backend);
        self.state = ConnectionState::Unbound;
        self.statement = StatementState::Idle;
        Ok(())
    }

    /// Release every resource and unload the backend module. The handle is
    /// finished even when an error is returned; later calls fail with
    /// [`ErrorKind::InvalidHandle`].
    pub fn finish(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Err(Error::with_detail(
                ErrorKind::InvalidHandle,
                "The handle is already finished",
            ));
        };
        let mut result = Ok(());
        if self.state == ConnectionState::Bound
            && let Err(e) = session.ops.unbind()
        {
            let error = e.detach();
            log::error!("{:#}", error);
            result = Err(error);
        }
        if let Err(e) = session.ops.finish() {
            let error = e.detach();
            log::error!("{:#}", error);
            result = result.and(Err(error));
        }
        let Session { ops, module } = session;
        drop(ops);
        self.registry.release(&module);
        result = result.and(module.close());
        self.state = ConnectionState::Finished;
        self.statement = StatementState::Idle;
        log::debug!("Finished handle of `{}`", self.backend);
        result
    }

    pub fn capabilities(&self, capability: Capability) -> Result<bool> {
        let ops = self.ops()?;
        Ok(match capability {
            Capability::Basic => true,
            Capability::LargeObject => ops.large_objects().is_some(),
        })
    }

    pub fn get_option(&self, option: DbOption) -> Result<OptionValue> {
        if option == DbOption::LibVersion {
            return Ok(OptionValue::Int(lib_version()));
        }
        self.ops()?.get_option(option).map_err(Error::detach)
    }

    pub fn set_option(&mut self, option: DbOption, value: impl Into<OptionValue>) -> Result<()> {
        let value = value.into();
        if option.is_read_only() {
            return Err(Error::with_detail(
                ErrorKind::OptionReadOnly,
                format!("Option `{}` is read only", option),
            ));
        }
        if !option.accepts(&value) {
            return Err(Error::with_detail(
                ErrorKind::InvalidParam,
                format!("Value {:?} is not valid for option `{}`", value, option),
            ));
        }
        self.ops_mut()?.set_option(option, value).map_err(Error::detach)
    }

    /// Human readable message of `error`. Backend errors are described by the
    /// backend, every other kind by the core.
    pub fn error(&self, error: &Error) -> Cow<'_, str> {
        match error.kind() {
            ErrorKind::Backend => match &self.session {
                Some(session) => {
                    let message = session.ops.error();
                    if message.is_empty() {
                        Cow::Owned(error.message().into_owned())
                    } else {
                        message
                    }
                }
                None => Cow::Borrowed(ErrorKind::InvalidHandle.message()),
            },
            kind => Cow::Borrowed(kind.message()),
        }
    }

    /// Message of a raw error code, see [`Handle::error`].
    pub fn error_code(&self, code: i32) -> Cow<'_, str> {
        if code == -ErrorKind::Backend.id() {
            return self.error(&Error::new(ErrorKind::Backend));
        }
        Cow::Borrowed(error_message(code))
    }

    /// Severity of `error` for this connection.
    pub fn error_type(&self, error: &Error) -> Severity {
        match error.kind() {
            ErrorKind::Backend => match &self.session {
                Some(session) => session.ops.error_type(),
                None => Severity::Fatal,
            },
            kind => kind.severity(),
        }
    }

    /// Severity of a raw error code, non negative codes are not errors.
    pub fn error_type_code(&self, code: i32) -> Severity {
        if code >= 0 {
            return Severity::None;
        }
        match ErrorKind::from_code(code) {
            Some(kind) => self.error_type(&Error::new(kind)),
            None => Severity::Recoverable,
        }
    }

    /// Escape `input` for use inside a string literal, natively when the
    /// backend can, otherwise by doubling quotes and backslashes.
    pub fn escape(&self, input: &[u8]) -> Result<Vec<u8>> {
        let ops = self.ops()?;
        let mut output = Vec::with_capacity(input.len() + input.len() / 8 + 1);
        match ops.escaper() {
            Some(escaper) => escaper
                .escape(input, &mut output)
                .map_err(Error::detach)?,
            None => escape_fallback(input, &mut output),
        }
        Ok(output)
    }

    /// Escape into a caller buffer, NUL terminated. Returns the escaped length.
    pub fn escape_into(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let escaped = self.escape(input)?;
        write_nul_terminated(&escaped, output)
    }

    /// Send one or more statements to the backend.
    pub fn query(&mut self, sql: impl AsRef<[u8]>) -> Result<()> {
        self.query_with_length(sql.as_ref(), 0)
    }

    /// Send the first `length` bytes of `sql`, zero meaning up to the first NUL byte.
    pub fn query_with_length(&mut self, sql: &[u8], length: usize) -> Result<()> {
        self.require(&[ConnectionState::Bound])?;
        let sql = statement_slice(sql, length)?;
        log::debug!("Query: {}", printable_query(sql));
        let result = self.ops_mut()?.query(sql).map_err(Error::detach);
        match result {
            Ok(()) => {
                self.statement = StatementState::Pending;
                Ok(())
            }
            Err(e) => {
                self.statement = StatementState::Idle;
                let error = e.context(format!("While running the query:\n{}", printable_query(sql)));
                log::error!("{:#}", error);
                Err(error)
            }
        }
    }

    /// Advance to the next result of the current statement.
    ///
    /// `timeout` bounds the wait for the backend, `None` blocks. A `chunk` of
    /// zero materializes the whole result, other values ask for paging where
    /// supported.
    pub fn result(&mut self, timeout: Option<Duration>, chunk: u64) -> Result<Outcome<'_>> {
        self.require(&[ConnectionState::Bound])?;
        if self.statement != StatementState::Pending {
            return Ok(Outcome::Done);
        }
        let outcome = match self.ops_mut()?.result(timeout, chunk) {
            Ok(outcome) => outcome,
            Err(e) => {
                let error = e.detach();
                log::error!("{:#}", error);
                return Err(error);
            }
        };
        Ok(match outcome {
            BackendOutcome::Done => {
                self.statement = StatementState::Done;
                Outcome::Done
            }
            BackendOutcome::Timeout => Outcome::Timeout,
            BackendOutcome::NoRows(cursor) => Outcome::NoRows(ResultSet::new(self, cursor, false)),
            BackendOutcome::Rows(cursor) => Outcome::Rows(ResultSet::new(self, cursor, true)),
        })
    }

    pub(crate) fn ops(&self) -> Result<&dyn BasicOps> {
        match &self.session {
            Some(session) => Ok(session.ops.as_ref()),
            None => Err(Error::with_detail(
                ErrorKind::InvalidHandle,
                "The handle is finished",
            )),
        }
    }

    fn ops_mut(&mut self) -> Result<&mut dyn BasicOps> {
        match &mut self.session {
            Some(session) => Ok(session.ops.as_mut()),
            None => Err(Error::with_detail(
                ErrorKind::InvalidHandle,
                "The handle is finished",
            )),
        }
    }

    fn require(&self, states: &[ConnectionState]) -> Result<()> {
        if states.contains(&self.state) {
            return Ok(());
        }
        Err(Error::with_detail(
            ErrorKind::InvalidHandle,
            format!(
                "The handle of `{}` is {:?}, expected one of {:?}",
                self.backend, self.state, states
            ),
        ))
    }
}

impl Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("backend", &self.backend)
            .field("state", &self.state)
            .field("statement", &self.statement)
            .finish()
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.session.is_some()
            && let Err(e) = self.finish()
        {
            log::error!("Error while dropping the handle of `{}`: {:#}", self.backend, e);
        }
    }
}
