use crate::{BindMethod, ColumnType, DbOption, OptionValue, Result, RowStatus, Severity};
use std::{borrow::Cow, sync::Arc, time::Duration};

/// Version of the backend interface, reported through `DbOption::ApiVersion`.
pub const API_VERSION: i64 = 1;

/// Name of the symbol a loadable backend module exports.
pub const ENTRY_POINT: &str = "dbxdrv_register";

/// Signature of [`ENTRY_POINT`], the driver is returned through the out-parameter.
pub type EntryPoint = unsafe fn(ops: &mut Option<Arc<dyn Driver>>);

/// Entry of a backend module: creates the per-connection objects.
///
/// One driver instance is shared by every handle of the same module, the
/// connection state lives in the [`BasicOps`] objects it creates.
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    /// Create a connection object. The meaning of `host` and `port` is backend
    /// defined (network address, directory, ...).
    fn init(&self, host: Option<&str>, port: Option<&str>) -> Result<Box<dyn BasicOps>>;

    /// Called when the first handle of this backend is created. Other
    /// backends are not blocked meanwhile, but creating or finishing a handle
    /// of this same backend from here deadlocks.
    fn setup(&self) -> Result<()> {
        Ok(())
    }

    /// Called when the last handle of this backend is finished.
    fn teardown(&self) {}
}

/// Result of advancing to the next result set of a statement.
pub enum BackendOutcome {
    Done,
    Timeout,
    NoRows(Box<dyn ResultOps>),
    Rows(Box<dyn ResultOps>),
}

/// Per-connection operations. Mandatory slots are trait methods, optional
/// groups are exposed through the `Option` returning accessors.
pub trait BasicOps: Send {
    fn bind(
        &mut self,
        database: &str,
        principal: Option<&str>,
        credential: Option<&str>,
        method: BindMethod,
    ) -> Result<()>;

    fn unbind(&mut self) -> Result<()>;

    /// Release every resource the connection object still holds.
    fn finish(&mut self) -> Result<()>;

    fn get_option(&self, option: DbOption) -> Result<OptionValue>;

    fn set_option(&mut self, option: DbOption, value: OptionValue) -> Result<()>;

    /// Message describing the last backend error.
    fn error(&self) -> Cow<'_, str>;

    /// Severity of the last backend error.
    fn error_type(&self) -> Severity;

    /// Hand a statement (possibly several) to the backend.
    fn query(&mut self, sql: &[u8]) -> Result<()>;

    /// Advance to the next result set, waiting at most `timeout` when given.
    fn result(&mut self, timeout: Option<Duration>, chunk: u64) -> Result<BackendOutcome>;

    /// Native escaping, `None` makes the core use its generic fallback.
    fn escaper(&self) -> Option<&dyn Escape> {
        None
    }

    /// Large object operations, `None` when unsupported.
    fn large_objects(&self) -> Option<&dyn LoOps> {
        None
    }
}

/// Backend native escaping of string literals.
pub trait Escape {
    /// Append the escaped form of `input` to `output`.
    fn escape(&self, input: &[u8], output: &mut Vec<u8>) -> Result<()>;
}

/// Per-result operations, the cursor over the rows of one result set.
pub trait ResultOps: Send {
    fn row_fetch(&mut self) -> Result<RowStatus>;

    /// Rows changed by the statement, 0 when unknown.
    fn rows_affected(&self) -> u64;

    fn column_count(&self) -> usize;

    fn column_name(&self, pos: usize) -> Option<&str>;

    fn column_type(&self, pos: usize) -> Result<ColumnType>;

    fn field_length(&self, pos: usize) -> usize;

    /// Value of the field in the current row, `None` for SQL NULL.
    fn field_value(&self, pos: usize) -> Option<&[u8]>;

    fn finish(self: Box<Self>) -> Result<()>;
}

/// Large object capability group.
pub trait LoOps {
    /// Open the large object identified by `locator`, obtained from a field
    /// value of `result`.
    fn open(&self, result: &dyn ResultOps, locator: &[u8]) -> Result<Box<dyn LoStream>>;
}

/// One open large object transfer.
pub trait LoStream: Send {
    /// Read up to `buffer.len()` bytes, 0 means end of stream.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    fn write(&mut self, buffer: &[u8]) -> Result<usize>;

    /// Largest single transfer the backend accepts, bigger requests are clamped.
    fn max_transfer(&self) -> usize {
        usize::MAX
    }

    /// Terminate the written data, called once before `close` if anything was written.
    fn finish_write(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()>;
}

/// Export the entry point of a loadable backend module.
///
/// ```rust,ignore
/// dbx_core::export_backend!(MyDriver::new());
/// ```
#[macro_export]
macro_rules! export_backend {
    ($driver:expr) => {
        #[unsafe(no_mangle)]
        pub fn dbxdrv_register(
            ops: &mut ::std::option::Option<::std::sync::Arc<dyn $crate::Driver>>,
        ) {
            *ops = ::std::option::Option::Some(::std::sync::Arc::new($driver));
        }
    };
}
