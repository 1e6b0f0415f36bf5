use crate::{Error, ErrorKind, Result};
use std::fmt::{self, Display};

/// Connection options understood by every backend.
///
/// Ids are stable: `0x0000-0x1fff` api options, `0x2000-0x3fff` api
/// extensions, `0x4000-0xffff` vendor specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DbOption {
    ApiVersion = 0x0000,
    ThreadSafe = 0x0001,
    /// Version of this library, answered without asking the backend.
    LibVersion = 0x0002,
    Tls = 0x0010,
    MultiStatements = 0x0020,
    PagedResults = 0x0021,
    Compress = 0x0022,
    Mode = 0x0023,
    ConnectTimeout = 0x0024,
}

impl DbOption {
    pub const ALL: [DbOption; 9] = [
        DbOption::ApiVersion,
        DbOption::ThreadSafe,
        DbOption::LibVersion,
        DbOption::Tls,
        DbOption::MultiStatements,
        DbOption::PagedResults,
        DbOption::Compress,
        DbOption::Mode,
        DbOption::ConnectTimeout,
    ];

    pub const fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Result<DbOption> {
        DbOption::ALL
            .into_iter()
            .find(|v| v.id() == id)
            .ok_or_else(|| {
                Error::with_detail(
                    ErrorKind::InvalidOption,
                    format!("Unknown option id 0x{:04x}", id),
                )
            })
    }

    /// Informational options can only be read.
    pub const fn is_read_only(self) -> bool {
        matches!(
            self,
            DbOption::ApiVersion | DbOption::ThreadSafe | DbOption::LibVersion
        )
    }

    /// Whether `value` has the shape this option expects.
    pub fn accepts(self, value: &OptionValue) -> bool {
        match self {
            DbOption::ApiVersion | DbOption::LibVersion | DbOption::ConnectTimeout => {
                matches!(value, OptionValue::Int(..))
            }
            DbOption::ThreadSafe
            | DbOption::MultiStatements
            | DbOption::PagedResults
            | DbOption::Compress => matches!(value, OptionValue::Flag(..)),
            DbOption::Tls => matches!(value, OptionValue::Tls(..)),
            DbOption::Mode => matches!(value, OptionValue::Text(..)),
        }
    }
}

impl Display for DbOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DbOption::ApiVersion => "api_version",
            DbOption::ThreadSafe => "thread_safe",
            DbOption::LibVersion => "lib_version",
            DbOption::Tls => "tls",
            DbOption::MultiStatements => "multi_statements",
            DbOption::PagedResults => "paged_results",
            DbOption::Compress => "compress",
            DbOption::Mode => "mode",
            DbOption::ConnectTimeout => "connect_timeout",
        };
        f.write_str(name)
    }
}

/// Encryption policy of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsMode {
    Never = 0,
    Try = 1,
    Always = 2,
}

impl TlsMode {
    pub fn from_id(id: i64) -> Result<TlsMode> {
        Ok(match id {
            0 => TlsMode::Never,
            1 => TlsMode::Try,
            2 => TlsMode::Always,
            _ => {
                return Err(Error::with_detail(
                    ErrorKind::InvalidParam,
                    format!("Invalid TLS mode {}", id),
                ));
            }
        })
    }
}

/// Value read from or written to a [`DbOption`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptionValue {
    Flag(bool),
    Int(i64),
    Tls(TlsMode),
    Text(String),
}

impl OptionValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            OptionValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OptionValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Flag(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<TlsMode> for OptionValue {
    fn from(value: TlsMode) -> Self {
        OptionValue::Tls(value)
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

/// Optional capability groups a backend may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Basic = 0,
    LargeObject = 1,
}

impl Capability {
    pub fn from_id(id: u32) -> Option<Capability> {
        match id {
            0 => Some(Capability::Basic),
            1 => Some(Capability::LargeObject),
            _ => None,
        }
    }
}

/// Authentication method used by `bind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindMethod {
    /// Principal and credential.
    Simple,
    /// Any other method id, backends reject the ones they don't know with
    /// [`ErrorKind::NotSupported`].
    Other(u32),
}

impl BindMethod {
    pub const fn id(self) -> u32 {
        match self {
            BindMethod::Simple => 0,
            BindMethod::Other(id) => id,
        }
    }

    pub const fn from_id(id: u32) -> BindMethod {
        match id {
            0 => BindMethod::Simple,
            id => BindMethod::Other(id),
        }
    }
}

/// Numeric version of this library: `major * 10000 + minor * 100 + patch`.
pub fn lib_version() -> i64 {
    let part = |v: &str| v.parse::<i64>().unwrap_or_default();
    part(env!("CARGO_PKG_VERSION_MAJOR")) * 10000
        + part(env!("CARGO_PKG_VERSION_MINOR")) * 100
        + part(env!("CARGO_PKG_VERSION_PATCH"))
}
