use std::{
    borrow::Cow,
    fmt::{self, Debug, Display},
};

/// Flat error taxonomy shared by the core and every backend.
///
/// The discriminant is the stable error code; functions reporting an error
/// return its negation (see [`Error::code`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorKind {
    Success = 0,
    /// The backend reported an error, its message and severity are delegated to it.
    Backend = 1,
    NoCapability = 2,
    InvalidParam = 3,
    OutOfMemory = 4,
    SizeMismatch = 5,
    /// The backend module could not be found or loaded.
    NotFound = 6,
    /// The entry point or a function slot is missing.
    NoOp = 7,
    InvalidOption = 8,
    OptionReadOnly = 9,
    OptionWriteFailed = 10,
    WaitFailed = 11,
    NotSupported = 12,
    InvalidHandle = 13,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 14] = [
        ErrorKind::Success,
        ErrorKind::Backend,
        ErrorKind::NoCapability,
        ErrorKind::InvalidParam,
        ErrorKind::OutOfMemory,
        ErrorKind::SizeMismatch,
        ErrorKind::NotFound,
        ErrorKind::NoOp,
        ErrorKind::InvalidOption,
        ErrorKind::OptionReadOnly,
        ErrorKind::OptionWriteFailed,
        ErrorKind::WaitFailed,
        ErrorKind::NotSupported,
        ErrorKind::InvalidHandle,
    ];

    pub const fn id(self) -> i32 {
        self as i32
    }

    /// Accepts both the kind id and the negated error code.
    pub fn from_code(code: i32) -> Option<ErrorKind> {
        let id = code.checked_abs()?;
        ErrorKind::ALL.get(id as usize).copied()
    }

    /// Canonical, core-owned message.
    pub const fn message(self) -> &'static str {
        match self {
            ErrorKind::Success => "Success",
            ErrorKind::Backend => "Backend error occured",
            ErrorKind::NoCapability => "Invalid capability",
            ErrorKind::InvalidParam => "Invalid parameter",
            ErrorKind::OutOfMemory => "Out of memory",
            ErrorKind::SizeMismatch => "Incorrect size of allocated memory",
            ErrorKind::NotFound => "Loading backend library failed",
            ErrorKind::NoOp => "Operation is not available",
            ErrorKind::InvalidOption => "Invalid option",
            ErrorKind::OptionReadOnly => "Option is read only",
            ErrorKind::OptionWriteFailed => "Setting option failed",
            ErrorKind::WaitFailed => "Waiting for result failed",
            ErrorKind::NotSupported => "Not supported",
            ErrorKind::InvalidHandle => "Invalid handle",
        }
    }

    /// Fixed classification of core-raised kinds. `Backend` errors are
    /// classified by the backend itself, this table only covers the case where
    /// no backend is available to ask.
    pub const fn severity(self) -> Severity {
        match self {
            ErrorKind::Success => Severity::None,
            ErrorKind::Backend
            | ErrorKind::InvalidHandle
            | ErrorKind::OutOfMemory
            | ErrorKind::NotFound
            | ErrorKind::NoOp
            | ErrorKind::WaitFailed => Severity::Fatal,
            _ => Severity::Recoverable,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Canonical message for a raw error code, unknown codes describe themselves
/// as an invalid parameter.
pub fn error_message(code: i32) -> &'static str {
    if code > 0 {
        return ErrorKind::InvalidParam.message();
    }
    ErrorKind::from_code(code)
        .unwrap_or(ErrorKind::InvalidParam)
        .message()
}

/// How bad an error is for the connection that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// No error.
    None,
    /// The operation failed, the connection is still usable.
    Recoverable,
    /// The connection should be abandoned (call `finish`).
    Fatal,
}

impl Severity {
    pub const fn as_i32(self) -> i32 {
        match self {
            Severity::None => 0,
            Severity::Recoverable => 1,
            Severity::Fatal => -1,
        }
    }

    pub const fn from_i32(value: i32) -> Severity {
        match value {
            0 => Severity::None,
            v if v > 0 => Severity::Recoverable,
            _ => Severity::Fatal,
        }
    }

    pub const fn is_fatal(self) -> bool {
        matches!(self, Severity::Fatal)
    }
}

/// Error returned by every fallible operation of the core and the backends.
///
/// It always carries an [`ErrorKind`] for programmatic branching and optionally
/// a chain of human readable details.
pub struct Error {
    kind: ErrorKind,
    detail: Option<anyhow::Error>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, detail: None }
    }

    /// A backend error with the given message.
    pub fn msg<M>(message: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        Self {
            kind: ErrorKind::Backend,
            detail: Some(anyhow::Error::msg(message)),
        }
    }

    pub fn with_detail<M>(kind: ErrorKind, message: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        Self {
            kind,
            detail: Some(anyhow::Error::msg(message)),
        }
    }

    /// Wraps the error with additional context, the kind is preserved.
    pub fn context<C>(self, context: C) -> Self
    where
        C: Display + Send + Sync + 'static,
    {
        let detail = match self.detail {
            Some(detail) => detail.context(context),
            None => anyhow::Error::msg(self.kind.message()).context(context),
        };
        Self {
            kind: self.kind,
            detail: Some(detail),
        }
    }

    /// Rebuild the detail from its rendered message, nothing in the result
    /// points into the module that produced the error. Required for every
    /// error that may outlive a loaded backend.
    pub fn detach(self) -> Self {
        match self.detail {
            Some(detail) => Self {
                kind: self.kind,
                detail: Some(anyhow::Error::msg(format!("{:#}", detail))),
            },
            None => self,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Stable negative code of this error.
    pub fn code(&self) -> i32 {
        -self.kind.id()
    }

    pub fn detail(&self) -> Option<&anyhow::Error> {
        self.detail.as_ref()
    }

    /// The most specific message available without asking a backend.
    pub fn message(&self) -> Cow<'_, str> {
        match &self.detail {
            Some(detail) => Cow::Owned(format!("{:#}", detail)),
            None => Cow::Borrowed(self.kind.message()),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) if f.alternate() => write!(f, "{}: {:#}", self.kind, detail),
            Some(detail) => write!(f, "{}: {}", self.kind, detail),
            None => Display::fmt(&self.kind, f),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("code", &self.code())
            .field("detail", &self.detail)
            .finish()
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<anyhow::Error> for Error {
    fn from(detail: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Backend,
            detail: Some(detail),
        }
    }
}

impl From<std::ffi::NulError> for Error {
    fn from(error: std::ffi::NulError) -> Self {
        Error::with_detail(ErrorKind::InvalidParam, error.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(error: std::str::Utf8Error) -> Self {
        Error::with_detail(ErrorKind::InvalidParam, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        for (i, kind) in ErrorKind::ALL.iter().enumerate() {
            assert_eq!(kind.id(), i as i32);
            assert_eq!(ErrorKind::from_code(-(i as i32)), Some(*kind));
        }
        assert_eq!(ErrorKind::from_code(-14), None);
        assert_eq!(Error::new(ErrorKind::InvalidHandle).code(), -13);
    }

    #[test]
    fn unknown_code_message() {
        assert_eq!(error_message(-99), "Invalid parameter");
        assert_eq!(error_message(0), "Success");
        assert_eq!(error_message(1), "Invalid parameter");
        assert_eq!(error_message(6), "Invalid parameter");
        assert_eq!(error_message(-6), "Loading backend library failed");
    }

    #[test]
    fn detached_error_keeps_the_message() {
        let error = Error::with_detail(ErrorKind::OptionWriteFailed, "refused")
            .context("While writing `tls`");
        let rendered = format!("{:#}", error);
        let detached = error.detach();
        assert_eq!(detached.kind(), ErrorKind::OptionWriteFailed);
        assert_eq!(format!("{:#}", detached), rendered);
        assert_eq!(detached.detail().map(|d| d.chain().count()), Some(1));

        let bare = Error::new(ErrorKind::NoOp).detach();
        assert!(bare.detail().is_none());
        assert_eq!(bare.message(), "Operation is not available");
    }

    #[test]
    fn fixed_severity_table() {
        assert_eq!(ErrorKind::Success.severity(), Severity::None);
        assert!(ErrorKind::InvalidHandle.severity().is_fatal());
        assert!(ErrorKind::NotFound.severity().is_fatal());
        assert!(ErrorKind::WaitFailed.severity().is_fatal());
        assert_eq!(ErrorKind::InvalidParam.severity(), Severity::Recoverable);
        assert_eq!(ErrorKind::OptionReadOnly.severity(), Severity::Recoverable);
        assert_eq!(Severity::from_i32(7), Severity::Recoverable);
        assert_eq!(Severity::from_i32(-3), Severity::Fatal);
    }

    #[test]
    fn context_keeps_kind() {
        let error = Error::new(ErrorKind::SizeMismatch).context("While escaping");
        assert_eq!(error.kind(), ErrorKind::SizeMismatch);
        assert!(format!("{:#}", error).contains("While escaping"));
        let error: Error = anyhow::anyhow!("no such table: t").into();
        assert_eq!(error.kind(), ErrorKind::Backend);
        assert_eq!(error.message(), "no such table: t");
    }
}
