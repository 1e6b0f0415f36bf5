mod cbox;
mod connection;
mod cursor;
mod driver;
mod extract;

pub(crate) use cbox::*;
pub use connection::*;
pub use cursor::*;
pub use driver::*;

use dbx_core::Registry;
use std::{
    ffi::{CStr, c_char},
    sync::Arc,
};

#[cfg(feature = "plugin")]
dbx_core::export_backend!(SqliteDriver::new());

/// Register the SQLite backend as `sqlite3` without loading any module.
pub fn register(registry: &Registry) {
    registry.register(SqliteDriver::NAME, Arc::new(SqliteDriver::new()));
}

/// Version of the linked SQLite library.
pub fn sqlite_version() -> &'static str {
    unsafe { CStr::from_ptr(libsqlite3_sys::sqlite3_libversion()) }
        .to_str()
        .unwrap_or("unknown")
}

pub(crate) fn error_message_from_ptr<'a>(ptr: *const c_char) -> &'a str {
    unsafe {
        if !ptr.is_null() {
            CStr::from_ptr(ptr)
                .to_str()
                .unwrap_or("Unknown error (the error message was not a valid C string)")
        } else {
            "Unknown error (could not extract the error message)"
        }
    }
}
