mod builtin;
mod connect;

pub use builtin::*;
pub use connect::*;
pub use dbx_core::*;
#[cfg(feature = "sqlite")]
pub use dbx_sqlite as sqlite;
