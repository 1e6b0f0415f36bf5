mod backend;
mod connection;
mod error;
mod large_object;
mod loader;
mod option;
mod registry;
mod result;
mod types;
mod util;

pub use ::anyhow::Context;
pub use backend::*;
pub use connection::*;
pub use error::*;
pub use large_object::*;
pub use loader::*;
pub use option::*;
pub use registry::*;
pub use result::*;
pub use types::*;
pub use util::*;

pub type Result<T> = std::result::Result<T, Error>;
