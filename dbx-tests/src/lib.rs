mod collect;
mod errors;
mod escape;
mod multiple;
mod options;
mod scripted;
mod simple;
mod statements;

pub use collect::*;
pub use scripted::*;

use crate::{
    errors::errors,
    escape::escape,
    multiple::{drain, union_all},
    options::{capabilities, options},
    simple::{null_and_empty, simple, terminal_states},
    statements::statements,
};
use dbx_core::{ConnectionState, Handle};
use log::LevelFilter;
use std::env;

#[cfg(not(feature = "disable-multiple-statements"))]
use multiple::multiple;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run the behaviour every backend must share on a bound handle.
pub fn execute_tests(handle: &mut Handle) {
    assert_eq!(
        handle.state(),
        ConnectionState::Bound,
        "The conformance tests need a bound handle"
    );
    simple(handle);
    null_and_empty(handle);
    terminal_states(handle);
    union_all(handle);
    #[cfg(not(feature = "disable-multiple-statements"))]
    multiple(handle);
    drain(handle);
    statements(handle);
    errors(handle);
    escape(handle);
    options(handle);
    capabilities(handle);
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        let value = { $($code)+ };
        log::set_max_level(level);
        value
    }};
}
