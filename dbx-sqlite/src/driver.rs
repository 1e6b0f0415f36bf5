use crate::SqliteConnection;
use dbx_core::{BasicOps, Driver, Result};

#[derive(Debug, Default)]
pub struct SqliteDriver {}

impl SqliteDriver {
    pub const NAME: &'static str = "sqlite3";

    pub const fn new() -> Self {
        Self {}
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn init(&self, host: Option<&str>, _port: Option<&str>) -> Result<Box<dyn BasicOps>> {
        Ok(Box::new(SqliteConnection::new(host)))
    }

    fn setup(&self) -> Result<()> {
        log::debug!("SQLite {} ready", crate::sqlite_version());
        Ok(())
    }
}
