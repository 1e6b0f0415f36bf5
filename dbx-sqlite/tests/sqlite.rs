#[cfg(test)]
mod tests {
    use dbx_core::{Handle, Registry};
    use dbx_sqlite::register;
    use dbx_tests::{execute_tests, init_logs};
    use std::{fs, path::Path, sync::Mutex};

    static MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn sqlite() {
        init_logs();
        const DB_PATH: &'static str = "../target/debug/tests.sqlite";
        let _guard = MUTEX.lock().unwrap();
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH).expect(
                format!("Failed to remove existing test database file {}", DB_PATH).as_str(),
            );
        }
        assert!(
            !Path::new(DB_PATH).exists(),
            "Database file should not exist before test"
        );
        let registry = Registry::default();
        register(&registry);
        let mut handle = Handle::init_with(&registry, "sqlite3", Some("../target/debug/"), None)
            .expect("Could not initialize the sqlite3 backend");
        handle
            .bind_simple("tests.sqlite", None, None)
            .expect("Could not open the database");
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after binding"
        );
        execute_tests(&mut handle);
        handle.finish().expect("Could not finish the handle");
    }
}
