#[cfg(test)]
mod tests {
    use dbx_core::{
        BindMethod, ColumnType, DbOption, ErrorKind, Handle, OptionValue, Outcome, Registry,
        RowStatus, Severity,
    };
    use dbx_sqlite::register;
    use dbx_tests::{collect, collect_one, init_logs, silent_logs};
    use std::{
        fs,
        path::Path,
        sync::Mutex,
        time::{Duration, Instant},
    };

    static MUTEX: Mutex<()> = Mutex::new(());

    fn open(file: &str) -> (Registry, Handle) {
        let path = format!("../target/debug/{}", file);
        if Path::new(&path).exists() {
            fs::remove_file(&path)
                .expect(format!("Failed to remove test database file {}", path).as_str());
        }
        let registry = Registry::default();
        register(&registry);
        let mut handle = Handle::init_with(&registry, "sqlite3", Some("../target/debug/"), None)
            .expect("Could not initialize the sqlite3 backend");
        handle
            .bind_simple(file, None, None)
            .expect("Could not open the database");
        (registry, handle)
    }

    #[test]
    fn create_database() {
        init_logs();
        const DB_PATH: &'static str = "../target/debug/creation.sqlite";
        let _guard = MUTEX.lock().unwrap();
        let (_registry, mut handle) = open("creation.sqlite");
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after binding"
        );
        handle.unbind().unwrap();
        handle.bind_simple("creation.sqlite", None, None).unwrap();
        handle.finish().unwrap();
        fs::remove_file(DB_PATH)
            .expect(format!("Failed to remove existing test database file {}", DB_PATH).as_str());
    }

    #[test]
    fn cannot_open() {
        init_logs();
        let registry = Registry::default();
        register(&registry);
        let mut handle = Handle::init_with(
            &registry,
            "sqlite3",
            Some("../target/debug/no/such/directory/"),
            None,
        )
        .unwrap();
        let error = silent_logs! { handle.bind_simple("db.sqlite", None, None).unwrap_err() };
        assert_eq!(error.kind(), ErrorKind::Backend);
        assert_eq!(handle.error(&error), "Opening database failed");
        assert_eq!(handle.error_type(&error), Severity::Fatal);
        let error = silent_logs! {
            handle
                .bind("db.sqlite", None, None, BindMethod::Other(1))
                .unwrap_err()
        };
        assert_eq!(error.kind(), ErrorKind::NotSupported);
    }

    #[test]
    fn tables() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let (_registry, mut handle) = open("tables.sqlite");
        collect(
            &mut handle,
            "CREATE TABLE item (id INTEGER PRIMARY KEY, name VARCHAR(20), price REAL, data BLOB, added DATE);
             INSERT INTO item VALUES (1, 'first', 1.5, x'00ff', '2024-01-01');
             INSERT INTO item VALUES (2, '', NULL, NULL, NULL);
             INSERT INTO item VALUES (3, NULL, NULL, x'', NULL)",
        )
        .expect("Failed to create the table");

        let updated = collect_one(&mut handle, "UPDATE item SET price = 2 WHERE id > 1").unwrap();
        assert!(!updated.has_rows);
        assert_eq!(updated.affected, 2);

        handle
            .query("SELECT id, name, price, data, added FROM item ORDER BY id")
            .unwrap();
        let Outcome::Rows(mut result) = handle.result(None, 0).unwrap() else {
            panic!("Expected rows");
        };
        assert_eq!(result.column_count(), 5);
        assert_eq!(result.column_name(1), Some("name"));
        assert_eq!(result.row_fetch().unwrap(), RowStatus::Next);
        assert_eq!(result.column_type(0).unwrap(), ColumnType::BigInt);
        assert_eq!(result.column_type(1).unwrap(), ColumnType::Clob);
        assert_eq!(result.column_type(2).unwrap(), ColumnType::Double);
        assert_eq!(result.column_type(3).unwrap(), ColumnType::Blob);
        assert_eq!(result.field_value(3), Some(&[0x00u8, 0xff][..]));
        assert_eq!(result.field_length(3), 2);
        assert_eq!(result.field_value(4), Some(&b"2024-01-01"[..]));

        assert_eq!(result.row_fetch().unwrap(), RowStatus::Next);
        assert_eq!(result.field_value(1), Some(&b""[..]), "Empty string is not NULL");
        assert_eq!(result.field_value(3), None);
        // NULL values are typed from the declaration
        assert_eq!(result.column_type(3).unwrap(), ColumnType::Blob);
        assert_eq!(result.column_type(4).unwrap(), ColumnType::Clob);

        assert_eq!(result.row_fetch().unwrap(), RowStatus::Next);
        assert_eq!(result.field_value(1), None);
        assert_eq!(result.column_type(1).unwrap(), ColumnType::Clob);
        assert_eq!(result.field_value(3), Some(&b""[..]), "Empty blob is not NULL");
        assert_eq!(result.field_value(2), Some(&b"2.0"[..]));

        assert_eq!(result.row_fetch().unwrap(), RowStatus::Done);
        assert_eq!(result.row_fetch().unwrap(), RowStatus::Done);
        result.finish().unwrap();
        assert!(handle.result(None, 0).unwrap().is_done());
    }

    #[test]
    fn busy_database() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let (registry, mut writer) = open("busy.sqlite");
        collect(&mut writer, "CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (1)").unwrap();

        let mut reader =
            Handle::init_with(&registry, "sqlite3", Some("../target/debug/"), None).unwrap();
        reader.bind_simple("busy.sqlite", None, None).unwrap();
        assert_eq!(registry.active_handles("sqlite3"), 2);

        collect(&mut writer, "BEGIN EXCLUSIVE").unwrap();
        reader.query("SELECT a FROM t").unwrap();
        let started = Instant::now();
        assert!(matches!(
            reader.result(Some(Duration::from_millis(50)), 0).unwrap(),
            Outcome::Timeout
        ));
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert!(matches!(
            reader.result(Some(Duration::ZERO), 0).unwrap(),
            Outcome::Timeout
        ));
        collect(&mut writer, "COMMIT").unwrap();

        let Outcome::Rows(mut result) = reader.result(Some(Duration::from_secs(5)), 0).unwrap()
        else {
            panic!("Expected the rows once the lock is released");
        };
        assert_eq!(result.row_fetch().unwrap(), RowStatus::Next);
        assert_eq!(result.field_value(0), Some(&b"1"[..]));
        result.finish().unwrap();
    }

    #[test]
    fn failing_statements() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let (_registry, mut handle) = open("failing.sqlite");
        handle
            .query("SELECT 1 AS n; SELECT * FROM missing; SELECT 3 AS n")
            .unwrap();
        {
            let Outcome::Rows(result) = handle.result(None, 0).unwrap() else {
                panic!("Expected the first result");
            };
            result.finish().unwrap();
        }
        let error = silent_logs! { handle.result(None, 0).unwrap_err() };
        assert_eq!(error.kind(), ErrorKind::Backend);
        assert!(handle.error(&error).contains("missing"));
        assert_eq!(handle.error_type(&error), Severity::Recoverable);
        assert!(
            handle.result(None, 0).unwrap().is_done(),
            "The rest of the text is dropped"
        );

        handle.query("   ").unwrap();
        assert!(handle.result(None, 0).unwrap().is_done());
        handle.query("-- nothing to run").unwrap();
        assert!(handle.result(None, 0).unwrap().is_done());
    }

    #[test]
    fn options() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let (_registry, mut handle) = open("options.sqlite");
        assert_eq!(
            handle.get_option(DbOption::MultiStatements).unwrap(),
            OptionValue::Flag(true)
        );
        assert_eq!(
            handle.get_option(DbOption::Mode).unwrap_err().kind(),
            ErrorKind::InvalidOption
        );
        handle.set_option(DbOption::MultiStatements, true).unwrap();
        for (option, value) in [
            (DbOption::MultiStatements, OptionValue::Flag(false)),
            (DbOption::Compress, OptionValue::Flag(true)),
            (DbOption::ConnectTimeout, OptionValue::Int(3)),
            (DbOption::Tls, OptionValue::Tls(dbx_core::TlsMode::Try)),
        ] {
            assert_eq!(
                handle.set_option(option, value).unwrap_err().kind(),
                ErrorKind::OptionWriteFailed,
                "Option `{}` can't be written",
                option
            );
        }
        assert_eq!(
            handle
                .set_option(DbOption::Mode, String::from("ro"))
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidOption
        );
    }
}
