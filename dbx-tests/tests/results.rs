#[cfg(test)]
mod tests {
    use dbx_core::{ErrorKind, Handle, Outcome, Registry, RowStatus, Severity};
    use dbx_tests::{Counters, ScriptedConfig, collect, init_logs, register_scripted, silent_logs};
    use std::time::{Duration, Instant};

    fn bound(config: ScriptedConfig) -> (Registry, Handle) {
        let registry = Registry::default();
        register_scripted(&registry, "scripted", config);
        let mut handle = Handle::init_with(&registry, "scripted", None, None).unwrap();
        handle.bind_simple("db", None, None).unwrap();
        (registry, handle)
    }

    #[test]
    fn result_without_statement() {
        init_logs();
        let (_registry, mut handle) = bound(Default::default());
        assert!(handle.result(None, 0).unwrap().is_done());
        assert!(handle.result(Some(Duration::ZERO), 0).unwrap().is_done());
    }

    #[test]
    fn timeout_then_result() {
        init_logs();
        let (_registry, mut handle) = bound(ScriptedConfig {
            latency: Duration::from_millis(300),
            ..Default::default()
        });
        handle.query("SELECT 1 AS n").unwrap();
        let started = Instant::now();
        let outcome = handle.result(Some(Duration::from_millis(10)), 0).unwrap();
        assert_eq!(outcome.code(), 3);
        assert!(matches!(outcome, Outcome::Timeout));
        drop(outcome);
        assert!(started.elapsed() < Duration::from_millis(300));
        assert!(matches!(
            handle.result(Some(Duration::ZERO), 0).unwrap(),
            Outcome::Timeout
        ));

        let Outcome::Rows(mut result) = handle.result(None, 0).unwrap() else {
            panic!("Expected the rows after waiting");
        };
        assert_eq!(result.row_fetch().unwrap(), RowStatus::Next);
        assert_eq!(result.field_value(0), Some(&b"1"[..]));
        result.finish().unwrap();
        assert!(handle.result(None, 0).unwrap().is_done());
    }

    #[test]
    fn done_is_not_fetched_again() {
        init_logs();
        let counters = Counters::default();
        let (_registry, mut handle) = bound(ScriptedConfig {
            counters: counters.clone(),
            ..Default::default()
        });
        handle.query("SELECT 1 AS n UNION ALL SELECT 2").unwrap();
        let Outcome::Rows(mut result) = handle.result(None, 0).unwrap() else {
            panic!("Expected rows");
        };
        while result.row_fetch().unwrap() == RowStatus::Next {}
        assert_eq!(Counters::get(&counters.row_fetches), 3);
        for _ in 0..5 {
            assert_eq!(result.row_fetch().unwrap(), RowStatus::Done);
        }
        assert_eq!(Counters::get(&counters.row_fetches), 3);
        result.finish().unwrap();
        assert_eq!(Counters::get(&counters.row_fetches), 3, "Nothing left to drain");
        assert_eq!(Counters::get(&counters.result_finishes), 1);
    }

    #[test]
    fn finish_drains_the_rows() {
        init_logs();
        let counters = Counters::default();
        let (_registry, mut handle) = bound(ScriptedConfig {
            counters: counters.clone(),
            ..Default::default()
        });
        handle
            .query("SELECT 1 AS n UNION ALL SELECT 2 UNION ALL SELECT 3")
            .unwrap();
        {
            let Outcome::Rows(result) = handle.result(None, 0).unwrap() else {
                panic!("Expected rows");
            };
            result.finish().unwrap();
        }
        assert_eq!(Counters::get(&counters.row_fetches), 4);
        assert_eq!(Counters::get(&counters.result_finishes), 1);

        handle.query("SELECT 1 AS n UNION ALL SELECT 2").unwrap();
        {
            let Outcome::Rows(mut result) = handle.result(None, 0).unwrap() else {
                panic!("Expected rows");
            };
            assert_eq!(result.row_fetch().unwrap(), RowStatus::Next);
        }
        assert_eq!(Counters::get(&counters.row_fetches), 7, "Dropping drains as well");
        assert_eq!(Counters::get(&counters.result_finishes), 2);
    }

    #[test]
    fn no_rows_result() {
        init_logs();
        let (_registry, mut handle) = bound(Default::default());
        handle.query("UPDATE t SET a = 1").unwrap();
        let outcome = handle.result(None, 0).unwrap();
        assert_eq!(outcome.code(), 2);
        let Outcome::NoRows(mut result) = outcome else {
            panic!("Expected a result without rows");
        };
        assert!(!result.has_rows());
        assert_eq!(result.rows_affected(), 1);
        assert_eq!(result.column_count(), 0);
        assert_eq!(result.row_fetch().unwrap(), RowStatus::Done);
        assert_eq!(result.field_value(0), None);
        result.finish().unwrap();
    }

    #[test]
    fn failed_query_leaves_nothing_pending() {
        init_logs();
        let (_registry, mut handle) = bound(Default::default());
        handle.query("SELECT 1 AS n").unwrap();
        let error = silent_logs! { handle.query("SELEKT 1").unwrap_err() };
        assert_eq!(error.kind(), ErrorKind::Backend);
        assert!(handle.error(&error).starts_with("Syntax error"));
        assert_eq!(handle.error_type(&error), Severity::Recoverable);
        assert!(handle.result(None, 0).unwrap().is_done());

        let error = silent_logs! { handle.query("DISCONNECT").unwrap_err() };
        assert_eq!(handle.error_type(&error), Severity::Fatal);
    }

    #[test]
    fn explicit_length() {
        init_logs();
        let (_registry, mut handle) = bound(Default::default());
        handle
            .query_with_length(b"SELECT 12 AS n; garbage", 14)
            .unwrap();
        let results = {
            let Outcome::Rows(mut result) = handle.result(None, 0).unwrap() else {
                panic!("Expected rows");
            };
            assert_eq!(result.row_fetch().unwrap(), RowStatus::Next);
            result.field_value(0).map(<[u8]>::to_vec)
        };
        assert_eq!(results, Some(b"12".to_vec()));
        assert!(handle.result(None, 0).unwrap().is_done());

        handle.query_with_length(b"SELECT 3 AS n\0SELECT", 0).unwrap();
        assert!(matches!(handle.result(None, 0).unwrap(), Outcome::Rows(..)));
        assert_eq!(
            handle.query_with_length(b"SELECT", 64).unwrap_err().kind(),
            ErrorKind::InvalidParam
        );
    }

    #[test]
    fn native_escape() {
        init_logs();
        let (_registry, mut handle) = bound(ScriptedConfig {
            native_escape: true,
            ..Default::default()
        });
        assert_eq!(handle.escape(br"it's a \").unwrap(), br"it\'s a \\");
        let (_registry, fallback) = bound(Default::default());
        assert_eq!(fallback.escape(br"it's a \").unwrap(), br"it''s a \\");
        let results = collect(&mut handle, r"SELECT 'it\'s a \\' AS v").unwrap();
        assert_eq!(results[0].value(0, 0), Some(&br"it's a \"[..]));
    }
}
