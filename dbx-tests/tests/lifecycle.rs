#[cfg(test)]
mod tests {
    use dbx_core::{
        BasicOps, BindMethod, ConnectionState, DbOption, Driver, Error, ErrorKind, Handle,
        Registry, Result, Severity,
    };
    use dbx_tests::{
        Counters, ScriptedConfig, ScriptedDriver, init_logs, register_scripted, silent_logs,
    };
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    /// Opens a handle of another backend while being set up.
    struct Dependent {
        registry: Registry,
        inner: ScriptedDriver,
        observed: Arc<AtomicUsize>,
    }

    impl Driver for Dependent {
        fn name(&self) -> &str {
            "dependent"
        }

        fn init(&self, host: Option<&str>, port: Option<&str>) -> Result<Box<dyn BasicOps>> {
            self.inner.init(host, port)
        }

        fn setup(&self) -> Result<()> {
            let mut handle = Handle::init_with(&self.registry, "scripted", None, None)?;
            self.observed
                .store(self.registry.active_handles("scripted"), Ordering::SeqCst);
            handle.finish()
        }
    }

    fn scripted(config: ScriptedConfig) -> Registry {
        let registry = Registry::default();
        register_scripted(&registry, "scripted", config);
        registry
    }

    #[test]
    fn state_transitions() {
        init_logs();
        let registry = scripted(Default::default());
        let mut handle = Handle::init_with(&registry, "scripted", Some("localhost"), None).unwrap();
        assert_eq!(handle.state(), ConnectionState::Initialized);
        assert_eq!(handle.backend_name(), "scripted");
        silent_logs! {
            assert_eq!(handle.unbind().unwrap_err().kind(), ErrorKind::InvalidHandle);
            assert_eq!(handle.query("SELECT 1").unwrap_err().kind(), ErrorKind::InvalidHandle);
            assert_eq!(
                handle.result(None, 0).unwrap_err().kind(),
                ErrorKind::InvalidHandle
            );
        }

        handle.bind_simple("db", Some("user"), Some("secret")).unwrap();
        assert_eq!(handle.state(), ConnectionState::Bound);
        assert_eq!(
            handle.bind_simple("db", None, None).unwrap_err().kind(),
            ErrorKind::InvalidHandle,
            "Binding twice is refused"
        );

        handle.unbind().unwrap();
        assert_eq!(handle.state(), ConnectionState::Unbound);
        assert_eq!(handle.query("SELECT 1").unwrap_err().kind(), ErrorKind::InvalidHandle);

        handle.bind_simple("other", None, None).unwrap();
        assert_eq!(handle.state(), ConnectionState::Bound);
        handle.query("SELECT 1").unwrap();
        assert!(handle.finish().is_ok(), "Finishing a bound handle unbinds it first");
        assert_eq!(handle.state(), ConnectionState::Finished);
        assert!(handle.is_finished());
    }

    #[test]
    fn finished_handle() {
        init_logs();
        let registry = scripted(Default::default());
        let mut handle = Handle::init_with(&registry, "scripted", None, None).unwrap();
        handle.finish().unwrap();
        assert_eq!(handle.finish().unwrap_err().kind(), ErrorKind::InvalidHandle);
        assert_eq!(
            handle.bind_simple("db", None, None).unwrap_err().kind(),
            ErrorKind::InvalidHandle
        );
        assert_eq!(handle.escape(b"x").unwrap_err().kind(), ErrorKind::InvalidHandle);
        assert_eq!(
            handle.get_option(DbOption::ApiVersion).unwrap_err().kind(),
            ErrorKind::InvalidHandle
        );
        assert_eq!(
            handle
                .capabilities(dbx_core::Capability::Basic)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidHandle
        );
        // Answered without the backend
        assert!(handle.get_option(DbOption::LibVersion).is_ok());
        let backend = Error::new(ErrorKind::Backend);
        assert_eq!(handle.error_type(&backend), Severity::Fatal);
        assert_eq!(handle.error(&backend), "Invalid handle");
    }

    #[test]
    fn bind_failures() {
        init_logs();
        let registry = scripted(ScriptedConfig {
            password: Some("secret".into()),
            ..Default::default()
        });
        let mut handle = Handle::init_with(&registry, "scripted", None, None).unwrap();
        let error = silent_logs! {
            handle.bind_simple("db", Some("user"), Some("wrong")).unwrap_err()
        };
        assert_eq!(error.kind(), ErrorKind::Backend);
        assert_eq!(handle.error(&error), "Access denied");
        assert_eq!(handle.error_type(&error), Severity::Fatal);
        assert_eq!(handle.state(), ConnectionState::Initialized);

        let error = silent_logs! {
            handle
                .bind("db", None, None, BindMethod::Other(7))
                .unwrap_err()
        };
        assert_eq!(error.kind(), ErrorKind::NotSupported);
        assert_eq!(handle.error_type(&error), Severity::Recoverable);

        handle.bind_simple("db", Some("user"), Some("secret")).unwrap();
    }

    #[test]
    fn setup_and_teardown() {
        init_logs();
        let counters = Counters::default();
        let registry = scripted(ScriptedConfig {
            counters: counters.clone(),
            ..Default::default()
        });
        let mut first = Handle::init_with(&registry, "scripted", None, None).unwrap();
        let second = Handle::init_with(&registry, "scripted", None, None).unwrap();
        assert_eq!(Counters::get(&counters.setups), 1);
        assert_eq!(registry.active_handles("scripted"), 2);

        first.finish().unwrap();
        assert_eq!(Counters::get(&counters.teardowns), 0);
        assert_eq!(registry.active_handles("scripted"), 1);

        drop(second);
        assert_eq!(Counters::get(&counters.teardowns), 1);
        assert_eq!(registry.active_handles("scripted"), 0);

        let _third = Handle::init_with(&registry, "scripted", None, None).unwrap();
        assert_eq!(Counters::get(&counters.setups), 2);
    }

    #[test]
    fn setup_can_use_other_backends() {
        init_logs();
        let counters = Counters::default();
        let registry = scripted(ScriptedConfig {
            counters: counters.clone(),
            ..Default::default()
        });
        let observed = Arc::new(AtomicUsize::new(0));
        registry.register(
            "dependent",
            Arc::new(Dependent {
                registry: registry.clone(),
                inner: ScriptedDriver::new(Default::default()),
                observed: observed.clone(),
            }),
        );
        let mut handle = Handle::init_with(&registry, "dependent", None, None).unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), 1);
        assert_eq!(Counters::get(&counters.setups), 1);
        assert_eq!(Counters::get(&counters.teardowns), 1);
        assert_eq!(registry.active_handles("dependent"), 1);
        assert_eq!(registry.active_handles("scripted"), 0);
        handle.finish().unwrap();
        assert_eq!(registry.active_handles("dependent"), 0);
    }

    #[test]
    fn init_failures() {
        init_logs();
        let counters = Counters::default();
        let registry = scripted(ScriptedConfig {
            counters: counters.clone(),
            ..Default::default()
        });
        silent_logs! {
            let error = Handle::init_with(&registry, "scripted", Some("unreachable"), None)
                .unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Backend);
        }
        assert_eq!(registry.active_handles("scripted"), 0);
        assert_eq!(Counters::get(&counters.setups), 1);
        assert_eq!(Counters::get(&counters.teardowns), 1);

        let failing = Counters::default();
        register_scripted(
            &registry,
            "failing",
            ScriptedConfig {
                fail_setup: true,
                counters: failing.clone(),
                ..Default::default()
            },
        );
        silent_logs! {
            assert!(Handle::init_with(&registry, "failing", None, None).is_err());
        }
        assert_eq!(registry.active_handles("failing"), 0);
        assert_eq!(Counters::get(&failing.teardowns), 0);

        silent_logs! {
            assert_eq!(
                Handle::init_with(&registry, "", None, None).unwrap_err().kind(),
                ErrorKind::InvalidParam
            );
        }
    }

    #[test]
    fn options() {
        init_logs();
        let registry = scripted(Default::default());
        let mut handle = Handle::init_with(&registry, "scripted", None, None).unwrap();
        handle
            .set_option(DbOption::Tls, dbx_core::TlsMode::Try)
            .expect("Options can be set before binding");
        handle
            .set_option(DbOption::ConnectTimeout, 5i64)
            .unwrap();
        handle
            .set_option(DbOption::Mode, String::from("readonly"))
            .unwrap();
        assert_eq!(
            handle.get_option(DbOption::Tls).unwrap(),
            dbx_core::OptionValue::Tls(dbx_core::TlsMode::Try)
        );
        assert_eq!(
            handle.get_option(DbOption::ConnectTimeout).unwrap(),
            dbx_core::OptionValue::Int(5)
        );
        assert_eq!(
            handle
                .set_option(DbOption::Tls, dbx_core::TlsMode::Always)
                .unwrap_err()
                .kind(),
            ErrorKind::OptionWriteFailed
        );
        assert_eq!(
            handle.set_option(DbOption::Tls, true).unwrap_err().kind(),
            ErrorKind::InvalidParam
        );

        handle.bind_simple("db", None, None).unwrap();
        handle.set_option(DbOption::MultiStatements, false).unwrap();
        let error = silent_logs! {
            handle.query("SELECT 1; SELECT 2").unwrap_err()
        };
        assert_eq!(error.kind(), ErrorKind::Backend);
        assert_eq!(handle.error(&error), "Multiple statements are disabled");
    }
}
