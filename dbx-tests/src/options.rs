use crate::{RESULT_TIMEOUT, collect};
use dbx_core::{
    Capability, DbOption, ErrorKind, Handle, OptionValue, Outcome, RowStatus, lib_version,
};

pub fn options(handle: &mut Handle) {
    assert!(matches!(
        handle.get_option(DbOption::ApiVersion).unwrap(),
        OptionValue::Int(..)
    ));
    assert!(matches!(
        handle.get_option(DbOption::ThreadSafe).unwrap(),
        OptionValue::Flag(..)
    ));
    assert_eq!(
        handle.get_option(DbOption::LibVersion).unwrap(),
        OptionValue::Int(lib_version())
    );
    assert_eq!(
        handle.get_option(DbOption::PagedResults).unwrap(),
        OptionValue::Flag(false)
    );

    for option in [DbOption::ApiVersion, DbOption::ThreadSafe, DbOption::LibVersion] {
        assert_eq!(
            handle.set_option(option, 1i64).unwrap_err().kind(),
            ErrorKind::OptionReadOnly,
            "Option `{}` must be read only",
            option
        );
    }
    assert_eq!(
        handle
            .set_option(DbOption::MultiStatements, 1i64)
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidParam
    );
    assert_eq!(
        handle
            .set_option(DbOption::PagedResults, true)
            .unwrap_err()
            .kind(),
        ErrorKind::OptionWriteFailed
    );

    #[cfg(not(feature = "disable-multiple-statements"))]
    {
        assert_eq!(
            handle.get_option(DbOption::MultiStatements).unwrap(),
            OptionValue::Flag(true)
        );
        handle
            .set_option(DbOption::MultiStatements, true)
            .expect("Enabling multiple statements must succeed");
    }
}

pub fn capabilities(handle: &mut Handle) {
    assert!(handle.capabilities(Capability::Basic).unwrap());
    if handle.capabilities(Capability::LargeObject).unwrap() {
        return;
    }
    handle
        .query("SELECT 'locator' AS l")
        .expect("Failed to send the query");
    {
        let Outcome::Rows(mut result) = handle.result(Some(RESULT_TIMEOUT), 0).unwrap() else {
            panic!("Expected a result with rows");
        };
        assert_eq!(result.row_fetch().unwrap(), RowStatus::Next);
        assert_eq!(
            result.lo_open(b"locator").unwrap_err().kind(),
            ErrorKind::NoCapability
        );
    }
    assert!(collect(handle, "SELECT 1 AS n").is_ok());
}
