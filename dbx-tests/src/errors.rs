use crate::{RESULT_TIMEOUT, collect_one};
use dbx_core::{Error, ErrorKind, Handle, Severity};

fn failing(handle: &mut Handle, sql: &str) -> Error {
    if let Err(e) = handle.query(sql) {
        return e;
    }
    match handle.result(Some(RESULT_TIMEOUT), 0) {
        Err(e) => e,
        Ok(outcome) => panic!("Expected `{}` to fail, got {:?}", sql, outcome),
    }
}

pub fn errors(handle: &mut Handle) {
    let error = crate::silent_logs! { failing(handle, "SELEC 1") };
    assert_eq!(error.kind(), ErrorKind::Backend);
    assert_eq!(error.code(), -1);
    assert!(!handle.error(&error).is_empty());
    assert_eq!(handle.error_type(&error), Severity::Recoverable);
    assert!(!handle.error_type(&error).is_fatal());

    let param = Error::new(ErrorKind::InvalidParam);
    assert_eq!(handle.error(&param), "Invalid parameter");
    assert_eq!(handle.error_type(&param), Severity::Recoverable);
    assert_eq!(handle.error_type_code(0), Severity::None);
    assert_eq!(handle.error_code(-13), "Invalid handle");

    let result = collect_one(handle, "SELECT 'alive' AS state")
        .expect("The handle must be usable after a recoverable error");
    assert_eq!(result.value(0, 0), Some(&b"alive"[..]));
}
