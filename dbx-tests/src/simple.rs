use crate::{RESULT_TIMEOUT, collect_one};
use dbx_core::{ColumnType, ErrorKind, Handle, Outcome, RowStatus};

pub fn simple(handle: &mut Handle) {
    let result = collect_one(
        handle,
        "SELECT 1 AS one, 'two' AS two, NULL AS three, 2.5 AS four",
    )
    .expect("Failed to select literals");
    assert!(result.has_rows);
    assert_eq!(result.columns, ["one", "two", "three", "four"]);
    assert_eq!(
        result.types,
        [
            ColumnType::BigInt,
            ColumnType::Clob,
            ColumnType::Unknown,
            ColumnType::Double
        ]
    );
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.value(0, 0), Some(&b"1"[..]));
    assert_eq!(result.value(0, 1), Some(&b"two"[..]));
    assert_eq!(result.value(0, 2), None);
    assert_eq!(result.value(0, 3), Some(&b"2.5"[..]));
}

pub fn null_and_empty(handle: &mut Handle) {
    handle
        .query("SELECT '' AS empty, NULL AS missing")
        .expect("Failed to send the query");
    let Outcome::Rows(mut result) = handle
        .result(Some(RESULT_TIMEOUT), 0)
        .expect("Failed to get the result")
    else {
        panic!("Expected a result with rows");
    };
    assert_eq!(result.row_fetch().unwrap(), RowStatus::Next);
    assert_eq!(result.field_value(0), Some(&[][..]));
    assert_eq!(result.field_length(0), 0);
    assert_eq!(result.field_value(1), None);
    assert_eq!(result.field_length(1), 0);
    assert_eq!(result.field_str(0).unwrap(), Some(""));
    assert_eq!(result.field_str(1).unwrap(), None);
    result.finish().expect("Failed to finish the result");
    assert!(handle.result(Some(RESULT_TIMEOUT), 0).unwrap().is_done());
}

pub fn terminal_states(handle: &mut Handle) {
    handle.query("SELECT 7 AS n").expect("Failed to send the query");
    {
        let Outcome::Rows(mut result) = handle.result(Some(RESULT_TIMEOUT), 0).unwrap() else {
            panic!("Expected a result with rows");
        };
        assert_eq!(result.column_count(), 1);
        assert_eq!(result.column_name(0), Some("n"));
        assert_eq!(result.column_index("n"), Some(0));
        assert_eq!(result.column_name(1), None);
        assert_eq!(
            result.column_type(1).unwrap_err().kind(),
            ErrorKind::InvalidParam
        );
        assert_eq!(result.field_value(0), None, "No row before the first fetch");
        assert_eq!(result.row_fetch().unwrap(), RowStatus::Next);
        assert_eq!(result.field_value(0), Some(&b"7"[..]));
        assert_eq!(result.field_value(1), None);
        assert_eq!(result.field_length(1), 0);
        assert_eq!(result.row_fetch().unwrap(), RowStatus::Done);
        assert_eq!(result.row_fetch().unwrap(), RowStatus::Done);
        assert_eq!(result.field_value(0), None, "No row after the last fetch");
        result.finish().expect("Failed to finish the result");
    }
    for _ in 0..3 {
        assert!(
            handle.result(Some(RESULT_TIMEOUT), 0).unwrap().is_done(),
            "The statement is done and stays done"
        );
    }
}
