use crate::{RESULT_TIMEOUT, collect, collect_one};
use dbx_core::{Handle, Outcome, RowStatus};

pub fn union_all(handle: &mut Handle) {
    let result = collect_one(
        handle,
        "SELECT 1 AS n UNION ALL SELECT 2 UNION ALL SELECT 3",
    )
    .expect("Failed to select the union");
    assert_eq!(result.columns, ["n"]);
    assert_eq!(
        result.rows,
        [
            [Some(b"1".to_vec())],
            [Some(b"2".to_vec())],
            [Some(b"3".to_vec())]
        ]
    );
}

#[cfg(not(feature = "disable-multiple-statements"))]
pub fn multiple(handle: &mut Handle) {
    let results = collect(handle, "SELECT 1 AS a; SELECT 'b' AS b").expect("Failed to run both statements");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].columns, ["a"]);
    assert_eq!(results[0].value(0, 0), Some(&b"1"[..]));
    assert_eq!(results[1].columns, ["b"]);
    assert_eq!(results[1].value(0, 0), Some(&b"b"[..]));
}

/// Finishing a result with rows left must not leak them into the next one.
pub fn drain(handle: &mut Handle) {
    #[cfg(not(feature = "disable-multiple-statements"))]
    let sql = "SELECT 1 AS n UNION ALL SELECT 2 UNION ALL SELECT 3; SELECT 4 AS m";
    #[cfg(feature = "disable-multiple-statements")]
    let sql = "SELECT 1 AS n UNION ALL SELECT 2 UNION ALL SELECT 3";
    handle.query(sql).expect("Failed to send the query");
    {
        let Outcome::Rows(mut result) = handle.result(Some(RESULT_TIMEOUT), 0).unwrap() else {
            panic!("Expected a result with rows");
        };
        assert_eq!(result.row_fetch().unwrap(), RowStatus::Next);
        assert_eq!(result.field_value(0), Some(&b"1"[..]));
        result.finish().expect("Failed to finish the partially read result");
    }
    #[cfg(not(feature = "disable-multiple-statements"))]
    {
        let Outcome::Rows(mut result) = handle.result(Some(RESULT_TIMEOUT), 0).unwrap() else {
            panic!("Expected the second result");
        };
        assert_eq!(result.column_name(0), Some("m"));
        assert_eq!(result.row_fetch().unwrap(), RowStatus::Next);
        assert_eq!(result.field_value(0), Some(&b"4"[..]));
        // Dropped without finishing
    }
    assert!(handle.result(Some(RESULT_TIMEOUT), 0).unwrap().is_done());
    let _ = collect(handle, "SELECT 1 AS n").expect("The handle must be usable after draining");
}
