use dbx_core::{ColumnType, Handle, Outcome, Result, RowStatus};
use std::time::Duration;

/// Wait used by the test helpers for every result.
pub const RESULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a result carried, copied out of the handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    pub has_rows: bool,
    pub columns: Vec<String>,
    pub types: Vec<ColumnType>,
    pub rows: Vec<Vec<Option<Vec<u8>>>>,
    pub affected: u64,
}

impl Collected {
    pub fn value(&self, row: usize, column: usize) -> Option<&[u8]> {
        self.rows.get(row)?.get(column)?.as_deref()
    }
}

/// Run `sql` and collect every result until the statement is done.
pub fn collect(handle: &mut Handle, sql: &str) -> Result<Vec<Collected>> {
    handle.query(sql)?;
    let mut results = Vec::new();
    loop {
        match handle.result(Some(RESULT_TIMEOUT), 0)? {
            Outcome::Done => return Ok(results),
            Outcome::Timeout => continue,
            Outcome::NoRows(mut result) | Outcome::Rows(mut result) => {
                let count = result.column_count();
                let mut collected = Collected {
                    has_rows: result.has_rows(),
                    columns: (0..count)
                        .map(|i| result.column_name(i).unwrap_or_default().to_string())
                        .collect(),
                    types: (0..count)
                        .map(|i| result.column_type(i))
                        .collect::<Result<_>>()?,
                    ..Default::default()
                };
                while result.row_fetch()? == RowStatus::Next {
                    collected.rows.push(
                        (0..count)
                            .map(|i| result.field_value(i).map(<[u8]>::to_vec))
                            .collect(),
                    );
                }
                collected.affected = result.rows_affected();
                result.finish()?;
                results.push(collected);
            }
        }
    }
}

/// Run a statement returning a single result.
pub fn collect_one(handle: &mut Handle, sql: &str) -> Result<Collected> {
    let mut results = collect(handle, sql)?;
    assert_eq!(
        results.len(),
        1,
        "Expected exactly one result from `{}`",
        sql
    );
    Ok(results.remove(0))
}
