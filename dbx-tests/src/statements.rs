use crate::collect_one;
use dbx_core::Handle;

pub fn statements(handle: &mut Handle) {
    collect_one(handle, "DROP TABLE IF EXISTS dbx_conformance").expect("Failed to drop the table");
    let created = collect_one(
        handle,
        "CREATE TABLE dbx_conformance (id INTEGER, name TEXT)",
    )
    .expect("Failed to create the table");
    assert!(!created.has_rows);
    assert_eq!(created.columns.len(), 0);
    assert!(created.rows.is_empty());
    let inserted = collect_one(
        handle,
        "INSERT INTO dbx_conformance (id, name) VALUES (1, 'one')",
    )
    .expect("Failed to insert");
    assert!(!inserted.has_rows);
    assert_eq!(inserted.affected, 1);
    collect_one(handle, "DROP TABLE dbx_conformance").expect("Failed to drop the table");
}
