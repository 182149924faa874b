//! End-to-end scenarios against the database facade.

use opal_engine::{
    Column, Constraint, Database, DataType, EngineError, JoinType, SortKey,
};

fn row(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn single_column_table(db: &Database, name: &str, column: &str, values: &[&str]) {
    db.create_table(name, vec![Column::new(column, DataType::Varchar)], vec![])
        .unwrap();
    db.insert(name, values.iter().map(|v| row(&[v])).collect())
        .unwrap();
}

#[test]
fn numeric_comparison_with_leading_zeros() {
    let db = Database::new();
    single_column_table(&db, "t", "x", &["01", "2"]);

    // Leading zeros compare numerically: "01" equals 1, not less than "1"
    // as a lexicographic reading would have it.
    let result = db.select("t", &strings(&["*"]), "x >= 1", &[], &[], "").unwrap();
    assert_eq!(result.rows.len(), 2);

    let result = db.select("t", &strings(&["*"]), "x > 1", &[], &[], "").unwrap();
    assert_eq!(result.rows, vec![row(&["2"])]);

    let result = db.select("t", &strings(&["*"]), "x = 1", &[], &[], "").unwrap();
    assert_eq!(result.rows, vec![row(&["01"])]);
}

#[test]
fn like_wildcards() {
    let db = Database::new();
    single_column_table(&db, "u", "name", &["alpha", "alphabet", "beta"]);

    let result = db
        .select("u", &strings(&["*"]), "name LIKE 'alph%'", &[], &[], "")
        .unwrap();
    assert_eq!(result.rows, vec![row(&["alpha"]), row(&["alphabet"])]);

    let result = db
        .select("u", &strings(&["*"]), "name LIKE '_eta'", &[], &[], "")
        .unwrap();
    assert_eq!(result.rows, vec![row(&["beta"])]);
}

#[test]
fn foreign_key_cascade_delete() {
    let db = Database::new();
    db.create_table("p", vec![Column::new("id", DataType::Integer)], vec![])
        .unwrap();
    db.insert("p", vec![row(&["1"]), row(&["2"])]).unwrap();

    db.create_table(
        "c",
        vec![Column::new("pid", DataType::Integer)],
        vec![
            Constraint::foreign_key("fk_c_p", strings(&["pid"]), "p", strings(&["id"]))
                .with_cascade_delete(),
        ],
    )
    .unwrap();
    db.insert("c", vec![row(&["1"]), row(&["1"]), row(&["2"])])
        .unwrap();

    let deleted = db.delete("p", "id = 1").unwrap();
    assert_eq!(deleted, 1);

    let remaining = db.select("c", &strings(&["*"]), "", &[], &[], "").unwrap();
    assert_eq!(remaining.rows, vec![row(&["2"])]);
}

#[test]
fn foreign_key_without_cascade_blocks_delete() {
    let db = Database::new();
    db.create_table("p", vec![Column::new("id", DataType::Integer)], vec![])
        .unwrap();
    db.insert("p", vec![row(&["1"])]).unwrap();
    db.create_table(
        "c",
        vec![Column::new("pid", DataType::Integer)],
        vec![Constraint::foreign_key(
            "fk_c_p",
            strings(&["pid"]),
            "p",
            strings(&["id"]),
        )],
    )
    .unwrap();
    db.insert("c", vec![row(&["1"])]).unwrap();

    let err = db.delete("p", "id = 1").unwrap_err();
    assert!(matches!(err, EngineError::Constraint { .. }));
    assert_eq!(db.select("p", &strings(&["*"]), "", &[], &[], "").unwrap().rows.len(), 1);
}

#[test]
fn foreign_key_rejects_dangling_insert_but_accepts_null() {
    let db = Database::new();
    db.create_table("p", vec![Column::new("id", DataType::Integer)], vec![])
        .unwrap();
    db.insert("p", vec![row(&["1"])]).unwrap();
    db.create_table(
        "c",
        vec![Column::new("pid", DataType::Integer)],
        vec![Constraint::foreign_key(
            "fk_c_p",
            strings(&["pid"]),
            "p",
            strings(&["id"]),
        )],
    )
    .unwrap();

    assert!(db.insert("c", vec![row(&["1"])]).is_ok());
    assert!(db.insert("c", vec![row(&["7"])]).is_err());
    // NULL satisfies any FK constraint.
    assert!(db.insert("c", vec![row(&[""])]).is_ok());
}

#[test]
fn transaction_rollback_restores_rows() {
    let db = Database::new();
    single_column_table(&db, "t", "x", &["keep"]);

    let mut txn = db.transaction();
    txn.begin().unwrap();
    txn.insert("t", vec![row(&["a"]), row(&["b"]), row(&["c"])])
        .unwrap();
    assert_eq!(
        txn.select("t", &strings(&["*"]), "", &[], &[], "").unwrap().rows.len(),
        4
    );
    txn.rollback().unwrap();

    let result = db
        .select("t", &strings(&["COUNT(*)"]), "", &[], &[], "")
        .unwrap();
    assert_eq!(result.rows, vec![row(&["1"])]);
}

#[test]
fn transaction_commit_keeps_rows_and_clears_snapshots() {
    let db = Database::new();
    single_column_table(&db, "t", "x", &[]);

    let mut txn = db.transaction();
    txn.begin().unwrap();
    txn.insert("t", vec![row(&["a"])]).unwrap();
    assert!(!txn.snapshot_names().is_empty());
    txn.commit().unwrap();
    assert!(txn.snapshot_names().is_empty());

    assert_eq!(db.select("t", &strings(&["*"]), "", &[], &[], "").unwrap().rows.len(), 1);
}

#[test]
fn transaction_rollback_drops_created_table() {
    let db = Database::new();

    let mut txn = db.transaction();
    txn.begin().unwrap();
    txn.create_table("fresh", vec![Column::new("x", DataType::Integer)], vec![])
        .unwrap();
    txn.insert("fresh", vec![row(&["1"])]).unwrap();
    txn.rollback().unwrap();

    assert!(!db.table_exists("fresh"));
}

#[test]
fn transaction_rollback_recreates_dropped_table() {
    let db = Database::new();
    single_column_table(&db, "t", "x", &["1", "2"]);

    let mut txn = db.transaction();
    txn.begin().unwrap();
    txn.drop_table("t").unwrap();
    assert!(!db.table_exists("t"));
    txn.rollback().unwrap();

    assert!(db.table_exists("t"));
    let result = db.select("t", &strings(&["*"]), "", &[], &[], "").unwrap();
    assert_eq!(result.rows.len(), 2);
}

#[test]
fn dropped_active_transaction_rolls_back() {
    let db = Database::new();
    single_column_table(&db, "t", "x", &[]);

    {
        let mut txn = db.transaction();
        txn.begin().unwrap();
        txn.insert("t", vec![row(&["a"])]).unwrap();
        // Dropped without commit.
    }

    assert_eq!(db.select("t", &strings(&["*"]), "", &[], &[], "").unwrap().rows.len(), 0);
}

#[test]
fn double_begin_and_stray_commit_are_errors() {
    let db = Database::new();
    let mut txn = db.transaction();
    assert!(matches!(txn.commit(), Err(EngineError::Transaction(_))));
    txn.begin().unwrap();
    assert!(matches!(txn.begin(), Err(EngineError::Transaction(_))));
    txn.commit().unwrap();
    assert!(matches!(txn.rollback(), Err(EngineError::Transaction(_))));
}

#[test]
fn deadlock_between_two_transactions_is_detected() {
    let db = Database::new();
    single_column_table(&db, "x", "v", &[]);
    single_column_table(&db, "y", "v", &[]);

    let mut txn_a = db.transaction();
    let mut txn_b = db.transaction();
    txn_a.begin().unwrap();
    txn_b.begin().unwrap();

    txn_a.lock_table_exclusive("x").unwrap();
    txn_b.lock_table_exclusive("y").unwrap();

    // Both now queue on the other's table.
    assert!(matches!(
        txn_b.lock_table_exclusive("x"),
        Err(EngineError::LockNotAcquired { .. })
    ));
    assert!(matches!(
        txn_a.lock_table_exclusive("y"),
        Err(EngineError::LockNotAcquired { .. })
    ));

    assert!(db.lock_manager().detect_deadlock());

    // Aborting the chosen victim clears the cycle and unblocks the other.
    txn_b.rollback().unwrap();
    assert!(!db.lock_manager().detect_deadlock());
    txn_a.lock_table_exclusive("y").unwrap();
    txn_a.commit().unwrap();
}

#[test]
fn shared_lock_upgrade_requires_sole_holder() {
    let db = Database::new();
    single_column_table(&db, "t", "x", &[]);

    let mut txn_a = db.transaction();
    let mut txn_b = db.transaction();
    txn_a.begin().unwrap();
    txn_b.begin().unwrap();

    txn_a.lock_table_shared("t").unwrap();
    txn_b.lock_table_shared("t").unwrap();

    assert!(matches!(
        txn_a.lock_table_exclusive("t"),
        Err(EngineError::UpgradeRejected(_))
    ));

    txn_b.commit().unwrap();
    txn_a.lock_table_exclusive("t").unwrap();
    txn_a.commit().unwrap();
}

#[test]
fn aggregation_median_end_to_end() {
    let db = Database::new();
    single_column_table(&db, "t", "x", &["1", "3", "5", "7"]);
    let result = db
        .select("t", &strings(&["MEDIAN(x)"]), "", &[], &[], "")
        .unwrap();
    assert_eq!(result.rows, vec![row(&["4"])]);

    let db = Database::new();
    single_column_table(&db, "t", "x", &["1", "3", "5"]);
    let result = db
        .select("t", &strings(&["MEDIAN(x)"]), "", &[], &[], "")
        .unwrap();
    assert_eq!(result.rows, vec![row(&["3"])]);
}

#[test]
fn aggregation_percentile_end_to_end() {
    let db = Database::new();
    single_column_table(&db, "t", "x", &["10", "20", "30", "40"]);

    // The call form takes only a column; the fold is the 90th percentile,
    // linear-interpolated: rank 2.7 between 30 and 40.
    let result = db
        .select("t", &strings(&["PERCENTILE(x)"]), "", &[], &[], "")
        .unwrap();
    assert_eq!(result.rows, vec![row(&["37"])]);

    // Reachable from HAVING as well.
    let result = db
        .select(
            "t",
            &strings(&["COUNT(*)"]),
            "",
            &[],
            &[],
            "PERCENTILE(x) > 30",
        )
        .unwrap();
    assert_eq!(result.rows, vec![row(&["4"])]);
}

#[test]
fn join_through_facade() {
    let db = Database::new();
    db.create_table(
        "users",
        vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::Varchar),
        ],
        vec![],
    )
    .unwrap();
    db.insert("users", vec![row(&["1", "ann"]), row(&["2", "bob"])])
        .unwrap();
    db.create_table(
        "orders",
        vec![
            Column::new("uid", DataType::Integer),
            Column::new("item", DataType::Varchar),
        ],
        vec![],
    )
    .unwrap();
    db.insert("orders", vec![row(&["1", "pen"]), row(&["3", "gum"])])
        .unwrap();

    let result = db
        .join_tables(
            "users",
            "orders",
            JoinType::Inner,
            "users.id = orders.uid",
            &strings(&["name", "item"]),
        )
        .unwrap();
    assert_eq!(result.rows, vec![row(&["ann", "pen"])]);

    let result = db
        .join_tables(
            "users",
            "orders",
            JoinType::LeftOuter,
            "users.id = orders.uid",
            &strings(&["name", "item"]),
        )
        .unwrap();
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[1], row(&["bob", ""]));
}

#[test]
fn upsert_matches_on_primary_key() {
    let db = Database::new();
    db.create_table(
        "t",
        vec![
            Column::new("id", DataType::Integer),
            Column::new("v", DataType::Varchar),
        ],
        vec![Constraint::primary_key("pk_t", strings(&["id"]))],
    )
    .unwrap();
    db.insert("t", vec![row(&["1", "old"])]).unwrap();

    let (inserted, updated) = db
        .upsert("t", vec![row(&["1", "new"]), row(&["2", "fresh"])])
        .unwrap();
    assert_eq!((inserted, updated), (1, 1));

    let result = db
        .select("t", &strings(&["*"]), "", &[SortKey::asc("id")], &[], "")
        .unwrap();
    assert_eq!(result.rows, vec![row(&["1", "new"]), row(&["2", "fresh"])]);
}

#[test]
fn group_by_having_order_by() {
    let db = Database::new();
    db.create_table(
        "sales",
        vec![
            Column::new("region", DataType::Varchar),
            Column::new("amount", DataType::Integer),
        ],
        vec![],
    )
    .unwrap();
    db.insert(
        "sales",
        vec![
            row(&["east", "10"]),
            row(&["west", "5"]),
            row(&["east", "20"]),
            row(&["west", "1"]),
            row(&["north", "100"]),
        ],
    )
    .unwrap();

    let result = db
        .select(
            "sales",
            &strings(&["region", "SUM(amount)"]),
            "",
            &[SortKey::desc("SUM(amount)")],
            &strings(&["region"]),
            "COUNT(*) > 1",
        )
        .unwrap();
    assert_eq!(result.rows, vec![row(&["east", "30"]), row(&["west", "6"])]);
}

#[test]
fn set_operations_through_facade() {
    let db = Database::new();
    single_column_table(&db, "a", "x", &["1", "2"]);
    single_column_table(&db, "b", "x", &["2", "3"]);

    let left = db.select("a", &strings(&["*"]), "", &[], &[], "").unwrap();
    let right = db.select("b", &strings(&["*"]), "", &[], &[], "").unwrap();

    let union = db.set_operation("UNION", &left, &right).unwrap();
    assert_eq!(union.rows.len(), 3);
    let union_all = db.set_operation("UNION ALL", &left, &right).unwrap();
    assert_eq!(union_all.rows.len(), 4);
    let intersect = db.set_operation("INTERSECT", &left, &right).unwrap();
    assert_eq!(intersect.rows, vec![row(&["2"])]);
    let except = db.set_operation("EXCEPT", &left, &right).unwrap();
    assert_eq!(except.rows, vec![row(&["1"])]);
}

#[test]
fn rename_and_describe() {
    let db = Database::new();
    single_column_table(&db, "Old", "x", &["1"]);
    db.create_index("idx_x", "Old", "x").unwrap();

    db.rename_table("old", "New").unwrap();
    assert!(!db.table_exists("old"));
    let info = db.describe_table("new").unwrap();
    assert_eq!(info.name, "New");
    assert_eq!(info.columns[0].name, "x");

    assert_eq!(db.index_lookup("idx_x", "1").unwrap(), vec![0]);
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    db.create_table(
        "t",
        vec![
            Column::new("id", DataType::Integer).not_null(),
            Column::new("v", DataType::Varchar),
        ],
        vec![],
    )
    .unwrap();
    db.insert("t", vec![row(&["1", "a"]), row(&["2", ""])]).unwrap();
    db.save_to(dir.path()).unwrap();

    let restored = Database::new();
    restored.load_from(dir.path()).unwrap();
    let result = restored.select("t", &strings(&["*"]), "", &[], &[], "").unwrap();
    assert_eq!(result.rows, vec![row(&["1", "a"]), row(&["2", ""])]);
    let info = restored.describe_table("t").unwrap();
    assert!(info.columns[0].not_null);
}

#[test]
fn users_and_privileges() {
    let db = Database::new();
    single_column_table(&db, "t", "x", &[]);
    db.create_user("ann", "s3cret-pass").unwrap();
    assert!(db.authenticate("ann", "s3cret-pass"));
    assert!(!db.authenticate("ann", "wrong"));
    assert!(!db.authenticate("ghost", "s3cret-pass"));

    db.grant_privilege("ann", "t", opal_engine::Privilege::All, false)
        .unwrap();
    assert!(db.check_privilege("ann", "t", opal_engine::Privilege::Select));
    db.revoke_privilege("ann", "t", opal_engine::Privilege::All);
    assert!(!db.check_privilege("ann", "t", opal_engine::Privilege::Select));
}

#[test]
fn truncate_and_row_alignment_invariant() {
    let db = Database::new();
    single_column_table(&db, "t", "x", &["1", "2", "3"]);
    db.alter_table_add_column("t", Column::new("y", DataType::Varchar))
        .unwrap();

    let info = db.describe_table("t").unwrap();
    let result = db.select("t", &strings(&["*"]), "", &[], &[], "").unwrap();
    assert!(result.rows.iter().all(|r| r.len() == info.columns.len()));

    db.truncate_table("t").unwrap();
    assert_eq!(db.select("t", &strings(&["*"]), "", &[], &[], "").unwrap().rows.len(), 0);
}
