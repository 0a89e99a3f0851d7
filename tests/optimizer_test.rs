use std::sync::Arc;

use brambledb::buffer::BufferPoolManager;
use brambledb::catalog::{Catalog, Column, DataType, Schema};
use brambledb::execution::physical_plan::{
    IndexScanMode, JoinType, PhysicalInsert, PhysicalNestedLoopJoin, PhysicalPlan, PhysicalSeqScan,
    PhysicalValues,
};
use brambledb::execution::ExecutionEngine;
use brambledb::expression::{BinaryOp, Expr};
use brambledb::optimizer::PhysicalOptimizer;
use brambledb::storage::disk_manager::DiskManager;
use brambledb::storage::disk_scheduler::DiskScheduler;
use brambledb::storage::tuple::Tuple;
use brambledb::utils::scalar::ScalarValue;
use brambledb::utils::table_ref::TableReference;
use tempfile::TempDir;

fn setup_catalog() -> (TempDir, Catalog) {
    let temp_dir = TempDir::new().unwrap();
    let disk_manager = Arc::new(DiskManager::try_new(temp_dir.path().join("test.db")).unwrap());
    let disk_scheduler = Arc::new(DiskScheduler::new(disk_manager));
    let buffer_pool = Arc::new(BufferPoolManager::new(512, disk_scheduler));
    (temp_dir, Catalog::new(buffer_pool))
}

fn col(table: &str, name: &str) -> Expr {
    Expr::column(Some(TableReference::bare(table)), name)
}

fn run(catalog: &Catalog, plan: Arc<PhysicalPlan>) -> Vec<Tuple> {
    let mut engine = ExecutionEngine::new(catalog);
    engine.execute(plan).unwrap()
}

fn insert_rows(catalog: &Catalog, table: &str, rows: Vec<Vec<Expr>>) {
    let table_info = catalog.table_by_name(table).unwrap();
    let values = PhysicalPlan::Values(PhysicalValues::new(table_info.schema.clone(), rows));
    let insert = PhysicalPlan::Insert(PhysicalInsert::new(
        table_info.oid,
        table_info.schema.clone(),
        Arc::new(values),
    ));
    run(catalog, Arc::new(insert));
}

fn seq_scan(catalog: &Catalog, table: &str, predicate: Option<Expr>) -> PhysicalPlan {
    let table_info = catalog.table_by_name(table).unwrap();
    PhysicalPlan::SeqScan(PhysicalSeqScan::new(
        table_info.oid,
        table_info.schema.clone(),
        predicate,
    ))
}

fn sorted_rows(tuples: Vec<Tuple>) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = tuples
        .iter()
        .map(|t| t.data.iter().map(|v| v.to_string()).collect())
        .collect();
    rows.sort();
    rows
}

#[test]
fn seq_scan_with_or_equalities_becomes_index_scan() {
    let (_tmp, mut catalog) = setup_catalog();
    catalog
        .create_table(
            "t",
            Schema::new(vec![
                Column::new("col0", DataType::Int32, false),
                Column::new("col1", DataType::Varchar(None), true),
            ]),
        )
        .unwrap();
    let rows = (0..20i32)
        .map(|i| vec![Expr::literal(i), Expr::literal(format!("row-{i}"))])
        .collect();
    insert_rows(&catalog, "t", rows);
    catalog.create_index("t_col0_idx", "t", &["col0"]).unwrap();

    let predicate = Expr::binary(
        Expr::binary(col("t", "col0"), BinaryOp::Eq, Expr::literal(7i32)),
        BinaryOp::Or,
        Expr::binary(col("t", "col0"), BinaryOp::Eq, Expr::literal(11i32)),
    );
    let plan = seq_scan(&catalog, "t", Some(predicate));

    let optimizer = PhysicalOptimizer::new();
    let optimized = optimizer.optimize(&plan, &catalog).unwrap();

    let PhysicalPlan::IndexScan(index_scan) = &optimized else {
        panic!("expected IndexScan after rewrite, got {optimized}");
    };
    let IndexScanMode::PointLookup { pred_keys } = &index_scan.mode else {
        panic!("expected point-lookup index scan");
    };
    assert_eq!(
        pred_keys,
        &vec![ScalarValue::Int32(Some(7)), ScalarValue::Int32(Some(11))]
    );

    // Both plans return the same multiset of tuples.
    let scan_rows = run(&catalog, Arc::new(plan));
    let index_rows = run(&catalog, Arc::new(optimized));
    assert_eq!(sorted_rows(scan_rows.clone()), sorted_rows(index_rows));
    assert_eq!(scan_rows.len(), 2);
}

#[test]
fn seq_scan_with_range_predicate_is_left_alone() {
    let (_tmp, mut catalog) = setup_catalog();
    catalog
        .create_table(
            "t",
            Schema::new(vec![Column::new("col0", DataType::Int32, false)]),
        )
        .unwrap();
    insert_rows(
        &catalog,
        "t",
        (0..5i32).map(|i| vec![Expr::literal(i)]).collect(),
    );
    catalog.create_index("t_col0_idx", "t", &["col0"]).unwrap();

    // A range comparison cannot become a point lookup.
    let predicate = Expr::binary(col("t", "col0"), BinaryOp::Gt, Expr::literal(2i32));
    let plan = seq_scan(&catalog, "t", Some(predicate));
    let optimized = PhysicalOptimizer::new().optimize(&plan, &catalog).unwrap();
    assert!(matches!(optimized, PhysicalPlan::SeqScan(_)));

    // Same for an OR that mixes in a non-equality arm.
    let predicate = Expr::binary(
        Expr::binary(col("t", "col0"), BinaryOp::Eq, Expr::literal(1i32)),
        BinaryOp::Or,
        Expr::binary(col("t", "col0"), BinaryOp::Lt, Expr::literal(0i32)),
    );
    let plan = seq_scan(&catalog, "t", Some(predicate));
    let optimized = PhysicalOptimizer::new().optimize(&plan, &catalog).unwrap();
    assert!(matches!(optimized, PhysicalPlan::SeqScan(_)));
}

#[test]
fn seq_scan_without_matching_index_is_left_alone() {
    let (_tmp, mut catalog) = setup_catalog();
    catalog
        .create_table(
            "t",
            Schema::new(vec![
                Column::new("col0", DataType::Int32, false),
                Column::new("col1", DataType::Int32, false),
            ]),
        )
        .unwrap();
    insert_rows(
        &catalog,
        "t",
        (0..5i32)
            .map(|i| vec![Expr::literal(i), Expr::literal(i)])
            .collect(),
    );
    catalog.create_index("t_col1_idx", "t", &["col1"]).unwrap();

    // Predicate targets col0 but only col1 is indexed.
    let predicate = Expr::binary(col("t", "col0"), BinaryOp::Eq, Expr::literal(3i32));
    let plan = seq_scan(&catalog, "t", Some(predicate));
    let optimized = PhysicalOptimizer::new().optimize(&plan, &catalog).unwrap();
    assert!(matches!(optimized, PhysicalPlan::SeqScan(_)));
}

fn create_join_fixture(catalog: &mut Catalog) {
    catalog
        .create_table(
            "t1",
            Schema::new(vec![
                Column::new("a", DataType::Int32, false),
                Column::new("b", DataType::Varchar(None), true),
            ]),
        )
        .unwrap();
    catalog
        .create_table(
            "t2",
            Schema::new(vec![
                Column::new("a", DataType::Int32, false),
                Column::new("c", DataType::Varchar(None), true),
            ]),
        )
        .unwrap();
    insert_rows(
        catalog,
        "t1",
        vec![
            vec![Expr::literal(1i32), Expr::literal("a")],
            vec![Expr::literal(2i32), Expr::literal("b")],
            vec![Expr::literal(3i32), Expr::literal("c")],
        ],
    );
    insert_rows(
        catalog,
        "t2",
        vec![
            vec![Expr::literal(2i32), Expr::literal("x")],
            vec![Expr::literal(2i32), Expr::literal("y")],
            vec![Expr::literal(4i32), Expr::literal("z")],
        ],
    );
}

fn nlj_plan(catalog: &Catalog, join_type: JoinType, condition: Expr) -> PhysicalPlan {
    let t1 = catalog.table_by_name("t1").unwrap();
    let t2 = catalog.table_by_name("t2").unwrap();
    let schema = Arc::new(
        Schema::try_merge(vec![
            t1.schema.as_ref().clone(),
            t2.schema.as_ref().clone(),
        ])
        .unwrap(),
    );
    PhysicalPlan::NestedLoopJoin(PhysicalNestedLoopJoin::new(
        join_type,
        Some(condition),
        Arc::new(seq_scan(catalog, "t1", None)),
        Arc::new(seq_scan(catalog, "t2", None)),
        schema,
    ))
}

#[test]
fn equi_nested_loop_join_becomes_hash_join() {
    let (_tmp, mut catalog) = setup_catalog();
    create_join_fixture(&mut catalog);

    for join_type in [JoinType::Inner, JoinType::LeftOuter] {
        let condition = Expr::binary(col("t1", "a"), BinaryOp::Eq, col("t2", "a"));
        let plan = nlj_plan(&catalog, join_type, condition);
        let optimized = PhysicalOptimizer::new().optimize(&plan, &catalog).unwrap();
        assert!(
            matches!(optimized, PhysicalPlan::HashJoin(_)),
            "expected HashJoin for {join_type}"
        );

        let nlj_rows = run(&catalog, Arc::new(plan));
        let hj_rows = run(&catalog, Arc::new(optimized));
        assert_eq!(sorted_rows(nlj_rows), sorted_rows(hj_rows));
    }
}

#[test]
fn non_equi_join_predicate_is_left_alone() {
    let (_tmp, mut catalog) = setup_catalog();
    create_join_fixture(&mut catalog);

    let condition = Expr::binary(col("t1", "a"), BinaryOp::Lt, col("t2", "a"));
    let plan = nlj_plan(&catalog, JoinType::Inner, condition);
    let optimized = PhysicalOptimizer::new().optimize(&plan, &catalog).unwrap();
    assert!(matches!(optimized, PhysicalPlan::NestedLoopJoin(_)));

    // A conjunction with a non-equi arm disqualifies the rewrite too.
    let condition = Expr::binary(
        Expr::binary(col("t1", "a"), BinaryOp::Eq, col("t2", "a")),
        BinaryOp::And,
        Expr::binary(col("t1", "a"), BinaryOp::Gt, Expr::literal(0i32)),
    );
    let plan = nlj_plan(&catalog, JoinType::Inner, condition);
    let optimized = PhysicalOptimizer::new().optimize(&plan, &catalog).unwrap();
    assert!(matches!(optimized, PhysicalPlan::NestedLoopJoin(_)));
}
