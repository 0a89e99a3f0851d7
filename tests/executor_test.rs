use std::sync::Arc;

use brambledb::buffer::BufferPoolManager;
use brambledb::catalog::{Catalog, Column, DataType, Schema};
use brambledb::execution::physical_plan::{
    AggregateExpr, AggregateFunction, IndexScanMode, JoinType, OrderByExpr, PhysicalAggregate,
    PhysicalDelete, PhysicalExternalMergeSort, PhysicalHashJoin, PhysicalIndexScan, PhysicalInsert,
    PhysicalLimit, PhysicalNestedIndexJoin, PhysicalNestedLoopJoin, PhysicalPlan, PhysicalSeqScan,
    PhysicalUpdate, PhysicalValues,
};
use brambledb::execution::ExecutionEngine;
use brambledb::expression::{BinaryOp, Expr};
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

fn eq(left: Expr, right: Expr) -> Expr {
    Expr::binary(left, BinaryOp::Eq, right)
}

fn run(catalog: &Catalog, plan: PhysicalPlan) -> Vec<Tuple> {
    let mut engine = ExecutionEngine::new(catalog);
    engine.execute(Arc::new(plan)).unwrap()
}

/// Insert literal rows through the Values -> Insert pipeline.
fn insert_rows(catalog: &Catalog, table: &str, rows: Vec<Vec<Expr>>) -> i32 {
    let table_info = catalog.table_by_name(table).unwrap();
    let values = PhysicalPlan::Values(PhysicalValues::new(table_info.schema.clone(), rows));
    let insert = PhysicalPlan::Insert(PhysicalInsert::new(
        table_info.oid,
        table_info.schema.clone(),
        Arc::new(values),
    ));
    let result = run(catalog, insert);
    assert_eq!(result.len(), 1);
    match result[0].data[0] {
        ScalarValue::Int32(Some(count)) => count,
        _ => panic!("insert did not report a row count"),
    }
}

fn seq_scan(catalog: &Catalog, table: &str, predicate: Option<Expr>) -> PhysicalPlan {
    let table_info = catalog.table_by_name(table).unwrap();
    PhysicalPlan::SeqScan(PhysicalSeqScan::new(
        table_info.oid,
        table_info.schema.clone(),
        predicate,
    ))
}

fn create_join_tables(catalog: &mut Catalog) {
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

    let left_rows = vec![
        vec![Expr::literal(1i32), Expr::literal("a")],
        vec![Expr::literal(2i32), Expr::literal("b")],
        vec![Expr::literal(3i32), Expr::literal("c")],
    ];
    let right_rows = vec![
        vec![Expr::literal(2i32), Expr::literal("x")],
        vec![Expr::literal(2i32), Expr::literal("y")],
        vec![Expr::literal(4i32), Expr::literal("z")],
    ];
    assert_eq!(insert_rows(catalog, "t1", left_rows), 3);
    assert_eq!(insert_rows(catalog, "t2", right_rows), 3);
}

fn join_output_schema(catalog: &Catalog) -> Arc<Schema> {
    let t1 = catalog.table_by_name("t1").unwrap();
    let t2 = catalog.table_by_name("t2").unwrap();
    Arc::new(
        Schema::try_merge(vec![
            t1.schema.as_ref().clone(),
            t2.schema.as_ref().clone(),
        ])
        .unwrap(),
    )
}

fn hash_join_plan(catalog: &Catalog, join_type: JoinType) -> PhysicalPlan {
    PhysicalPlan::HashJoin(PhysicalHashJoin::new(
        join_type,
        Arc::new(seq_scan(catalog, "t1", None)),
        Arc::new(seq_scan(catalog, "t2", None)),
        vec![col("t1", "a")],
        vec![col("t2", "a")],
        join_output_schema(catalog),
    ))
}

fn row_keys(tuples: &[Tuple]) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = tuples
        .iter()
        .map(|t| t.data.iter().map(|v| v.to_string()).collect())
        .collect();
    rows.sort();
    rows
}

#[test]
fn hash_join_inner_and_left() {
    let (_tmp, mut catalog) = setup_catalog();
    create_join_tables(&mut catalog);

    let inner = run(&catalog, hash_join_plan(&catalog, JoinType::Inner));
    assert_eq!(
        row_keys(&inner),
        vec![
            vec!["2".to_string(), "b".to_string(), "2".to_string(), "x".to_string()],
            vec!["2".to_string(), "b".to_string(), "2".to_string(), "y".to_string()],
        ]
    );

    let left = run(&catalog, hash_join_plan(&catalog, JoinType::LeftOuter));
    assert_eq!(
        row_keys(&left),
        vec![
            vec!["1".to_string(), "a".to_string(), "NULL".to_string(), "NULL".to_string()],
            vec!["2".to_string(), "b".to_string(), "2".to_string(), "x".to_string()],
            vec!["2".to_string(), "b".to_string(), "2".to_string(), "y".to_string()],
            vec!["3".to_string(), "c".to_string(), "NULL".to_string(), "NULL".to_string()],
        ]
    );

    let rendered = brambledb::utils::util::pretty_format_tuples(&left).to_string();
    println!("{rendered}");
    assert!(rendered.contains('b'));
}

#[test]
fn hash_join_rejects_unsupported_join_types() {
    let (_tmp, mut catalog) = setup_catalog();
    create_join_tables(&mut catalog);

    let plan = hash_join_plan(&catalog, JoinType::FullOuter);
    let mut engine = ExecutionEngine::new(&catalog);
    assert!(engine.execute(Arc::new(plan)).is_err());
}

#[test]
fn nested_loop_join_matches_hash_join() {
    let (_tmp, mut catalog) = setup_catalog();
    create_join_tables(&mut catalog);

    for join_type in [JoinType::Inner, JoinType::LeftOuter] {
        let nlj = PhysicalPlan::NestedLoopJoin(PhysicalNestedLoopJoin::new(
            join_type,
            Some(eq(col("t1", "a"), col("t2", "a"))),
            Arc::new(seq_scan(&catalog, "t1", None)),
            Arc::new(seq_scan(&catalog, "t2", None)),
            join_output_schema(&catalog),
        ));
        let nlj_rows = run(&catalog, nlj);
        let hj_rows = run(&catalog, hash_join_plan(&catalog, join_type));
        assert_eq!(row_keys(&nlj_rows), row_keys(&hj_rows));
    }
}

#[test]
fn nested_index_join_probes_inner_index() {
    let (_tmp, mut catalog) = setup_catalog();
    create_join_tables(&mut catalog);
    catalog.create_index("t2_a_idx", "t2", &["a"]).unwrap();

    // The unique index keeps one rid per key, so key 2 joins a single row.
    let t2 = catalog.table_by_name("t2").unwrap().clone();
    let index_info = catalog.index_by_name("t2_a_idx", t2.oid).unwrap().clone();

    let join = PhysicalPlan::NestedIndexJoin(PhysicalNestedIndexJoin::new(
        JoinType::LeftOuter,
        Arc::new(seq_scan(&catalog, "t1", None)),
        col("t1", "a"),
        t2.oid,
        index_info.oid,
        t2.schema.clone(),
        join_output_schema(&catalog),
    ));
    let rows = run(&catalog, join);
    let keys = row_keys(&rows);
    assert_eq!(keys.len(), 3);
    assert_eq!(keys[0][0], "1");
    assert_eq!(keys[0][2], "NULL");
    assert_eq!(keys[1][0], "2");
    assert_eq!(keys[1][2], "2");
    assert_eq!(keys[2][0], "3");
    assert_eq!(keys[2][2], "NULL");
}

fn create_numbers_table(catalog: &mut Catalog, rows: &[(i32, i32)]) {
    catalog
        .create_table(
            "numbers",
            Schema::new(vec![
                Column::new("grp", DataType::Int32, false),
                Column::new("val", DataType::Int32, true),
            ]),
        )
        .unwrap();
    let exprs = rows
        .iter()
        .map(|(grp, val)| vec![Expr::literal(*grp), Expr::literal(*val)])
        .collect();
    insert_rows(catalog, "numbers", exprs);
}

#[test]
fn aggregation_with_groups() {
    let (_tmp, mut catalog) = setup_catalog();
    create_numbers_table(
        &mut catalog,
        &[(1, 10), (1, 20), (2, 5), (2, 15), (2, 40), (3, 7)],
    );

    let output_schema = Arc::new(Schema::new(vec![
        Column::new("grp", DataType::Int32, false),
        Column::new("cnt", DataType::Int64, false),
        Column::new("total", DataType::Int64, true),
        Column::new("low", DataType::Int32, true),
        Column::new("high", DataType::Int32, true),
    ]));
    let plan = PhysicalPlan::Aggregate(PhysicalAggregate::new(
        Arc::new(seq_scan(&catalog, "numbers", None)),
        vec![col("numbers", "grp")],
        vec![
            AggregateExpr::count_star(),
            AggregateExpr::new(AggregateFunction::Sum, col("numbers", "val")),
            AggregateExpr::new(AggregateFunction::Min, col("numbers", "val")),
            AggregateExpr::new(AggregateFunction::Max, col("numbers", "val")),
        ],
        output_schema,
    ));

    let rows = run(&catalog, plan);
    assert_eq!(
        row_keys(&rows),
        vec![
            vec!["1".to_string(), "2".to_string(), "30".to_string(), "10".to_string(), "20".to_string()],
            vec!["2".to_string(), "3".to_string(), "60".to_string(), "5".to_string(), "40".to_string()],
            vec!["3".to_string(), "1".to_string(), "7".to_string(), "7".to_string(), "7".to_string()],
        ]
    );
}

#[test]
fn count_star_on_empty_table_is_zero() {
    let (_tmp, mut catalog) = setup_catalog();
    catalog
        .create_table(
            "empty_t",
            Schema::new(vec![Column::new("x", DataType::Int32, false)]),
        )
        .unwrap();
    let table_info = catalog.table_by_name("empty_t").unwrap();

    let output_schema = Arc::new(Schema::new(vec![Column::new(
        "cnt",
        DataType::Int64,
        false,
    )]));
    let plan = PhysicalPlan::Aggregate(PhysicalAggregate::new(
        Arc::new(PhysicalPlan::SeqScan(PhysicalSeqScan::new(
            table_info.oid,
            table_info.schema.clone(),
            None,
        ))),
        vec![],
        vec![AggregateExpr::count_star()],
        output_schema,
    ));

    let rows = run(&catalog, plan);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].data[0], ScalarValue::Int64(Some(0)));
}

#[test]
fn limit_with_offset() {
    let (_tmp, mut catalog) = setup_catalog();
    create_numbers_table(&mut catalog, &[(1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]);

    let plan = PhysicalPlan::Limit(PhysicalLimit::new(
        Some(2),
        1,
        Arc::new(seq_scan(&catalog, "numbers", None)),
    ));
    let rows = run(&catalog, plan);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].data[0], ScalarValue::Int32(Some(2)));
    assert_eq!(rows[1].data[0], ScalarValue::Int32(Some(3)));
}

#[test]
fn seq_scan_applies_pushed_predicate() {
    let (_tmp, mut catalog) = setup_catalog();
    create_numbers_table(&mut catalog, &[(1, 1), (2, 2), (3, 3), (4, 4)]);

    let predicate = Expr::binary(col("numbers", "grp"), BinaryOp::Gt, Expr::literal(2i32));
    let rows = run(&catalog, seq_scan(&catalog, "numbers", Some(predicate)));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].data[0], ScalarValue::Int32(Some(3)));
    assert_eq!(rows[1].data[0], ScalarValue::Int32(Some(4)));
}

#[test]
fn delete_with_predicate_updates_heap_and_index() {
    let (_tmp, mut catalog) = setup_catalog();
    create_numbers_table(&mut catalog, &[(1, 1), (2, 2), (3, 3), (4, 4)]);
    catalog
        .create_index("numbers_grp_idx", "numbers", &["grp"])
        .unwrap();
    let table_info = catalog.table_by_name("numbers").unwrap().clone();
    let index_info = catalog
        .index_by_name("numbers_grp_idx", table_info.oid)
        .unwrap()
        .clone();

    let predicate = Expr::binary(col("numbers", "grp"), BinaryOp::LtEq, Expr::literal(2i32));
    let delete = PhysicalPlan::Delete(PhysicalDelete::new(
        table_info.oid,
        Arc::new(seq_scan(&catalog, "numbers", Some(predicate))),
    ));
    let result = run(&catalog, delete);
    assert_eq!(result[0].data[0], ScalarValue::Int32(Some(2)));

    // The survivors are visible through a scan and the index forgets the
    // deleted keys.
    let remaining = run(&catalog, seq_scan(&catalog, "numbers", None));
    assert_eq!(remaining.len(), 2);
    let deleted_key = Tuple::new(index_info.key_schema.clone(), vec![1i32.into()]);
    assert!(index_info.index.get(&deleted_key).unwrap().is_none());
    let kept_key = Tuple::new(index_info.key_schema.clone(), vec![3i32.into()]);
    assert!(index_info.index.get(&kept_key).unwrap().is_some());
}

#[test]
fn update_rewrites_rows_and_reindexes() {
    let (_tmp, mut catalog) = setup_catalog();
    create_numbers_table(&mut catalog, &[(1, 10), (2, 20), (3, 30)]);
    catalog
        .create_index("numbers_grp_idx", "numbers", &["grp"])
        .unwrap();
    let table_info = catalog.table_by_name("numbers").unwrap().clone();
    let index_info = catalog
        .index_by_name("numbers_grp_idx", table_info.oid)
        .unwrap()
        .clone();

    // grp = grp + 100, val untouched.
    let update = PhysicalPlan::Update(PhysicalUpdate::new(
        table_info.oid,
        table_info.schema.clone(),
        vec![
            Expr::binary(col("numbers", "grp"), BinaryOp::Plus, Expr::literal(100i32)),
            col("numbers", "val"),
        ],
        Arc::new(seq_scan(&catalog, "numbers", None)),
    ));
    let result = run(&catalog, update);
    assert_eq!(result[0].data[0], ScalarValue::Int32(Some(3)));

    let rows = run(&catalog, seq_scan(&catalog, "numbers", None));
    let mut grps: Vec<ScalarValue> = rows.iter().map(|t| t.data[0].clone()).collect();
    grps.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(
        grps,
        vec![101i32.into(), 102i32.into(), 103i32.into()]
    );

    // New keys entered the index; old ones left it.
    let old_key = Tuple::new(index_info.key_schema.clone(), vec![1i32.into()]);
    assert!(index_info.index.get(&old_key).unwrap().is_none());
    let new_key = Tuple::new(index_info.key_schema.clone(), vec![101i32.into()]);
    assert!(index_info.index.get(&new_key).unwrap().is_some());
}

#[test]
fn index_scan_point_lookup_and_ordered_modes() {
    let (_tmp, mut catalog) = setup_catalog();
    create_numbers_table(
        &mut catalog,
        &[(5, 50), (3, 30), (1, 10), (4, 40), (2, 20)],
    );
    catalog
        .create_index("numbers_grp_idx", "numbers", &["grp"])
        .unwrap();
    let table_info = catalog.table_by_name("numbers").unwrap().clone();
    let index_info = catalog
        .index_by_name("numbers_grp_idx", table_info.oid)
        .unwrap()
        .clone();

    let point = PhysicalPlan::IndexScan(PhysicalIndexScan::new(
        table_info.oid,
        index_info.oid,
        table_info.schema.clone(),
        IndexScanMode::PointLookup {
            pred_keys: vec![2i32.into(), 4i32.into(), 9i32.into()],
        },
    ));
    let rows = run(&catalog, point);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].data[0], ScalarValue::Int32(Some(2)));
    assert_eq!(rows[1].data[0], ScalarValue::Int32(Some(4)));

    // Ordered mode walks the leaf chain in key order.
    let ordered = PhysicalPlan::IndexScan(PhysicalIndexScan::new(
        table_info.oid,
        index_info.oid,
        table_info.schema.clone(),
        IndexScanMode::Range {
            start: std::ops::Bound::Unbounded,
            end: std::ops::Bound::Unbounded,
        },
    ));
    let rows = run(&catalog, ordered);
    let grps: Vec<ScalarValue> = rows.iter().map(|t| t.data[0].clone()).collect();
    assert_eq!(
        grps,
        vec![1i32.into(), 2i32.into(), 3i32.into(), 4i32.into(), 5i32.into()]
    );
}

#[test]
fn external_merge_sort_orders_multi_page_input() {
    let (_tmp, mut catalog) = setup_catalog();
    // Enough fixed-width rows to spill across several sort pages.
    let rows: Vec<(i32, i32)> = (0..2000).map(|i| ((7919 * i) % 2000, i)).collect();
    create_numbers_table(&mut catalog, &rows);

    let sort = PhysicalPlan::Sort(PhysicalExternalMergeSort::new(
        Arc::new(seq_scan(&catalog, "numbers", None)),
        vec![OrderByExpr::asc(col("numbers", "grp"))],
    ));
    let sorted = run(&catalog, sort);
    assert_eq!(sorted.len(), 2000);
    for window in sorted.windows(2) {
        assert!(window[0].data[0] <= window[1].data[0]);
    }

    // Sorting an already sorted stream is a fixed point.
    let again = PhysicalPlan::Sort(PhysicalExternalMergeSort::new(
        Arc::new(seq_scan(&catalog, "numbers", None)),
        vec![OrderByExpr::asc(col("numbers", "grp"))],
    ));
    let resorted = run(&catalog, again);
    let firsts: Vec<&ScalarValue> = sorted.iter().map(|t| &t.data[0]).collect();
    let seconds: Vec<&ScalarValue> = resorted.iter().map(|t| &t.data[0]).collect();
    assert_eq!(firsts, seconds);
}

#[test]
fn external_merge_sort_descending() {
    let (_tmp, mut catalog) = setup_catalog();
    create_numbers_table(&mut catalog, &[(3, 1), (1, 2), (2, 3)]);

    let sort = PhysicalPlan::Sort(PhysicalExternalMergeSort::new(
        Arc::new(seq_scan(&catalog, "numbers", None)),
        vec![OrderByExpr::desc(col("numbers", "grp"))],
    ));
    let rows = run(&catalog, sort);
    let grps: Vec<ScalarValue> = rows.iter().map(|t| t.data[0].clone()).collect();
    assert_eq!(grps, vec![3i32.into(), 2i32.into(), 1i32.into()]);
}
