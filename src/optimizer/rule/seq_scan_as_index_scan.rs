use crate::catalog::{Catalog, ColumnRef};
use crate::error::BrambleResult;
use crate::execution::physical_plan::{IndexScanMode, PhysicalIndexScan, PhysicalPlan};
use crate::expression::{BinaryOp, Expr};
use crate::optimizer::PhysicalOptimizerRule;
use crate::utils::scalar::ScalarValue;

/// Rewrites a sequential scan whose pushed predicate is an equality (or an
/// OR of equalities) on a single indexed column into an index point-lookup
/// scan with constant pred keys.
pub struct SeqScanAsIndexScan;

impl PhysicalOptimizerRule for SeqScanAsIndexScan {
    fn try_optimize(
        &self,
        plan: &PhysicalPlan,
        catalog: &Catalog,
    ) -> BrambleResult<Option<PhysicalPlan>> {
        let PhysicalPlan::SeqScan(scan) = plan else {
            return Ok(None);
        };
        let Some(predicate) = &scan.predicate else {
            return Ok(None);
        };

        for index_info in catalog.table_indexes(scan.table_oid) {
            // Only single-column indexes support point lookups here.
            if index_info.key_schema.column_count() != 1 {
                continue;
            }
            let key_column = index_info.key_schema.column_with_index(0)?;

            let Some(pred_keys) = extract_equality_keys(predicate, &key_column) else {
                continue;
            };
            if pred_keys.is_empty() {
                continue;
            }

            return Ok(Some(PhysicalPlan::IndexScan(PhysicalIndexScan::new(
                scan.table_oid,
                index_info.oid,
                scan.table_schema.clone(),
                IndexScanMode::PointLookup { pred_keys },
            ))));
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        "SeqScanAsIndexScan"
    }
}

fn column_matches(expr: &Expr, key_column: &ColumnRef) -> bool {
    let Expr::Column(column) = expr else {
        return false;
    };
    if !column.name.eq_ignore_ascii_case(&key_column.name) {
        return false;
    }
    match (&column.relation, &key_column.relation) {
        (Some(rel), Some(key_rel)) => rel == key_rel,
        _ => true,
    }
}

/// Constants compared for equality against the indexed column, or `None`
/// when any part of the predicate is not such a comparison.
fn extract_equality_keys(expr: &Expr, key_column: &ColumnRef) -> Option<Vec<ScalarValue>> {
    let Expr::Binary(binary) = expr else {
        return None;
    };
    match binary.op {
        BinaryOp::Eq => {
            let (column_side, literal_side) = match (binary.left.as_ref(), binary.right.as_ref()) {
                (column @ Expr::Column(_), Expr::Literal(literal)) => (column, literal),
                (Expr::Literal(literal), column @ Expr::Column(_)) => (column, literal),
                _ => return None,
            };
            if !column_matches(column_side, key_column) {
                return None;
            }
            Some(vec![literal_side.value.clone()])
        }
        BinaryOp::Or => {
            let mut keys = extract_equality_keys(&binary.left, key_column)?;
            keys.extend(extract_equality_keys(&binary.right, key_column)?);
            Some(keys)
        }
        _ => None,
    }
}
