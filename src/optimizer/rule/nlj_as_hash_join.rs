use crate::catalog::{Catalog, Schema};
use crate::error::BrambleResult;
use crate::execution::physical_plan::{JoinType, PhysicalHashJoin, PhysicalPlan};
use crate::execution::VolcanoExecutor;
use crate::expression::{BinaryOp, ColumnExpr, Expr};
use crate::optimizer::PhysicalOptimizerRule;

/// Rewrites a nested loop join whose predicate is a conjunction of
/// column-to-column equalities (one side from each input) into a hash join
/// with aligned key expression lists. INNER and LEFT joins only.
pub struct NljAsHashJoin;

impl PhysicalOptimizerRule for NljAsHashJoin {
    fn try_optimize(
        &self,
        plan: &PhysicalPlan,
        _catalog: &Catalog,
    ) -> BrambleResult<Option<PhysicalPlan>> {
        let PhysicalPlan::NestedLoopJoin(nlj) = plan else {
            return Ok(None);
        };
        if !matches!(nlj.join_type, JoinType::Inner | JoinType::LeftOuter) {
            return Ok(None);
        }
        let Some(condition) = &nlj.condition else {
            return Ok(None);
        };

        let left_schema = nlj.left_input.output_schema();
        let right_schema = nlj.right_input.output_schema();

        let mut left_key_exprs = Vec::new();
        let mut right_key_exprs = Vec::new();
        if !extract_equi_conditions(
            condition,
            &left_schema,
            &right_schema,
            &mut left_key_exprs,
            &mut right_key_exprs,
        ) || left_key_exprs.is_empty()
        {
            return Ok(None);
        }

        Ok(Some(PhysicalPlan::HashJoin(PhysicalHashJoin::new(
            nlj.join_type,
            nlj.left_input.clone(),
            nlj.right_input.clone(),
            left_key_exprs,
            right_key_exprs,
            nlj.schema.clone(),
        ))))
    }

    fn name(&self) -> &str {
        "NljAsHashJoin"
    }
}

/// Which input a column reference resolves against. Ambiguous references
/// (resolving in both schemas) disqualify the rewrite.
fn resolve_side(column: &ColumnExpr, left_schema: &Schema, right_schema: &Schema) -> Option<bool> {
    let in_left = left_schema
        .index_of(column.relation.as_ref(), &column.name)
        .is_ok();
    let in_right = right_schema
        .index_of(column.relation.as_ref(), &column.name)
        .is_ok();
    match (in_left, in_right) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

/// Recursively peel a conjunction of equality comparisons, normalizing each
/// so the left-input column lands in the left key list.
fn extract_equi_conditions(
    expr: &Expr,
    left_schema: &Schema,
    right_schema: &Schema,
    left_key_exprs: &mut Vec<Expr>,
    right_key_exprs: &mut Vec<Expr>,
) -> bool {
    let Expr::Binary(binary) = expr else {
        return false;
    };
    match binary.op {
        BinaryOp::And => {
            extract_equi_conditions(
                &binary.left,
                left_schema,
                right_schema,
                left_key_exprs,
                right_key_exprs,
            ) && extract_equi_conditions(
                &binary.right,
                left_schema,
                right_schema,
                left_key_exprs,
                right_key_exprs,
            )
        }
        BinaryOp::Eq => {
            let (Expr::Column(first), Expr::Column(second)) =
                (binary.left.as_ref(), binary.right.as_ref())
            else {
                return false;
            };
            let Some(first_is_left) = resolve_side(first, left_schema, right_schema) else {
                return false;
            };
            let Some(second_is_left) = resolve_side(second, left_schema, right_schema) else {
                return false;
            };
            if first_is_left == second_is_left {
                return false;
            }
            if first_is_left {
                left_key_exprs.push(Expr::Column(first.clone()));
                right_key_exprs.push(Expr::Column(second.clone()));
            } else {
                left_key_exprs.push(Expr::Column(second.clone()));
                right_key_exprs.push(Expr::Column(first.clone()));
            }
            true
        }
        _ => false,
    }
}
