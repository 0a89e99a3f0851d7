pub mod rule;

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::{BrambleError, BrambleResult};
use crate::execution::physical_plan::{
    PhysicalAggregate, PhysicalDelete, PhysicalExternalMergeSort, PhysicalHashJoin,
    PhysicalIndexScan, PhysicalInsert, PhysicalLimit, PhysicalNestedIndexJoin,
    PhysicalNestedLoopJoin, PhysicalPlan, PhysicalSeqScan, PhysicalUpdate, PhysicalValues,
};
use crate::optimizer::rule::{NljAsHashJoin, SeqScanAsIndexScan};

/// A physical-plan rewrite. Returns the replacement node, or `None` when the
/// rule does not apply.
pub trait PhysicalOptimizerRule {
    fn try_optimize(
        &self,
        plan: &PhysicalPlan,
        catalog: &Catalog,
    ) -> BrambleResult<Option<PhysicalPlan>>;

    fn name(&self) -> &str;
}

/// Applies its rules bottom-up: children are optimized first, then each rule
/// gets a shot at the rebuilt node.
pub struct PhysicalOptimizer {
    rules: Vec<Arc<dyn PhysicalOptimizerRule>>,
}

impl Default for PhysicalOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicalOptimizer {
    pub fn new() -> Self {
        Self {
            rules: vec![Arc::new(SeqScanAsIndexScan), Arc::new(NljAsHashJoin)],
        }
    }

    pub fn with_rules(rules: Vec<Arc<dyn PhysicalOptimizerRule>>) -> Self {
        Self { rules }
    }

    pub fn optimize(&self, plan: &PhysicalPlan, catalog: &Catalog) -> BrambleResult<PhysicalPlan> {
        let children = plan
            .inputs()
            .into_iter()
            .map(|child| self.optimize(child, catalog).map(Arc::new))
            .collect::<BrambleResult<Vec<_>>>()?;
        let mut current = Self::with_new_children(plan, children)?;

        for rule in self.rules.iter() {
            if let Some(new_plan) = rule.try_optimize(&current, catalog)? {
                current = new_plan;
            }
        }
        Ok(current)
    }

    /// Rebuild a node with freshly optimized children, resetting its runtime
    /// state through the ordinary constructors.
    fn with_new_children(
        plan: &PhysicalPlan,
        mut children: Vec<Arc<PhysicalPlan>>,
    ) -> BrambleResult<PhysicalPlan> {
        let mut next_child = || {
            if children.is_empty() {
                Err(BrambleError::Internal(
                    "physical plan rebuild ran out of children".to_string(),
                ))
            } else {
                Ok(children.remove(0))
            }
        };

        Ok(match plan {
            PhysicalPlan::Values(op) => PhysicalPlan::Values(PhysicalValues::new(
                op.schema.clone(),
                op.rows.clone(),
            )),
            PhysicalPlan::SeqScan(op) => PhysicalPlan::SeqScan(PhysicalSeqScan::new(
                op.table_oid,
                op.table_schema.clone(),
                op.predicate.clone(),
            )),
            PhysicalPlan::IndexScan(op) => PhysicalPlan::IndexScan(PhysicalIndexScan::new(
                op.table_oid,
                op.index_oid,
                op.table_schema.clone(),
                op.mode.clone(),
            )),
            PhysicalPlan::Insert(op) => PhysicalPlan::Insert(PhysicalInsert::new(
                op.table_oid,
                op.table_schema.clone(),
                next_child()?,
            )),
            PhysicalPlan::Update(op) => PhysicalPlan::Update(PhysicalUpdate::new(
                op.table_oid,
                op.table_schema.clone(),
                op.update_exprs.clone(),
                next_child()?,
            )),
            PhysicalPlan::Delete(op) => {
                PhysicalPlan::Delete(PhysicalDelete::new(op.table_oid, next_child()?))
            }
            PhysicalPlan::NestedLoopJoin(op) => {
                PhysicalPlan::NestedLoopJoin(PhysicalNestedLoopJoin::new(
                    op.join_type,
                    op.condition.clone(),
                    next_child()?,
                    next_child()?,
                    op.schema.clone(),
                ))
            }
            PhysicalPlan::HashJoin(op) => PhysicalPlan::HashJoin(PhysicalHashJoin::new(
                op.join_type,
                next_child()?,
                next_child()?,
                op.left_key_exprs.clone(),
                op.right_key_exprs.clone(),
                op.schema.clone(),
            )),
            PhysicalPlan::NestedIndexJoin(op) => {
                PhysicalPlan::NestedIndexJoin(PhysicalNestedIndexJoin::new(
                    op.join_type,
                    next_child()?,
                    op.key_expr.clone(),
                    op.inner_table_oid,
                    op.index_oid,
                    op.inner_schema.clone(),
                    op.schema.clone(),
                ))
            }
            PhysicalPlan::Aggregate(op) => PhysicalPlan::Aggregate(PhysicalAggregate::new(
                next_child()?,
                op.group_by_exprs.clone(),
                op.aggregate_exprs.clone(),
                op.schema.clone(),
            )),
            PhysicalPlan::Limit(op) => {
                PhysicalPlan::Limit(PhysicalLimit::new(op.limit, op.offset, next_child()?))
            }
            PhysicalPlan::Sort(op) => PhysicalPlan::Sort(PhysicalExternalMergeSort::new(
                next_child()?,
                op.order_bys.clone(),
            )),
        })
    }
}
