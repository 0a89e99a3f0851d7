use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::catalog::{IndexOid, SchemaRef, TableOid};
use crate::error::{BrambleError, BrambleResult};
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::expression::Expr;
use crate::storage::page::{RecordId, INVALID_RID};
use crate::storage::tuple::Tuple;

use super::{JoinType, PhysicalPlan};

#[derive(Debug, Default)]
struct NestedIndexJoinState {
    pending: VecDeque<Tuple>,
}

/// For each outer tuple, evaluates the key expression and probes the inner
/// table's index; matching inner rows come from the heap, skipping deleted
/// tuples. A null key short-circuits to unmatched. Supports INNER and LEFT.
#[derive(Debug)]
pub struct PhysicalNestedIndexJoin {
    pub join_type: JoinType,
    pub left_input: Arc<PhysicalPlan>,
    pub key_expr: Expr,
    pub inner_table_oid: TableOid,
    pub index_oid: IndexOid,
    pub inner_schema: SchemaRef,
    pub schema: SchemaRef,

    state: Mutex<NestedIndexJoinState>,
}

impl PhysicalNestedIndexJoin {
    pub fn new(
        join_type: JoinType,
        left_input: Arc<PhysicalPlan>,
        key_expr: Expr,
        inner_table_oid: TableOid,
        index_oid: IndexOid,
        inner_schema: SchemaRef,
        schema: SchemaRef,
    ) -> Self {
        PhysicalNestedIndexJoin {
            join_type,
            left_input,
            key_expr,
            inner_table_oid,
            index_oid,
            inner_schema,
            schema,
            state: Mutex::new(NestedIndexJoinState::default()),
        }
    }
}

impl VolcanoExecutor for PhysicalNestedIndexJoin {
    fn init(&self, context: &mut ExecutionContext) -> BrambleResult<()> {
        if !matches!(self.join_type, JoinType::Inner | JoinType::LeftOuter) {
            return Err(BrambleError::NotSupport(format!(
                "nested index join does not support {} joins",
                self.join_type
            )));
        }
        self.left_input.init(context)?;
        *self.state.lock() = NestedIndexJoinState::default();
        Ok(())
    }

    fn next(&self, context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>> {
        let mut state = self.state.lock();
        loop {
            if let Some(merged) = state.pending.pop_front() {
                return Ok(Some((merged, INVALID_RID)));
            }

            let Some((left_tuple, _)) = self.left_input.next(context)? else {
                return Ok(None);
            };

            let key_value = context.eval_expr(&self.key_expr, &left_tuple)?;
            let mut matched = Vec::new();
            if !key_value.is_null() {
                let index_info = context.catalog.index(self.index_oid)?;
                let key_type = index_info.key_schema.column_with_index(0)?.data_type;
                let key = Tuple::new(
                    index_info.key_schema.clone(),
                    vec![key_value.cast_to(&key_type)?],
                );
                if let Some(rid) = index_info.index.get(&key)? {
                    let table_heap = context.table_heap(self.inner_table_oid)?;
                    let (meta, inner_tuple) = table_heap.full_tuple(rid)?;
                    if !meta.is_deleted {
                        matched.push(inner_tuple);
                    }
                }
            }

            if matched.is_empty() {
                if self.join_type == JoinType::LeftOuter {
                    let padded = Tuple::try_merge(vec![
                        left_tuple,
                        Tuple::empty(self.inner_schema.clone()),
                    ])?;
                    return Ok(Some((padded, INVALID_RID)));
                }
                continue;
            }

            for inner_tuple in matched {
                state
                    .pending
                    .push_back(Tuple::try_merge(vec![left_tuple.clone(), inner_tuple])?);
            }
        }
    }

    fn output_schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

impl std::fmt::Display for PhysicalNestedIndexJoin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NestedIndexJoin({})", self.join_type)
    }
}
