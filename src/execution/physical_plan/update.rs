use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::catalog::{SchemaRef, TableOid, UPDATE_OUTPUT_SCHEMA_REF};
use crate::error::BrambleResult;
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::expression::Expr;
use crate::storage::page::{RecordId, INVALID_RID};
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;

use super::PhysicalPlan;

/// Sink operator implementing update as delete-then-insert, so the fresh
/// rids re-enter every table index. One target expression per table column,
/// evaluated against the old tuple.
#[derive(Debug)]
pub struct PhysicalUpdate {
    pub table_oid: TableOid,
    pub table_schema: SchemaRef,
    pub update_exprs: Vec<Expr>,
    pub input: Arc<PhysicalPlan>,

    update_rows: AtomicU32,
    done: AtomicU32,
}

impl PhysicalUpdate {
    pub fn new(
        table_oid: TableOid,
        table_schema: SchemaRef,
        update_exprs: Vec<Expr>,
        input: Arc<PhysicalPlan>,
    ) -> Self {
        Self {
            table_oid,
            table_schema,
            update_exprs,
            input,
            update_rows: AtomicU32::new(0),
            done: AtomicU32::new(0),
        }
    }
}

impl VolcanoExecutor for PhysicalUpdate {
    fn init(&self, context: &mut ExecutionContext) -> BrambleResult<()> {
        self.input.init(context)?;
        self.update_rows.store(0, Ordering::SeqCst);
        self.done.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn next(&self, context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>> {
        if self.done.swap(1, Ordering::SeqCst) != 0 {
            return Ok(None);
        }

        // Stage the rewrites first so the re-inserts cannot be re-observed by
        // the child scan.
        let mut staged = Vec::new();
        while let Some((tuple, rid)) = self.input.next(context)? {
            let mut new_data = Vec::with_capacity(self.update_exprs.len());
            for (idx, expr) in self.update_exprs.iter().enumerate() {
                let value = context.eval_expr(expr, &tuple)?;
                let target_type = self.table_schema.column_with_index(idx)?.data_type;
                new_data.push(value.cast_to(&target_type)?);
            }
            staged.push((rid, tuple, Tuple::new(self.table_schema.clone(), new_data)));
        }

        for (rid, old_tuple, new_tuple) in staged {
            context.delete_tuple_with_indexes(self.table_oid, rid, &old_tuple)?;
            context.insert_tuple_with_indexes(self.table_oid, &new_tuple)?;
            self.update_rows.fetch_add(1, Ordering::SeqCst);
        }

        let update_rows = self.update_rows.load(Ordering::SeqCst);
        Ok(Some((
            Tuple::new(
                self.output_schema(),
                vec![ScalarValue::Int32(Some(update_rows as i32))],
            ),
            INVALID_RID,
        )))
    }

    fn output_schema(&self) -> SchemaRef {
        UPDATE_OUTPUT_SCHEMA_REF.clone()
    }
}

impl std::fmt::Display for PhysicalUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Update")
    }
}
