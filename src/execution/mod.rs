pub mod physical_plan;

use std::sync::Arc;

use crate::catalog::{Catalog, IndexInfo, SchemaRef, TableOid};
use crate::error::{BrambleError, BrambleResult};
use crate::execution::physical_plan::PhysicalPlan;
use crate::expression::{Expr, ExprTrait};
use crate::storage::page::{RecordId, TupleMeta, EMPTY_TUPLE_META};
use crate::storage::table_heap::TableHeap;
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;

/// Pull-based operator interface. `init` is an idempotent reset; `next`
/// produces the next tuple together with its rid (meaningful only for
/// operators that read base tables).
pub trait VolcanoExecutor {
    fn init(&self, _context: &mut ExecutionContext) -> BrambleResult<()> {
        Ok(())
    }

    fn next(&self, context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>>;

    fn output_schema(&self) -> SchemaRef;
}

/// Shared state threaded through every physical operator during execution:
/// catalog access, expression evaluation, and heap/index maintenance.
pub struct ExecutionContext<'a> {
    pub catalog: &'a Catalog,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Evaluate an expression expected to produce a boolean result. A null
    /// boolean filters the row out.
    pub fn eval_predicate(&self, expr: &Expr, tuple: &Tuple) -> BrambleResult<bool> {
        match expr.evaluate(tuple)? {
            ScalarValue::Boolean(Some(v)) => Ok(v),
            ScalarValue::Boolean(None) => Ok(false),
            other => Err(BrambleError::Execution(format!(
                "predicate value must be boolean, got {}",
                other
            ))),
        }
    }

    pub fn eval_expr(&self, expr: &Expr, tuple: &Tuple) -> BrambleResult<ScalarValue> {
        expr.evaluate(tuple)
    }

    pub fn table_heap(&self, table_oid: TableOid) -> BrambleResult<Arc<TableHeap>> {
        Ok(self.catalog.table(table_oid)?.table.clone())
    }

    pub fn table_indexes(&self, table_oid: TableOid) -> Vec<IndexInfo> {
        self.catalog
            .table_indexes(table_oid)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Insert into the heap and every index of the table, in lockstep.
    pub fn insert_tuple_with_indexes(
        &self,
        table_oid: TableOid,
        tuple: &Tuple,
    ) -> BrambleResult<RecordId> {
        let table_heap = self.table_heap(table_oid)?;
        let rid = table_heap.insert_tuple(&EMPTY_TUPLE_META, tuple)?;
        for index_info in self.table_indexes(table_oid) {
            let key = tuple.project_with_schema(index_info.key_schema.clone())?;
            index_info.index.insert(&key, rid)?;
        }
        Ok(rid)
    }

    /// Mark a heap row deleted and remove its entries from every index.
    pub fn delete_tuple_with_indexes(
        &self,
        table_oid: TableOid,
        rid: RecordId,
        tuple: &Tuple,
    ) -> BrambleResult<()> {
        let table_heap = self.table_heap(table_oid)?;
        table_heap.update_tuple_meta(TupleMeta { is_deleted: true }, rid)?;
        for index_info in self.table_indexes(table_oid) {
            let key = tuple.project_with_schema(index_info.key_schema.clone())?;
            index_info.index.delete(&key)?;
        }
        Ok(())
    }
}

pub struct ExecutionEngine<'a> {
    pub context: ExecutionContext<'a>,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            context: ExecutionContext::new(catalog),
        }
    }

    pub fn execute(&mut self, plan: Arc<PhysicalPlan>) -> BrambleResult<Vec<Tuple>> {
        plan.init(&mut self.context)?;
        let mut result = Vec::new();
        while let Some((tuple, _rid)) = plan.next(&mut self.context)? {
            result.push(tuple);
        }
        Ok(result)
    }
}
