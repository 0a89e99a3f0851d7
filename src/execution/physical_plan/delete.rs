use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::catalog::{SchemaRef, TableOid, DELETE_OUTPUT_SCHEMA_REF};
use crate::error::BrambleResult;
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::storage::page::{RecordId, INVALID_RID};
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;

use super::PhysicalPlan;

/// Sink operator: drains the child scan, marking each row deleted in the
/// heap and removing it from every table index, then emits the count.
#[derive(Debug)]
pub struct PhysicalDelete {
    pub table_oid: TableOid,
    pub input: Arc<PhysicalPlan>,

    delete_rows: AtomicU32,
    done: AtomicU32,
}

impl PhysicalDelete {
    pub fn new(table_oid: TableOid, input: Arc<PhysicalPlan>) -> Self {
        Self {
            table_oid,
            input,
            delete_rows: AtomicU32::new(0),
            done: AtomicU32::new(0),
        }
    }
}

impl VolcanoExecutor for PhysicalDelete {
    fn init(&self, context: &mut ExecutionContext) -> BrambleResult<()> {
        self.input.init(context)?;
        self.delete_rows.store(0, Ordering::SeqCst);
        self.done.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn next(&self, context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>> {
        if self.done.swap(1, Ordering::SeqCst) != 0 {
            return Ok(None);
        }

        while let Some((tuple, rid)) = self.input.next(context)? {
            context.delete_tuple_with_indexes(self.table_oid, rid, &tuple)?;
            self.delete_rows.fetch_add(1, Ordering::SeqCst);
        }

        let delete_rows = self.delete_rows.load(Ordering::SeqCst);
        Ok(Some((
            Tuple::new(
                self.output_schema(),
                vec![ScalarValue::Int32(Some(delete_rows as i32))],
            ),
            INVALID_RID,
        )))
    }

    fn output_schema(&self) -> SchemaRef {
        DELETE_OUTPUT_SCHEMA_REF.clone()
    }
}

impl std::fmt::Display for PhysicalDelete {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Delete")
    }
}
