use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::catalog::{SchemaRef, TableOid, INSERT_OUTPUT_SCHEMA_REF};
use crate::error::BrambleResult;
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::storage::page::{RecordId, INVALID_RID};
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;

use super::PhysicalPlan;

/// Sink operator: drains the child, inserting each tuple into the heap and
/// every table index, then emits a single row-count tuple.
#[derive(Debug)]
pub struct PhysicalInsert {
    pub table_oid: TableOid,
    pub table_schema: SchemaRef,
    pub input: Arc<PhysicalPlan>,

    insert_rows: AtomicU32,
    done: AtomicU32,
}

impl PhysicalInsert {
    pub fn new(table_oid: TableOid, table_schema: SchemaRef, input: Arc<PhysicalPlan>) -> Self {
        Self {
            table_oid,
            table_schema,
            input,
            insert_rows: AtomicU32::new(0),
            done: AtomicU32::new(0),
        }
    }
}

impl VolcanoExecutor for PhysicalInsert {
    fn init(&self, context: &mut ExecutionContext) -> BrambleResult<()> {
        self.input.init(context)?;
        self.insert_rows.store(0, Ordering::SeqCst);
        self.done.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn next(&self, context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>> {
        if self.done.swap(1, Ordering::SeqCst) != 0 {
            return Ok(None);
        }

        while let Some((tuple, _)) = self.input.next(context)? {
            // Re-shape the incoming tuple onto the table schema, casting
            // column by column.
            let mut casted_data = Vec::with_capacity(tuple.data.len());
            for (idx, value) in tuple.data.iter().enumerate() {
                let target_type = self.table_schema.column_with_index(idx)?.data_type;
                casted_data.push(value.cast_to(&target_type)?);
            }
            let tuple = Tuple::new(self.table_schema.clone(), casted_data);

            context.insert_tuple_with_indexes(self.table_oid, &tuple)?;
            self.insert_rows.fetch_add(1, Ordering::SeqCst);
        }

        let insert_rows = self.insert_rows.load(Ordering::SeqCst);
        Ok(Some((
            Tuple::new(
                self.output_schema(),
                vec![ScalarValue::Int32(Some(insert_rows as i32))],
            ),
            INVALID_RID,
        )))
    }

    fn output_schema(&self) -> SchemaRef {
        INSERT_OUTPUT_SCHEMA_REF.clone()
    }
}

impl std::fmt::Display for PhysicalInsert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Insert")
    }
}
