use parking_lot::Mutex;

use crate::catalog::{SchemaRef, TableOid};
use crate::error::{BrambleError, BrambleResult};
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::expression::Expr;
use crate::storage::page::RecordId;
use crate::storage::table_heap::TableIterator;
use crate::storage::tuple::Tuple;

/// Full scan over a table heap, applying the pushed-down predicate and
/// skipping deleted rows.
pub struct PhysicalSeqScan {
    pub table_oid: TableOid,
    pub table_schema: SchemaRef,
    pub predicate: Option<Expr>,

    iterator: Mutex<Option<TableIterator>>,
}

impl PhysicalSeqScan {
    pub fn new(table_oid: TableOid, table_schema: SchemaRef, predicate: Option<Expr>) -> Self {
        PhysicalSeqScan {
            table_oid,
            table_schema,
            predicate,
            iterator: Mutex::new(None),
        }
    }
}

impl VolcanoExecutor for PhysicalSeqScan {
    fn init(&self, context: &mut ExecutionContext) -> BrambleResult<()> {
        let table_heap = context.table_heap(self.table_oid)?;
        *self.iterator.lock() = Some(table_heap.iter());
        Ok(())
    }

    fn next(&self, context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>> {
        loop {
            let entry = {
                let mut guard = self.iterator.lock();
                let iterator = guard.as_mut().ok_or_else(|| {
                    BrambleError::Execution("sequential scan not initialized".to_string())
                })?;
                iterator.next()?
            };
            let Some((rid, meta, tuple)) = entry else {
                return Ok(None);
            };
            if meta.is_deleted {
                continue;
            }
            if let Some(predicate) = &self.predicate {
                if !context.eval_predicate(predicate, &tuple)? {
                    continue;
                }
            }
            return Ok(Some((tuple, rid)));
        }
    }

    fn output_schema(&self) -> SchemaRef {
        self.table_schema.clone()
    }
}

impl std::fmt::Display for PhysicalSeqScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SeqScan")
    }
}

impl std::fmt::Debug for PhysicalSeqScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalSeqScan")
            .field("table_oid", &self.table_oid)
            .field("predicate", &self.predicate)
            .finish()
    }
}
