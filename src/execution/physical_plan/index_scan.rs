use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ops::Bound;
use std::sync::Arc;

use crate::catalog::{IndexOid, SchemaRef, TableOid};
use crate::error::BrambleResult;
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::storage::index::TreeIndexIterator;
use crate::storage::page::RecordId;
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;

/// How the index is driven: a batch of point lookups extracted from an
/// equality predicate, or an ordered walk over a key range.
#[derive(Debug, Clone)]
pub enum IndexScanMode {
    PointLookup { pred_keys: Vec<ScalarValue> },
    Range {
        start: Bound<Tuple>,
        end: Bound<Tuple>,
    },
}

#[derive(Default)]
struct IndexScanState {
    rids: VecDeque<RecordId>,
    iterator: Option<TreeIndexIterator>,
}

/// Scans a single-column B+-tree index, materializing matching tuples from
/// the heap and skipping deleted rows.
#[derive(Debug)]
pub struct PhysicalIndexScan {
    pub table_oid: TableOid,
    pub index_oid: IndexOid,
    pub table_schema: SchemaRef,
    pub mode: IndexScanMode,

    state: Mutex<IndexScanState>,
}

impl PhysicalIndexScan {
    pub fn new(
        table_oid: TableOid,
        index_oid: IndexOid,
        table_schema: SchemaRef,
        mode: IndexScanMode,
    ) -> Self {
        PhysicalIndexScan {
            table_oid,
            index_oid,
            table_schema,
            mode,
            state: Mutex::new(IndexScanState::default()),
        }
    }
}

impl VolcanoExecutor for PhysicalIndexScan {
    fn init(&self, context: &mut ExecutionContext) -> BrambleResult<()> {
        let index_info = context.catalog.index(self.index_oid)?;
        let mut state = self.state.lock();
        state.rids.clear();
        state.iterator = None;

        match &self.mode {
            IndexScanMode::PointLookup { pred_keys } => {
                // Gather every matching rid up front; tuples materialize in
                // `next` so deletes interleaved with the scan are honored.
                for pred_key in pred_keys {
                    let key_type = index_info.key_schema.column_with_index(0)?.data_type;
                    let key = Tuple::new(
                        index_info.key_schema.clone(),
                        vec![pred_key.cast_to(&key_type)?],
                    );
                    if let Some(rid) = index_info.index.get(&key)? {
                        state.rids.push_back(rid);
                    }
                }
            }
            IndexScanMode::Range { start, end } => {
                let iterator = TreeIndexIterator::new(
                    Arc::clone(&index_info.index),
                    (start.clone(), end.clone()),
                );
                state.iterator = Some(iterator);
            }
        }
        Ok(())
    }

    fn next(&self, context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>> {
        let table_heap = context.table_heap(self.table_oid)?;
        let mut state = self.state.lock();
        loop {
            let rid = match &mut state.iterator {
                Some(iterator) => iterator.next()?,
                None => state.rids.pop_front(),
            };
            let Some(rid) = rid else {
                return Ok(None);
            };
            let (meta, tuple) = table_heap.full_tuple(rid)?;
            if meta.is_deleted {
                continue;
            }
            return Ok(Some((tuple, rid)));
        }
    }

    fn output_schema(&self) -> SchemaRef {
        self.table_schema.clone()
    }
}

impl std::fmt::Display for PhysicalIndexScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.mode {
            IndexScanMode::PointLookup { pred_keys } => {
                write!(f, "IndexScan(point, {} keys)", pred_keys.len())
            }
            IndexScanMode::Range { .. } => write!(f, "IndexScan(range)"),
        }
    }
}

impl std::fmt::Debug for IndexScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexScanState")
            .field("pending_rids", &self.rids.len())
            .finish()
    }
}
