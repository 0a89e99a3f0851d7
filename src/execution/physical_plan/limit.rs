use parking_lot::Mutex;
use std::sync::Arc;

use crate::catalog::SchemaRef;
use crate::error::BrambleResult;
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::storage::page::RecordId;
use crate::storage::tuple::Tuple;

use super::PhysicalPlan;

/// Forwards child tuples until the configured count is reached, after an
/// optional offset.
#[derive(Debug)]
pub struct PhysicalLimit {
    pub limit: Option<usize>,
    pub offset: usize,
    pub input: Arc<PhysicalPlan>,

    produced: Mutex<usize>,
    skipped: Mutex<usize>,
}

impl PhysicalLimit {
    pub fn new(limit: Option<usize>, offset: usize, input: Arc<PhysicalPlan>) -> Self {
        PhysicalLimit {
            limit,
            offset,
            input,
            produced: Mutex::new(0),
            skipped: Mutex::new(0),
        }
    }
}

impl VolcanoExecutor for PhysicalLimit {
    fn init(&self, context: &mut ExecutionContext) -> BrambleResult<()> {
        self.input.init(context)?;
        *self.produced.lock() = 0;
        *self.skipped.lock() = 0;
        Ok(())
    }

    fn next(&self, context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>> {
        if let Some(limit) = self.limit {
            if *self.produced.lock() >= limit {
                return Ok(None);
            }
        }

        loop {
            let Some(entry) = self.input.next(context)? else {
                return Ok(None);
            };
            {
                let mut skipped = self.skipped.lock();
                if *skipped < self.offset {
                    *skipped += 1;
                    continue;
                }
            }
            *self.produced.lock() += 1;
            return Ok(Some(entry));
        }
    }

    fn output_schema(&self) -> SchemaRef {
        self.input.output_schema()
    }
}

impl std::fmt::Display for PhysicalLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Limit(limit: {:?}, offset: {})", self.limit, self.offset)
    }
}
