use parking_lot::Mutex;

use crate::catalog::SchemaRef;
use crate::error::BrambleResult;
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::expression::{Expr, ExprTrait};
use crate::storage::page::{RecordId, INVALID_RID};
use crate::storage::tuple::{Tuple, EMPTY_TUPLE};

/// Materializes a fixed list of rows, casting each value to its column type.
#[derive(Debug)]
pub struct PhysicalValues {
    pub schema: SchemaRef,
    pub rows: Vec<Vec<Expr>>,

    cursor: Mutex<usize>,
}

impl PhysicalValues {
    pub fn new(schema: SchemaRef, rows: Vec<Vec<Expr>>) -> Self {
        PhysicalValues {
            schema,
            rows,
            cursor: Mutex::new(0),
        }
    }
}

impl VolcanoExecutor for PhysicalValues {
    fn init(&self, _context: &mut ExecutionContext) -> BrambleResult<()> {
        *self.cursor.lock() = 0;
        Ok(())
    }

    fn next(&self, _context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>> {
        let mut cursor = self.cursor.lock();
        if *cursor >= self.rows.len() {
            return Ok(None);
        }
        let exprs = &self.rows[*cursor];
        *cursor += 1;

        let mut values = Vec::with_capacity(exprs.len());
        for (idx, expr) in exprs.iter().enumerate() {
            let value = expr.evaluate(&EMPTY_TUPLE)?;
            let target_type = self.schema.column_with_index(idx)?.data_type;
            values.push(value.cast_to(&target_type)?);
        }
        Ok(Some((Tuple::new(self.schema.clone(), values), INVALID_RID)))
    }

    fn output_schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

impl std::fmt::Display for PhysicalValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Values({} rows)", self.rows.len())
    }
}
