use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::SchemaRef;
use crate::error::{BrambleError, BrambleResult};
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::expression::Expr;
use crate::storage::page::{RecordId, INVALID_RID};
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;

use super::{JoinType, PhysicalPlan};

#[derive(Default)]
struct HashJoinState {
    built: bool,
    /// Build-side rows keyed by their composite join key.
    table: HashMap<Vec<ScalarValue>, Vec<Tuple>>,
    /// Matches already produced for the current probe tuple.
    pending: Vec<Tuple>,
}

/// Builds a multi-valued hash table from the right child, then probes it
/// with the left. The key expression lists are aligned pairwise. Supports
/// INNER and LEFT joins.
#[derive(Debug)]
pub struct PhysicalHashJoin {
    pub join_type: JoinType,
    pub left_input: Arc<PhysicalPlan>,
    pub right_input: Arc<PhysicalPlan>,
    pub left_key_exprs: Vec<Expr>,
    pub right_key_exprs: Vec<Expr>,
    pub schema: SchemaRef,

    state: Mutex<HashJoinState>,
}

impl PhysicalHashJoin {
    pub fn new(
        join_type: JoinType,
        left_input: Arc<PhysicalPlan>,
        right_input: Arc<PhysicalPlan>,
        left_key_exprs: Vec<Expr>,
        right_key_exprs: Vec<Expr>,
        schema: SchemaRef,
    ) -> Self {
        debug_assert_eq!(left_key_exprs.len(), right_key_exprs.len());
        PhysicalHashJoin {
            join_type,
            left_input,
            right_input,
            left_key_exprs,
            right_key_exprs,
            schema,
            state: Mutex::new(HashJoinState::default()),
        }
    }

    fn compose_key(
        context: &ExecutionContext,
        exprs: &[Expr],
        tuple: &Tuple,
    ) -> BrambleResult<Vec<ScalarValue>> {
        exprs
            .iter()
            .map(|expr| context.eval_expr(expr, tuple))
            .collect()
    }
}

impl VolcanoExecutor for PhysicalHashJoin {
    fn init(&self, context: &mut ExecutionContext) -> BrambleResult<()> {
        if !matches!(self.join_type, JoinType::Inner | JoinType::LeftOuter) {
            return Err(BrambleError::NotSupport(format!(
                "hash join does not support {} joins",
                self.join_type
            )));
        }
        self.left_input.init(context)?;
        self.right_input.init(context)?;
        *self.state.lock() = HashJoinState::default();
        Ok(())
    }

    fn next(&self, context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>> {
        let mut state = self.state.lock();

        if !state.built {
            // Build phase: drain the right child.
            while let Some((tuple, _)) = self.right_input.next(context)? {
                let key = Self::compose_key(context, &self.right_key_exprs, &tuple)?;
                state.table.entry(key).or_default().push(tuple);
            }
            state.built = true;
        }

        loop {
            if let Some(merged) = state.pending.pop() {
                return Ok(Some((merged, INVALID_RID)));
            }

            let Some((left_tuple, _)) = self.left_input.next(context)? else {
                return Ok(None);
            };
            let key = Self::compose_key(context, &self.left_key_exprs, &left_tuple)?;

            match state.table.get(&key) {
                Some(matches) => {
                    let mut merged_rows = Vec::with_capacity(matches.len());
                    for right_tuple in matches.iter().rev() {
                        merged_rows
                            .push(Tuple::try_merge(vec![left_tuple.clone(), right_tuple.clone()])?);
                    }
                    state.pending = merged_rows;
                }
                None => {
                    if self.join_type == JoinType::LeftOuter {
                        let padded = Tuple::try_merge(vec![
                            left_tuple,
                            Tuple::empty(self.right_input.output_schema()),
                        ])?;
                        return Ok(Some((padded, INVALID_RID)));
                    }
                }
            }
        }
    }

    fn output_schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

impl std::fmt::Display for PhysicalHashJoin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashJoin({})", self.join_type)
    }
}

impl std::fmt::Debug for HashJoinState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashJoinState")
            .field("built", &self.built)
            .field("build_keys", &self.table.len())
            .finish()
    }
}
