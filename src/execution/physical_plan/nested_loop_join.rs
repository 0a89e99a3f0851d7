use parking_lot::Mutex;
use std::sync::Arc;

use crate::catalog::SchemaRef;
use crate::error::{BrambleError, BrambleResult};
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::expression::Expr;
use crate::storage::page::{RecordId, INVALID_RID};
use crate::storage::tuple::Tuple;

use super::{JoinType, PhysicalPlan};

#[derive(Debug, Default)]
struct NestedLoopJoinState {
    left_tuple: Option<Tuple>,
    /// Whether the current left tuple matched at least one right tuple.
    left_matched: bool,
}

/// For each outer tuple, re-initializes and drains the inner child,
/// evaluating the join predicate on the merged row. Supports INNER and LEFT
/// joins; a LEFT join pads unmatched outers with nulls.
#[derive(Debug)]
pub struct PhysicalNestedLoopJoin {
    pub join_type: JoinType,
    pub condition: Option<Expr>,
    pub left_input: Arc<PhysicalPlan>,
    pub right_input: Arc<PhysicalPlan>,
    pub schema: SchemaRef,

    state: Mutex<NestedLoopJoinState>,
}

impl PhysicalNestedLoopJoin {
    pub fn new(
        join_type: JoinType,
        condition: Option<Expr>,
        left_input: Arc<PhysicalPlan>,
        right_input: Arc<PhysicalPlan>,
        schema: SchemaRef,
    ) -> Self {
        PhysicalNestedLoopJoin {
            join_type,
            condition,
            left_input,
            right_input,
            schema,
            state: Mutex::new(NestedLoopJoinState::default()),
        }
    }

    fn null_padded_right(&self) -> Tuple {
        Tuple::empty(self.right_input.output_schema())
    }
}

impl VolcanoExecutor for PhysicalNestedLoopJoin {
    fn init(&self, context: &mut ExecutionContext) -> BrambleResult<()> {
        if !matches!(self.join_type, JoinType::Inner | JoinType::LeftOuter) {
            return Err(BrambleError::NotSupport(format!(
                "nested loop join does not support {} joins",
                self.join_type
            )));
        }
        self.left_input.init(context)?;
        self.right_input.init(context)?;
        *self.state.lock() = NestedLoopJoinState::default();
        Ok(())
    }

    fn next(&self, context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>> {
        let mut state = self.state.lock();
        loop {
            let left_tuple = match &state.left_tuple {
                Some(tuple) => tuple.clone(),
                None => match self.left_input.next(context)? {
                    Some((tuple, _)) => {
                        state.left_tuple = Some(tuple.clone());
                        state.left_matched = false;
                        self.right_input.init(context)?;
                        tuple
                    }
                    None => return Ok(None),
                },
            };

            while let Some((right_tuple, _)) = self.right_input.next(context)? {
                let merged = Tuple::try_merge(vec![left_tuple.clone(), right_tuple])?;
                let accepted = match &self.condition {
                    Some(condition) => context.eval_predicate(condition, &merged)?,
                    None => true,
                };
                if accepted {
                    state.left_matched = true;
                    return Ok(Some((merged, INVALID_RID)));
                }
            }

            // Inner side exhausted for this outer tuple.
            let unmatched = !state.left_matched;
            state.left_tuple = None;
            if self.join_type == JoinType::LeftOuter && unmatched {
                let padded = Tuple::try_merge(vec![left_tuple, self.null_padded_right()])?;
                return Ok(Some((padded, INVALID_RID)));
            }
        }
    }

    fn output_schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

impl std::fmt::Display for PhysicalNestedLoopJoin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NestedLoopJoin({})", self.join_type)
    }
}
