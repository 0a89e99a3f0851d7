use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::catalog::SchemaRef;
use crate::error::{BrambleError, BrambleResult};
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::expression::Expr;
use crate::storage::page::{RecordId, INVALID_RID};
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;

use super::PhysicalPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
}

/// One aggregate column in the output: a function plus its argument.
/// `COUNT(*)` takes no argument.
#[derive(Debug, Clone)]
pub struct AggregateExpr {
    pub func: AggregateFunction,
    pub expr: Option<Expr>,
}

impl AggregateExpr {
    pub fn count_star() -> Self {
        Self {
            func: AggregateFunction::CountStar,
            expr: None,
        }
    }

    pub fn new(func: AggregateFunction, expr: Expr) -> Self {
        debug_assert!(func != AggregateFunction::CountStar);
        Self {
            func,
            expr: Some(expr),
        }
    }

    fn initial_value(&self) -> ScalarValue {
        match self.func {
            AggregateFunction::CountStar => ScalarValue::Int64(Some(0)),
            AggregateFunction::Count => ScalarValue::Int64(Some(0)),
            // NULL until the first non-null input arrives.
            AggregateFunction::Sum | AggregateFunction::Min | AggregateFunction::Max => {
                ScalarValue::Int64(None)
            }
        }
    }

    fn combine(&self, accumulator: &ScalarValue, input: &ScalarValue) -> BrambleResult<ScalarValue> {
        match self.func {
            AggregateFunction::CountStar => {
                accumulator.wrapping_add(ScalarValue::Int64(Some(1)))
            }
            AggregateFunction::Count => {
                if input.is_null() {
                    Ok(accumulator.clone())
                } else {
                    accumulator.wrapping_add(ScalarValue::Int64(Some(1)))
                }
            }
            AggregateFunction::Sum => {
                if input.is_null() {
                    Ok(accumulator.clone())
                } else if accumulator.is_null() {
                    Ok(input.clone())
                } else {
                    accumulator.wrapping_add(input.clone())
                }
            }
            AggregateFunction::Min => {
                if input.is_null() {
                    Ok(accumulator.clone())
                } else if accumulator.is_null() {
                    Ok(input.clone())
                } else if input < accumulator {
                    Ok(input.clone())
                } else {
                    Ok(accumulator.clone())
                }
            }
            AggregateFunction::Max => {
                if input.is_null() {
                    Ok(accumulator.clone())
                } else if accumulator.is_null() {
                    Ok(input.clone())
                } else if input > accumulator {
                    Ok(input.clone())
                } else {
                    Ok(accumulator.clone())
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct AggregateState {
    built: bool,
    /// Group key paired with its parallel accumulators; insertion-ordered so
    /// output is deterministic.
    groups: Vec<(Vec<ScalarValue>, Vec<ScalarValue>)>,
    output: VecDeque<Tuple>,
}

/// Hash aggregation keyed by the group-by vector. With no group-by columns
/// the initial-value row is inserted up front, so aggregating an empty input
/// still yields one row (e.g. `COUNT(*)` returns 0).
#[derive(Debug)]
pub struct PhysicalAggregate {
    pub input: Arc<PhysicalPlan>,
    pub group_by_exprs: Vec<Expr>,
    pub aggregate_exprs: Vec<AggregateExpr>,
    pub schema: SchemaRef,

    state: Mutex<AggregateState>,
}

impl PhysicalAggregate {
    pub fn new(
        input: Arc<PhysicalPlan>,
        group_by_exprs: Vec<Expr>,
        aggregate_exprs: Vec<AggregateExpr>,
        schema: SchemaRef,
    ) -> Self {
        PhysicalAggregate {
            input,
            group_by_exprs,
            aggregate_exprs,
            schema,
            state: Mutex::new(AggregateState::default()),
        }
    }

    fn initial_accumulators(&self) -> Vec<ScalarValue> {
        self.aggregate_exprs
            .iter()
            .map(|agg| agg.initial_value())
            .collect()
    }

    fn insert_combine(
        &self,
        state: &mut AggregateState,
        key: Vec<ScalarValue>,
        context: &ExecutionContext,
        tuple: &Tuple,
    ) -> BrambleResult<()> {
        let pos = match state.groups.iter().position(|(k, _)| *k == key) {
            Some(pos) => pos,
            None => {
                state.groups.push((key, self.initial_accumulators()));
                state.groups.len() - 1
            }
        };
        let slot = &mut state.groups[pos].1;
        for (accumulator, agg) in slot.iter_mut().zip(self.aggregate_exprs.iter()) {
            let input_value = match &agg.expr {
                Some(expr) => context.eval_expr(expr, tuple)?,
                None => ScalarValue::Int64(Some(1)),
            };
            *accumulator = agg.combine(accumulator, &input_value)?;
        }
        Ok(())
    }
}

impl VolcanoExecutor for PhysicalAggregate {
    fn init(&self, context: &mut ExecutionContext) -> BrambleResult<()> {
        self.input.init(context)?;
        *self.state.lock() = AggregateState::default();
        Ok(())
    }

    fn next(&self, context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>> {
        let mut state = self.state.lock();

        if !state.built {
            while let Some((tuple, _)) = self.input.next(context)? {
                let key = self
                    .group_by_exprs
                    .iter()
                    .map(|expr| context.eval_expr(expr, &tuple))
                    .collect::<BrambleResult<Vec<ScalarValue>>>()?;
                self.insert_combine(&mut state, key, context, &tuple)?;
            }

            if state.groups.is_empty() && self.group_by_exprs.is_empty() {
                state.groups.push((vec![], self.initial_accumulators()));
            }

            let expected = self.schema.column_count();
            let groups = std::mem::take(&mut state.groups);
            for (key, accumulators) in groups {
                let mut data = key;
                data.extend(accumulators);
                if data.len() != expected {
                    return Err(BrambleError::Execution(format!(
                        "aggregation produced {} columns but schema has {}",
                        data.len(),
                        expected
                    )));
                }
                // Null accumulators still need the schema's column types.
                let data = data
                    .into_iter()
                    .zip(self.schema.columns.iter())
                    .map(|(value, col)| {
                        if value.is_null() {
                            Ok(ScalarValue::new_empty(col.data_type))
                        } else {
                            value.cast_to(&col.data_type)
                        }
                    })
                    .collect::<BrambleResult<Vec<ScalarValue>>>()?;
                state.output.push_back(Tuple::new(self.schema.clone(), data));
            }
            state.built = true;
        }

        Ok(state.output.pop_front().map(|tuple| (tuple, INVALID_RID)))
    }

    fn output_schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

impl std::fmt::Display for PhysicalAggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Aggregate(groups: {}, aggregates: {})",
            self.group_by_exprs.len(),
            self.aggregate_exprs.len()
        )
    }
}
