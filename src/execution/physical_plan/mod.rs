mod aggregate;
mod delete;
mod hash_join;
mod index_scan;
mod insert;
mod limit;
mod nested_index_join;
mod nested_loop_join;
mod seq_scan;
mod sort;
mod update;
mod values;

pub use aggregate::{AggregateExpr, AggregateFunction, PhysicalAggregate};
pub use delete::PhysicalDelete;
pub use hash_join::PhysicalHashJoin;
pub use index_scan::{IndexScanMode, PhysicalIndexScan};
pub use insert::PhysicalInsert;
pub use limit::PhysicalLimit;
pub use nested_index_join::PhysicalNestedIndexJoin;
pub use nested_loop_join::PhysicalNestedLoopJoin;
pub use seq_scan::PhysicalSeqScan;
pub use sort::{MergeSortRun, OrderByExpr, PhysicalExternalMergeSort};
pub use update::PhysicalUpdate;
pub use values::PhysicalValues;

use crate::catalog::SchemaRef;
use crate::storage::page::RecordId;
use crate::storage::tuple::Tuple;
use crate::{
    error::BrambleResult,
    execution::{ExecutionContext, VolcanoExecutor},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
}

impl std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug)]
pub enum PhysicalPlan {
    Values(PhysicalValues),
    SeqScan(PhysicalSeqScan),
    IndexScan(PhysicalIndexScan),
    Insert(PhysicalInsert),
    Update(PhysicalUpdate),
    Delete(PhysicalDelete),
    NestedLoopJoin(PhysicalNestedLoopJoin),
    HashJoin(PhysicalHashJoin),
    NestedIndexJoin(PhysicalNestedIndexJoin),
    Aggregate(PhysicalAggregate),
    Limit(PhysicalLimit),
    Sort(PhysicalExternalMergeSort),
}

impl PhysicalPlan {
    pub fn inputs(&self) -> Vec<&PhysicalPlan> {
        match self {
            PhysicalPlan::Insert(PhysicalInsert { input, .. }) => vec![input],
            PhysicalPlan::Update(PhysicalUpdate { input, .. }) => vec![input],
            PhysicalPlan::Delete(PhysicalDelete { input, .. }) => vec![input],
            PhysicalPlan::Limit(PhysicalLimit { input, .. }) => vec![input],
            PhysicalPlan::Sort(PhysicalExternalMergeSort { input, .. }) => vec![input],
            PhysicalPlan::Aggregate(PhysicalAggregate { input, .. }) => vec![input],
            PhysicalPlan::NestedLoopJoin(PhysicalNestedLoopJoin {
                left_input,
                right_input,
                ..
            }) => vec![left_input, right_input],
            PhysicalPlan::HashJoin(PhysicalHashJoin {
                left_input,
                right_input,
                ..
            }) => vec![left_input, right_input],
            PhysicalPlan::NestedIndexJoin(PhysicalNestedIndexJoin { left_input, .. }) => {
                vec![left_input]
            }
            PhysicalPlan::Values(_) | PhysicalPlan::SeqScan(_) | PhysicalPlan::IndexScan(_) => {
                vec![]
            }
        }
    }
}

impl VolcanoExecutor for PhysicalPlan {
    fn init(&self, context: &mut ExecutionContext) -> BrambleResult<()> {
        match self {
            PhysicalPlan::Values(op) => op.init(context),
            PhysicalPlan::SeqScan(op) => op.init(context),
            PhysicalPlan::IndexScan(op) => op.init(context),
            PhysicalPlan::Insert(op) => op.init(context),
            PhysicalPlan::Update(op) => op.init(context),
            PhysicalPlan::Delete(op) => op.init(context),
            PhysicalPlan::NestedLoopJoin(op) => op.init(context),
            PhysicalPlan::HashJoin(op) => op.init(context),
            PhysicalPlan::NestedIndexJoin(op) => op.init(context),
            PhysicalPlan::Aggregate(op) => op.init(context),
            PhysicalPlan::Limit(op) => op.init(context),
            PhysicalPlan::Sort(op) => op.init(context),
        }
    }

    fn next(&self, context: &mut ExecutionContext) -> BrambleResult<Option<(Tuple, RecordId)>> {
        match self {
            PhysicalPlan::Values(op) => op.next(context),
            PhysicalPlan::SeqScan(op) => op.next(context),
            PhysicalPlan::IndexScan(op) => op.next(context),
            PhysicalPlan::Insert(op) => op.next(context),
            PhysicalPlan::Update(op) => op.next(context),
            PhysicalPlan::Delete(op) => op.next(context),
            PhysicalPlan::NestedLoopJoin(op) => op.next(context),
            PhysicalPlan::HashJoin(op) => op.next(context),
            PhysicalPlan::NestedIndexJoin(op) => op.next(context),
            PhysicalPlan::Aggregate(op) => op.next(context),
            PhysicalPlan::Limit(op) => op.next(context),
            PhysicalPlan::Sort(op) => op.next(context),
        }
    }

    fn output_schema(&self) -> SchemaRef {
        match self {
            Self::Values(op) => op.output_schema(),
            Self::SeqScan(op) => op.output_schema(),
            Self::IndexScan(op) => op.output_schema(),
            Self::Insert(op) => op.output_schema(),
            Self::Update(op) => op.output_schema(),
            Self::Delete(op) => op.output_schema(),
            Self::NestedLoopJoin(op) => op.output_schema(),
            Self::HashJoin(op) => op.output_schema(),
            Self::NestedIndexJoin(op) => op.output_schema(),
            Self::Aggregate(op) => op.output_schema(),
            Self::Limit(op) => op.output_schema(),
            Self::Sort(op) => op.output_schema(),
        }
    }
}

impl std::fmt::Display for PhysicalPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Values(op) => write!(f, "{op}"),
            Self::SeqScan(op) => write!(f, "{op}"),
            Self::IndexScan(op) => write!(f, "{op}"),
            Self::Insert(op) => write!(f, "{op}"),
            Self::Update(op) => write!(f, "{op}"),
            Self::Delete(op) => write!(f, "{op}"),
            Self::NestedLoopJoin(op) => write!(f, "{op}"),
            Self::HashJoin(op) => write!(f, "{op}"),
            Self::NestedIndexJoin(op) => write!(f, "{op}"),
            Self::Aggregate(op) => write!(f, "{op}"),
            Self::Limit(op) => write!(f, "{op}"),
            Self::Sort(op) => write!(f, "{op}"),
        }
    }
}
