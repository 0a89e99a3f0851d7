mod binary;
mod column;
mod literal;

pub use binary::{BinaryExpr, BinaryOp};
pub use column::ColumnExpr;
pub use literal::Literal;

use crate::catalog::{Column, DataType, Schema};
use crate::error::BrambleResult;
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;
use crate::utils::table_ref::TableReference;

pub trait ExprTrait {
    /// Data type this expression evaluates to, given the input schema.
    fn data_type(&self, input_schema: &Schema) -> BrambleResult<DataType>;

    /// Whether the result may be null, given the input schema.
    fn nullable(&self, input_schema: &Schema) -> BrambleResult<bool>;

    /// Evaluate against a tuple.
    fn evaluate(&self, tuple: &Tuple) -> BrambleResult<ScalarValue>;

    /// Output column this expression produces.
    fn to_column(&self, input_schema: &Schema) -> BrambleResult<Column>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A named reference to a qualified field.
    Column(ColumnExpr),
    /// A constant value.
    Literal(Literal),
    /// A binary expression such as `a + b` or `a = b`.
    Binary(BinaryExpr),
}

impl ExprTrait for Expr {
    fn data_type(&self, input_schema: &Schema) -> BrambleResult<DataType> {
        match self {
            Expr::Column(e) => e.data_type(input_schema),
            Expr::Literal(e) => e.data_type(input_schema),
            Expr::Binary(e) => e.data_type(input_schema),
        }
    }

    fn nullable(&self, input_schema: &Schema) -> BrambleResult<bool> {
        match self {
            Expr::Column(e) => e.nullable(input_schema),
            Expr::Literal(e) => e.nullable(input_schema),
            Expr::Binary(e) => e.nullable(input_schema),
        }
    }

    fn evaluate(&self, tuple: &Tuple) -> BrambleResult<ScalarValue> {
        match self {
            Expr::Column(e) => e.evaluate(tuple),
            Expr::Literal(e) => e.evaluate(tuple),
            Expr::Binary(e) => e.evaluate(tuple),
        }
    }

    fn to_column(&self, input_schema: &Schema) -> BrambleResult<Column> {
        match self {
            Expr::Column(e) => e.to_column(input_schema),
            Expr::Literal(e) => e.to_column(input_schema),
            Expr::Binary(e) => e.to_column(input_schema),
        }
    }
}

impl Expr {
    pub fn column(relation: Option<TableReference>, name: impl Into<String>) -> Self {
        Expr::Column(ColumnExpr {
            relation,
            name: name.into(),
        })
    }

    pub fn literal(value: impl Into<ScalarValue>) -> Self {
        Expr::Literal(Literal {
            value: value.into(),
        })
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary(BinaryExpr {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Column(e) => write!(f, "{e}"),
            Expr::Literal(e) => write!(f, "{e}"),
            Expr::Binary(e) => write!(f, "{e}"),
        }
    }
}
