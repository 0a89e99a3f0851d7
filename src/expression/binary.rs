use crate::catalog::Schema;
use crate::catalog::{Column, DataType};
use crate::error::BrambleError;
use crate::error::BrambleResult;
use crate::expression::{Expr, ExprTrait};
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;
use std::cmp::Ordering;

fn numeric_binary_op<F>(left: ScalarValue, right: ScalarValue, op: F) -> BrambleResult<ScalarValue>
where
    F: Fn(ScalarValue, ScalarValue) -> BrambleResult<ScalarValue>,
{
    let coercion_type =
        DataType::comparison_numeric_coercion(&left.data_type(), &right.data_type())?;
    let l_cast = left.cast_to(&coercion_type)?;
    let r_cast = right.cast_to(&coercion_type)?;
    op(l_cast, r_cast)
}

/// Binary expression
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BinaryExpr {
    /// Left-hand side of the expression
    pub left: Box<Expr>,
    /// The comparison operator
    pub op: BinaryOp,
    /// Right-hand side of the expression
    pub right: Box<Expr>,
}

impl ExprTrait for BinaryExpr {
    fn data_type(&self, input_schema: &Schema) -> BrambleResult<DataType> {
        let left_type = self.left.data_type(input_schema)?;
        let right_type = self.right.data_type(input_schema)?;
        match self.op {
            BinaryOp::Gt
            | BinaryOp::Lt
            | BinaryOp::GtEq
            | BinaryOp::LtEq
            | BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::And
            | BinaryOp::Or => Ok(DataType::Boolean),
            BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Multiply | BinaryOp::Divide => {
                DataType::comparison_numeric_coercion(&left_type, &right_type)
            }
        }
    }

    fn nullable(&self, input_schema: &Schema) -> BrambleResult<bool> {
        Ok(self.left.nullable(input_schema)? || self.right.nullable(input_schema)?)
    }

    fn evaluate(&self, tuple: &Tuple) -> BrambleResult<ScalarValue> {
        let l = self.left.evaluate(tuple)?;
        let r = self.right.evaluate(tuple)?;
        match self.op {
            BinaryOp::Gt => evaluate_comparison(l, r, &[Ordering::Greater]),
            BinaryOp::Lt => evaluate_comparison(l, r, &[Ordering::Less]),
            BinaryOp::GtEq => evaluate_comparison(l, r, &[Ordering::Greater, Ordering::Equal]),
            BinaryOp::LtEq => evaluate_comparison(l, r, &[Ordering::Less, Ordering::Equal]),
            BinaryOp::Eq => evaluate_comparison(l, r, &[Ordering::Equal]),
            BinaryOp::NotEq => evaluate_comparison(l, r, &[Ordering::Greater, Ordering::Less]),
            BinaryOp::And => {
                let l_bool = l.as_boolean()?;
                let r_bool = r.as_boolean()?;
                Ok(ScalarValue::Boolean(Some(
                    l_bool.unwrap_or(false) && r_bool.unwrap_or(false),
                )))
            }
            BinaryOp::Or => {
                let l_bool = l.as_boolean()?;
                let r_bool = r.as_boolean()?;
                Ok(ScalarValue::Boolean(Some(
                    l_bool.unwrap_or(false) || r_bool.unwrap_or(false),
                )))
            }
            BinaryOp::Plus => numeric_binary_op(l, r, |a, b| a.wrapping_add(b)),
            BinaryOp::Minus => numeric_binary_op(l, r, |a, b| a.wrapping_sub(b)),
            BinaryOp::Multiply => numeric_binary_op(l, r, |a, b| a.wrapping_mul(b)),
            BinaryOp::Divide => numeric_binary_op(l, r, |a, b| a.wrapping_div(b)),
        }
    }

    fn to_column(&self, input_schema: &Schema) -> BrambleResult<Column> {
        Ok(Column::new(
            format!("{self}"),
            self.data_type(input_schema)?,
            self.nullable(input_schema)?,
        ))
    }
}

fn evaluate_comparison(
    left: ScalarValue,
    right: ScalarValue,
    accepted_orderings: &[Ordering],
) -> BrambleResult<ScalarValue> {
    if left.is_null() || right.is_null() {
        return Ok(ScalarValue::Boolean(None));
    }
    let coercion_type =
        DataType::comparison_numeric_coercion(&left.data_type(), &right.data_type())?;
    let order = left
        .cast_to(&coercion_type)?
        .partial_cmp(&right.cast_to(&coercion_type)?)
        .ok_or(BrambleError::Execution(format!(
            "Can not compare {:?} and {:?}",
            left, right
        )))?;
    Ok(ScalarValue::Boolean(Some(
        accepted_orderings.contains(&order),
    )))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Hash)]
pub enum BinaryOp {
    Plus,
    Minus,
    Multiply,
    Divide,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Eq,
    NotEq,
    And,
    Or,
}

impl std::fmt::Display for BinaryExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {} {})", self.left, self.op, self.right)
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, Schema};
    use std::sync::Arc;

    #[test]
    fn comparisons_coerce_numeric_types() {
        let schema = Arc::new(Schema::new(vec![
            Column::new("a", DataType::Int8, false),
            Column::new("b", DataType::Int64, false),
        ]));
        let tuple = Tuple::new(schema, vec![5i8.into(), 5i64.into()]);

        let expr = Expr::binary(Expr::column(None, "a"), BinaryOp::Eq, Expr::column(None, "b"));
        assert_eq!(
            expr.evaluate(&tuple).unwrap(),
            ScalarValue::Boolean(Some(true))
        );
    }

    #[test]
    fn comparison_with_null_is_null() {
        let schema = Arc::new(Schema::new(vec![Column::new("a", DataType::Int32, true)]));
        let tuple = Tuple::new(schema, vec![ScalarValue::Int32(None)]);

        let expr = Expr::binary(Expr::column(None, "a"), BinaryOp::Eq, Expr::literal(3i32));
        assert_eq!(expr.evaluate(&tuple).unwrap(), ScalarValue::Boolean(None));
    }

    #[test]
    fn or_of_equalities() {
        let schema = Arc::new(Schema::new(vec![Column::new("a", DataType::Int32, false)]));
        let tuple = Tuple::new(schema, vec![11i32.into()]);

        let expr = Expr::binary(
            Expr::binary(Expr::column(None, "a"), BinaryOp::Eq, Expr::literal(7i32)),
            BinaryOp::Or,
            Expr::binary(Expr::column(None, "a"), BinaryOp::Eq, Expr::literal(11i32)),
        );
        assert_eq!(
            expr.evaluate(&tuple).unwrap(),
            ScalarValue::Boolean(Some(true))
        );
    }
}
