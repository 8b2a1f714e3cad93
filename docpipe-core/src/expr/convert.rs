//! Operand normalization.
//!
//! Two positions exist. In *operand* position (the left side of an operator, a field
//! argument) a string names a field. In *value* position (the right side of an operator) a
//! string is a string literal. In both positions an expression passes through untouched and
//! any other literal becomes a constant.

use chrono::{DateTime, Utc};

use super::{BooleanExpression, Constant, Expression, Field, FunctionExpr};
use crate::reference::DocumentReference;
use crate::value::{ConstantValue, FieldTransform, GeoPoint, Timestamp, VectorValue};
use crate::wire::WireValue;

/// Value position: literals become constants.
pub trait IntoExpr {
    fn into_expr(self) -> Expression;
}

/// Operand position: strings name fields.
pub trait IntoOperand {
    fn into_operand(self) -> Expression;
}

/// Vector operands: expressions pass through, raw numbers become a vector constant.
pub trait IntoVector {
    fn into_vector_expr(self) -> Expression;
}

macro_rules! expression_like {
    ($($t:ty),*) => {
        $(
            impl IntoExpr for $t {
                fn into_expr(self) -> Expression {
                    Expression::from(self)
                }
            }

            impl IntoOperand for $t {
                fn into_operand(self) -> Expression {
                    Expression::from(self)
                }
            }

            impl IntoVector for $t {
                fn into_vector_expr(self) -> Expression {
                    Expression::from(self)
                }
            }
        )*
    };
}

expression_like!(Expression, Field, Constant, FunctionExpr, BooleanExpression);

macro_rules! literal {
    ($($t:ty),*) => {
        $(
            impl IntoExpr for $t {
                fn into_expr(self) -> Expression {
                    Expression::Constant(Constant::new(self))
                }
            }

            impl IntoOperand for $t {
                fn into_operand(self) -> Expression {
                    Expression::Constant(Constant::new(self))
                }
            }
        )*
    };
}

literal!(
    bool,
    i32,
    i64,
    u32,
    f32,
    f64,
    ConstantValue,
    Timestamp,
    DateTime<Utc>,
    GeoPoint,
    DocumentReference,
    FieldTransform,
    WireValue,
    serde_json::Value
);

impl IntoExpr for &str {
    fn into_expr(self) -> Expression {
        Expression::Constant(Constant::new(self))
    }
}

impl IntoExpr for String {
    fn into_expr(self) -> Expression {
        Expression::Constant(Constant::new(self))
    }
}

impl IntoOperand for &str {
    fn into_operand(self) -> Expression {
        Expression::Field(Field::new(self))
    }
}

impl IntoOperand for String {
    fn into_operand(self) -> Expression {
        Expression::Field(Field::new(self))
    }
}

impl IntoOperand for &String {
    fn into_operand(self) -> Expression {
        Expression::Field(Field::new(self.as_str()))
    }
}

impl IntoExpr for VectorValue {
    fn into_expr(self) -> Expression {
        Expression::Constant(Constant::new(self))
    }
}

impl<T: IntoExpr> IntoExpr for Option<T> {
    fn into_expr(self) -> Expression {
        match self {
            Some(v) => v.into_expr(),
            None => Expression::Constant(Constant::new(ConstantValue::Null)),
        }
    }
}

/// All-constant arrays stay constants; anything computed makes a list expression.
fn array_expr(items: Vec<Expression>) -> Expression {
    let constants: Option<Vec<ConstantValue>> = items
        .iter()
        .map(|item| match item {
            Expression::Constant(c) => Some(c.value().clone()),
            _ => None,
        })
        .collect();

    match constants {
        Some(values) => Expression::Constant(Constant::new(ConstantValue::Array(values))),
        None => Expression::List(items),
    }
}

impl<T: IntoExpr> IntoExpr for Vec<T> {
    fn into_expr(self) -> Expression {
        array_expr(self.into_iter().map(IntoExpr::into_expr).collect())
    }
}

impl<T: IntoExpr, const N: usize> IntoExpr for [T; N] {
    fn into_expr(self) -> Expression {
        array_expr(self.into_iter().map(IntoExpr::into_expr).collect())
    }
}

impl<T: IntoExpr> IntoOperand for Vec<T> {
    fn into_operand(self) -> Expression {
        self.into_expr()
    }
}

impl<T: IntoExpr, const N: usize> IntoOperand for [T; N] {
    fn into_operand(self) -> Expression {
        self.into_expr()
    }
}

fn vector_constant(values: Vec<f64>) -> Expression {
    Expression::Constant(Constant::new(VectorValue::new(values)))
}

impl IntoVector for VectorValue {
    fn into_vector_expr(self) -> Expression {
        Expression::Constant(Constant::new(self))
    }
}

impl IntoVector for Vec<f64> {
    fn into_vector_expr(self) -> Expression {
        vector_constant(self)
    }
}

impl IntoVector for &[f64] {
    fn into_vector_expr(self) -> Expression {
        vector_constant(self.to_vec())
    }
}

impl<const N: usize> IntoVector for [f64; N] {
    fn into_vector_expr(self) -> Expression {
        vector_constant(self.to_vec())
    }
}

impl IntoVector for &str {
    fn into_vector_expr(self) -> Expression {
        Expression::Field(Field::new(self))
    }
}
