//! Free-function constructors.
//!
//! Each mirrors a method of [`ExpressionOps`] but takes its first operand in operand position,
//! so `equal("rating", 5)` compares the `rating` field with the literal `5`.

use super::convert::{IntoExpr, IntoOperand, IntoVector};
use super::ops::ExpressionOps;
use super::{
    AggregateFunction, BooleanExpression, Constant, Direction, Expression, Field, FunctionExpr,
    Ordering,
};
use crate::value::ConstantValue;

pub fn field(path: impl Into<String>) -> Field {
    Field::new(path)
}

pub fn constant(value: impl Into<ConstantValue>) -> Constant {
    Constant::new(value)
}

fn variadic(name: &str, conditions: impl IntoIterator<Item = BooleanExpression>) -> BooleanExpression {
    let args: Vec<Expression> = conditions
        .into_iter()
        .map(BooleanExpression::into_inner)
        .collect();
    BooleanExpression::function(name, args)
}

pub fn and(conditions: impl IntoIterator<Item = BooleanExpression>) -> BooleanExpression {
    variadic("and", conditions)
}

pub fn or(conditions: impl IntoIterator<Item = BooleanExpression>) -> BooleanExpression {
    variadic("or", conditions)
}

pub fn xor(conditions: impl IntoIterator<Item = BooleanExpression>) -> BooleanExpression {
    variadic("xor", conditions)
}

pub fn not(condition: BooleanExpression) -> BooleanExpression {
    condition.not()
}

/// `condition ? then : otherwise`
pub fn conditional(
    condition: BooleanExpression,
    then: impl IntoExpr,
    otherwise: impl IntoExpr,
) -> Expression {
    Expression::Function(FunctionExpr::new(
        "conditional",
        vec![condition.into_inner(), then.into_expr(), otherwise.into_expr()],
    ))
}

/// Array built by the `array` function from possibly computed elements.
pub fn array<T: IntoExpr>(elements: impl IntoIterator<Item = T>) -> Expression {
    Expression::Function(FunctionExpr::new(
        "array",
        elements.into_iter().map(IntoExpr::into_expr).collect(),
    ))
}

/// Map built by the `map` function: keys and values alternate in the argument list.
pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Expression
where
    K: Into<String>,
    V: IntoExpr,
{
    let mut args = Vec::new();
    for (key, value) in entries {
        let key: String = key.into();
        args.push(Expression::Constant(Constant::new(key)));
        args.push(value.into_expr());
    }
    Expression::Function(FunctionExpr::new("map", args))
}

pub fn current_timestamp() -> Expression {
    Expression::Function(FunctionExpr::new("current_timestamp", vec![]))
}

pub fn document_id(operand: impl IntoOperand) -> Expression {
    operand.into_operand().document_id()
}

// Comparison

pub fn equal(left: impl IntoOperand, right: impl IntoExpr) -> BooleanExpression {
    left.into_operand().equal(right)
}

pub fn not_equal(left: impl IntoOperand, right: impl IntoExpr) -> BooleanExpression {
    left.into_operand().not_equal(right)
}

pub fn less_than(left: impl IntoOperand, right: impl IntoExpr) -> BooleanExpression {
    left.into_operand().less_than(right)
}

pub fn less_than_or_equal(left: impl IntoOperand, right: impl IntoExpr) -> BooleanExpression {
    left.into_operand().less_than_or_equal(right)
}

pub fn greater_than(left: impl IntoOperand, right: impl IntoExpr) -> BooleanExpression {
    left.into_operand().greater_than(right)
}

pub fn greater_than_or_equal(left: impl IntoOperand, right: impl IntoExpr) -> BooleanExpression {
    left.into_operand().greater_than_or_equal(right)
}

pub fn equal_any(left: impl IntoOperand, values: impl IntoExpr) -> BooleanExpression {
    left.into_operand().equal_any(values)
}

pub fn not_equal_any(left: impl IntoOperand, values: impl IntoExpr) -> BooleanExpression {
    left.into_operand().not_equal_any(values)
}

// Type checks

pub fn exists(operand: impl IntoOperand) -> BooleanExpression {
    operand.into_operand().exists()
}

pub fn is_absent(operand: impl IntoOperand) -> BooleanExpression {
    operand.into_operand().is_absent()
}

pub fn is_null(operand: impl IntoOperand) -> BooleanExpression {
    operand.into_operand().is_null()
}

pub fn is_nan(operand: impl IntoOperand) -> BooleanExpression {
    operand.into_operand().is_nan()
}

pub fn is_error(operand: impl IntoOperand) -> BooleanExpression {
    operand.into_operand().is_error()
}

// Strings

pub fn like(operand: impl IntoOperand, pattern: impl IntoExpr) -> BooleanExpression {
    operand.into_operand().like(pattern)
}

pub fn regex_contains(operand: impl IntoOperand, pattern: impl IntoExpr) -> BooleanExpression {
    operand.into_operand().regex_contains(pattern)
}

pub fn regex_match(operand: impl IntoOperand, pattern: impl IntoExpr) -> BooleanExpression {
    operand.into_operand().regex_match(pattern)
}

pub fn string_contains(operand: impl IntoOperand, substring: impl IntoExpr) -> BooleanExpression {
    operand.into_operand().string_contains(substring)
}

pub fn starts_with(operand: impl IntoOperand, prefix: impl IntoExpr) -> BooleanExpression {
    operand.into_operand().starts_with(prefix)
}

pub fn ends_with(operand: impl IntoOperand, suffix: impl IntoExpr) -> BooleanExpression {
    operand.into_operand().ends_with(suffix)
}

pub fn char_length(operand: impl IntoOperand) -> Expression {
    operand.into_operand().char_length()
}

// Arrays

pub fn array_contains(operand: impl IntoOperand, element: impl IntoExpr) -> BooleanExpression {
    operand.into_operand().array_contains(element)
}

pub fn array_contains_any(operand: impl IntoOperand, values: impl IntoExpr) -> BooleanExpression {
    operand.into_operand().array_contains_any(values)
}

pub fn array_contains_all(operand: impl IntoOperand, values: impl IntoExpr) -> BooleanExpression {
    operand.into_operand().array_contains_all(values)
}

pub fn array_length(operand: impl IntoOperand) -> Expression {
    operand.into_operand().array_length()
}

// Arithmetic

pub fn add(left: impl IntoOperand, right: impl IntoExpr) -> Expression {
    left.into_operand().add(right)
}

pub fn subtract(left: impl IntoOperand, right: impl IntoExpr) -> Expression {
    left.into_operand().subtract(right)
}

pub fn multiply(left: impl IntoOperand, right: impl IntoExpr) -> Expression {
    left.into_operand().multiply(right)
}

pub fn divide(left: impl IntoOperand, right: impl IntoExpr) -> Expression {
    left.into_operand().divide(right)
}

pub fn modulo(left: impl IntoOperand, right: impl IntoExpr) -> Expression {
    left.into_operand().modulo(right)
}

// Vectors

pub fn cosine_distance(operand: impl IntoOperand, other: impl IntoVector) -> Expression {
    operand.into_operand().cosine_distance(other)
}

pub fn dot_product(operand: impl IntoOperand, other: impl IntoVector) -> Expression {
    operand.into_operand().dot_product(other)
}

pub fn euclidean_distance(operand: impl IntoOperand, other: impl IntoVector) -> Expression {
    operand.into_operand().euclidean_distance(other)
}

pub fn vector_length(operand: impl IntoOperand) -> Expression {
    operand.into_operand().vector_length()
}

// Aggregates

pub fn count(operand: impl IntoOperand) -> AggregateFunction {
    operand.into_operand().count()
}

/// Counts every input row.
pub fn count_all() -> AggregateFunction {
    AggregateFunction::new("count", vec![])
}

pub fn count_if(condition: BooleanExpression) -> AggregateFunction {
    condition.count_if()
}

pub fn count_distinct(operand: impl IntoOperand) -> AggregateFunction {
    operand.into_operand().count_distinct()
}

pub fn sum(operand: impl IntoOperand) -> AggregateFunction {
    operand.into_operand().sum()
}

pub fn average(operand: impl IntoOperand) -> AggregateFunction {
    operand.into_operand().average()
}

pub fn minimum(operand: impl IntoOperand) -> AggregateFunction {
    operand.into_operand().minimum()
}

pub fn maximum(operand: impl IntoOperand) -> AggregateFunction {
    operand.into_operand().maximum()
}

// Orderings

pub fn ascending(operand: impl IntoOperand) -> Ordering {
    Ordering::new(operand, Direction::Ascending)
}

pub fn descending(operand: impl IntoOperand) -> Ordering {
    Ordering::new(operand, Direction::Descending)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_functions_match_methods() {
        assert_eq!(equal("rating", 5), field("rating").equal(5));
        assert_eq!(exists("tags"), field("tags").exists());
        assert_eq!(sum("price"), field("price").sum());
        assert_eq!(ascending("title"), field("title").ascending());
        assert_eq!(
            cosine_distance("embedding", vec![0.5, 0.5]),
            field("embedding").cosine_distance(vec![0.5, 0.5])
        );
    }

    #[test]
    fn test_free_function_accepts_expression_operand() {
        let cond = greater_than(field("a").add(1), 10);
        match cond.inner() {
            Expression::Function(f) => {
                assert_eq!(f.name(), "greater_than");
                assert!(matches!(&f.args()[0], Expression::Function(inner) if inner.name() == "add"));
            }
            other => panic!("Expected Function, got {:?}", other),
        }
    }

    #[test]
    fn test_logical_combinators() {
        let cond = and([exists("a"), or([equal("b", 1), equal("b", 2)])]);
        match cond.inner() {
            Expression::Function(f) => {
                assert_eq!(f.name(), "and");
                assert_eq!(f.args().len(), 2);
            }
            other => panic!("Expected Function, got {:?}", other),
        }

        let negated = not(exists("a"));
        assert!(matches!(negated.inner(), Expression::Function(f) if f.name() == "not"));
    }

    #[test]
    fn test_map_function_alternates_keys_and_values() {
        let expr = map([("a", field("x").into_expr()), ("b", 2i64.into_expr())]);
        match expr {
            Expression::Function(f) => {
                assert_eq!(f.name(), "map");
                assert_eq!(f.args().len(), 4);
                assert_eq!(f.args()[0], constant("a").into());
            }
            other => panic!("Expected Function, got {:?}", other),
        }
    }

    #[test]
    fn test_count_all_has_no_arguments() {
        assert!(count_all().args().is_empty());
        assert_eq!(count_all().name(), "count");
    }

    #[test]
    fn test_conditional() {
        let expr = conditional(greater_than("stock", 0), "in stock", "sold out");
        match expr {
            Expression::Function(f) => {
                assert_eq!(f.name(), "conditional");
                assert_eq!(f.args()[1], constant("in stock").into());
            }
            other => panic!("Expected Function, got {:?}", other),
        }
    }
}
