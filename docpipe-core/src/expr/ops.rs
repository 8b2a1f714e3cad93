//! Chained operators available on every expression-like value.

use super::convert::{IntoExpr, IntoVector};
use super::{
    AggregateFunction, AliasedExpression, BooleanExpression, Constant, Direction, Expression,
    FunctionExpr, Ordering,
};

/// Units accepted by `timestamp_add` / `timestamp_subtract`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Microsecond,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Microsecond => "microsecond",
            TimeUnit::Millisecond => "millisecond",
            TimeUnit::Second => "second",
            TimeUnit::Minute => "minute",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
        }
    }
}

fn call(name: &str, args: Vec<Expression>) -> Expression {
    Expression::Function(FunctionExpr::new(name, args))
}

fn predicate(name: &str, args: Vec<Expression>) -> BooleanExpression {
    BooleanExpression::function(name, args)
}

fn with_rest<T: IntoExpr>(first: Expression, rest: impl IntoIterator<Item = T>) -> Vec<Expression> {
    std::iter::once(first)
        .chain(rest.into_iter().map(IntoExpr::into_expr))
        .collect()
}

/// Operator methods. Implemented for everything convertible into an [`Expression`].
pub trait ExpressionOps: Into<Expression> + Sized {
    // Arithmetic

    fn add(self, other: impl IntoExpr) -> Expression {
        call("add", vec![self.into(), other.into_expr()])
    }

    fn subtract(self, other: impl IntoExpr) -> Expression {
        call("subtract", vec![self.into(), other.into_expr()])
    }

    fn multiply(self, other: impl IntoExpr) -> Expression {
        call("multiply", vec![self.into(), other.into_expr()])
    }

    fn divide(self, other: impl IntoExpr) -> Expression {
        call("divide", vec![self.into(), other.into_expr()])
    }

    fn modulo(self, other: impl IntoExpr) -> Expression {
        call("mod", vec![self.into(), other.into_expr()])
    }

    fn pow(self, exponent: impl IntoExpr) -> Expression {
        call("pow", vec![self.into(), exponent.into_expr()])
    }

    fn abs(self) -> Expression {
        call("abs", vec![self.into()])
    }

    fn ceil(self) -> Expression {
        call("ceil", vec![self.into()])
    }

    fn floor(self) -> Expression {
        call("floor", vec![self.into()])
    }

    fn round(self) -> Expression {
        call("round", vec![self.into()])
    }

    fn sqrt(self) -> Expression {
        call("sqrt", vec![self.into()])
    }

    fn exp(self) -> Expression {
        call("exp", vec![self.into()])
    }

    fn ln(self) -> Expression {
        call("ln", vec![self.into()])
    }

    fn log10(self) -> Expression {
        call("log10", vec![self.into()])
    }

    // Comparison

    fn equal(self, other: impl IntoExpr) -> BooleanExpression {
        predicate("equal", vec![self.into(), other.into_expr()])
    }

    fn not_equal(self, other: impl IntoExpr) -> BooleanExpression {
        predicate("not_equal", vec![self.into(), other.into_expr()])
    }

    fn less_than(self, other: impl IntoExpr) -> BooleanExpression {
        predicate("less_than", vec![self.into(), other.into_expr()])
    }

    fn less_than_or_equal(self, other: impl IntoExpr) -> BooleanExpression {
        predicate("less_than_or_equal", vec![self.into(), other.into_expr()])
    }

    fn greater_than(self, other: impl IntoExpr) -> BooleanExpression {
        predicate("greater_than", vec![self.into(), other.into_expr()])
    }

    fn greater_than_or_equal(self, other: impl IntoExpr) -> BooleanExpression {
        predicate("greater_than_or_equal", vec![self.into(), other.into_expr()])
    }

    /// True when the value equals any element of `values` (an array literal or expression).
    fn equal_any(self, values: impl IntoExpr) -> BooleanExpression {
        predicate("equal_any", vec![self.into(), values.into_expr()])
    }

    fn not_equal_any(self, values: impl IntoExpr) -> BooleanExpression {
        predicate("not_equal_any", vec![self.into(), values.into_expr()])
    }

    // Type checks

    fn exists(self) -> BooleanExpression {
        predicate("exists", vec![self.into()])
    }

    fn is_absent(self) -> BooleanExpression {
        predicate("is_absent", vec![self.into()])
    }

    fn is_null(self) -> BooleanExpression {
        predicate("is_null", vec![self.into()])
    }

    fn is_not_null(self) -> BooleanExpression {
        predicate("is_not_null", vec![self.into()])
    }

    fn is_nan(self) -> BooleanExpression {
        predicate("is_nan", vec![self.into()])
    }

    fn is_not_nan(self) -> BooleanExpression {
        predicate("is_not_nan", vec![self.into()])
    }

    fn is_error(self) -> BooleanExpression {
        predicate("is_error", vec![self.into()])
    }

    /// Value to use when evaluating this expression errors.
    fn if_error(self, catch: impl IntoExpr) -> Expression {
        call("if_error", vec![self.into(), catch.into_expr()])
    }

    /// Value to use when this expression is absent.
    fn if_absent(self, otherwise: impl IntoExpr) -> Expression {
        call("if_absent", vec![self.into(), otherwise.into_expr()])
    }

    /// Declares the expression boolean-valued (e.g. a flag field) so it can be used as a condition.
    fn as_boolean(self) -> BooleanExpression {
        BooleanExpression::wrap(self)
    }

    // Strings

    fn char_length(self) -> Expression {
        call("char_length", vec![self.into()])
    }

    fn byte_length(self) -> Expression {
        call("byte_length", vec![self.into()])
    }

    fn like(self, pattern: impl IntoExpr) -> BooleanExpression {
        predicate("like", vec![self.into(), pattern.into_expr()])
    }

    fn regex_contains(self, pattern: impl IntoExpr) -> BooleanExpression {
        predicate("regex_contains", vec![self.into(), pattern.into_expr()])
    }

    fn regex_match(self, pattern: impl IntoExpr) -> BooleanExpression {
        predicate("regex_match", vec![self.into(), pattern.into_expr()])
    }

    fn string_contains(self, substring: impl IntoExpr) -> BooleanExpression {
        predicate("string_contains", vec![self.into(), substring.into_expr()])
    }

    fn starts_with(self, prefix: impl IntoExpr) -> BooleanExpression {
        predicate("starts_with", vec![self.into(), prefix.into_expr()])
    }

    fn ends_with(self, suffix: impl IntoExpr) -> BooleanExpression {
        predicate("ends_with", vec![self.into(), suffix.into_expr()])
    }

    fn to_lower(self) -> Expression {
        call("to_lower", vec![self.into()])
    }

    fn to_upper(self) -> Expression {
        call("to_upper", vec![self.into()])
    }

    fn trim(self) -> Expression {
        call("trim", vec![self.into()])
    }

    fn string_concat<T: IntoExpr>(self, others: impl IntoIterator<Item = T>) -> Expression {
        call("string_concat", with_rest(self.into(), others))
    }

    fn substring(self, position: impl IntoExpr, length: impl IntoExpr) -> Expression {
        call(
            "substring",
            vec![self.into(), position.into_expr(), length.into_expr()],
        )
    }

    fn string_reverse(self) -> Expression {
        call("string_reverse", vec![self.into()])
    }

    // Arrays

    fn array_contains(self, element: impl IntoExpr) -> BooleanExpression {
        predicate("array_contains", vec![self.into(), element.into_expr()])
    }

    fn array_contains_any(self, values: impl IntoExpr) -> BooleanExpression {
        predicate("array_contains_any", vec![self.into(), values.into_expr()])
    }

    fn array_contains_all(self, values: impl IntoExpr) -> BooleanExpression {
        predicate("array_contains_all", vec![self.into(), values.into_expr()])
    }

    fn array_length(self) -> Expression {
        call("array_length", vec![self.into()])
    }

    fn array_concat<T: IntoExpr>(self, others: impl IntoIterator<Item = T>) -> Expression {
        call("array_concat", with_rest(self.into(), others))
    }

    fn array_reverse(self) -> Expression {
        call("array_reverse", vec![self.into()])
    }

    /// Element at `offset`; negative offsets count from the end.
    fn array_get(self, offset: impl IntoExpr) -> Expression {
        call("array_get", vec![self.into(), offset.into_expr()])
    }

    // Maps

    fn map_get(self, key: &str) -> Expression {
        call("map_get", vec![self.into(), Constant::new(key).into()])
    }

    fn map_merge<T: IntoExpr>(self, others: impl IntoIterator<Item = T>) -> Expression {
        call("map_merge", with_rest(self.into(), others))
    }

    fn map_remove(self, key: &str) -> Expression {
        call("map_remove", vec![self.into(), Constant::new(key).into()])
    }

    // Vectors

    fn cosine_distance(self, other: impl IntoVector) -> Expression {
        call("cosine_distance", vec![self.into(), other.into_vector_expr()])
    }

    fn dot_product(self, other: impl IntoVector) -> Expression {
        call("dot_product", vec![self.into(), other.into_vector_expr()])
    }

    fn euclidean_distance(self, other: impl IntoVector) -> Expression {
        call("euclidean_distance", vec![self.into(), other.into_vector_expr()])
    }

    fn vector_length(self) -> Expression {
        call("vector_length", vec![self.into()])
    }

    // Timestamps

    fn timestamp_add(self, unit: TimeUnit, amount: impl IntoExpr) -> Expression {
        call(
            "timestamp_add",
            vec![self.into(), Constant::new(unit.as_str()).into(), amount.into_expr()],
        )
    }

    fn timestamp_subtract(self, unit: TimeUnit, amount: impl IntoExpr) -> Expression {
        call(
            "timestamp_subtract",
            vec![self.into(), Constant::new(unit.as_str()).into(), amount.into_expr()],
        )
    }

    fn timestamp_to_unix_micros(self) -> Expression {
        call("timestamp_to_unix_micros", vec![self.into()])
    }

    fn timestamp_to_unix_millis(self) -> Expression {
        call("timestamp_to_unix_millis", vec![self.into()])
    }

    fn timestamp_to_unix_seconds(self) -> Expression {
        call("timestamp_to_unix_seconds", vec![self.into()])
    }

    fn unix_micros_to_timestamp(self) -> Expression {
        call("unix_micros_to_timestamp", vec![self.into()])
    }

    fn unix_millis_to_timestamp(self) -> Expression {
        call("unix_millis_to_timestamp", vec![self.into()])
    }

    fn unix_seconds_to_timestamp(self) -> Expression {
        call("unix_seconds_to_timestamp", vec![self.into()])
    }

    // Logical min/max over values (not aggregates)

    fn logical_maximum<T: IntoExpr>(self, others: impl IntoIterator<Item = T>) -> Expression {
        call("logical_maximum", with_rest(self.into(), others))
    }

    fn logical_minimum<T: IntoExpr>(self, others: impl IntoIterator<Item = T>) -> Expression {
        call("logical_minimum", with_rest(self.into(), others))
    }

    // Document metadata

    fn document_id(self) -> Expression {
        call("document_id", vec![self.into()])
    }

    fn collection_id(self) -> Expression {
        call("collection_id", vec![self.into()])
    }

    // Ordering and aliasing

    fn ascending(self) -> Ordering {
        Ordering {
            expr: self.into(),
            direction: Direction::Ascending,
        }
    }

    fn descending(self) -> Ordering {
        Ordering {
            expr: self.into(),
            direction: Direction::Descending,
        }
    }

    fn alias(self, alias: impl Into<String>) -> AliasedExpression {
        AliasedExpression {
            expr: self.into(),
            alias: alias.into(),
        }
    }

    // Aggregates

    fn count(self) -> AggregateFunction {
        AggregateFunction::new("count", vec![self.into()])
    }

    fn sum(self) -> AggregateFunction {
        AggregateFunction::new("sum", vec![self.into()])
    }

    fn average(self) -> AggregateFunction {
        AggregateFunction::new("average", vec![self.into()])
    }

    fn minimum(self) -> AggregateFunction {
        AggregateFunction::new("minimum", vec![self.into()])
    }

    fn maximum(self) -> AggregateFunction {
        AggregateFunction::new("maximum", vec![self.into()])
    }

    fn count_distinct(self) -> AggregateFunction {
        AggregateFunction::new("count_distinct", vec![self.into()])
    }
}

impl<T: Into<Expression>> ExpressionOps for T {}
