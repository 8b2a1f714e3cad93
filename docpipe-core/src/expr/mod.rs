//! Expression algebra.
//!
//! Expressions are immutable trees. Every operator is sugar over [`FunctionExpr`]; boolean
//! results are wrapped in [`BooleanExpression`], which encodes exactly like its inner node.
//! Aggregates are a separate type so they cannot be nested inside ordinary expressions.

mod convert;
mod functions;
mod ops;

use std::fmt;

pub use convert::{IntoExpr, IntoOperand, IntoVector};
pub use functions::*;
pub use ops::{ExpressionOps, TimeUnit};

use crate::error::{PipelineError, PipelineResult};
use crate::ordered_map::OrderedMap;
use crate::value::ConstantValue;

/// Named expressions, as used by select/add_fields/distinct and aggregate groups.
pub type ExpressionMap = OrderedMap<Expression>;

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Reference to a (dotted) field of the current row.
    Field(Field),

    /// Literal value.
    Constant(Constant),

    /// Operator or function application.
    Function(FunctionExpr),

    /// Array literal with at least one computed element.
    List(Vec<Expression>),

    /// Map literal whose values may be computed.
    Map(ExpressionMap),
}

impl Expression {
    /// Map literal. Distinct from the `map(...)` function sugar.
    pub fn map_literal<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: IntoExpr,
    {
        Expression::Map(
            entries
                .into_iter()
                .map(|(k, v)| {
                    let key: String = k.into();
                    (key, v.into_expr())
                })
                .collect(),
        )
    }

    pub fn list<V: IntoExpr>(items: impl IntoIterator<Item = V>) -> Self {
        Expression::List(items.into_iter().map(IntoExpr::into_expr).collect())
    }

    /// Name this expression contributes when used as a projection without an alias.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Expression::Field(f) => Some(f.path()),
            _ => None,
        }
    }
}

/// Dotted path into the current row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    path: String,
}

impl Field {
    /// Path of the document name pseudo-field.
    pub const DOCUMENT_ID: &'static str = "__name__";

    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn document_id() -> Self {
        Self::new(Self::DOCUMENT_ID)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('.')
    }
}

impl From<&str> for Field {
    fn from(path: &str) -> Self {
        Field::new(path)
    }
}

impl From<String> for Field {
    fn from(path: String) -> Self {
        Field::new(path)
    }
}

impl From<&Field> for Field {
    fn from(field: &Field) -> Self {
        field.clone()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    value: ConstantValue,
}

impl Constant {
    pub fn new(value: impl Into<ConstantValue>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &ConstantValue {
        &self.value
    }

    pub fn into_value(self) -> ConstantValue {
        self.value
    }
}

/// `{name, args}` application node.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpr {
    name: String,
    args: Vec<Expression>,
}

impl FunctionExpr {
    pub fn new(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Expression] {
        &self.args
    }
}

/// An expression known by construction to evaluate to a boolean.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanExpression {
    inner: Box<Expression>,
}

impl BooleanExpression {
    /// Treats any expression as boolean-valued, e.g. a field holding a flag.
    pub fn wrap(expr: impl Into<Expression>) -> Self {
        Self {
            inner: Box::new(expr.into()),
        }
    }

    pub(crate) fn function(name: &str, args: Vec<Expression>) -> Self {
        Self::wrap(FunctionExpr::new(name, args))
    }

    pub fn inner(&self) -> &Expression {
        &self.inner
    }

    pub fn into_inner(self) -> Expression {
        *self.inner
    }

    pub fn not(self) -> BooleanExpression {
        BooleanExpression::function("not", vec![self.into_inner()])
    }

    pub fn and(self, other: BooleanExpression) -> BooleanExpression {
        and([self, other])
    }

    pub fn or(self, other: BooleanExpression) -> BooleanExpression {
        or([self, other])
    }

    pub fn xor(self, other: BooleanExpression) -> BooleanExpression {
        xor([self, other])
    }

    /// Counts the rows for which this condition holds.
    pub fn count_if(self) -> AggregateFunction {
        AggregateFunction::new("count_if", vec![self.into_inner()])
    }

    /// Boolean fallback when evaluating this condition errors.
    pub fn if_error(self, catch: BooleanExpression) -> BooleanExpression {
        BooleanExpression::function("if_error", vec![self.into_inner(), catch.into_inner()])
    }

    pub fn conditional(self, then: impl IntoExpr, otherwise: impl IntoExpr) -> Expression {
        conditional(self, then, otherwise)
    }
}

/// Aggregate accumulator. Only valid directly inside an aggregate stage.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateFunction {
    name: String,
    args: Vec<Expression>,
}

impl AggregateFunction {
    pub fn new(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Expression] {
        &self.args
    }

    pub fn alias(self, alias: impl Into<String>) -> AliasedAggregate {
        AliasedAggregate {
            aggregate: self,
            alias: alias.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasedAggregate {
    pub aggregate: AggregateFunction,
    pub alias: String,
}

/// Expression with a named output column.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasedExpression {
    pub expr: Expression,
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ascending => "ascending",
            Direction::Descending => "descending",
        }
    }

    pub fn reversed(&self) -> Direction {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub expr: Expression,
    pub direction: Direction,
}

impl Ordering {
    pub fn new(expr: impl IntoOperand, direction: Direction) -> Self {
        Self {
            expr: expr.into_operand(),
            direction,
        }
    }

    pub fn reversed(&self) -> Ordering {
        Ordering {
            expr: self.expr.clone(),
            direction: self.direction.reversed(),
        }
    }
}

/// A projection item: a field (named by its own path) or an aliased expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Selectable {
    Field(Field),
    Aliased(AliasedExpression),
}

impl Selectable {
    /// Output column name: the alias, or the field's own path.
    pub fn name(&self) -> &str {
        match self {
            Selectable::Field(f) => f.path(),
            Selectable::Aliased(a) => &a.alias,
        }
    }

    pub fn to_expression(&self) -> Expression {
        match self {
            Selectable::Field(f) => Expression::Field(f.clone()),
            Selectable::Aliased(a) => a.expr.clone(),
        }
    }

    /// Splits into `(name, expression)`.
    pub fn into_entry(self) -> (String, Expression) {
        match self {
            Selectable::Field(f) => (f.path().to_string(), Expression::Field(f)),
            Selectable::Aliased(a) => (a.alias, a.expr),
        }
    }
}

impl From<&str> for Selectable {
    fn from(name: &str) -> Self {
        Selectable::Field(Field::new(name))
    }
}

impl From<String> for Selectable {
    fn from(name: String) -> Self {
        Selectable::Field(Field::new(name))
    }
}

impl From<Field> for Selectable {
    fn from(field: Field) -> Self {
        Selectable::Field(field)
    }
}

impl From<AliasedExpression> for Selectable {
    fn from(aliased: AliasedExpression) -> Self {
        Selectable::Aliased(aliased)
    }
}

impl TryFrom<&serde_json::Value> for Selectable {
    type Error = PipelineError;

    /// Only strings (field names) have a selectable shape.
    fn try_from(value: &serde_json::Value) -> PipelineResult<Self> {
        match value {
            serde_json::Value::String(name) => Ok(Selectable::from(name.as_str())),
            other => Err(PipelineError::UnsupportedOperand(format!(
                "{} cannot be used as a field name or aliased expression",
                other
            ))),
        }
    }
}

/// Collapses selectables into a name -> expression map; later names overwrite earlier ones.
pub fn selectables_to_map(items: impl IntoIterator<Item = Selectable>) -> ExpressionMap {
    items.into_iter().map(Selectable::into_entry).collect()
}

macro_rules! impl_into_expression {
    ($($t:ty => $variant:ident),*) => {
        $(
            impl From<$t> for Expression {
                fn from(value: $t) -> Self {
                    Expression::$variant(value)
                }
            }
        )*
    };
}

impl_into_expression!(Field => Field, Constant => Constant, FunctionExpr => Function);

impl From<BooleanExpression> for Expression {
    fn from(value: BooleanExpression) -> Self {
        value.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean_expression_unwraps_to_inner() {
        let cond = field("rating").greater_than(4);
        let inner = cond.inner().clone();
        let expr: Expression = cond.into();
        assert_eq!(expr, inner);
        match expr {
            Expression::Function(f) => assert_eq!(f.name(), "greater_than"),
            other => panic!("Expected Function, got {:?}", other),
        }
    }

    #[test]
    fn test_selectable_names() {
        assert_eq!(Selectable::from("title").name(), "title");
        let aliased: Selectable = field("b").alias("c").into();
        assert_eq!(aliased.name(), "c");
    }

    #[test]
    fn test_selectables_to_map_alias_wins() {
        let map = selectables_to_map(vec![Selectable::from("a"), field("b").alias("c").into()]);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(map.get("c"), Some(&Expression::Field(Field::new("b"))));
    }

    #[test]
    fn test_selectables_to_map_later_overwrites() {
        let map = selectables_to_map(vec![Selectable::from("a"), constant(1).alias("a").into()]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a"), Some(&constant(1).into()));
    }

    #[test]
    fn test_selectable_from_untyped_value() {
        assert_eq!(
            Selectable::try_from(&json!("title")).unwrap(),
            Selectable::Field(Field::new("title"))
        );

        let err = Selectable::try_from(&json!(42)).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedOperand(ref msg) if msg.contains("42")));
    }

    #[test]
    fn test_ordering_reversed() {
        let ordering = field("rating").descending();
        assert_eq!(ordering.reversed().direction, Direction::Ascending);
        assert_eq!(ordering.reversed().expr, ordering.expr);
    }
}
