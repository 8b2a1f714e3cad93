//! Declarative queries and their pipeline equivalent.
//!
//! A [`Query`] is the classic filter/order/limit description of a read. [`Query::to_pipeline`]
//! rewrites it as stages:
//!
//! 1. the source (`collection` or `collection_group`)
//! 2. one `where` per filter
//! 3. an `exists` guard on every ordered field, then `sort` (document name is always the final
//!    tie-breaker)
//! 4. `offset`, `limit` (for limit-to-last: reversed sort, limit, original sort)
//! 5. `select` for projections

use crate::error::{PipelineError, PipelineResult};
use crate::expr::{
    and, or, BooleanExpression, Direction, Expression, ExpressionOps, Field, Ordering, Selectable,
};
use crate::pipeline::{Pipeline, PipelineSource};
use crate::reference::{CollectionReference, DatabaseId};
use crate::value::ConstantValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    ArrayContains,
    ArrayContainsAny,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOperator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Field {
        field: Field,
        op: FilterOperator,
        value: ConstantValue,
    },
    Composite {
        op: CompositeOperator,
        filters: Vec<Filter>,
    },
}

impl Filter {
    pub fn field(
        field: impl Into<Field>,
        op: FilterOperator,
        value: impl Into<ConstantValue>,
    ) -> Self {
        Filter::Field {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Composite {
            op: CompositeOperator::And,
            filters: filters.into_iter().collect(),
        }
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Composite {
            op: CompositeOperator::Or,
            filters: filters.into_iter().collect(),
        }
    }

    /// Pipeline condition equivalent to this filter.
    pub fn to_condition(&self) -> PipelineResult<BooleanExpression> {
        match self {
            Filter::Field { field, op, value } => field_condition(field, *op, value),
            Filter::Composite { op, filters } => {
                let mut conditions = filters
                    .iter()
                    .map(Filter::to_condition)
                    .collect::<PipelineResult<Vec<_>>>()?;
                match (conditions.len(), op) {
                    (0, _) => Err(PipelineError::InvalidArgument(
                        "composite filter requires at least one filter".to_string(),
                    )),
                    (1, _) => Ok(conditions.remove(0)),
                    (_, CompositeOperator::And) => Ok(and(conditions)),
                    (_, CompositeOperator::Or) => Ok(or(conditions)),
                }
            }
        }
    }
}

fn is_nan(value: &ConstantValue) -> bool {
    matches!(value, ConstantValue::Double(d) if d.is_nan())
}

/// Null and NaN equality map onto the dedicated checks; every other comparison is guarded
/// by `exists` so missing fields never match.
fn field_condition(
    field: &Field,
    op: FilterOperator,
    value: &ConstantValue,
) -> PipelineResult<BooleanExpression> {
    let target = Expression::Field(field.clone());

    match (op, value) {
        (FilterOperator::Equal, ConstantValue::Null) => return Ok(target.is_null()),
        (FilterOperator::NotEqual, ConstantValue::Null) => return Ok(target.is_not_null()),
        (FilterOperator::Equal, v) if is_nan(v) => return Ok(target.is_nan()),
        (FilterOperator::NotEqual, v) if is_nan(v) => return Ok(target.is_not_nan()),
        _ => {}
    }

    let value = value.clone();
    let comparison = match op {
        FilterOperator::Equal => target.clone().equal(value),
        FilterOperator::NotEqual => target.clone().not_equal(value),
        FilterOperator::LessThan => target.clone().less_than(value),
        FilterOperator::LessThanOrEqual => target.clone().less_than_or_equal(value),
        FilterOperator::GreaterThan => target.clone().greater_than(value),
        FilterOperator::GreaterThanOrEqual => target.clone().greater_than_or_equal(value),
        FilterOperator::ArrayContains => target.clone().array_contains(value),
        FilterOperator::ArrayContainsAny => {
            require_array(field, op, &value)?;
            target.clone().array_contains_any(value)
        }
        FilterOperator::In => {
            require_array(field, op, &value)?;
            target.clone().equal_any(value)
        }
        FilterOperator::NotIn => {
            require_array(field, op, &value)?;
            target.clone().not_equal_any(value)
        }
    };

    Ok(and([target.exists(), comparison]))
}

fn require_array(field: &Field, op: FilterOperator, value: &ConstantValue) -> PipelineResult<()> {
    match value {
        ConstantValue::Array(_) => Ok(()),
        other => Err(PipelineError::InvalidArgument(format!(
            "{:?} filter on '{}' requires an array value, got {}",
            op,
            field,
            other.type_name()
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuerySource {
    Collection(CollectionReference),
    CollectionGroup(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    database: DatabaseId,
    source: QuerySource,
    filters: Vec<Filter>,
    order_by: Vec<Ordering>,
    offset: Option<u32>,
    limit: Option<u32>,
    limit_to_last: bool,
    projection: Option<Vec<Field>>,
}

impl Query {
    pub fn collection(reference: CollectionReference) -> Self {
        Self::new(reference.database().clone(), QuerySource::Collection(reference))
    }

    pub fn collection_group(database: DatabaseId, collection_id: impl Into<String>) -> Self {
        Self::new(database, QuerySource::CollectionGroup(collection_id.into()))
    }

    fn new(database: DatabaseId, source: QuerySource) -> Self {
        Self {
            database,
            source,
            filters: Vec::new(),
            order_by: Vec::new(),
            offset: None,
            limit: None,
            limit_to_last: false,
            projection: None,
        }
    }

    pub fn database(&self) -> &DatabaseId {
        &self.database
    }

    pub fn source(&self) -> &QuerySource {
        &self.source
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn where_field(
        self,
        field: impl Into<Field>,
        op: FilterOperator,
        value: impl Into<ConstantValue>,
    ) -> Self {
        self.filter(Filter::field(field, op, value))
    }

    pub fn order_by(mut self, field: impl Into<Field>, direction: Direction) -> Self {
        let field: Field = field.into();
        self.order_by.push(Ordering::new(field, direction));
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self.limit_to_last = false;
        self
    }

    /// Keeps the last `limit` rows in the requested order. Requires an explicit ordering.
    pub fn limit_to_last(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self.limit_to_last = true;
        self
    }

    pub fn select<F: Into<Field>>(mut self, fields: impl IntoIterator<Item = F>) -> Self {
        self.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Explicit orderings with the document name appended as tie-breaker.
    fn normalized_orderings(&self) -> Vec<Ordering> {
        let mut orderings = self.order_by.clone();
        let has_name = orderings
            .iter()
            .any(|o| o.expr.field_name() == Some(Field::DOCUMENT_ID));
        if !has_name {
            let direction = orderings
                .last()
                .map(|o| o.direction)
                .unwrap_or(Direction::Ascending);
            orderings.push(Ordering::new(Field::document_id(), direction));
        }
        orderings
    }

    pub fn to_pipeline(&self) -> PipelineResult<Pipeline> {
        let source = PipelineSource::new(self.database.clone());
        let mut pipeline = match &self.source {
            QuerySource::Collection(reference) => source.collection(reference)?,
            QuerySource::CollectionGroup(id) => source.collection_group(id)?,
        };

        for filter in &self.filters {
            pipeline = pipeline.filter(filter.to_condition()?);
        }

        if self.limit_to_last && self.order_by.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "limit_to_last requires at least one order_by clause".to_string(),
            ));
        }

        let needs_sort = !self.order_by.is_empty() || self.offset.is_some() || self.limit.is_some();
        let orderings = self.normalized_orderings();

        if !self.order_by.is_empty() {
            let guards: Vec<BooleanExpression> = self
                .order_by
                .iter()
                .map(|o| o.expr.clone().exists())
                .collect();
            let guard = if guards.len() == 1 {
                guards.into_iter().next()
            } else {
                Some(and(guards))
            };
            if let Some(guard) = guard {
                pipeline = pipeline.filter(guard);
            }
        }

        if self.limit_to_last {
            let reversed: Vec<Ordering> = orderings.iter().map(Ordering::reversed).collect();
            pipeline = pipeline.sort(reversed)?;
            if let Some(offset) = self.offset {
                pipeline = pipeline.offset(offset);
            }
            if let Some(limit) = self.limit {
                pipeline = pipeline.limit(limit);
            }
            pipeline = pipeline.sort(orderings)?;
        } else {
            if needs_sort {
                pipeline = pipeline.sort(orderings)?;
            }
            if let Some(offset) = self.offset {
                pipeline = pipeline.offset(offset);
            }
            if let Some(limit) = self.limit {
                pipeline = pipeline.limit(limit);
            }
        }

        if let Some(fields) = &self.projection {
            pipeline = pipeline.select(fields.iter().cloned().map(Selectable::from));
        }

        Ok(pipeline)
    }
}
