//! Stage AST.
//!
//! A [`Stage`] is a [`StageKind`] (the typed parameters) plus the caller's raw option overrides.
//! Stages are immutable once appended to a pipeline.

use std::fmt;

use crate::expr::{
    AggregateFunction, BooleanExpression, Constant, Expression, ExpressionMap, Field, IntoExpr,
    Ordering,
};
use crate::options::{KnownOption, OptionKind, OptionValue, RawOptions};
use crate::ordered_map::OrderedMap;
use crate::pipeline::Pipeline;
use crate::reference::{CollectionReference, DocumentReference};
use crate::value::ConstantValue;

const NO_OPTIONS: &[KnownOption] = &[];

const SOURCE_OPTIONS: &[KnownOption] =
    &[KnownOption::new("forceIndex", "force_index", OptionKind::String)];

const FIND_NEAREST_OPTIONS: &[KnownOption] = &[
    KnownOption::new("limit", "limit", OptionKind::Integer),
    KnownOption::new("distanceField", "distance_field", OptionKind::FieldReference),
];

const UNNEST_OPTIONS: &[KnownOption] =
    &[KnownOption::new("indexField", "index_field", OptionKind::FieldReference)];

/// Similarity measure used by `find_nearest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMeasure {
    Euclidean,
    Cosine,
    DotProduct,
}

impl DistanceMeasure {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMeasure::Euclidean => "euclidean",
            DistanceMeasure::Cosine => "cosine",
            DistanceMeasure::DotProduct => "dot_product",
        }
    }
}

impl fmt::Display for DistanceMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized sample request: a document count or a percentage, never both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleRate {
    Documents(i64),
    Percent(f64),
}

impl SampleRate {
    /// Wire tag, `documents` or `percent`.
    pub fn mode(&self) -> &'static str {
        match self {
            SampleRate::Documents(_) => "documents",
            SampleRate::Percent(_) => "percent",
        }
    }

    pub fn rate(&self) -> f64 {
        match self {
            SampleRate::Documents(n) => *n as f64,
            SampleRate::Percent(p) => *p,
        }
    }
}

/// One positional parameter of a raw stage.
#[derive(Debug, Clone, PartialEq)]
pub enum RawParam {
    Expression(Expression),
    Aggregate(AggregateFunction),
}

impl RawParam {
    /// A plain key/value object, encoded as a map literal rather than the `map(...)` function.
    pub fn object<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: IntoExpr,
    {
        RawParam::Expression(Expression::map_literal(entries))
    }
}

impl From<Expression> for RawParam {
    fn from(expr: Expression) -> Self {
        RawParam::Expression(expr)
    }
}

impl From<Field> for RawParam {
    fn from(field: Field) -> Self {
        RawParam::Expression(field.into())
    }
}

impl From<Constant> for RawParam {
    fn from(constant: Constant) -> Self {
        RawParam::Expression(constant.into())
    }
}

impl From<BooleanExpression> for RawParam {
    fn from(condition: BooleanExpression) -> Self {
        RawParam::Expression(condition.into())
    }
}

impl From<AggregateFunction> for RawParam {
    fn from(aggregate: AggregateFunction) -> Self {
        RawParam::Aggregate(aggregate)
    }
}

impl From<ConstantValue> for RawParam {
    fn from(value: ConstantValue) -> Self {
        RawParam::Expression(Expression::Constant(Constant::new(value)))
    }
}

impl From<&str> for RawParam {
    fn from(value: &str) -> Self {
        RawParam::from(ConstantValue::from(value))
    }
}

impl From<i64> for RawParam {
    fn from(value: i64) -> Self {
        RawParam::from(ConstantValue::from(value))
    }
}

impl From<f64> for RawParam {
    fn from(value: f64) -> Self {
        RawParam::from(ConstantValue::from(value))
    }
}

impl From<bool> for RawParam {
    fn from(value: bool) -> Self {
        RawParam::from(ConstantValue::from(value))
    }
}

/// Objects become map literals; everything else becomes a constant.
impl From<serde_json::Value> for RawParam {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => RawParam::object(map),
            other => RawParam::from(ConstantValue::from(other)),
        }
    }
}

/// Typed parameters of a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageKind {
    Collection {
        reference: CollectionReference,
        force_index: Option<String>,
    },
    CollectionGroup {
        collection_id: String,
        force_index: Option<String>,
    },
    Database,
    Documents {
        documents: Vec<DocumentReference>,
    },
    AddFields {
        fields: ExpressionMap,
    },
    RemoveFields {
        fields: Vec<Field>,
    },
    Select {
        selections: ExpressionMap,
    },
    Where {
        condition: BooleanExpression,
    },
    Offset {
        offset: i64,
    },
    Limit {
        limit: i64,
    },
    Distinct {
        groups: ExpressionMap,
    },
    Aggregate {
        accumulators: OrderedMap<AggregateFunction>,
        groups: ExpressionMap,
    },
    FindNearest {
        field: Field,
        vector: Expression,
        distance_measure: DistanceMeasure,
        limit: Option<i64>,
        distance_field: Option<Field>,
    },
    ReplaceWith {
        map: Expression,
    },
    Sample {
        rate: SampleRate,
    },
    Union {
        other: Pipeline,
    },
    Unnest {
        expr: Expression,
        alias: String,
        index_field: Option<Field>,
    },
    Sort {
        orderings: Vec<Ordering>,
    },
    Delete {
        target: Option<CollectionReference>,
    },
    Upsert {
        target: Option<CollectionReference>,
    },
    Insert {
        target: Option<CollectionReference>,
    },
    Raw {
        name: String,
        params: Vec<RawParam>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    kind: StageKind,
    raw_options: RawOptions,
}

impl Stage {
    pub fn new(kind: StageKind, raw_options: RawOptions) -> Self {
        Self { kind, raw_options }
    }

    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    pub fn raw_options(&self) -> &RawOptions {
        &self.raw_options
    }

    /// Stage name on the wire.
    pub fn name(&self) -> &str {
        match &self.kind {
            StageKind::Collection { .. } => "collection",
            StageKind::CollectionGroup { .. } => "collection_group",
            StageKind::Database => "database",
            StageKind::Documents { .. } => "documents",
            StageKind::AddFields { .. } => "add_fields",
            StageKind::RemoveFields { .. } => "remove_fields",
            StageKind::Select { .. } => "select",
            StageKind::Where { .. } => "where",
            StageKind::Offset { .. } => "offset",
            StageKind::Limit { .. } => "limit",
            StageKind::Distinct { .. } => "distinct",
            StageKind::Aggregate { .. } => "aggregate",
            StageKind::FindNearest { .. } => "find_nearest",
            StageKind::ReplaceWith { .. } => "replace_with",
            StageKind::Sample { .. } => "sample",
            StageKind::Union { .. } => "union",
            StageKind::Unnest { .. } => "unnest",
            StageKind::Sort { .. } => "sort",
            StageKind::Delete { .. } => "delete",
            StageKind::Upsert { .. } => "upsert",
            StageKind::Insert { .. } => "insert",
            StageKind::Raw { name, .. } => name,
        }
    }

    /// Builder method that created this stage, used in validation messages.
    pub fn method_name(&self) -> &'static str {
        match &self.kind {
            StageKind::Collection { .. } => "PipelineSource::collection",
            StageKind::CollectionGroup { .. } => "PipelineSource::collection_group",
            StageKind::Database => "PipelineSource::database",
            StageKind::Documents { .. } => "PipelineSource::documents",
            StageKind::AddFields { .. } => "Pipeline::add_fields",
            StageKind::RemoveFields { .. } => "Pipeline::remove_fields",
            StageKind::Select { .. } => "Pipeline::select",
            StageKind::Where { .. } => "Pipeline::where",
            StageKind::Offset { .. } => "Pipeline::offset",
            StageKind::Limit { .. } => "Pipeline::limit",
            StageKind::Distinct { .. } => "Pipeline::distinct",
            StageKind::Aggregate { .. } => "Pipeline::aggregate",
            StageKind::FindNearest { .. } => "Pipeline::find_nearest",
            StageKind::ReplaceWith { .. } => "Pipeline::replace_with",
            StageKind::Sample { .. } => "Pipeline::sample",
            StageKind::Union { .. } => "Pipeline::union",
            StageKind::Unnest { .. } => "Pipeline::unnest",
            StageKind::Sort { .. } => "Pipeline::sort",
            StageKind::Delete { .. } => "Pipeline::delete",
            StageKind::Upsert { .. } => "Pipeline::upsert",
            StageKind::Insert { .. } => "Pipeline::insert",
            StageKind::Raw { .. } => "Pipeline::raw_stage",
        }
    }

    pub fn known_options(&self) -> &'static [KnownOption] {
        match &self.kind {
            StageKind::Collection { .. } | StageKind::CollectionGroup { .. } => SOURCE_OPTIONS,
            StageKind::FindNearest { .. } => FIND_NEAREST_OPTIONS,
            StageKind::Unnest { .. } => UNNEST_OPTIONS,
            _ => NO_OPTIONS,
        }
    }

    /// Known option values set on this stage, keyed by builder-facing name.
    pub fn computed_options(&self) -> Vec<(&'static str, OptionValue)> {
        let mut options = Vec::new();
        match &self.kind {
            StageKind::Collection { force_index, .. }
            | StageKind::CollectionGroup { force_index, .. } => {
                if let Some(index) = force_index {
                    options.push(("forceIndex", OptionValue::String(index.clone())));
                }
            }
            StageKind::FindNearest {
                limit,
                distance_field,
                ..
            } => {
                if let Some(limit) = limit {
                    options.push(("limit", OptionValue::Integer(*limit)));
                }
                if let Some(field) = distance_field {
                    options.push(("distanceField", OptionValue::Field(field.clone())));
                }
            }
            StageKind::Unnest { index_field, .. } => {
                if let Some(field) = index_field {
                    options.push(("indexField", OptionValue::Field(field.clone())));
                }
            }
            _ => {}
        }
        options
    }
}
