//! AST to wire encoding.
//!
//! The serializer assumes its input has passed the [`Validator`](crate::validate::Validator).
//! Anything validation should have rejected comes back as [`PipelineError::Internal`].

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::error::{PipelineError, PipelineResult};
use crate::expr::{AggregateFunction, Expression, ExpressionMap, Ordering};
use crate::options::OptionsMerger;
use crate::ordered_map::OrderedMap;
use crate::pipeline::Pipeline;
use crate::reference::CollectionReference;
use crate::stage::{RawParam, SampleRate, Stage, StageKind};
use crate::value::ConstantValue;
use crate::wire::{WirePipeline, WireStage, WireValue};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializerSettings {
    /// Drop undefined map entries and encode other undefined values as null.
    pub ignore_undefined_properties: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Serializer {
    settings: SerializerSettings,
}

impl Serializer {
    pub fn new(settings: SerializerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SerializerSettings {
        &self.settings
    }

    pub fn encode_pipeline(&self, pipeline: &Pipeline) -> PipelineResult<WirePipeline> {
        let stages = pipeline
            .stages()
            .map(|stage| self.encode_stage(stage))
            .collect::<PipelineResult<Vec<_>>>()?;
        debug!(stages = stages.len(), "Serialized pipeline");
        Ok(WirePipeline { stages })
    }

    pub fn encode_stage(&self, stage: &Stage) -> PipelineResult<WireStage> {
        let args = self.encode_stage_args(stage.kind())?;
        let options = OptionsMerger::new(stage.name(), stage.known_options()).merge(
            &stage.computed_options(),
            stage.raw_options(),
            self,
        )?;
        trace!(stage = stage.name(), args = args.len(), "Encoded stage");
        Ok(WireStage {
            name: stage.name().to_string(),
            args,
            options,
        })
    }

    fn encode_stage_args(&self, kind: &StageKind) -> PipelineResult<Vec<WireValue>> {
        Ok(match kind {
            StageKind::Collection { reference, .. } => {
                vec![WireValue::reference(format!("/{}", reference.path()))]
            }
            StageKind::CollectionGroup { collection_id, .. } => vec![
                WireValue::reference(""),
                WireValue::string(collection_id.as_str()),
            ],
            StageKind::Database => vec![],
            StageKind::Documents { documents } => documents
                .iter()
                .map(|doc| WireValue::reference(format!("/{}", doc.path())))
                .collect(),
            StageKind::AddFields { fields } => vec![self.encode_named(fields)?],
            StageKind::RemoveFields { fields } => fields
                .iter()
                .map(|f| WireValue::field_reference(f.path()))
                .collect(),
            StageKind::Select { selections } => vec![self.encode_named(selections)?],
            StageKind::Where { condition } => vec![self.encode_expression(condition.inner())?],
            StageKind::Offset { offset } => vec![WireValue::IntegerValue(*offset)],
            StageKind::Limit { limit } => vec![WireValue::IntegerValue(*limit)],
            StageKind::Distinct { groups } => vec![self.encode_named(groups)?],
            StageKind::Aggregate {
                accumulators,
                groups,
            } => vec![
                self.encode_accumulators(accumulators)?,
                self.encode_named(groups)?,
            ],
            StageKind::FindNearest {
                field,
                vector,
                distance_measure,
                ..
            } => vec![
                WireValue::field_reference(field.path()),
                self.encode_expression(vector)?,
                WireValue::string(distance_measure.as_str()),
            ],
            StageKind::ReplaceWith { map } => vec![
                self.encode_expression(map)?,
                WireValue::string("full_replace"),
            ],
            StageKind::Sample { rate } => {
                let value = match rate {
                    SampleRate::Documents(n) => WireValue::IntegerValue(*n),
                    SampleRate::Percent(p) => WireValue::DoubleValue(*p),
                };
                vec![value, WireValue::string(rate.mode())]
            }
            StageKind::Union { other } => {
                vec![WireValue::PipelineValue(self.encode_pipeline(other)?)]
            }
            StageKind::Unnest { expr, alias, .. } => vec![
                self.encode_expression(expr)?,
                WireValue::field_reference(alias.as_str()),
            ],
            StageKind::Sort { orderings } => orderings
                .iter()
                .map(|o| self.encode_ordering(o))
                .collect::<PipelineResult<Vec<_>>>()?,
            StageKind::Delete { target }
            | StageKind::Upsert { target }
            | StageKind::Insert { target } => encode_target(target.as_ref()),
            StageKind::Raw { params, .. } => params
                .iter()
                .map(|p| match p {
                    RawParam::Expression(e) => self.encode_expression(e),
                    RawParam::Aggregate(a) => self.encode_aggregate(a),
                })
                .collect::<PipelineResult<Vec<_>>>()?,
        })
    }

    pub fn encode_expression(&self, expr: &Expression) -> PipelineResult<WireValue> {
        match expr {
            Expression::Field(f) => Ok(WireValue::field_reference(f.path())),
            Expression::Constant(c) => self.encode_constant(c.value()),
            Expression::Function(f) => Ok(WireValue::function(
                f.name(),
                f.args()
                    .iter()
                    .map(|a| self.encode_expression(a))
                    .collect::<PipelineResult<Vec<_>>>()?,
            )),
            Expression::List(items) => Ok(WireValue::array(
                items
                    .iter()
                    .map(|i| self.encode_expression(i))
                    .collect::<PipelineResult<Vec<_>>>()?,
            )),
            Expression::Map(entries) => self.encode_named(entries),
        }
    }

    pub fn encode_aggregate(&self, aggregate: &AggregateFunction) -> PipelineResult<WireValue> {
        Ok(WireValue::function(
            aggregate.name(),
            aggregate
                .args()
                .iter()
                .map(|a| self.encode_expression(a))
                .collect::<PipelineResult<Vec<_>>>()?,
        ))
    }

    /// `{direction, expression}`
    pub fn encode_ordering(&self, ordering: &Ordering) -> PipelineResult<WireValue> {
        Ok(WireValue::map([
            ("direction", WireValue::string(ordering.direction.as_str())),
            ("expression", self.encode_expression(&ordering.expr)?),
        ]))
    }

    /// A name -> expression map as a single map value.
    pub fn encode_named(&self, entries: &ExpressionMap) -> PipelineResult<WireValue> {
        let mut fields = BTreeMap::new();
        for (name, expr) in entries.iter() {
            if self.is_dropped(expr) {
                continue;
            }
            fields.insert(name.to_string(), self.encode_expression(expr)?);
        }
        Ok(WireValue::map(fields))
    }

    fn encode_accumulators(
        &self,
        accumulators: &OrderedMap<AggregateFunction>,
    ) -> PipelineResult<WireValue> {
        let fields = accumulators
            .iter()
            .map(|(alias, aggregate)| Ok((alias, self.encode_aggregate(aggregate)?)))
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(WireValue::map(fields))
    }

    fn is_dropped(&self, expr: &Expression) -> bool {
        self.settings.ignore_undefined_properties
            && matches!(expr, Expression::Constant(c) if *c.value() == ConstantValue::Undefined)
    }

    pub fn encode_constant(&self, value: &ConstantValue) -> PipelineResult<WireValue> {
        Ok(match value {
            ConstantValue::Null => WireValue::NullValue,
            ConstantValue::Boolean(b) => WireValue::BooleanValue(*b),
            ConstantValue::Integer(i) => WireValue::IntegerValue(*i),
            ConstantValue::Double(d) => WireValue::DoubleValue(*d),
            ConstantValue::String(s) => WireValue::string(s.as_str()),
            ConstantValue::Bytes(b) => WireValue::BytesValue(b.clone()),
            ConstantValue::Timestamp(ts) => WireValue::TimestampValue(*ts),
            ConstantValue::GeoPoint(p) => WireValue::GeoPointValue(*p),
            ConstantValue::Vector(v) => WireValue::vector(v.values()),
            ConstantValue::Reference(r) => WireValue::reference(r.resource_name()),
            ConstantValue::Array(items) => WireValue::array(
                items
                    .iter()
                    .map(|i| self.encode_constant(i))
                    .collect::<PipelineResult<Vec<_>>>()?,
            ),
            ConstantValue::Map(entries) => {
                let mut fields = BTreeMap::new();
                for (key, v) in entries {
                    if self.settings.ignore_undefined_properties && *v == ConstantValue::Undefined
                    {
                        continue;
                    }
                    fields.insert(key.clone(), self.encode_constant(v)?);
                }
                WireValue::map(fields)
            }
            ConstantValue::Undefined if self.settings.ignore_undefined_properties => {
                WireValue::NullValue
            }
            ConstantValue::Undefined => {
                return Err(PipelineError::Internal(
                    "undefined value reached the serializer".to_string(),
                ))
            }
            ConstantValue::Transform(t) => {
                return Err(PipelineError::Internal(format!(
                    "{} reached the serializer",
                    t.method_name()
                )))
            }
            ConstantValue::Wire(w) => w.clone(),
        })
    }
}

fn encode_target(target: Option<&CollectionReference>) -> Vec<WireValue> {
    target
        .map(|c| vec![WireValue::reference(format!("/{}", c.path()))])
        .unwrap_or_default()
}
