//! Pre-serialization checks.
//!
//! A read-only walk over every expression a stage holds, raw option overrides included. Stops
//! at the first violation and reports it against the builder method that created the stage.

use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::expr::{AggregateFunction, Expression, ExpressionMap, Field, Ordering};
use crate::pipeline::Pipeline;
use crate::stage::{RawParam, Stage, StageKind};
use crate::value::ConstantValue;

#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    ignore_undefined_properties: bool,
}

impl Validator {
    pub fn new(ignore_undefined_properties: bool) -> Self {
        Self {
            ignore_undefined_properties,
        }
    }

    pub fn validate_pipeline(&self, pipeline: &Pipeline) -> PipelineResult<()> {
        for stage in pipeline.stages() {
            self.validate_stage(stage)?;
        }
        debug!(stages = pipeline.len(), "Validated pipeline");
        Ok(())
    }

    pub fn validate_stage(&self, stage: &Stage) -> PipelineResult<()> {
        let method = stage.method_name();
        self.validate_kind(method, stage.kind())?;
        for (key, expr) in stage.raw_options().iter() {
            self.validate_entry(method, key, expr)?;
        }
        Ok(())
    }

    fn validate_kind(&self, method: &str, kind: &StageKind) -> PipelineResult<()> {
        match kind {
            StageKind::Collection { .. }
            | StageKind::CollectionGroup { .. }
            | StageKind::Database
            | StageKind::Documents { .. }
            | StageKind::Offset { .. }
            | StageKind::Limit { .. }
            | StageKind::Sample { .. }
            | StageKind::Delete { .. }
            | StageKind::Upsert { .. }
            | StageKind::Insert { .. } => Ok(()),
            StageKind::AddFields { fields } => self.validate_map(method, fields),
            StageKind::RemoveFields { fields } => fields
                .iter()
                .try_for_each(|f| self.validate_field(method, f)),
            StageKind::Select { selections } => self.validate_map(method, selections),
            StageKind::Where { condition } => self.validate_expression(method, condition.inner()),
            StageKind::Distinct { groups } => self.validate_map(method, groups),
            StageKind::Aggregate {
                accumulators,
                groups,
            } => {
                for aggregate in accumulators.values() {
                    self.validate_aggregate(method, aggregate)?;
                }
                self.validate_map(method, groups)
            }
            StageKind::FindNearest {
                field,
                vector,
                distance_field,
                ..
            } => {
                self.validate_field(method, field)?;
                self.validate_expression(method, vector)?;
                if let Some(f) = distance_field {
                    self.validate_field(method, f)?;
                }
                Ok(())
            }
            StageKind::ReplaceWith { map } => self.validate_expression(method, map),
            StageKind::Union { other } => self.validate_pipeline(other),
            StageKind::Unnest {
                expr, index_field, ..
            } => {
                self.validate_expression(method, expr)?;
                if let Some(f) = index_field {
                    self.validate_field(method, f)?;
                }
                Ok(())
            }
            StageKind::Sort { orderings } => orderings
                .iter()
                .try_for_each(|o| self.validate_ordering(method, o)),
            StageKind::Raw { params, .. } => params.iter().try_for_each(|p| match p {
                RawParam::Expression(e) => self.validate_expression(method, e),
                RawParam::Aggregate(a) => self.validate_aggregate(method, a),
            }),
        }
    }

    pub fn validate_expression(&self, method: &str, expr: &Expression) -> PipelineResult<()> {
        match expr {
            Expression::Field(f) => self.validate_field(method, f),
            Expression::Constant(c) => self.validate_constant(method, c.value(), None),
            Expression::Function(f) => f
                .args()
                .iter()
                .try_for_each(|a| self.validate_expression(method, a)),
            Expression::List(items) => items
                .iter()
                .try_for_each(|i| self.validate_expression(method, i)),
            Expression::Map(entries) => self.validate_map(method, entries),
        }
    }

    fn validate_map(&self, method: &str, entries: &ExpressionMap) -> PipelineResult<()> {
        for (key, expr) in entries.iter() {
            self.validate_entry(method, key, expr)?;
        }
        Ok(())
    }

    /// Constants keyed by a map entry or option name report that key as their location.
    fn validate_entry(&self, method: &str, key: &str, expr: &Expression) -> PipelineResult<()> {
        match expr {
            Expression::Constant(c) => self.validate_constant(method, c.value(), Some(key)),
            other => self.validate_expression(method, other),
        }
    }

    fn validate_aggregate(&self, method: &str, aggregate: &AggregateFunction) -> PipelineResult<()> {
        aggregate
            .args()
            .iter()
            .try_for_each(|a| self.validate_expression(method, a))
    }

    fn validate_ordering(&self, method: &str, ordering: &Ordering) -> PipelineResult<()> {
        self.validate_expression(method, &ordering.expr)
    }

    fn validate_field(&self, method: &str, field: &Field) -> PipelineResult<()> {
        if field.path().is_empty() {
            return Err(PipelineError::validation(
                method,
                "Field paths must not be empty.",
            ));
        }
        if field.segments().any(str::is_empty) {
            return Err(PipelineError::validation(
                method,
                format!("Field path '{}' contains an empty segment.", field.path()),
            ));
        }
        Ok(())
    }

    fn validate_constant(
        &self,
        method: &str,
        value: &ConstantValue,
        path: Option<&str>,
    ) -> PipelineResult<()> {
        let location = || match path {
            Some(p) => format!(" (found in field {})", p),
            None => String::new(),
        };

        match value {
            ConstantValue::Undefined if self.ignore_undefined_properties => Ok(()),
            ConstantValue::Undefined => Err(PipelineError::validation(
                method,
                format!(
                    "Unsupported field value: undefined{}. Enable ignore_undefined_properties to skip undefined values.",
                    location()
                ),
            )),
            ConstantValue::Transform(t) => Err(PipelineError::validation(
                method,
                format!(
                    "{} cannot be used inside a pipeline expression{}.",
                    t.method_name(),
                    location()
                ),
            )),
            ConstantValue::Array(items) => items
                .iter()
                .try_for_each(|i| self.validate_constant(method, i, path)),
            ConstantValue::Map(entries) => {
                for (key, v) in entries {
                    let nested = match path {
                        Some(p) => format!("{}.{}", p, key),
                        None => key.clone(),
                    };
                    self.validate_constant(method, v, Some(&nested))?;
                }
                Ok(())
            }
            ConstantValue::Double(_)
            | ConstantValue::Null
            | ConstantValue::Boolean(_)
            | ConstantValue::Integer(_)
            | ConstantValue::String(_)
            | ConstantValue::Bytes(_)
            | ConstantValue::Timestamp(_)
            | ConstantValue::GeoPoint(_)
            | ConstantValue::Vector(_)
            | ConstantValue::Reference(_)
            | ConstantValue::Wire(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{and, field, ExpressionOps, IntoExpr};
    use crate::options::RawOptions;
    use crate::value::FieldTransform;

    #[test]
    fn test_undefined_rejected_deep_in_tree() {
        let condition = and([
            field("a").exists(),
            field("b").add(field("c").multiply(ConstantValue::Undefined)).equal(3),
        ]);
        let err = Validator::new(false)
            .validate_expression("Pipeline::where", condition.inner())
            .unwrap_err();
        match err {
            PipelineError::Validation { method, message } => {
                assert_eq!(method, "Pipeline::where");
                assert!(message.contains("undefined"));
            }
            other => panic!("Expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_undefined_allowed_with_flag() {
        let expr = field("a").equal(ConstantValue::Undefined);
        assert!(Validator::new(true)
            .validate_expression("Pipeline::where", expr.inner())
            .is_ok());
    }

    #[test]
    fn test_transform_rejected_even_with_flag() {
        let expr = Expression::map_literal([("n", FieldTransform::ServerTimestamp.into_expr())]);
        let err = Validator::new(true)
            .validate_expression("Pipeline::add_fields", &expr)
            .unwrap_err();
        match err {
            PipelineError::Validation { message, .. } => {
                assert!(message.contains("FieldTransform::ServerTimestamp"));
                assert!(message.contains("found in field n"));
            }
            other => panic!("Expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_constant_map_path() {
        let value = ConstantValue::map([(
            "outer",
            ConstantValue::map([("inner", ConstantValue::Undefined)]),
        )]);
        let expr = Expression::map_literal([("doc", value)]);
        let err = Validator::new(false)
            .validate_expression("Pipeline::select", &expr)
            .unwrap_err();
        assert!(err.to_string().contains("doc.outer.inner"));
    }

    #[test]
    fn test_raw_options_checked_after_stage_body() {
        let raw = RawOptions::new()
            .with("hint", "scan")
            .with("ts", FieldTransform::ServerTimestamp);
        let stage = Stage::new(StageKind::Limit { limit: 3 }, raw);
        let err = Validator::new(true).validate_stage(&stage).unwrap_err();
        match err {
            PipelineError::Validation { method, message } => {
                assert_eq!(method, "Pipeline::limit");
                assert!(message.contains("found in field ts"));
            }
            other => panic!("Expected Validation, got {:?}", other),
        }

        let stage = Stage::new(
            StageKind::Limit { limit: 3 },
            RawOptions::new().with("hint", ConstantValue::Undefined),
        );
        assert!(Validator::new(false).validate_stage(&stage).is_err());
        assert!(Validator::new(true).validate_stage(&stage).is_ok());
    }

    #[test]
    fn test_empty_field_segment_rejected() {
        let err = Validator::new(false)
            .validate_expression("Pipeline::select", &field("a..b").into())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation { .. }));
    }
}
