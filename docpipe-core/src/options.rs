//! Stage options: statically known options plus caller-supplied raw overrides.
//!
//! Every stage declares a table of [`KnownOption`]s. At serialization time the computed values
//! are encoded under their wire names, then the raw overrides are laid over the result. Raw
//! keys may be dotted paths into nested option maps and always win.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::expr::{Expression, Field, IntoExpr};
use crate::ordered_map::OrderedMap;
use crate::serialize::Serializer;
use crate::wire::{MapValue, WireValue};

/// Value kinds a known option accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Integer,
    String,
    Boolean,
    FieldReference,
    Expression,
}

/// Declared option: the builder-facing name, its wire name and accepted kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownOption {
    pub name: &'static str,
    pub wire_name: &'static str,
    pub kind: OptionKind,
}

impl KnownOption {
    pub const fn new(name: &'static str, wire_name: &'static str, kind: OptionKind) -> Self {
        Self {
            name,
            wire_name,
            kind,
        }
    }
}

/// A computed option value, keyed by its builder-facing name.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Integer(i64),
    String(String),
    Boolean(bool),
    Field(Field),
    Expression(Expression),
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Integer(_) => OptionKind::Integer,
            OptionValue::String(_) => OptionKind::String,
            OptionValue::Boolean(_) => OptionKind::Boolean,
            OptionValue::Field(_) => OptionKind::FieldReference,
            OptionValue::Expression(_) => OptionKind::Expression,
        }
    }

    fn encode(&self, serializer: &Serializer) -> PipelineResult<WireValue> {
        Ok(match self {
            OptionValue::Integer(i) => WireValue::IntegerValue(*i),
            OptionValue::String(s) => WireValue::string(s.as_str()),
            OptionValue::Boolean(b) => WireValue::BooleanValue(*b),
            OptionValue::Field(f) => WireValue::field_reference(f.path()),
            OptionValue::Expression(e) => serializer.encode_expression(e)?,
        })
    }
}

/// Arbitrary option overrides, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOptions {
    entries: OrderedMap<Expression>,
}

impl RawOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an override. `key` may be a dotted path such as `"hints.index"`.
    pub fn with(mut self, key: impl Into<String>, value: impl IntoExpr) -> Self {
        self.entries.insert(key, value.into_expr());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl IntoExpr) {
        self.entries.insert(key, value.into_expr());
    }

    pub fn get(&self, key: &str) -> Option<&Expression> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expression)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: IntoExpr> FromIterator<(K, V)> for RawOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = RawOptions::new();
        for (key, value) in iter {
            options.insert(key, value);
        }
        options
    }
}

impl TryFrom<serde_json::Value> for RawOptions {
    type Error = PipelineError;

    fn try_from(value: serde_json::Value) -> PipelineResult<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            serde_json::Value::Null => Ok(RawOptions::new()),
            other => Err(PipelineError::InvalidArgument(format!(
                "raw options must be an object, got {}",
                other
            ))),
        }
    }
}

/// Merges computed known options with raw overrides for one stage.
#[derive(Debug, Clone, Copy)]
pub struct OptionsMerger<'a> {
    stage: &'a str,
    known: &'static [KnownOption],
}

impl<'a> OptionsMerger<'a> {
    pub fn new(stage: &'a str, known: &'static [KnownOption]) -> Self {
        Self { stage, known }
    }

    fn lookup(&self, name: &str) -> PipelineResult<&'static KnownOption> {
        self.known.iter().find(|k| k.name == name).ok_or_else(|| {
            PipelineError::Internal(format!(
                "stage '{}' has no known option named '{}'",
                self.stage, name
            ))
        })
    }

    pub fn merge(
        &self,
        computed: &[(&'static str, OptionValue)],
        raw: &RawOptions,
        serializer: &Serializer,
    ) -> PipelineResult<BTreeMap<String, WireValue>> {
        let mut merged = BTreeMap::new();

        for (name, value) in computed {
            let known = self.lookup(name)?;
            if value.kind() != known.kind {
                return Err(PipelineError::Internal(format!(
                    "option '{}' of stage '{}' expects {:?}, got {:?}",
                    name,
                    self.stage,
                    known.kind,
                    value.kind()
                )));
            }
            merged.insert(known.wire_name.to_string(), value.encode(serializer)?);
        }

        for (key, expr) in raw.iter() {
            let value = serializer.encode_expression(expr).map_err(|e| {
                PipelineError::Serialization(format!(
                    "option '{}' of stage '{}' has no wire representation: {}",
                    key, self.stage, e
                ))
            })?;
            let replaced = set_path(&mut merged, key, value)?;
            if replaced {
                warn!(stage = self.stage, option = key, "Raw option overrides computed value");
            } else {
                debug!(stage = self.stage, option = key, "Applied raw option");
            }
        }

        Ok(merged)
    }
}

/// Sets `value` at a dotted `path`, creating intermediate maps. Returns whether a value was
/// replaced.
fn set_path(
    root: &mut BTreeMap<String, WireValue>,
    path: &str,
    value: WireValue,
) -> PipelineResult<bool> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(PipelineError::InvalidArgument(format!(
            "option path '{}' contains an empty segment",
            path
        )));
    }

    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return Ok(false),
    };

    let mut current = root;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| WireValue::MapValue(MapValue::default()));
        if !matches!(entry, WireValue::MapValue(_)) {
            *entry = WireValue::MapValue(MapValue::default());
        }
        current = match entry {
            WireValue::MapValue(map) => &mut map.fields,
            _ => {
                return Err(PipelineError::Internal(format!(
                    "option path '{}' did not resolve to a map",
                    path
                )))
            }
        };
    }

    Ok(current.insert(last.to_string(), value).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::field;
    use crate::serialize::SerializerSettings;
    use crate::value::ConstantValue;
    use serde_json::json;

    const KNOWN: &[KnownOption] = &[
        KnownOption::new("limit", "limit", OptionKind::Integer),
        KnownOption::new("distanceField", "distance_field", OptionKind::FieldReference),
    ];

    fn serializer() -> Serializer {
        Serializer::new(SerializerSettings::default())
    }

    #[test]
    fn test_known_options_use_wire_names() {
        let merged = OptionsMerger::new("find_nearest", KNOWN)
            .merge(
                &[
                    ("limit", OptionValue::Integer(5)),
                    ("distanceField", OptionValue::Field(field("d"))),
                ],
                &RawOptions::new(),
                &serializer(),
            )
            .unwrap();

        assert_eq!(merged.get("limit"), Some(&WireValue::IntegerValue(5)));
        assert_eq!(
            merged.get("distance_field"),
            Some(&WireValue::field_reference("d"))
        );
        assert!(!merged.contains_key("distanceField"));
    }

    #[test]
    fn test_raw_override_wins() {
        let raw = RawOptions::new().with("distance_field", field("other"));
        let merged = OptionsMerger::new("find_nearest", KNOWN)
            .merge(
                &[("distanceField", OptionValue::Field(field("d")))],
                &raw,
                &serializer(),
            )
            .unwrap();

        assert_eq!(
            merged.get("distance_field"),
            Some(&WireValue::field_reference("other"))
        );
    }

    #[test]
    fn test_dotted_raw_keys_nest() {
        let raw = RawOptions::new()
            .with("hints.index", "by_rating")
            .with("hints.scan", true);
        let merged = OptionsMerger::new("collection", &[])
            .merge(&[], &raw, &serializer())
            .unwrap();

        let hints = merged.get("hints").and_then(WireValue::as_map).unwrap();
        assert_eq!(hints.get("index"), Some(&WireValue::string("by_rating")));
        assert_eq!(hints.get("scan"), Some(&WireValue::BooleanValue(true)));
    }

    #[test]
    fn test_unknown_computed_option_is_internal_error() {
        let err = OptionsMerger::new("limit", &[])
            .merge(&[("limit", OptionValue::Integer(1))], &RawOptions::new(), &serializer())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Internal(_)));
    }

    #[test]
    fn test_unrepresentable_raw_value_fails() {
        let raw = RawOptions::new().with("x", ConstantValue::Undefined);
        let err = OptionsMerger::new("select", &[])
            .merge(&[], &raw, &serializer())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Serialization(ref msg) if msg.contains("'x'")));
    }

    #[test]
    fn test_raw_options_from_json() {
        let raw = RawOptions::try_from(json!({"a": 1, "b": "two"})).unwrap();
        assert_eq!(raw.len(), 2);
        assert!(RawOptions::try_from(json!([1])).is_err());
    }

    #[test]
    fn test_empty_path_segment_rejected() {
        let raw = RawOptions::new().with("a..b", 1);
        let err = OptionsMerger::new("select", &[])
            .merge(&[], &raw, &serializer())
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }
}
