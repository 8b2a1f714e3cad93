//! Wire format consumed by the execution engine.
//!
//! A pipeline is sent as `{stages: [{name, args, options}]}`. Values use the tagged
//! representation below; maps are ordered by key so that encodings are deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{GeoPoint, Timestamp};

/// Map key/value that tags a map as an embedding vector.
pub const VECTOR_TYPE_KEY: &str = "__type__";
pub const VECTOR_TYPE_VALUE: &str = "__vector__";
pub const VECTOR_VALUE_KEY: &str = "value";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireValue {
    NullValue,
    BooleanValue(bool),
    IntegerValue(i64),
    DoubleValue(f64),
    TimestampValue(Timestamp),
    StringValue(String),
    BytesValue(#[serde(with = "base64_bytes")] Vec<u8>),
    ReferenceValue(String),
    GeoPointValue(GeoPoint),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
    FieldReferenceValue(String),
    FunctionValue(FunctionValue),
    PipelineValue(WirePipeline),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<WireValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: BTreeMap<String, WireValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionValue {
    pub name: String,
    #[serde(default)]
    pub args: Vec<WireValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, WireValue>,
}

/// One encoded stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireStage {
    pub name: String,
    #[serde(default)]
    pub args: Vec<WireValue>,
    #[serde(default)]
    pub options: BTreeMap<String, WireValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WirePipeline {
    pub stages: Vec<WireStage>,
}

/// A pipeline plus request-level options (explain mode and the like).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructuredPipeline {
    pub pipeline: WirePipeline,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, WireValue>,
}

impl WireValue {
    pub fn string(value: impl Into<String>) -> Self {
        WireValue::StringValue(value.into())
    }

    pub fn field_reference(path: impl Into<String>) -> Self {
        WireValue::FieldReferenceValue(path.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        WireValue::ReferenceValue(name.into())
    }

    pub fn array(values: impl IntoIterator<Item = WireValue>) -> Self {
        WireValue::ArrayValue(ArrayValue {
            values: values.into_iter().collect(),
        })
    }

    pub fn map<K: Into<String>>(fields: impl IntoIterator<Item = (K, WireValue)>) -> Self {
        WireValue::MapValue(MapValue {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }

    pub fn function(name: impl Into<String>, args: Vec<WireValue>) -> Self {
        WireValue::FunctionValue(FunctionValue {
            name: name.into(),
            args,
            options: BTreeMap::new(),
        })
    }

    /// `{__type__: "__vector__", value: [doubles]}`
    pub fn vector(values: &[f64]) -> Self {
        WireValue::map([
            (VECTOR_TYPE_KEY, WireValue::string(VECTOR_TYPE_VALUE)),
            (
                VECTOR_VALUE_KEY,
                WireValue::array(values.iter().map(|v| WireValue::DoubleValue(*v))),
            ),
        ])
    }

    pub fn as_function(&self) -> Option<&FunctionValue> {
        match self {
            WireValue::FunctionValue(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_field_reference(&self) -> Option<&str> {
        match self {
            WireValue::FieldReferenceValue(path) => Some(path),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, WireValue>> {
        match self {
            WireValue::MapValue(m) => Some(&m.fields),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[WireValue]> {
        match self {
            WireValue::ArrayValue(a) => Some(&a.values),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::StringValue(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            WireValue::IntegerValue(i) => Some(*i),
            _ => None,
        }
    }

    /// Vector payload if this is a tagged vector map.
    pub fn as_vector(&self) -> Option<Vec<f64>> {
        let fields = self.as_map()?;
        if fields.get(VECTOR_TYPE_KEY)?.as_str()? != VECTOR_TYPE_VALUE {
            return None;
        }
        fields
            .get(VECTOR_VALUE_KEY)?
            .as_array()?
            .iter()
            .map(|v| match v {
                WireValue::DoubleValue(d) => Some(*d),
                WireValue::IntegerValue(i) => Some(*i as f64),
                _ => None,
            })
            .collect()
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tagged_json_shape() {
        let value = WireValue::function(
            "greater_than",
            vec![WireValue::field_reference("rating"), WireValue::IntegerValue(4)],
        );
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"function_value": {
                "name": "greater_than",
                "args": [{"field_reference_value": "rating"}, {"integer_value": 4}]
            }})
        );
    }

    #[test]
    fn test_bytes_are_base64() {
        let value = WireValue::BytesValue(vec![0, 1, 2, 255]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, json!({"bytes_value": "AAEC/w=="}));

        let back: WireValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_vector_tagging() {
        let vector = WireValue::vector(&[1.0, 2.5]);
        assert_eq!(vector.as_vector(), Some(vec![1.0, 2.5]));
        assert_eq!(WireValue::map([("value", WireValue::NullValue)]).as_vector(), None);
    }

    #[test]
    fn test_stage_deserializes_with_defaults() {
        let stage: WireStage = serde_json::from_value(json!({"name": "database"})).unwrap();
        assert_eq!(stage.name, "database");
        assert!(stage.args.is_empty());
        assert!(stage.options.is_empty());
    }
}
