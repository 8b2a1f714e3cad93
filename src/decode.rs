//! Conversion of wire values returned by the engine into plain JSON.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use docpipe_core::WireValue;
use serde_json::{Map, Number, Value};

/// Lossy JSON view of a wire value.
///
/// Timestamps become RFC 3339 strings, bytes become base64 and vectors become number
/// arrays. Non-finite doubles become `null`.
pub fn wire_to_json(value: &WireValue) -> Value {
    match value {
        WireValue::NullValue => Value::Null,
        WireValue::BooleanValue(b) => Value::Bool(*b),
        WireValue::IntegerValue(i) => Value::from(*i),
        WireValue::DoubleValue(d) => double(*d),
        WireValue::TimestampValue(ts) => Value::String(ts.to_rfc3339()),
        WireValue::StringValue(s) => Value::String(s.clone()),
        WireValue::BytesValue(bytes) => Value::String(STANDARD.encode(bytes)),
        WireValue::ReferenceValue(name) => Value::String(name.clone()),
        WireValue::GeoPointValue(point) => {
            let mut map = Map::new();
            map.insert("latitude".to_string(), double(point.latitude));
            map.insert("longitude".to_string(), double(point.longitude));
            Value::Object(map)
        }
        WireValue::ArrayValue(array) => Value::Array(array.values.iter().map(wire_to_json).collect()),
        WireValue::MapValue(map) => {
            if let Some(values) = value.as_vector() {
                return Value::Array(values.into_iter().map(double).collect());
            }
            Value::Object(
                map.fields
                    .iter()
                    .map(|(k, v)| (k.clone(), wire_to_json(v)))
                    .collect(),
            )
        }
        WireValue::FieldReferenceValue(path) => Value::String(path.clone()),
        WireValue::FunctionValue(function) => Value::String(format!("{}(...)", function.name)),
        WireValue::PipelineValue(_) => Value::Null,
    }
}

fn double(d: f64) -> Value {
    Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null)
}
