//! Literal values that can be embedded in expressions as constants.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::reference::DocumentReference;
use crate::wire::WireValue;

/// A point in time with nanosecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    pub fn now() -> Self {
        Utc::now().into()
    }

    pub fn from_millis(millis: i64) -> Self {
        let seconds = millis.div_euclid(1000);
        let nanos = (millis.rem_euclid(1000) * 1_000_000) as i32;
        Self { seconds, nanos }
    }

    /// `None` when the value is outside chrono's representable range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.seconds, self.nanos.max(0) as u32).single()
    }

    pub fn to_rfc3339(&self) -> String {
        match self.to_datetime() {
            Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
            None => format!("{}.{:09}", self.seconds, self.nanos),
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos() as i32,
        }
    }
}

/// Latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Opaque embedding vector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorValue(Vec<f64>);

impl VectorValue {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for VectorValue {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl From<&[f64]> for VectorValue {
    fn from(values: &[f64]) -> Self {
        Self(values.to_vec())
    }
}

/// Write-time sentinels. They are meaningful in document writes only and are
/// rejected wherever they appear inside a pipeline expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTransform {
    Delete,
    ServerTimestamp,
    Increment(Box<ConstantValue>),
    ArrayUnion(Vec<ConstantValue>),
    ArrayRemove(Vec<ConstantValue>),
}

impl FieldTransform {
    pub fn method_name(&self) -> &'static str {
        match self {
            FieldTransform::Delete => "FieldTransform::Delete",
            FieldTransform::ServerTimestamp => "FieldTransform::ServerTimestamp",
            FieldTransform::Increment(_) => "FieldTransform::Increment",
            FieldTransform::ArrayUnion(_) => "FieldTransform::ArrayUnion",
            FieldTransform::ArrayRemove(_) => "FieldTransform::ArrayRemove",
        }
    }
}

/// Any literal that can appear as a constant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(Timestamp),
    GeoPoint(GeoPoint),
    Vector(VectorValue),
    Reference(DocumentReference),
    Array(Vec<ConstantValue>),
    /// Entries keep insertion order.
    Map(Vec<(String, ConstantValue)>),
    /// Absent-value marker. Rejected by the validator unless undefined properties are ignored.
    Undefined,
    Transform(FieldTransform),
    /// Already encoded; passed through to the wire untouched.
    Wire(WireValue),
}

impl ConstantValue {
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        ConstantValue::Bytes(data.into())
    }

    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<ConstantValue>,
    {
        ConstantValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn array<V: Into<ConstantValue>>(values: impl IntoIterator<Item = V>) -> Self {
        ConstantValue::Array(values.into_iter().map(Into::into).collect())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ConstantValue::Null => "null",
            ConstantValue::Boolean(_) => "boolean",
            ConstantValue::Integer(_) => "integer",
            ConstantValue::Double(_) => "double",
            ConstantValue::String(_) => "string",
            ConstantValue::Bytes(_) => "bytes",
            ConstantValue::Timestamp(_) => "timestamp",
            ConstantValue::GeoPoint(_) => "geo point",
            ConstantValue::Vector(_) => "vector",
            ConstantValue::Reference(_) => "reference",
            ConstantValue::Array(_) => "array",
            ConstantValue::Map(_) => "map",
            ConstantValue::Undefined => "undefined",
            ConstantValue::Transform(_) => "field transform",
            ConstantValue::Wire(_) => "wire value",
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Null => write!(f, "null"),
            ConstantValue::Boolean(b) => write!(f, "{}", b),
            ConstantValue::Integer(i) => write!(f, "{}", i),
            ConstantValue::Double(d) => write!(f, "{}", d),
            ConstantValue::String(s) => write!(f, "\"{}\"", s),
            ConstantValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            ConstantValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            ConstantValue::GeoPoint(p) => write!(f, "GeoPoint({}, {})", p.latitude, p.longitude),
            ConstantValue::Vector(v) => write!(f, "Vector({:?})", v.values()),
            ConstantValue::Reference(r) => write!(f, "DocumentReference({})", r.path()),
            ConstantValue::Array(items) => write!(f, "<array of {}>", items.len()),
            ConstantValue::Map(entries) => write!(f, "<map of {}>", entries.len()),
            ConstantValue::Undefined => write!(f, "undefined"),
            ConstantValue::Transform(t) => write!(f, "{}", t.method_name()),
            ConstantValue::Wire(_) => write!(f, "<wire value>"),
        }
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ConstantValue {
                fn from(v: $t) -> Self {
                    ConstantValue::Integer(v as i64)
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for ConstantValue {
    fn from(v: bool) -> Self {
        ConstantValue::Boolean(v)
    }
}

impl From<f32> for ConstantValue {
    fn from(v: f32) -> Self {
        ConstantValue::Double(v as f64)
    }
}

impl From<f64> for ConstantValue {
    fn from(v: f64) -> Self {
        ConstantValue::Double(v)
    }
}

impl From<&str> for ConstantValue {
    fn from(v: &str) -> Self {
        ConstantValue::String(v.to_string())
    }
}

impl From<String> for ConstantValue {
    fn from(v: String) -> Self {
        ConstantValue::String(v)
    }
}

impl From<Timestamp> for ConstantValue {
    fn from(v: Timestamp) -> Self {
        ConstantValue::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for ConstantValue {
    fn from(v: DateTime<Utc>) -> Self {
        ConstantValue::Timestamp(v.into())
    }
}

impl From<GeoPoint> for ConstantValue {
    fn from(v: GeoPoint) -> Self {
        ConstantValue::GeoPoint(v)
    }
}

impl From<VectorValue> for ConstantValue {
    fn from(v: VectorValue) -> Self {
        ConstantValue::Vector(v)
    }
}

impl From<DocumentReference> for ConstantValue {
    fn from(v: DocumentReference) -> Self {
        ConstantValue::Reference(v)
    }
}

impl From<FieldTransform> for ConstantValue {
    fn from(v: FieldTransform) -> Self {
        ConstantValue::Transform(v)
    }
}

impl From<WireValue> for ConstantValue {
    fn from(v: WireValue) -> Self {
        ConstantValue::Wire(v)
    }
}

impl From<Vec<ConstantValue>> for ConstantValue {
    fn from(v: Vec<ConstantValue>) -> Self {
        ConstantValue::Array(v)
    }
}

impl<T: Into<ConstantValue>> From<Option<T>> for ConstantValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ConstantValue::Null)
    }
}

impl From<serde_json::Value> for ConstantValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;

        match v {
            Value::Null => ConstantValue::Null,
            Value::Bool(b) => ConstantValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ConstantValue::Integer(i),
                None => ConstantValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ConstantValue::String(s),
            Value::Array(items) => {
                ConstantValue::Array(items.into_iter().map(ConstantValue::from).collect())
            }
            Value::Object(map) => ConstantValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, ConstantValue::from(v)))
                    .collect(),
            ),
        }
    }
}
