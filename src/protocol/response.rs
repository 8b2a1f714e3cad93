use std::collections::BTreeMap;

use docpipe_core::{Timestamp, WireValue};
use serde::{Deserialize, Serialize};

/// A result document as returned by the engine. `name` is absent for computed rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, WireValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<Timestamp>,
}

impl WireDocument {
    pub fn new<K: Into<String>>(fields: impl IntoIterator<Item = (K, WireValue)>) -> Self {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A type-tagged opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyPayload {
    pub type_url: String,
    #[serde(with = "super::base64_bytes", default)]
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExplainStatsPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AnyPayload>,
}

/// One response message. Streaming executions may deliver several.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutePipelineResponse {
    #[serde(
        default,
        with = "super::base64_bytes_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction: Option<Vec<u8>>,
    #[serde(default)]
    pub results: Vec<WireDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain_stats: Option<ExplainStatsPayload>,
}

impl ExecutePipelineResponse {
    pub fn with_results(results: Vec<WireDocument>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }
}
