//! Decoded pipeline results.

use std::collections::BTreeMap;

use docpipe_core::{DocumentReference, Timestamp, WireValue};
use serde_json::{Map, Value};

use crate::decode::wire_to_json;
use crate::error::{ClientError, ClientResult};
use crate::explain::ExplainStats;
use crate::protocol::{ExecutePipelineResponse, WireDocument};

/// One result row. Rows produced by `select`/`aggregate` have no document reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    reference: Option<DocumentReference>,
    fields: BTreeMap<String, WireValue>,
    create_time: Option<Timestamp>,
    update_time: Option<Timestamp>,
    execution_time: Option<Timestamp>,
}

impl Row {
    pub(crate) fn from_wire(
        document: WireDocument,
        execution_time: Option<Timestamp>,
    ) -> ClientResult<Self> {
        let reference = document
            .name
            .as_deref()
            .map(DocumentReference::from_resource_name)
            .transpose()
            .map_err(|e| ClientError::Decode(format!("invalid document name: {}", e)))?;
        Ok(Self {
            reference,
            fields: document.fields,
            create_time: document.create_time,
            update_time: document.update_time,
            execution_time,
        })
    }

    pub fn reference(&self) -> Option<&DocumentReference> {
        self.reference.as_ref()
    }

    pub fn id(&self) -> Option<&str> {
        self.reference.as_ref().map(DocumentReference::id)
    }

    pub fn create_time(&self) -> Option<Timestamp> {
        self.create_time
    }

    pub fn update_time(&self) -> Option<Timestamp> {
        self.update_time
    }

    pub fn execution_time(&self) -> Option<Timestamp> {
        self.execution_time
    }

    /// Raw wire values keyed by top-level field name
    pub fn fields(&self) -> &BTreeMap<String, WireValue> {
        &self.fields
    }

    /// The row as a JSON object.
    pub fn data(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), wire_to_json(v)))
            .collect();
        Value::Object(map)
    }

    /// Field at a dotted path such as `author.name`.
    pub fn get(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_map()?.get(segment)?;
        }
        Some(wire_to_json(current))
    }
}

/// The complete result of one execution.
#[derive(Debug, Clone)]
pub struct PipelineSnapshot {
    results: Vec<Row>,
    execution_time: Option<Timestamp>,
    explain_stats: Option<ExplainStats>,
    transaction: Option<Vec<u8>>,
}

impl PipelineSnapshot {
    pub(crate) fn from_response(response: ExecutePipelineResponse) -> ClientResult<Self> {
        let execution_time = response.execution_time;
        let results = response
            .results
            .into_iter()
            .map(|doc| Row::from_wire(doc, execution_time))
            .collect::<ClientResult<Vec<_>>>()?;
        Ok(Self {
            results,
            execution_time,
            explain_stats: response.explain_stats.map(ExplainStats::new),
            transaction: response.transaction,
        })
    }

    pub fn results(&self) -> &[Row] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Row> {
        self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn execution_time(&self) -> Option<Timestamp> {
        self.execution_time
    }

    /// Present only when the execution ran in explain or analyze mode.
    pub fn explain_stats(&self) -> Option<&ExplainStats> {
        self.explain_stats.as_ref()
    }

    /// Transaction id returned by the engine, if it began one.
    pub fn transaction(&self) -> Option<&[u8]> {
        self.transaction.as_deref()
    }
}
