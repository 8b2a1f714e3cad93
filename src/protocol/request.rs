use docpipe_core::{StructuredPipeline, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainMode {
    /// Run the pipeline and return results only.
    #[default]
    Execute,
    /// Plan without executing.
    Explain,
    /// Execute and return results together with execution statistics.
    Analyze,
}

impl ExplainMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplainMode::Execute => "execute",
            ExplainMode::Explain => "explain",
            ExplainMode::Analyze => "analyze",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainOptions {
    pub mode: ExplainMode,
}

/// Read consistency for one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencySelector {
    Transaction(#[serde(with = "super::base64_bytes")] Vec<u8>),
    ReadTime(Timestamp),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutePipelineRequest {
    /// `projects/{project}/databases/{database}`
    pub database: String,
    pub structured_pipeline: StructuredPipeline,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency: Option<ConsistencySelector>,
}

impl ExecutePipelineRequest {
    /// Explain mode carried in the pipeline options, if any.
    pub fn explain_mode(&self) -> Option<ExplainMode> {
        let options = self
            .structured_pipeline
            .options
            .get("explain_options")?
            .as_map()?;
        match options.get("mode")?.as_str()? {
            "execute" => Some(ExplainMode::Execute),
            "explain" => Some(ExplainMode::Explain),
            "analyze" => Some(ExplainMode::Analyze),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_consistency_serialization() {
        let selector = ConsistencySelector::Transaction(vec![1, 2, 3]);
        assert_eq!(serde_json::to_value(&selector).unwrap(), json!({"transaction": "AQID"}));

        let selector = ConsistencySelector::ReadTime(Timestamp::new(10, 5));
        assert_eq!(
            serde_json::to_value(&selector).unwrap(),
            json!({"read_time": {"seconds": 10, "nanos": 5}})
        );
    }

    #[test]
    fn test_explain_mode_serialization() {
        assert_eq!(serde_json::to_value(ExplainMode::Analyze).unwrap(), json!("analyze"));
        assert_eq!(ExplainMode::default(), ExplainMode::Execute);
    }
}
