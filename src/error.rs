use docpipe_core::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Construction-time usage errors are caller bugs; everything else comes from I/O or data.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ClientError::Pipeline(
                PipelineError::UnsupportedOperand(_)
                    | PipelineError::InvalidArgument(_)
                    | PipelineError::DatabaseMismatch { .. }
            )
        )
    }
}

impl serde::Serialize for ClientError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_is_transparent() {
        let err: ClientError = PipelineError::InvalidArgument("bad".to_string()).into();
        assert_eq!(err.to_string(), "Invalid argument: bad");
        assert!(err.is_usage_error());
    }

    #[test]
    fn test_decode_error_message() {
        let err = ClientError::Decode("no payload".to_string());
        assert_eq!(err.to_string(), "Decode error: no payload");
        assert!(!err.is_usage_error());
        assert_eq!(serde_json::to_value(&err).unwrap(), "Decode error: no payload");
    }
}
