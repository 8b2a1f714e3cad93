//! The execution collaborator: whatever actually runs a compiled pipeline.
//!
//! The client never talks to a network itself. It hands an [`ExecutePipelineRequest`] to a
//! [`PipelineExecutor`] and decodes what comes back.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::protocol::{ExecutePipelineRequest, ExecutePipelineResponse};

#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    /// Run a pipeline and return the complete result in one response.
    async fn execute(&self, request: ExecutePipelineRequest) -> ClientResult<ExecutePipelineResponse>;

    /// Run a pipeline and deliver responses incrementally.
    ///
    /// The default yields the single batched response from [`PipelineExecutor::execute`].
    fn stream(
        &self,
        request: ExecutePipelineRequest,
    ) -> BoxStream<'_, ClientResult<ExecutePipelineResponse>> {
        let stream = async_stream::try_stream! {
            let response = self.execute(request).await?;
            yield response;
        };
        stream.boxed()
    }
}

enum Reply {
    Response(ExecutePipelineResponse),
    Error(String),
    Chunks(Vec<ExecutePipelineResponse>),
}

/// In-memory executor for testing.
///
/// Records every request it receives and replays queued replies in order. With an empty
/// queue it answers with an empty response.
#[derive(Default)]
pub struct InMemoryExecutor {
    requests: Mutex<Vec<ExecutePipelineRequest>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    pub fn push_response(&self, response: ExecutePipelineResponse) {
        self.replies.lock().push_back(Reply::Response(response));
    }

    /// Queue an execution failure
    pub fn push_error(&self, message: impl Into<String>) {
        self.replies.lock().push_back(Reply::Error(message.into()));
    }

    /// Queue a reply delivered as several partial responses when streamed.
    pub fn push_chunks(&self, chunks: Vec<ExecutePipelineResponse>) {
        self.replies.lock().push_back(Reply::Chunks(chunks));
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<ExecutePipelineRequest> {
        self.requests.lock().clone()
    }

    fn next_reply(&self, request: ExecutePipelineRequest) -> Reply {
        debug!(
            database = %request.database,
            stages = request.structured_pipeline.pipeline.stages.len(),
            "In-memory executor received pipeline"
        );
        self.requests.lock().push(request);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or(Reply::Response(ExecutePipelineResponse::default()))
    }
}

/// Folds partial responses into one: results concatenate, the last non-empty metadata wins.
fn combine(chunks: Vec<ExecutePipelineResponse>) -> ExecutePipelineResponse {
    let mut combined = ExecutePipelineResponse::default();
    for chunk in chunks {
        combined.results.extend(chunk.results);
        if chunk.transaction.is_some() {
            combined.transaction = chunk.transaction;
        }
        if chunk.execution_time.is_some() {
            combined.execution_time = chunk.execution_time;
        }
        if chunk.explain_stats.is_some() {
            combined.explain_stats = chunk.explain_stats;
        }
    }
    combined
}

#[async_trait]
impl PipelineExecutor for InMemoryExecutor {
    async fn execute(&self, request: ExecutePipelineRequest) -> ClientResult<ExecutePipelineResponse> {
        match self.next_reply(request) {
            Reply::Response(response) => Ok(response),
            Reply::Error(message) => Err(ClientError::Execution(message)),
            Reply::Chunks(chunks) => Ok(combine(chunks)),
        }
    }

    fn stream(
        &self,
        request: ExecutePipelineRequest,
    ) -> BoxStream<'_, ClientResult<ExecutePipelineResponse>> {
        let reply = self.next_reply(request);
        let stream = async_stream::try_stream! {
            match reply {
                Reply::Response(response) => yield response,
                Reply::Error(message) => Err(ClientError::Execution(message))?,
                Reply::Chunks(chunks) => {
                    for chunk in chunks {
                        yield chunk;
                    }
                }
            }
        };
        stream.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpipe_core::{StructuredPipeline, Timestamp};
    use futures::TryStreamExt;

    use crate::protocol::WireDocument;

    fn request() -> ExecutePipelineRequest {
        ExecutePipelineRequest {
            database: "projects/p/databases/(default)".to_string(),
            structured_pipeline: StructuredPipeline::default(),
            consistency: None,
        }
    }

    #[tokio::test]
    async fn test_empty_queue_returns_empty_response() {
        let executor = InMemoryExecutor::new();
        let response = executor.execute(request()).await.unwrap();
        assert!(response.results.is_empty());
        assert_eq!(executor.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_error_reply() {
        let executor = InMemoryExecutor::new();
        executor.push_error("unavailable");
        let err = executor.execute(request()).await.unwrap_err();
        assert!(matches!(err, ClientError::Execution(ref m) if m == "unavailable"));
    }

    #[tokio::test]
    async fn test_chunks_combine_on_execute() {
        let executor = InMemoryExecutor::new();
        executor.push_chunks(vec![
            ExecutePipelineResponse::with_results(vec![WireDocument::default()]),
            ExecutePipelineResponse {
                results: vec![WireDocument::default()],
                execution_time: Some(Timestamp::new(5, 0)),
                ..Default::default()
            },
        ]);
        let response = executor.execute(request()).await.unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.execution_time, Some(Timestamp::new(5, 0)));
    }

    #[tokio::test]
    async fn test_stream_yields_chunks_in_order() {
        let executor = InMemoryExecutor::new();
        executor.push_chunks(vec![
            ExecutePipelineResponse::with_results(vec![WireDocument::default()]),
            ExecutePipelineResponse::with_results(vec![
                WireDocument::default(),
                WireDocument::default(),
            ]),
        ]);
        let chunks: Vec<_> = executor.stream(request()).try_collect().await.unwrap();
        let sizes: Vec<usize> = chunks.iter().map(|c| c.results.len()).collect();
        assert_eq!(sizes, vec![1, 2]);
    }

    #[test]
    fn test_stream_error_with_block_on() {
        let executor = InMemoryExecutor::new();
        executor.push_error("boom");
        let result: ClientResult<Vec<_>> =
            tokio_test::block_on(executor.stream(request()).try_collect());
        assert!(matches!(result, Err(ClientError::Execution(_))));
    }
}
