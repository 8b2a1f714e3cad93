//! Entry points that compile a pipeline into a request and run it through an executor.

use docpipe_core::{
    DatabaseId, IntoExpr, OptionsMerger, Pipeline, PipelineError, PipelineSource, RawOptions,
    Serializer, Timestamp, WireValue,
};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::executor::PipelineExecutor;
use crate::protocol::{ConsistencySelector, ExecutePipelineRequest, ExplainMode};
use crate::settings::Settings;
use crate::snapshot::{PipelineSnapshot, Row};

/// Per-call execution options.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    consistency: Option<ConsistencySelector>,
    explain: Option<ExplainMode>,
    raw_options: RawOptions,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read within an existing transaction. Cannot be combined with a read time.
    pub fn with_transaction(mut self, transaction: impl Into<Vec<u8>>) -> ClientResult<Self> {
        if matches!(self.consistency, Some(ConsistencySelector::ReadTime(_))) {
            return Err(PipelineError::InvalidArgument(
                "a transaction and a read time cannot both be set".to_string(),
            )
            .into());
        }
        self.consistency = Some(ConsistencySelector::Transaction(transaction.into()));
        Ok(self)
    }

    /// Read at a point in time. Cannot be combined with a transaction.
    pub fn with_read_time(mut self, read_time: Timestamp) -> ClientResult<Self> {
        if matches!(self.consistency, Some(ConsistencySelector::Transaction(_))) {
            return Err(PipelineError::InvalidArgument(
                "a transaction and a read time cannot both be set".to_string(),
            )
            .into());
        }
        self.consistency = Some(ConsistencySelector::ReadTime(read_time));
        Ok(self)
    }

    pub fn explain(mut self, mode: ExplainMode) -> Self {
        self.explain = Some(mode);
        self
    }

    /// Request-level option passed through untouched. Dotted keys nest.
    pub fn raw_option(mut self, key: impl Into<String>, value: impl IntoExpr) -> Self {
        self.raw_options.insert(key, value);
        self
    }

    pub fn consistency(&self) -> Option<&ConsistencySelector> {
        self.consistency.as_ref()
    }
}

/// Runs pipelines against one database through an executor.
pub struct PipelineClient<E> {
    executor: E,
    settings: Settings,
    source: PipelineSource,
}

impl<E: PipelineExecutor> PipelineClient<E> {
    pub fn new(executor: E, settings: Settings) -> ClientResult<Self> {
        settings.validate()?;
        let source = PipelineSource::new(settings.database());
        Ok(Self {
            executor,
            settings,
            source,
        })
    }

    /// Source factory bound to the configured database.
    pub fn pipeline(&self) -> &PipelineSource {
        &self.source
    }

    pub fn database(&self) -> &DatabaseId {
        self.source.database_id()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Validate and serialize a pipeline into the request the executor receives.
    pub fn compile(
        &self,
        pipeline: &Pipeline,
        options: &ExecuteOptions,
    ) -> ClientResult<ExecutePipelineRequest> {
        if pipeline.database() != self.database() {
            return Err(PipelineError::DatabaseMismatch {
                expected: self.database().resource_name(),
                actual: pipeline.database().resource_name(),
            }
            .into());
        }
        if pipeline.len() > self.settings.max_stages {
            return Err(PipelineError::InvalidArgument(format!(
                "pipeline has {} stages, more than the configured maximum of {}",
                pipeline.len(),
                self.settings.max_stages
            ))
            .into());
        }

        let serializer_settings = self.settings.serializer_settings();
        let mut structured = pipeline.to_structured_pipeline(&serializer_settings)?;

        let serializer = Serializer::new(serializer_settings);
        let mut request_options =
            OptionsMerger::new("execute", &[]).merge(&[], &options.raw_options, &serializer)?;

        if let Some(mode) = options.explain.or(self.settings.explain) {
            match request_options.get_mut("explain_options") {
                Some(WireValue::MapValue(existing)) => {
                    existing
                        .fields
                        .entry("mode".to_string())
                        .or_insert_with(|| WireValue::string(mode.as_str()));
                }
                Some(_) => {}
                None => {
                    request_options.insert(
                        "explain_options".to_string(),
                        WireValue::map([("mode", WireValue::string(mode.as_str()))]),
                    );
                }
            }
        }
        structured.options = request_options;

        Ok(ExecutePipelineRequest {
            database: self.database().resource_name(),
            structured_pipeline: structured,
            consistency: options.consistency.clone(),
        })
    }

    pub async fn execute(&self, pipeline: &Pipeline) -> ClientResult<PipelineSnapshot> {
        self.execute_with(pipeline, &ExecuteOptions::default()).await
    }

    pub async fn execute_with(
        &self,
        pipeline: &Pipeline,
        options: &ExecuteOptions,
    ) -> ClientResult<PipelineSnapshot> {
        let request = self.compile(pipeline, options)?;
        debug!(
            database = %request.database,
            stages = request.structured_pipeline.pipeline.stages.len(),
            "Executing pipeline"
        );
        let response = self.executor.execute(request).await?;
        PipelineSnapshot::from_response(response)
    }

    /// Rows as the executor delivers them. Compilation errors surface as the first item.
    pub fn stream<'a>(&'a self, pipeline: &Pipeline) -> BoxStream<'a, ClientResult<Row>> {
        self.stream_with(pipeline, &ExecuteOptions::default())
    }

    pub fn stream_with<'a>(
        &'a self,
        pipeline: &Pipeline,
        options: &ExecuteOptions,
    ) -> BoxStream<'a, ClientResult<Row>> {
        let request = match self.compile(pipeline, options) {
            Ok(request) => request,
            Err(e) => return futures::stream::once(async move { Err(e) }).boxed(),
        };
        debug!(database = %request.database, "Streaming pipeline");

        self.executor
            .stream(request)
            .map_ok(|response| {
                let execution_time = response.execution_time;
                futures::stream::iter(
                    response
                        .results
                        .into_iter()
                        .map(move |doc| Row::from_wire(doc, execution_time)),
                )
            })
            .try_flatten()
            .boxed()
    }
}

impl<E> std::fmt::Debug for PipelineClient<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineClient")
            .field("database", &self.source.database_id().resource_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InMemoryExecutor;
    use docpipe_core::prelude::*;

    fn client() -> PipelineClient<InMemoryExecutor> {
        PipelineClient::new(InMemoryExecutor::new(), Settings::new("test-project")).unwrap()
    }

    #[test]
    fn test_transaction_and_read_time_are_exclusive() {
        let err = ExecuteOptions::new()
            .with_transaction(vec![1])
            .unwrap()
            .with_read_time(Timestamp::new(1, 0))
            .unwrap_err();
        assert!(err.is_usage_error());

        assert!(ExecuteOptions::new()
            .with_read_time(Timestamp::new(1, 0))
            .unwrap()
            .with_transaction(vec![1])
            .is_err());
    }

    #[test]
    fn test_compile_sets_explain_mode() {
        let client = client();
        let pipeline = client.pipeline().collection("books").unwrap();
        let request = client
            .compile(&pipeline, &ExecuteOptions::new().explain(ExplainMode::Analyze))
            .unwrap();
        assert_eq!(request.explain_mode(), Some(ExplainMode::Analyze));
        assert_eq!(request.database, "projects/test-project/databases/(default)");

        let request = client.compile(&pipeline, &ExecuteOptions::new()).unwrap();
        assert_eq!(request.explain_mode(), None);
        assert!(request.structured_pipeline.options.is_empty());
    }

    #[test]
    fn test_raw_explain_options_keep_raw_mode() {
        let client = client();
        let pipeline = client.pipeline().collection("books").unwrap();
        let options = ExecuteOptions::new()
            .explain(ExplainMode::Analyze)
            .raw_option("explain_options.mode", "explain")
            .raw_option("explain_options.output_format", "json");
        let request = client.compile(&pipeline, &options).unwrap();
        assert_eq!(request.explain_mode(), Some(ExplainMode::Explain));
        let explain = request.structured_pipeline.options["explain_options"]
            .as_map()
            .unwrap();
        assert_eq!(explain["output_format"], WireValue::string("json"));
    }

    #[test]
    fn test_compile_rejects_other_database() {
        let client = client();
        let other = PipelineSource::new(DatabaseId::new("other", "(default)"))
            .collection("books")
            .unwrap();
        let err = client.compile(&other, &ExecuteOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Pipeline(PipelineError::DatabaseMismatch { .. })
        ));
    }

    #[test]
    fn test_compile_enforces_max_stages() {
        let mut settings = Settings::new("test-project");
        settings.max_stages = 2;
        let client = PipelineClient::new(InMemoryExecutor::new(), settings).unwrap();
        let pipeline = client.pipeline().collection("books").unwrap().limit(1).offset(1);
        let err = client.compile(&pipeline, &ExecuteOptions::new()).unwrap_err();
        assert!(err.to_string().contains("maximum of 2"));
    }
}
