//! docpipe - build declarative document pipelines and run them through an execution engine.
//!
//! Pipelines are built with the immutable builder from [`docpipe_core`], compiled into the
//! `{name, args, options}` wire form by a [`PipelineClient`], and handed to a
//! [`PipelineExecutor`]. Results come back as a [`PipelineSnapshot`] of [`Row`]s.
//!
//! # Example
//!
//! ```rust
//! use docpipe::prelude::*;
//! use docpipe::{InMemoryExecutor, PipelineClient, Settings};
//!
//! # tokio_test::block_on(async {
//! let client = PipelineClient::new(InMemoryExecutor::new(), Settings::new("my-project")).unwrap();
//! let pipeline = client
//!     .pipeline()
//!     .collection("books")
//!     .unwrap()
//!     .filter(field("rating").greater_than(4))
//!     .limit(10);
//!
//! let snapshot = client.execute(&pipeline).await.unwrap();
//! assert!(snapshot.is_empty());
//! # });
//! ```

pub mod client;
pub mod decode;
pub mod error;
pub mod executor;
pub mod explain;
pub mod logging;
pub mod protocol;
pub mod settings;
pub mod snapshot;

pub use client::{ExecuteOptions, PipelineClient};
pub use decode::wire_to_json;
pub use error::{ClientError, ClientResult};
pub use executor::{InMemoryExecutor, PipelineExecutor};
pub use explain::ExplainStats;
pub use protocol::{ExecutePipelineRequest, ExecutePipelineResponse, ExplainMode, WireDocument};
pub use settings::Settings;
pub use snapshot::{PipelineSnapshot, Row};

pub use docpipe_core::{Pipeline, PipelineError, PipelineResult, PipelineSource};

/// Builder vocabulary plus the client entry points.
pub mod prelude {
    pub use docpipe_core::prelude::*;

    pub use crate::client::{ExecuteOptions, PipelineClient};
    pub use crate::protocol::ExplainMode;
    pub use crate::settings::Settings;
}
