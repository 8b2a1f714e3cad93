//! docpipe-core - transport-independent pipeline AST, validator and wire serializer.
//!
//! This crate builds declarative document pipelines and turns them into the wire form an
//! execution engine consumes. It has no I/O; executing pipelines is the client crate's job.
//!
//! # Main Components
//!
//! - **Expressions**: field references, constants, function calls, aggregates and orderings
//! - **Stages / Pipeline**: an immutable, append-only stage list with a fluent builder
//! - **Validator**: fail-fast checks on literal payloads before anything is sent
//! - **Serializer**: `{name, args, options}` wire stages, with known/raw option merging
//!
//! # Example
//!
//! ```rust
//! use docpipe_core::prelude::*;
//!
//! let source = PipelineSource::new(DatabaseId::default_database("my-project"));
//! let pipeline = source
//!     .collection("books")
//!     .unwrap()
//!     .filter(field("rating").greater_than(4))
//!     .select(["title", "author"])
//!     .limit(10);
//!
//! let wire = pipeline.to_wire(&SerializerSettings::default()).unwrap();
//! let names: Vec<&str> = wire.stages.iter().map(|s| s.name.as_str()).collect();
//! assert_eq!(names, vec!["collection", "where", "select", "limit"]);
//! ```

pub mod error;
pub mod expr;
pub mod options;
pub mod ordered_map;
pub mod pipeline;
pub mod query;
pub mod reference;
pub mod serialize;
pub mod stage;
pub mod validate;
pub mod value;
pub mod wire;

// Re-export main types for convenience
pub use error::{PipelineError, PipelineResult};
pub use expr::{
    AggregateFunction, AliasedAggregate, AliasedExpression, BooleanExpression, Constant, Direction,
    Expression, ExpressionMap, ExpressionOps, Field, FunctionExpr, IntoExpr, IntoOperand,
    IntoVector, Ordering, Selectable, TimeUnit,
};
pub use options::{KnownOption, OptionKind, OptionValue, OptionsMerger, RawOptions};
pub use ordered_map::OrderedMap;
pub use pipeline::{
    AddFieldsOptions, AggregateOptions, CollectionGroupOptions, CollectionSourceOptions,
    CollectionTarget, DistinctOptions, DocumentTarget, DocumentsOptions, FindNearestOptions,
    LimitOptions, MutationOptions, OffsetOptions, Pipeline, PipelineSource, RemoveFieldsOptions,
    ReplaceWithOptions, SampleOptions, SelectOptions, SortOptions, UnionOptions, UnnestOptions,
    WhereOptions,
};
pub use query::{CompositeOperator, Filter, FilterOperator, Query, QuerySource};
pub use reference::{CollectionReference, DatabaseId, DocumentReference};
pub use serialize::{Serializer, SerializerSettings};
pub use stage::{DistanceMeasure, RawParam, SampleRate, Stage, StageKind};
pub use validate::Validator;
pub use value::{ConstantValue, FieldTransform, GeoPoint, Timestamp, VectorValue};
pub use wire::{StructuredPipeline, WirePipeline, WireStage, WireValue};

/// Everything needed to build pipelines, including the free-function constructors.
pub mod prelude {
    pub use crate::error::{PipelineError, PipelineResult};
    pub use crate::expr::*;
    pub use crate::pipeline::*;
    pub use crate::query::{Filter, FilterOperator, Query};
    pub use crate::reference::{CollectionReference, DatabaseId, DocumentReference};
    pub use crate::serialize::SerializerSettings;
    pub use crate::stage::{DistanceMeasure, RawParam};
    pub use crate::value::{ConstantValue, FieldTransform, GeoPoint, Timestamp, VectorValue};
    pub use crate::options::RawOptions;
}
