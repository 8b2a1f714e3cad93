//! Immutable pipeline builder.
//!
//! Every builder method takes `&self` and returns a new [`Pipeline`]. Stages live in a
//! persistent list linked from the newest stage back to the source, so appending allocates one
//! node and the new pipeline shares its whole prefix with the old one. Earlier pipelines stay
//! valid and can be extended independently.
//!
//! Each stage has a positional method and a `*_with` method taking an options record. The
//! positional form only builds the record; one normalization per stage turns the record into
//! a [`StageKind`].

use std::sync::Arc;

use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::expr::{
    selectables_to_map, AliasedAggregate, BooleanExpression, Expression, Field, IntoExpr,
    IntoOperand, IntoVector, Ordering, Selectable,
};
use crate::options::RawOptions;
use crate::ordered_map::OrderedMap;
use crate::query::Query;
use crate::reference::{
    ensure_same_database, CollectionReference, DatabaseId, DocumentReference,
};
use crate::serialize::{Serializer, SerializerSettings};
use crate::stage::{DistanceMeasure, RawParam, SampleRate, Stage, StageKind};
use crate::validate::Validator;
use crate::wire::{StructuredPipeline, WirePipeline};

/// A collection given by path or by reference.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionTarget {
    Path(String),
    Reference(CollectionReference),
}

impl CollectionTarget {
    /// References must belong to `database`; paths are resolved against it.
    fn resolve(self, database: &DatabaseId) -> PipelineResult<CollectionReference> {
        match self {
            CollectionTarget::Path(path) => CollectionReference::new(database.clone(), &path),
            CollectionTarget::Reference(reference) => {
                ensure_same_database(database, reference.database())?;
                Ok(reference)
            }
        }
    }
}

impl From<&str> for CollectionTarget {
    fn from(path: &str) -> Self {
        CollectionTarget::Path(path.to_string())
    }
}

impl From<String> for CollectionTarget {
    fn from(path: String) -> Self {
        CollectionTarget::Path(path)
    }
}

impl From<CollectionReference> for CollectionTarget {
    fn from(reference: CollectionReference) -> Self {
        CollectionTarget::Reference(reference)
    }
}

impl From<&CollectionReference> for CollectionTarget {
    fn from(reference: &CollectionReference) -> Self {
        CollectionTarget::Reference(reference.clone())
    }
}

/// A document given by path or by reference.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentTarget {
    Path(String),
    Reference(DocumentReference),
}

impl DocumentTarget {
    fn resolve(self, database: &DatabaseId) -> PipelineResult<DocumentReference> {
        match self {
            DocumentTarget::Path(path) => DocumentReference::new(database.clone(), &path),
            DocumentTarget::Reference(reference) => {
                ensure_same_database(database, reference.database())?;
                Ok(reference)
            }
        }
    }
}

impl From<&str> for DocumentTarget {
    fn from(path: &str) -> Self {
        DocumentTarget::Path(path.to_string())
    }
}

impl From<String> for DocumentTarget {
    fn from(path: String) -> Self {
        DocumentTarget::Path(path)
    }
}

impl From<DocumentReference> for DocumentTarget {
    fn from(reference: DocumentReference) -> Self {
        DocumentTarget::Reference(reference)
    }
}

impl From<&DocumentReference> for DocumentTarget {
    fn from(reference: &DocumentReference) -> Self {
        DocumentTarget::Reference(reference.clone())
    }
}

macro_rules! raw_option_setter {
    ($($t:ty),* $(,)?) => {
        $(
            impl $t {
                /// Adds a raw option override. Dotted keys reach nested options.
                pub fn raw_option(mut self, key: impl Into<String>, value: impl IntoExpr) -> Self {
                    self.raw_options.insert(key, value);
                    self
                }
            }
        )*
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSourceOptions {
    pub collection: CollectionTarget,
    pub force_index: Option<String>,
    pub raw_options: RawOptions,
}

impl CollectionSourceOptions {
    pub fn new(collection: impl Into<CollectionTarget>) -> Self {
        Self {
            collection: collection.into(),
            force_index: None,
            raw_options: RawOptions::new(),
        }
    }

    pub fn force_index(mut self, index: impl Into<String>) -> Self {
        self.force_index = Some(index.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionGroupOptions {
    pub collection_id: String,
    pub force_index: Option<String>,
    pub raw_options: RawOptions,
}

impl CollectionGroupOptions {
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            force_index: None,
            raw_options: RawOptions::new(),
        }
    }

    pub fn force_index(mut self, index: impl Into<String>) -> Self {
        self.force_index = Some(index.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentsOptions {
    pub documents: Vec<DocumentTarget>,
    pub raw_options: RawOptions,
}

impl DocumentsOptions {
    pub fn new<D: Into<DocumentTarget>>(documents: impl IntoIterator<Item = D>) -> Self {
        Self {
            documents: documents.into_iter().map(Into::into).collect(),
            raw_options: RawOptions::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddFieldsOptions {
    pub fields: Vec<Selectable>,
    pub raw_options: RawOptions,
}

impl AddFieldsOptions {
    pub fn new<S: Into<Selectable>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            raw_options: RawOptions::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoveFieldsOptions {
    pub fields: Vec<Field>,
    pub raw_options: RawOptions,
}

impl RemoveFieldsOptions {
    pub fn new<F: Into<Field>>(fields: impl IntoIterator<Item = F>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            raw_options: RawOptions::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOptions {
    pub selections: Vec<Selectable>,
    pub raw_options: RawOptions,
}

impl SelectOptions {
    pub fn new<S: Into<Selectable>>(selections: impl IntoIterator<Item = S>) -> Self {
        Self {
            selections: selections.into_iter().map(Into::into).collect(),
            raw_options: RawOptions::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhereOptions {
    pub condition: BooleanExpression,
    pub raw_options: RawOptions,
}

impl WhereOptions {
    pub fn new(condition: BooleanExpression) -> Self {
        Self {
            condition,
            raw_options: RawOptions::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetOptions {
    pub offset: u32,
    pub raw_options: RawOptions,
}

impl OffsetOptions {
    pub fn new(offset: u32) -> Self {
        Self {
            offset,
            raw_options: RawOptions::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimitOptions {
    pub limit: u32,
    pub raw_options: RawOptions,
}

impl LimitOptions {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            raw_options: RawOptions::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistinctOptions {
    pub groups: Vec<Selectable>,
    pub raw_options: RawOptions,
}

impl DistinctOptions {
    pub fn new<S: Into<Selectable>>(groups: impl IntoIterator<Item = S>) -> Self {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
            raw_options: RawOptions::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOptions {
    pub accumulators: Vec<AliasedAggregate>,
    pub groups: Vec<Selectable>,
    pub raw_options: RawOptions,
}

impl AggregateOptions {
    pub fn new(accumulators: impl IntoIterator<Item = AliasedAggregate>) -> Self {
        Self {
            accumulators: accumulators.into_iter().collect(),
            groups: Vec::new(),
            raw_options: RawOptions::new(),
        }
    }

    pub fn groups<S: Into<Selectable>>(mut self, groups: impl IntoIterator<Item = S>) -> Self {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FindNearestOptions {
    pub field: Field,
    pub vector: Expression,
    pub distance_measure: DistanceMeasure,
    pub limit: Option<u32>,
    pub distance_field: Option<Field>,
    pub raw_options: RawOptions,
}

impl FindNearestOptions {
    pub fn new(
        field: impl Into<Field>,
        vector: impl IntoVector,
        distance_measure: DistanceMeasure,
    ) -> Self {
        Self {
            field: field.into(),
            vector: vector.into_vector_expr(),
            distance_measure,
            limit: None,
            distance_field: None,
            raw_options: RawOptions::new(),
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Output field receiving the computed distance.
    pub fn distance_field(mut self, field: impl Into<Field>) -> Self {
        self.distance_field = Some(field.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceWithOptions {
    pub map: Expression,
    pub raw_options: RawOptions,
}

impl ReplaceWithOptions {
    /// A string names the field holding the replacement map.
    pub fn new(map: impl IntoOperand) -> Self {
        Self {
            map: map.into_operand(),
            raw_options: RawOptions::new(),
        }
    }
}

/// Exactly one of `documents` and `percentage` must be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleOptions {
    pub documents: Option<u32>,
    pub percentage: Option<f64>,
    pub raw_options: RawOptions,
}

impl SampleOptions {
    pub fn documents(documents: u32) -> Self {
        Self {
            documents: Some(documents),
            ..Self::default()
        }
    }

    pub fn percentage(percentage: f64) -> Self {
        Self {
            percentage: Some(percentage),
            ..Self::default()
        }
    }

    fn rate(&self) -> PipelineResult<SampleRate> {
        match (self.documents, self.percentage) {
            (Some(n), None) => Ok(documents_rate(n)),
            (None, Some(p)) if p.is_finite() && p >= 0.0 => Ok(SampleRate::Percent(p)),
            (None, Some(p)) => Err(PipelineError::InvalidArgument(format!(
                "sample percentage must be a non-negative number, got {}",
                p
            ))),
            (Some(_), Some(_)) => Err(PipelineError::InvalidArgument(
                "sample accepts either documents or percentage, not both".to_string(),
            )),
            (None, None) => Err(PipelineError::InvalidArgument(
                "sample requires either documents or percentage".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionOptions {
    pub other: Pipeline,
    pub raw_options: RawOptions,
}

impl UnionOptions {
    pub fn new(other: &Pipeline) -> Self {
        Self {
            other: other.clone(),
            raw_options: RawOptions::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnnestOptions {
    pub selectable: Selectable,
    pub index_field: Option<Field>,
    pub raw_options: RawOptions,
}

impl UnnestOptions {
    pub fn new(selectable: impl Into<Selectable>) -> Self {
        Self {
            selectable: selectable.into(),
            index_field: None,
            raw_options: RawOptions::new(),
        }
    }

    /// Output field receiving each element's array index.
    pub fn index_field(mut self, field: impl Into<Field>) -> Self {
        self.index_field = Some(field.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortOptions {
    pub orderings: Vec<Ordering>,
    pub raw_options: RawOptions,
}

impl SortOptions {
    pub fn new(orderings: impl IntoIterator<Item = Ordering>) -> Self {
        Self {
            orderings: orderings.into_iter().collect(),
            raw_options: RawOptions::new(),
        }
    }
}

fn documents_rate(documents: u32) -> SampleRate {
    SampleRate::Documents(i64::from(documents))
}

/// Options shared by `delete`, `upsert` and `insert`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationOptions {
    /// Write into this collection instead of the documents' own.
    pub target: Option<CollectionTarget>,
    pub raw_options: RawOptions,
}

impl MutationOptions {
    pub fn target(target: impl Into<CollectionTarget>) -> Self {
        Self {
            target: Some(target.into()),
            raw_options: RawOptions::new(),
        }
    }
}

raw_option_setter!(
    CollectionSourceOptions,
    CollectionGroupOptions,
    DocumentsOptions,
    AddFieldsOptions,
    RemoveFieldsOptions,
    SelectOptions,
    WhereOptions,
    OffsetOptions,
    LimitOptions,
    DistinctOptions,
    AggregateOptions,
    FindNearestOptions,
    ReplaceWithOptions,
    SampleOptions,
    UnionOptions,
    UnnestOptions,
    SortOptions,
    MutationOptions,
);

/// Entry point for building pipelines against one database.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSource {
    database: DatabaseId,
}

impl PipelineSource {
    pub fn new(database: DatabaseId) -> Self {
        Self { database }
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.database
    }

    /// All documents of one collection.
    pub fn collection(&self, collection: impl Into<CollectionTarget>) -> PipelineResult<Pipeline> {
        self.collection_with(CollectionSourceOptions::new(collection))
    }

    pub fn collection_with(&self, options: CollectionSourceOptions) -> PipelineResult<Pipeline> {
        let reference = options.collection.resolve(&self.database)?;
        Ok(self.start(
            StageKind::Collection {
                reference,
                force_index: options.force_index,
            },
            options.raw_options,
        ))
    }

    /// All collections with the given id, at any depth.
    pub fn collection_group(&self, collection_id: &str) -> PipelineResult<Pipeline> {
        self.collection_group_with(CollectionGroupOptions::new(collection_id))
    }

    pub fn collection_group_with(&self, options: CollectionGroupOptions) -> PipelineResult<Pipeline> {
        if options.collection_id.is_empty() || options.collection_id.contains('/') {
            return Err(PipelineError::InvalidArgument(format!(
                "invalid collection id '{}': must be non-empty and must not contain '/'",
                options.collection_id
            )));
        }
        Ok(self.start(
            StageKind::CollectionGroup {
                collection_id: options.collection_id,
                force_index: options.force_index,
            },
            options.raw_options,
        ))
    }

    /// Every document in the database.
    pub fn database(&self) -> Pipeline {
        self.database_with(RawOptions::new())
    }

    pub fn database_with(&self, raw_options: RawOptions) -> Pipeline {
        self.start(StageKind::Database, raw_options)
    }

    /// An explicit list of documents.
    pub fn documents<D: Into<DocumentTarget>>(
        &self,
        documents: impl IntoIterator<Item = D>,
    ) -> PipelineResult<Pipeline> {
        self.documents_with(DocumentsOptions::new(documents))
    }

    pub fn documents_with(&self, options: DocumentsOptions) -> PipelineResult<Pipeline> {
        if options.documents.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "documents requires at least one document".to_string(),
            ));
        }
        let documents = options
            .documents
            .into_iter()
            .map(|d| d.resolve(&self.database))
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(self.start(StageKind::Documents { documents }, options.raw_options))
    }

    /// Converts a declarative query into the equivalent pipeline.
    pub fn create_from(&self, query: &Query) -> PipelineResult<Pipeline> {
        ensure_same_database(&self.database, query.database())?;
        query.to_pipeline()
    }

    fn start(&self, kind: StageKind, raw_options: RawOptions) -> Pipeline {
        Pipeline {
            database: self.database.clone(),
            last: Arc::new(StageNode {
                stage: Stage::new(kind, raw_options),
                parent: None,
            }),
            len: 1,
        }
    }
}

/// One link of the stage list. `parent` points at the previous stage.
#[derive(Debug)]
struct StageNode {
    stage: Stage,
    parent: Option<Arc<StageNode>>,
}

impl Drop for StageNode {
    // Unlink iteratively so long chains do not recurse once per stage.
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(node) = parent {
            match Arc::try_unwrap(node) {
                Ok(mut node) => parent = node.parent.take(),
                Err(_) => break,
            }
        }
    }
}

/// Which write stage a [`MutationOptions`] record turns into.
#[derive(Debug, Clone, Copy)]
enum Mutation {
    Delete,
    Upsert,
    Insert,
}

impl Mutation {
    fn into_kind(self, target: Option<CollectionReference>) -> StageKind {
        match self {
            Mutation::Delete => StageKind::Delete { target },
            Mutation::Upsert => StageKind::Upsert { target },
            Mutation::Insert => StageKind::Insert { target },
        }
    }
}

/// Ordered, immutable list of stages. Always holds at least the source stage.
#[derive(Clone)]
pub struct Pipeline {
    database: DatabaseId,
    last: Arc<StageNode>,
    len: usize,
}

impl PartialEq for Pipeline {
    fn eq(&self, other: &Self) -> bool {
        self.database == other.database
            && self.len == other.len
            && (Arc::ptr_eq(&self.last, &other.last) || self.stages().eq(other.stages()))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("database", &self.database)
            .field("stages", &self.stages().collect::<Vec<_>>())
            .finish()
    }
}

impl Pipeline {
    pub fn database(&self) -> &DatabaseId {
        &self.database
    }

    /// Stages from the source onwards.
    pub fn stages(&self) -> impl ExactSizeIterator<Item = &Stage> {
        let mut stages = Vec::with_capacity(self.len);
        let mut node = Some(&self.last);
        while let Some(current) = node {
            stages.push(&current.stage);
            node = current.parent.as_ref();
        }
        stages.reverse();
        stages.into_iter()
    }

    /// The most recently added stage.
    pub fn last_stage(&self) -> &Stage {
        &self.last.stage
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn append(&self, kind: StageKind, raw_options: RawOptions) -> Pipeline {
        Pipeline {
            database: self.database.clone(),
            last: Arc::new(StageNode {
                stage: Stage::new(kind, raw_options),
                parent: Some(Arc::clone(&self.last)),
            }),
            len: self.len + 1,
        }
    }

    fn append_mutation(
        &self,
        mutation: Mutation,
        target: Option<CollectionReference>,
        raw_options: RawOptions,
    ) -> Pipeline {
        self.append(mutation.into_kind(target), raw_options)
    }

    fn mutation_with(&self, mutation: Mutation, options: MutationOptions) -> PipelineResult<Pipeline> {
        let target = options
            .target
            .map(|t| t.resolve(&self.database))
            .transpose()?;
        Ok(self.append_mutation(mutation, target, options.raw_options))
    }

    pub fn add_fields<S: Into<Selectable>>(&self, fields: impl IntoIterator<Item = S>) -> Pipeline {
        self.add_fields_with(AddFieldsOptions::new(fields))
    }

    pub fn add_fields_with(&self, options: AddFieldsOptions) -> Pipeline {
        self.append(
            StageKind::AddFields {
                fields: selectables_to_map(options.fields),
            },
            options.raw_options,
        )
    }

    pub fn remove_fields<F: Into<Field>>(&self, fields: impl IntoIterator<Item = F>) -> Pipeline {
        self.remove_fields_with(RemoveFieldsOptions::new(fields))
    }

    pub fn remove_fields_with(&self, options: RemoveFieldsOptions) -> Pipeline {
        self.append(
            StageKind::RemoveFields {
                fields: options.fields,
            },
            options.raw_options,
        )
    }

    pub fn select<S: Into<Selectable>>(&self, selections: impl IntoIterator<Item = S>) -> Pipeline {
        self.select_with(SelectOptions::new(selections))
    }

    pub fn select_with(&self, options: SelectOptions) -> Pipeline {
        self.append(
            StageKind::Select {
                selections: selectables_to_map(options.selections),
            },
            options.raw_options,
        )
    }

    /// Keeps rows for which `condition` holds. Emitted as the `where` stage.
    #[doc(alias = "where")]
    pub fn filter(&self, condition: BooleanExpression) -> Pipeline {
        self.filter_with(WhereOptions::new(condition))
    }

    pub fn filter_with(&self, options: WhereOptions) -> Pipeline {
        self.append(
            StageKind::Where {
                condition: options.condition,
            },
            options.raw_options,
        )
    }

    pub fn offset(&self, offset: u32) -> Pipeline {
        self.offset_with(OffsetOptions::new(offset))
    }

    pub fn offset_with(&self, options: OffsetOptions) -> Pipeline {
        self.append(
            StageKind::Offset {
                offset: i64::from(options.offset),
            },
            options.raw_options,
        )
    }

    pub fn limit(&self, limit: u32) -> Pipeline {
        self.limit_with(LimitOptions::new(limit))
    }

    pub fn limit_with(&self, options: LimitOptions) -> Pipeline {
        self.append(
            StageKind::Limit {
                limit: i64::from(options.limit),
            },
            options.raw_options,
        )
    }

    pub fn distinct<S: Into<Selectable>>(&self, groups: impl IntoIterator<Item = S>) -> Pipeline {
        self.distinct_with(DistinctOptions::new(groups))
    }

    pub fn distinct_with(&self, options: DistinctOptions) -> Pipeline {
        self.append(
            StageKind::Distinct {
                groups: selectables_to_map(options.groups),
            },
            options.raw_options,
        )
    }

    /// Aggregates over all rows. Use [`aggregate_with`](Self::aggregate_with) to group.
    pub fn aggregate(&self, accumulators: impl IntoIterator<Item = AliasedAggregate>) -> Pipeline {
        self.aggregate_with(AggregateOptions::new(accumulators))
    }

    pub fn aggregate_with(&self, options: AggregateOptions) -> Pipeline {
        let accumulators: OrderedMap<_> = options
            .accumulators
            .into_iter()
            .map(|a| (a.alias, a.aggregate))
            .collect();
        self.append(
            StageKind::Aggregate {
                accumulators,
                groups: selectables_to_map(options.groups),
            },
            options.raw_options,
        )
    }

    pub fn find_nearest(
        &self,
        field: impl Into<Field>,
        vector: impl IntoVector,
        distance_measure: DistanceMeasure,
    ) -> Pipeline {
        self.find_nearest_with(FindNearestOptions::new(field, vector, distance_measure))
    }

    pub fn find_nearest_with(&self, options: FindNearestOptions) -> Pipeline {
        self.append(
            StageKind::FindNearest {
                field: options.field,
                vector: options.vector,
                distance_measure: options.distance_measure,
                limit: options.limit.map(i64::from),
                distance_field: options.distance_field,
            },
            options.raw_options,
        )
    }

    /// Replaces each row with the given map; a string names a map-valued field.
    pub fn replace_with(&self, map: impl IntoOperand) -> Pipeline {
        self.replace_with_options(ReplaceWithOptions::new(map))
    }

    pub fn replace_with_options(&self, options: ReplaceWithOptions) -> Pipeline {
        self.append(StageKind::ReplaceWith { map: options.map }, options.raw_options)
    }

    /// Samples up to `documents` rows. A document count is always a valid rate.
    pub fn sample(&self, documents: u32) -> Pipeline {
        self.append_sample(documents_rate(documents), RawOptions::new())
    }

    pub fn sample_with(&self, options: SampleOptions) -> PipelineResult<Pipeline> {
        let rate = options.rate()?;
        Ok(self.append_sample(rate, options.raw_options))
    }

    fn append_sample(&self, rate: SampleRate, raw_options: RawOptions) -> Pipeline {
        self.append(StageKind::Sample { rate }, raw_options)
    }

    /// Rows of `self` followed by rows of `other`. Both must target the same database.
    pub fn union(&self, other: &Pipeline) -> PipelineResult<Pipeline> {
        self.union_with(UnionOptions::new(other))
    }

    pub fn union_with(&self, options: UnionOptions) -> PipelineResult<Pipeline> {
        ensure_same_database(&self.database, &options.other.database)?;
        Ok(self.append(
            StageKind::Union {
                other: options.other,
            },
            options.raw_options,
        ))
    }

    /// One row per element of an array; the element is stored under the selectable's name.
    pub fn unnest(&self, selectable: impl Into<Selectable>) -> Pipeline {
        self.unnest_with(UnnestOptions::new(selectable))
    }

    pub fn unnest_with(&self, options: UnnestOptions) -> Pipeline {
        let (alias, expr) = options.selectable.into_entry();
        self.append(
            StageKind::Unnest {
                expr,
                alias,
                index_field: options.index_field,
            },
            options.raw_options,
        )
    }

    pub fn sort(&self, orderings: impl IntoIterator<Item = Ordering>) -> PipelineResult<Pipeline> {
        self.sort_with(SortOptions::new(orderings))
    }

    pub fn sort_with(&self, options: SortOptions) -> PipelineResult<Pipeline> {
        if options.orderings.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "sort requires at least one ordering".to_string(),
            ));
        }
        Ok(self.append(
            StageKind::Sort {
                orderings: options.orderings,
            },
            options.raw_options,
        ))
    }

    /// Deletes every row's document. Without a target nothing needs resolving.
    pub fn delete(&self) -> Pipeline {
        self.append_mutation(Mutation::Delete, None, RawOptions::new())
    }

    /// Deletes the rows' documents from `target` instead of their own collection.
    pub fn delete_into(&self, target: impl Into<CollectionTarget>) -> PipelineResult<Pipeline> {
        self.delete_with(MutationOptions::target(target))
    }

    pub fn delete_with(&self, options: MutationOptions) -> PipelineResult<Pipeline> {
        self.mutation_with(Mutation::Delete, options)
    }

    pub fn upsert(&self) -> Pipeline {
        self.append_mutation(Mutation::Upsert, None, RawOptions::new())
    }

    pub fn upsert_into(&self, target: impl Into<CollectionTarget>) -> PipelineResult<Pipeline> {
        self.upsert_with(MutationOptions::target(target))
    }

    pub fn upsert_with(&self, options: MutationOptions) -> PipelineResult<Pipeline> {
        self.mutation_with(Mutation::Upsert, options)
    }

    pub fn insert(&self) -> Pipeline {
        self.append_mutation(Mutation::Insert, None, RawOptions::new())
    }

    pub fn insert_into(&self, target: impl Into<CollectionTarget>) -> PipelineResult<Pipeline> {
        self.insert_with(MutationOptions::target(target))
    }

    pub fn insert_with(&self, options: MutationOptions) -> PipelineResult<Pipeline> {
        self.mutation_with(Mutation::Insert, options)
    }

    /// Appends a stage the typed API does not cover.
    pub fn raw_stage<P: Into<RawParam>>(
        &self,
        name: &str,
        params: impl IntoIterator<Item = P>,
    ) -> Pipeline {
        self.raw_stage_with(name, params, RawOptions::new())
    }

    pub fn raw_stage_with<P: Into<RawParam>>(
        &self,
        name: &str,
        params: impl IntoIterator<Item = P>,
        raw_options: RawOptions,
    ) -> Pipeline {
        self.append(
            StageKind::Raw {
                name: name.to_string(),
                params: params.into_iter().map(Into::into).collect(),
            },
            raw_options,
        )
    }

    pub fn validate(&self, ignore_undefined_properties: bool) -> PipelineResult<()> {
        Validator::new(ignore_undefined_properties).validate_pipeline(self)
    }

    /// Validates, then encodes the stage list.
    pub fn to_wire(&self, settings: &SerializerSettings) -> PipelineResult<WirePipeline> {
        self.validate(settings.ignore_undefined_properties)?;
        Serializer::new(*settings).encode_pipeline(self)
    }

    pub fn to_structured_pipeline(
        &self,
        settings: &SerializerSettings,
    ) -> PipelineResult<StructuredPipeline> {
        let pipeline = self.to_wire(settings)?;
        debug!(
            database = %self.database,
            stages = pipeline.stages.len(),
            "Compiled structured pipeline"
        );
        Ok(StructuredPipeline {
            pipeline,
            options: Default::default(),
        })
    }

    /// Wire form as JSON, with default serializer settings.
    pub fn to_wire_json(&self) -> PipelineResult<serde_json::Value> {
        let wire = self.to_wire(&SerializerSettings::default())?;
        serde_json::to_value(&wire).map_err(|e| PipelineError::Serialization(e.to_string()))
    }
}
