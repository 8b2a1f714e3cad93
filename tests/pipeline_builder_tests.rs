//! Pipeline Builder Tests
//!
//! Tests for:
//! - Source factories and chaining without mutation
//! - Wire encoding of stage names, arguments and options
//! - Alias precedence and operand normalization
//! - Known option precedence over raw options

use docpipe::prelude::*;
use docpipe_core::{WireStage, WireValue};
use serde_json::json;

fn source() -> PipelineSource {
    PipelineSource::new(DatabaseId::default_database("test-project"))
}

fn books() -> Pipeline {
    source().collection("books").unwrap()
}

fn encode(pipeline: &Pipeline) -> Vec<WireStage> {
    pipeline
        .to_wire(&SerializerSettings::default())
        .expect("pipeline should encode")
        .stages
}

fn stage_names(pipeline: &Pipeline) -> Vec<String> {
    encode(pipeline).into_iter().map(|s| s.name).collect()
}

#[test]
fn test_round_trip_stage_sequence() {
    let pipeline = books()
        .filter(field("rating").greater_than(4))
        .select(["title", "author"])
        .limit(10);

    assert_eq!(
        stage_names(&pipeline),
        vec!["collection", "where", "select", "limit"]
    );

    let stages = encode(&pipeline);
    assert_eq!(stages[0].args, vec![WireValue::reference("/books")]);

    let condition = stages[1].args[0].as_function().unwrap();
    assert_eq!(condition.name, "greater_than");
    assert_eq!(
        condition.args,
        vec![
            WireValue::field_reference("rating"),
            WireValue::IntegerValue(4)
        ]
    );

    let selections = stages[2].args[0].as_map().unwrap();
    assert_eq!(
        selections.get("title"),
        Some(&WireValue::field_reference("title"))
    );
    assert_eq!(stages[3].args, vec![WireValue::IntegerValue(10)]);
}

#[test]
fn test_branches_share_prefix() {
    let base = books().filter(field("published").equal(true));
    let recent = base.sort([field("year").descending()]).unwrap().limit(5);
    let sampled = base.sample(3);

    assert_eq!(base.len(), 2);
    assert_eq!(stage_names(&recent), vec!["collection", "where", "sort", "limit"]);
    assert_eq!(stage_names(&sampled), vec!["collection", "where", "sample"]);
}

#[test]
fn test_alias_precedence_in_add_fields() {
    let pipeline = books().add_fields([
        field("price").multiply(2).alias("double_price"),
        field("title").alias("name"),
    ]);
    let stages = encode(&pipeline);
    let fields = stages[1].args[0].as_map().unwrap();
    let keys: Vec<&String> = fields.keys().collect();
    assert_eq!(keys, vec!["double_price", "name"]);
    assert_eq!(
        fields["double_price"].as_function().map(|f| f.name.as_str()),
        Some("multiply")
    );
}

#[test]
fn test_aggregate_with_groups() {
    let pipeline = books().aggregate_with(
        AggregateOptions::new([
            count_all().alias("total"),
            average("rating").alias("avg_rating"),
        ])
        .groups(["genre"]),
    );
    let stages = encode(&pipeline);
    assert_eq!(stages[1].name, "aggregate");
    assert_eq!(stages[1].args.len(), 2);

    let accumulators = stages[1].args[0].as_map().unwrap();
    assert_eq!(
        accumulators["avg_rating"].as_function().map(|f| f.name.as_str()),
        Some("average")
    );
    let groups = stages[1].args[1].as_map().unwrap();
    assert_eq!(groups["genre"], WireValue::field_reference("genre"));
}

#[test]
fn test_find_nearest_options() {
    let pipeline = books().find_nearest_with(
        FindNearestOptions::new("embedding", vec![0.1, 0.2], DistanceMeasure::Cosine)
            .limit(3)
            .distance_field("distance"),
    );
    let stages = encode(&pipeline);
    let stage = &stages[1];

    assert_eq!(stage.name, "find_nearest");
    assert_eq!(stage.args[0], WireValue::field_reference("embedding"));
    assert_eq!(stage.args[1].as_vector(), Some(vec![0.1, 0.2]));
    assert_eq!(stage.args[2], WireValue::string("cosine"));
    assert_eq!(stage.options["limit"], WireValue::IntegerValue(3));
    assert_eq!(
        stage.options["distance_field"],
        WireValue::field_reference("distance")
    );
}

#[test]
fn test_raw_option_overrides_known_option() {
    let pipeline = source()
        .collection_with(
            CollectionSourceOptions::new("books")
                .force_index("by_rating")
                .raw_option("force_index", "by_title")
                .raw_option("hints.scan", "forward"),
        )
        .unwrap();
    let stages = encode(&pipeline);
    let options = &stages[0].options;

    assert_eq!(options["force_index"], WireValue::string("by_title"));
    assert_eq!(
        options["hints"],
        WireValue::map([("scan", WireValue::string("forward"))])
    );
}

#[test]
fn test_union_encodes_sub_pipeline() {
    let archived = source().collection("archived_books").unwrap();
    let pipeline = books().union(&archived).unwrap();
    let stages = encode(&pipeline);

    match &stages[1].args[0] {
        WireValue::PipelineValue(inner) => {
            assert_eq!(inner.stages.len(), 1);
            assert_eq!(inner.stages[0].name, "collection");
        }
        other => panic!("Expected pipeline value, got {:?}", other),
    }
}

#[test]
fn test_union_rejects_other_database() {
    let other = PipelineSource::new(DatabaseId::new("other-project", "archive"))
        .collection("books")
        .unwrap();
    let err = books().union(&other).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("projects/test-project/databases/(default)"));
    assert!(message.contains("projects/other-project/databases/archive"));
}

#[test]
fn test_sample_requires_exactly_one_mode() {
    assert!(books().sample_with(SampleOptions::default()).is_err());
    let both = SampleOptions {
        documents: Some(5),
        percentage: Some(0.5),
        ..Default::default()
    };
    assert!(matches!(
        books().sample_with(both),
        Err(PipelineError::InvalidArgument(_))
    ));

    let stages = encode(&books().sample_with(SampleOptions::percentage(0.25)).unwrap());
    assert_eq!(
        stages[1].args,
        vec![WireValue::DoubleValue(0.25), WireValue::string("percent")]
    );
}

#[test]
fn test_raw_stage_params() {
    let pipeline = books().raw_stage(
        "custom_stage",
        [RawParam::from("x"), RawParam::from(json!({"depth": 2}))],
    );
    let stages = encode(&pipeline);
    assert_eq!(stages[1].name, "custom_stage");
    assert_eq!(stages[1].args[0], WireValue::string("x"));
    assert_eq!(
        stages[1].args[1],
        WireValue::map([("depth", WireValue::IntegerValue(2))])
    );
}

#[test]
fn test_to_wire_json_shape() {
    let json = books().limit(1).to_wire_json().unwrap();
    assert_eq!(json["stages"][1]["name"], "limit");
    assert_eq!(json["stages"][1]["args"][0]["integer_value"], 1);
}

#[test]
fn test_mutation_stages_without_target() {
    let stages = encode(&books().delete().upsert().insert());
    let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["collection", "delete", "upsert", "insert"]);
    for stage in &stages[1..] {
        assert!(stage.args.is_empty());
        assert!(stage.options.is_empty());
    }
}

#[test]
fn test_mutation_stages_with_target() {
    let archive = vec![WireValue::reference("/archive")];

    let deleted = encode(&books().delete_with(MutationOptions::target("archive")).unwrap());
    assert_eq!(deleted[1].name, "delete");
    assert_eq!(deleted[1].args, archive);
    assert!(deleted[1].options.is_empty());

    let upserted = encode(&books().upsert_into("archive").unwrap());
    assert_eq!(upserted[1].name, "upsert");
    assert_eq!(upserted[1].args, archive);

    let inserted = encode(
        &books()
            .insert_with(MutationOptions::target("archive").raw_option("batch_size", 50i64))
            .unwrap(),
    );
    assert_eq!(inserted[1].name, "insert");
    assert_eq!(inserted[1].args, archive);
    assert_eq!(
        inserted[1].options.get("batch_size"),
        Some(&WireValue::IntegerValue(50))
    );
}

#[test]
fn test_collection_group_stage() {
    let stages = encode(&source().collection_group("reviews").unwrap());
    assert_eq!(stages[0].name, "collection_group");
    assert_eq!(
        stages[0].args,
        vec![WireValue::reference(""), WireValue::string("reviews")]
    );
    assert!(stages[0].options.is_empty());

    let forced = encode(
        &source()
            .collection_group_with(CollectionGroupOptions::new("reviews").force_index("by_rating"))
            .unwrap(),
    );
    assert_eq!(
        forced[0].options.get("force_index"),
        Some(&WireValue::string("by_rating"))
    );
}

#[test]
fn test_documents_stage() {
    let stages = encode(&source().documents(["books/b1", "books/b2"]).unwrap());
    assert_eq!(stages[0].name, "documents");
    assert_eq!(
        stages[0].args,
        vec![
            WireValue::reference("/books/b1"),
            WireValue::reference("/books/b2")
        ]
    );
    assert!(stages[0].options.is_empty());
}

#[test]
fn test_replace_with_stage() {
    let stages = encode(&books().replace_with("meta"));
    assert_eq!(stages[1].name, "replace_with");
    assert_eq!(
        stages[1].args,
        vec![
            WireValue::field_reference("meta"),
            WireValue::string("full_replace")
        ]
    );
    assert!(stages[1].options.is_empty());
}

#[test]
fn test_unnest_stage_with_index_field() {
    let stages = encode(
        &books().unnest_with(UnnestOptions::new(field("tags").alias("tag")).index_field("idx")),
    );
    assert_eq!(stages[1].name, "unnest");
    assert_eq!(
        stages[1].args,
        vec![
            WireValue::field_reference("tags"),
            WireValue::field_reference("tag")
        ]
    );
    assert_eq!(
        stages[1].options.get("index_field"),
        Some(&WireValue::field_reference("idx"))
    );

    let plain = encode(&books().unnest(field("tags").alias("tag")));
    assert!(plain[1].options.is_empty());
}
