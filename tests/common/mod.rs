#![allow(dead_code)]

use std::collections::BTreeSet;
use serde_json::json;
use searchview::core::config::Config;
use searchview::core::database::{Database, WriteOptions};
use searchview::core::types::Document;
use searchview::core::view::ViewProperties;
use searchview::query::request::ViewQuery;
use searchview::schema::link::LinkConfig;
use searchview::search::results::QueryResult;
use searchview::storage::collection::CollectionOptions;

pub const COLLECTION: &str = "UnitTestsCollection";
pub const OTHER_COLLECTION: &str = "AnotherUnitTestsCollection";
pub const VIEW: &str = "UnitTestsView";

pub const SHARD_LAYOUTS: [u32; 3] = [1, 2, 4];

pub fn link() -> LinkConfig {
    LinkConfig::new()
        .include_all_fields(true)
        .with_field("text", ["text_en"])
}

/// 20 a/b/c documents, 4 text documents, 3 typed documents and one keyed
/// document, inserted after the view link exists
pub async fn setup(shards: u32) -> Database {
    setup_with(shards, Config::default()).await
}

pub async fn setup_with(shards: u32, config: Config) -> Database {
    let db = Database::open(config).unwrap();
    let options = CollectionOptions::new(shards, 1);
    db.create_collection(COLLECTION, Some(options)).unwrap();
    db.create_collection(OTHER_COLLECTION, Some(options)).unwrap();

    db.create_view(VIEW, "arangosearch", ViewProperties::new()).unwrap();
    db.update_view_properties(VIEW, ViewProperties::new().link(COLLECTION, link()))
        .unwrap();

    let sync = WriteOptions::sync();
    db.insert(OTHER_COLLECTION, json!({"a": "foo", "id": 0}), sync).await.unwrap();
    db.insert(OTHER_COLLECTION, json!({"a": "ba", "id": 1}), sync).await.unwrap();

    for i in 0..5 {
        db.insert(COLLECTION, json!({"a": "foo", "b": "bar", "c": i}), sync).await.unwrap();
        db.insert(COLLECTION, json!({"a": "foo", "b": "baz", "c": i}), sync).await.unwrap();
        db.insert(COLLECTION, json!({"a": "bar", "b": "foo", "c": i}), sync).await.unwrap();
        db.insert(COLLECTION, json!({"a": "baz", "b": "foo", "c": i}), sync).await.unwrap();
    }

    let text_docs = [
        json!({"name": "full", "text": "the quick brown fox jumps over the lazy dog"}),
        json!({"name": "half", "text": "quick fox over lazy"}),
        json!({"name": "other half", "text": "the brown jumps the dog"}),
        json!({"name": "quarter", "text": "quick over"}),
        json!({"name": "numeric", "anotherNumericField": 0}),
        json!({"name": "null", "anotherNullField": null}),
        json!({"name": "bool", "anotherBoolField": true}),
        json!({"_key": "foo", "xyz": 1}),
    ];
    for doc in text_docs {
        db.insert(COLLECTION, doc, sync).await.unwrap();
    }

    db
}

pub async fn run(db: &Database, query: ViewQuery) -> QueryResult {
    db.for_each_in_view(&query.wait_for_sync()).await.unwrap()
}

pub fn text<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get_field(field).and_then(|v| v.as_str())
}

pub fn number(doc: &Document, field: &str) -> Option<f64> {
    doc.get_field(field).and_then(|v| v.as_f64())
}

pub fn names(result: &QueryResult) -> Vec<&str> {
    result
        .documents
        .iter()
        .map(|doc| text(doc, "name").unwrap_or(""))
        .collect()
}

pub fn key_set(result: &QueryResult) -> BTreeSet<String> {
    result.keys().into_iter().map(str::to_string).collect()
}

pub fn keys(result: &QueryResult) -> Vec<String> {
    result.keys().into_iter().map(str::to_string).collect()
}
