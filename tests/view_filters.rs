mod common;

use std::collections::BTreeSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use searchview::core::error::ErrorKind;
use searchview::core::types::FieldValue;
use searchview::query::ast::{Expr, FieldRef, Predicate, SortExpr};
use searchview::query::request::ViewQuery;
use common::*;

fn query() -> ViewQuery {
    ViewQuery::new(VIEW)
}

#[tokio::test]
async fn attribute_equality() {
    for shards in SHARD_LAYOUTS {
        let db = setup(shards).await;
        let result = run(&db, query().filter(Predicate::eq("a", "foo"))).await;

        assert_eq!(result.len(), 10, "shards = {}", shards);
        assert!(result.documents.iter().all(|doc| text(doc, "a") == Some("foo")));
    }
}

#[tokio::test]
async fn conjunction_sorted_by_attribute() {
    for shards in SHARD_LAYOUTS {
        let db = setup(shards).await;
        let filter = Predicate::eq("a", "foo").and(Predicate::eq("b", "bar"));

        let asc = run(&db, query().filter(filter.clone()).sort(SortExpr::asc("c"))).await;
        let cs: Vec<f64> = asc.documents.iter().filter_map(|doc| number(doc, "c")).collect();
        assert_eq!(cs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(asc.documents.iter().all(|doc| text(doc, "b") == Some("bar")));

        let desc = run(&db, query().filter(filter).sort(SortExpr::desc("c"))).await;
        let cs: Vec<f64> = desc.documents.iter().filter_map(|doc| number(doc, "c")).collect();
        assert_eq!(cs, vec![4.0, 3.0, 2.0, 1.0, 0.0]);
    }
}

#[tokio::test]
async fn numeric_ranges() {
    let db = setup(4).await;
    let count = |p: Predicate| {
        let db = &db;
        async move { run(db, query().filter(p)).await.len() }
    };

    let between = run(&db, query().filter(Predicate::gt("c", 1).and(Predicate::lt("c", 3)))).await;
    assert_eq!(between.len(), 4);
    assert!(between.documents.iter().all(|doc| number(doc, "c") == Some(2.0)));

    assert_eq!(count(Predicate::lt("c", 2)).await, 8);
    assert_eq!(count(Predicate::le("c", 2)).await, 12);
    assert_eq!(count(Predicate::ge("c", 1).and(Predicate::le("c", 3))).await, 12);
    assert_eq!(count(Predicate::lt("c", 1).or(Predicate::gt("c", 3))).await, 8);
    assert_eq!(count(Predicate::gt("c", 3).and(Predicate::lt("c", 1))).await, 0);
}

#[tokio::test]
async fn random_ranges_match_a_scan() {
    let db = setup(2).await;
    let all = db.all_documents(COLLECTION).unwrap();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..50 {
        let lo = rng.gen_range(-1..6) as f64 - 0.5 * rng.gen_range(0..2) as f64;
        let hi = rng.gen_range(-1..6) as f64;
        let (lo_incl, hi_incl) = (rng.gen_bool(0.5), rng.gen_bool(0.5));

        let lower = if lo_incl { Predicate::ge("c", lo) } else { Predicate::gt("c", lo) };
        let upper = if hi_incl { Predicate::le("c", hi) } else { Predicate::lt("c", hi) };
        let result = run(&db, query().filter(lower.and(upper))).await;

        let expected: BTreeSet<String> = all
            .iter()
            .filter(|doc| match number(doc, "c") {
                Some(c) => (if lo_incl { c >= lo } else { c > lo }) && (if hi_incl { c <= hi } else { c < hi }),
                None => false,
            })
            .map(|doc| doc.key.clone())
            .collect();
        assert_eq!(key_set(&result), expected, "lo = {} ({}), hi = {} ({})", lo, lo_incl, hi, hi_incl);
    }
}

#[tokio::test]
async fn inequality_includes_documents_without_the_field() {
    let db = setup(4).await;
    let ne = run(&db, query().filter(Predicate::ne("a", "foo"))).await;
    let eq = run(&db, query().filter(Predicate::eq("a", "foo"))).await;
    assert_eq!(ne.len(), 18);

    let (ne, eq) = (key_set(&ne), key_set(&eq));
    assert!(ne.is_disjoint(&eq));
    assert_eq!(ne.union(&eq).count(), 28);

    let missing: BTreeSet<String> = db
        .all_documents(COLLECTION)
        .unwrap()
        .iter()
        .filter(|doc| doc.get_field("a").is_none())
        .map(|doc| doc.key.clone())
        .collect();
    assert_eq!(missing.len(), 8);
    assert!(missing.is_subset(&ne));
}

#[tokio::test]
async fn prefix_filters() {
    let db = setup(2).await;
    let result = run(&db, query().filter(Predicate::starts_with("a", "fo"))).await;
    assert_eq!(result.len(), 10);
    assert!(result.documents.iter().all(|doc| text(doc, "a") == Some("foo")));

    let result = run(&db, query().filter(Predicate::starts_with("b", "ba"))).await;
    assert_eq!(result.len(), 10);

    let result = run(
        &db,
        query()
            .filter(Predicate::starts_with("b", "ba").and(Predicate::eq("c", 0)))
            .sort(SortExpr::asc("b")),
    )
    .await;
    let rows: Vec<(Option<&str>, Option<f64>)> = result
        .documents
        .iter()
        .map(|doc| (text(doc, "b"), number(doc, "c")))
        .collect();
    assert_eq!(rows, vec![(Some("bar"), Some(0.0)), (Some("baz"), Some(0.0))]);
}

#[tokio::test]
async fn existence_by_kind_and_analyzer() {
    let db = setup(4).await;
    let count = |p: Predicate| {
        let db = &db;
        async move { run(db, query().filter(p)).await.len() }
    };

    assert_eq!(count(Predicate::exists("text")).await, 4);
    assert_eq!(count(Predicate::exists_analyzer("text", "text_en")).await, 4);
    assert_eq!(count(Predicate::exists_kind("text", "string")).await, 4);
    // Only indexed under text_en, so identity existence finds nothing
    assert_eq!(count(Predicate::exists_kind("text", "analyzer")).await, 0);
    assert_eq!(
        count(Predicate::analyzer(Predicate::exists_kind("text", "analyzer"), "text_en")).await,
        4
    );
    assert_eq!(count(Predicate::exists_kind("text", "type")).await, 0);
    assert_eq!(count(Predicate::exists("nonExistentField")).await, 0);
}

#[tokio::test]
async fn existence_of_typed_fields() {
    let db = setup(2).await;

    let result = run(&db, query().filter(Predicate::exists_kind("anotherBoolField", "bool"))).await;
    assert_eq!(names(&result), vec!["bool"]);

    let dynamic = FieldRef::dynamic(Expr::concat([Expr::from("another"), Expr::from("NumericField")]));
    let result = run(&db, query().filter(Predicate::exists_kind(dynamic, "numeric"))).await;
    assert_eq!(names(&result), vec!["numeric"]);

    let result = run(&db, query().filter(Predicate::exists_kind("anotherNullField", "null"))).await;
    assert_eq!(names(&result), vec!["null"]);

    let result = run(&db, query().filter(Predicate::exists_kind("anotherNullField", "type"))).await;
    assert_eq!(names(&result), vec!["null"]);

    let result = run(&db, query().filter(Predicate::eq("anotherBoolField", true))).await;
    assert_eq!(names(&result), vec!["bool"]);
}

#[tokio::test]
async fn phrase_in_every_form() {
    for shards in [1, 4] {
        let db = setup(shards).await;
        let phrase = "quick brown fox jumps";
        let as_array = || Expr::array([Expr::from(phrase)]);

        let forms = [
            Predicate::phrase("text", phrase, Some("text_en")),
            Predicate::analyzer(Predicate::phrase("text", phrase, None), "text_en"),
            Predicate::phrase("text", as_array(), Some("text_en")),
            Predicate::analyzer(Predicate::phrase("text", as_array(), None), "text_en"),
        ];
        for form in forms {
            let result = run(&db, query().filter(form.clone())).await;
            assert_eq!(names(&result), vec!["full"], "{:?}", form);
        }

        // Tokens present but not adjacent
        let result = run(&db, query().filter(Predicate::phrase("text", "quick fox", Some("text_en")))).await;
        assert_eq!(names(&result), vec!["half"]);
        let result = run(&db, query().filter(Predicate::phrase("text", "fox quick", Some("text_en")))).await;
        assert!(result.is_empty());
    }
}

#[tokio::test]
async fn phrase_with_position_gap() {
    let db = setup(1).await;
    let gapped = Expr::array([Expr::from("quick"), Expr::from(1), Expr::from("fox")]);
    let result = run(&db, query().filter(Predicate::phrase("text", gapped, Some("text_en")))).await;
    assert_eq!(names(&result), vec!["full"]);

    let huge = Expr::array([Expr::from("quick"), Expr::from(4294967295.0), Expr::from("fox")]);
    let err = db
        .for_each_in_view(&query().filter(Predicate::phrase("text", huge, Some("text_en"))))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedPredicate);
}

#[tokio::test]
async fn conjunction_over_array_elements() {
    for shards in [1, 2] {
        let db = setup(shards).await;
        for doc in [
            serde_json::json!({"_key": "spread", "tags": [0, 5], "labels": ["apple", "pear"]}),
            serde_json::json!({"_key": "inside", "tags": 2, "labels": "kiwi"}),
        ] {
            db.insert(COLLECTION, doc, searchview::core::database::WriteOptions::sync())
                .await
                .unwrap();
        }

        let gt = Predicate::gt("tags", 1);
        let lt = Predicate::lt("tags", 3);
        let both = key_set(&run(&db, query().filter(gt.clone().and(lt.clone()))).await);
        let gt = key_set(&run(&db, query().filter(gt)).await);
        let lt = key_set(&run(&db, query().filter(lt)).await);
        let expected: BTreeSet<String> = gt.intersection(&lt).cloned().collect();
        assert_eq!(both, expected, "shards = {}", shards);
        assert!(both.contains("spread") && both.contains("inside"));

        let eq_both = run(&db, query().filter(Predicate::eq("tags", 0).and(Predicate::eq("tags", 5)))).await;
        assert_eq!(eq_both.keys(), vec!["spread"]);

        let strings = run(
            &db,
            query().filter(Predicate::gt("labels", "banana").and(Predicate::lt("labels", "berry"))),
        )
        .await;
        assert_eq!(strings.keys(), vec!["spread"]);
    }
}

#[tokio::test]
async fn correlated_inner_loop() {
    for shards in [1, 4] {
        let db = setup(shards).await;
        let rows: Vec<_> = db
            .all_documents(OTHER_COLLECTION)
            .unwrap()
            .iter()
            .map(|doc| searchview::query::binder::Bindings::new().bind("adoc", doc.to_value()))
            .collect();

        let adoc = || Expr::var("adoc");
        let query = query()
            .filter(
                Predicate::eq("c", adoc().attr("id"))
                    .and(Predicate::starts_with(FieldRef::dynamic("a"), adoc().attr("a"))),
            )
            .sort(SortExpr::desc("c"))
            .sort(SortExpr::asc("a"))
            .sort(SortExpr::asc("b"))
            .wait_for_sync();
        let result = db.for_each_in_view_correlated(&query, &rows).await.unwrap();

        let rows: Vec<(&str, &str, f64)> = result
            .documents
            .iter()
            .map(|doc| (text(doc, "a").unwrap(), text(doc, "b").unwrap(), number(doc, "c").unwrap()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("bar", "foo", 1.0),
                ("baz", "foo", 1.0),
                ("foo", "bar", 0.0),
                ("foo", "baz", 0.0),
            ]
        );
    }
}

#[tokio::test]
async fn membership_in_literal_array() {
    let db = setup(2).await;
    let values = Expr::array([Expr::from(0), Expr::from(4)]);
    let result = run(&db, query().filter(Predicate::is_in("c", values))).await;
    assert_eq!(result.len(), 8);
    assert!(result.documents.iter().all(|doc| matches!(number(doc, "c"), Some(c) if c == 0.0 || c == 4.0)));
}

#[tokio::test]
async fn unlinked_fields_match_nothing() {
    let db = searchview::core::database::Database::open(Default::default()).unwrap();
    db.create_collection("c", None).unwrap();
    db.create_view(
        "v",
        "arangosearch",
        searchview::core::view::ViewProperties::new()
            .link("c", searchview::schema::link::LinkConfig::new().with_field("a", ["identity"])),
    )
    .unwrap();
    db.insert("c", serde_json::json!({"a": "x", "b": "y"}), searchview::core::database::WriteOptions::sync())
        .await
        .unwrap();

    let result = run(&db, ViewQuery::new("v").filter(Predicate::eq("a", "x"))).await;
    assert_eq!(result.len(), 1);
    let result = run(&db, ViewQuery::new("v").filter(Predicate::eq("b", "y"))).await;
    assert!(result.is_empty());
}

#[tokio::test]
async fn compile_errors_are_reported() {
    let db = setup(1).await;

    let err = db
        .for_each_in_view(&query().filter(Predicate::analyzer(Predicate::eq("a", "foo"), "missing")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownAnalyzer);

    let err = db
        .for_each_in_view(&query().filter(Predicate::lt("c", true)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedPredicate);

    let err = db
        .for_each_in_view(&query().filter(Predicate::eq("c", Expr::var("unbound"))))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = db
        .for_each_in_view(&query().filter(Predicate::eq(
            FieldRef::dynamic(FieldValue::Number(1.0)),
            "foo",
        )))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedPredicate);
}
