use super::*;

fn hit(text: &str, distance: f32, inserted_at: i64, insert_position: u32) -> SearchHit {
    SearchHit {
        record_id: format!("{text}_chunk_{insert_position}"),
        source_id: "app_log".to_string(),
        sequence_index: insert_position,
        text: text.to_string(),
        distance,
        inserted_at,
        insert_position,
    }
}

#[test]
fn flat_results_stay_flat() {
    let result = QueryResult::from(vec!["a".to_string(), "b".to_string()]);
    assert_eq!(result.chunks(), ["a", "b"]);
    assert_eq!(result.len(), 2);
}

#[test]
fn nested_results_are_flattened_in_order() {
    let nested = vec![
        vec!["first".to_string(), "second".to_string()],
        vec![],
        vec!["third".to_string()],
    ];
    let result = QueryResult::from_nested(nested);
    assert_eq!(result.chunks(), ["first", "second", "third"]);
}

#[test]
fn nested_and_flat_shapes_agree() {
    let flat = QueryResult::from(vec!["x".to_string(), "y".to_string()]);
    let nested = QueryResult::from_nested(vec![vec!["x".to_string(), "y".to_string()]]);
    assert_eq!(flat, nested);
}

#[test]
fn empty_result() {
    let result = QueryResult::default();
    assert!(result.is_empty());
    assert_eq!(result.into_inner(), Vec::<String>::new());
}

#[test]
fn hits_rank_by_distance() {
    let hits = vec![hit("far", 0.9, 1, 0), hit("near", 0.1, 2, 0), hit("mid", 0.5, 3, 0)];
    let ranked = top_k(hits, 10);
    let texts: Vec<_> = ranked.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(texts, ["near", "mid", "far"]);
}

#[test]
fn ties_go_to_earliest_insert() {
    let hits = vec![
        hit("later", 0.25, 20, 0),
        hit("same_commit_second", 0.25, 10, 1),
        hit("same_commit_first", 0.25, 10, 0),
    ];
    let ranked = top_k(hits, 2);
    let texts: Vec<_> = ranked.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(texts, ["same_commit_first", "same_commit_second"]);
}

#[test]
fn hits_convert_to_query_result() {
    let result = QueryResult::from(top_k(vec![hit("b", 0.2, 1, 0), hit("a", 0.1, 1, 1)], 5));
    assert_eq!(result.chunks(), ["a", "b"]);
}

#[test]
fn metric_serialization() {
    assert_eq!(DistanceMetric::default(), DistanceMetric::Cosine);
    assert_eq!(DistanceMetric::L2.to_string(), "l2");
    assert_eq!(
        DistanceMetric::Cosine.distance_type(),
        lancedb::DistanceType::Cosine
    );
}
