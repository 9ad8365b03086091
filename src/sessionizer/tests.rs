use super::*;
use crate::types::EventKind::{Purchase, View};

fn ev(kind: crate::types::EventKind, timestamp: u64, product_id: &str) -> Event {
    Event::new(kind, timestamp, product_id)
}

#[test]
fn test_sessionize_empty_input() {
    assert!(sessionize(Vec::new()).is_empty());
}

#[test]
fn test_sessionize_sorts_and_truncates_at_last_purchase() {
    let sessions = sessionize(vec![
        ev(View, 10, "p1"),
        ev(Purchase, 8, "p1"),
        ev(View, 4, "p1"),
        ev(View, 14, "p1"),
        ev(Purchase, 13, "p1"),
        ev(View, 1, "p1"),
    ]);

    let session = &sessions["p1"];
    let timestamps: Vec<u64> = session.events.iter().map(|e| e.timestamp).collect();
    assert_eq!(timestamps, vec![1, 4, 8, 10, 13]);
    assert_eq!(session.discarded, 1);
    assert_eq!(session.last_purchase().map(|e| e.timestamp), Some(13));
}

#[test]
fn test_sessionize_excludes_products_without_purchase() {
    let sessions = sessionize(vec![
        ev(View, 1, "p2"),
        ev(View, 2, "p2"),
        ev(Purchase, 3, "p3"),
    ]);

    assert!(!sessions.contains_key("p2"));
    assert!(sessions.contains_key("p3"));
}

#[test]
fn test_sessionize_product_ids_are_case_sensitive() {
    let sessions = sessionize(vec![
        ev(Purchase, 1, "p1"),
        ev(View, 0, "P1"),
        ev(Purchase, 2, "P1"),
    ]);

    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions["p1"].events.len(), 1);
    assert_eq!(sessions["P1"].events.len(), 2);
}

#[test]
fn test_sessionize_ties_keep_input_order() {
    // Purchase first in input: the view at the same timestamp follows it and is cut.
    let sessions = sessionize(vec![ev(Purchase, 5, "p1"), ev(View, 5, "p1")]);
    assert_eq!(sessions["p1"].events, vec![ev(Purchase, 5, "p1")]);
    assert_eq!(sessions["p1"].discarded, 1);

    // View first in input: it stays in the prefix.
    let sessions = sessionize(vec![ev(View, 5, "p1"), ev(Purchase, 5, "p1")]);
    assert_eq!(
        sessions["p1"].events,
        vec![ev(View, 5, "p1"), ev(Purchase, 5, "p1")]
    );
    assert_eq!(sessions["p1"].discarded, 0);
}

#[test]
fn test_sessionize_equal_timestamp_purchases_use_rightmost() {
    let sessions = sessionize(vec![
        ev(Purchase, 3, "p1"),
        ev(View, 3, "p1"),
        ev(Purchase, 3, "p1"),
        ev(View, 3, "p1"),
    ]);

    let session = &sessions["p1"];
    assert_eq!(session.events.len(), 3);
    assert_eq!(session.view_count(), 1);
    assert_eq!(session.purchase_count(), 2);
    assert_eq!(session.discarded, 1);
}

#[test]
fn test_sessionize_keys_are_sorted() {
    let sessions = sessionize(vec![
        ev(Purchase, 1, "b"),
        ev(Purchase, 1, "a"),
        ev(Purchase, 1, "C"),
        ev(Purchase, 1, "aa"),
    ]);

    let keys: Vec<&str> = sessions.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["C", "a", "aa", "b"]);
}

#[test]
fn test_group_by_product_keeps_input_order() {
    let groups = group_by_product(vec![
        ev(View, 9, "p1"),
        ev(View, 1, "p2"),
        ev(Purchase, 3, "p1"),
    ]);

    assert_eq!(groups.len(), 2);
    let p1: Vec<u64> = groups["p1"].iter().map(|e| e.timestamp).collect();
    assert_eq!(p1, vec![9, 3]);
}

#[test]
fn test_truncate_at_last_purchase_without_purchase() {
    assert!(truncate_at_last_purchase(vec![ev(View, 1, "p1")]).is_none());
    assert!(truncate_at_last_purchase(Vec::new()).is_none());
}

#[test]
fn test_truncate_at_last_purchase_only_purchase() {
    let session = truncate_at_last_purchase(vec![ev(Purchase, 2, "p2")]).unwrap();
    assert_eq!(session.view_count(), 0);
    assert_eq!(session.purchase_count(), 1);
    assert_eq!(session.discarded, 0);
}
