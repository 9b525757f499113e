//! Tests for decoder module

use super::*;
use serde_json::json;

#[test]
fn test_default_path() {
    assert_eq!(JsonDecoder::new().path(), "$.value[*]");
}

#[test]
fn test_decode_value_collection() {
    let body = json!({
        "odata.metadata": "$metadata#PurchaseInvoices",
        "value": [
            {"DocEntry": 1, "DocNum": 100, "DocType": "dDocument_Items"},
            {"DocEntry": 2, "DocNum": 101, "DocType": "dDocument_Service"}
        ]
    });

    let records = JsonDecoder::new().decode(&body).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["DocNum"], 100);
    assert_eq!(records[1]["DocType"], "dDocument_Service");
}

#[test]
fn test_decode_empty_collection() {
    let records = JsonDecoder::new().decode(&json!({"value": []})).unwrap();
    assert!(records.is_empty());
}

#[test]
fn test_decode_missing_collection() {
    let records = JsonDecoder::new().decode(&json!({"error": {}})).unwrap();
    assert!(records.is_empty());
}

#[test]
fn test_decode_nested_lines() {
    let body = json!({
        "value": [
            {"DocNum": 1, "DocumentLines": [{"LineNum": 0}, {"LineNum": 1}]},
            {"DocNum": 2, "DocumentLines": [{"LineNum": 0}]}
        ]
    });

    let records = JsonDecoder::with_path("$.value[*].DocumentLines[*]")
        .decode(&body)
        .unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.contains_key("LineNum")));
}

#[test]
fn test_decode_simple_path_array() {
    let body = json!({"data": {"rows": [{"a": 1}, {"a": 2}]}});
    let records = JsonDecoder::with_path("$.data.rows").decode(&body).unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn test_decode_simple_path_single_object() {
    let body = json!({"DocNum": 5, "DocumentLines": []});
    let records = JsonDecoder::with_path("$").decode(&body).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["DocNum"], 5);
}

#[test]
fn test_decode_skips_non_objects() {
    let body = json!({"value": [{"a": 1}, 2, "x", null]});
    let records = JsonDecoder::new().decode(&body).unwrap();
    assert_eq!(records.len(), 1);
}
