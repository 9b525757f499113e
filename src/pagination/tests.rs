//! Tests for pagination module

use super::*;
use crate::types::UrlParams;
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// Next-link decoding
// ============================================================================

#[test]
fn test_decode_absolute_link() {
    let params = decode_next_link(
        "https://sap.example.com:50000/b1s/v1/PurchaseInvoices?$select=DocNum&$skip=20",
    )
    .unwrap();

    assert_eq!(
        params,
        UrlParams::new().with("$select", "DocNum").with("$skip", "20")
    );
}

#[test]
fn test_decode_relative_link() {
    let params = decode_next_link("PurchaseInvoices?$orderby=DocEntry&$skip=40").unwrap();
    assert_eq!(params.get("$orderby"), Some("DocEntry"));
    assert_eq!(params.get("$skip"), Some("40"));
    assert_eq!(params.len(), 2);
}

#[test]
fn test_decode_root_relative_link() {
    let params = decode_next_link("/b1s/v1/SQLQueries('Q1')/List?startDate='2024-01-01'&$skip=20")
        .unwrap();
    assert_eq!(params.get("startDate"), Some("'2024-01-01'"));
    assert_eq!(params.get("$skip"), Some("20"));
}

#[test]
fn test_decode_keeps_repeated_keys() {
    let params = decode_next_link("https://h/x?tag=a&tag=b&$skip=2").unwrap();
    assert_eq!(params.get_all("tag"), ["a", "b"]);
}

#[test]
fn test_decode_percent_encoded_values() {
    let params =
        decode_next_link("https://h/PurchaseInvoices?$filter=UpdateDate%20ge%20'2024-01-01'")
            .unwrap();
    assert_eq!(params.get("$filter"), Some("UpdateDate ge '2024-01-01'"));
}

#[test]
fn test_decode_link_without_query() {
    let params = decode_next_link("https://h/PurchaseInvoices").unwrap();
    assert!(params.is_empty());
}

// ============================================================================
// PageCursor
// ============================================================================

#[test]
fn test_next_params_v1_field() {
    let cursor = PageCursor::new();
    let body = json!({
        "value": [{"DocNum": 1}],
        "odata.nextLink": "PurchaseInvoices?$skip=2"
    });

    let (token, params) = cursor.next_params(None, &body).unwrap();
    assert_eq!(token.as_deref(), Some("PurchaseInvoices?$skip=2"));
    assert_eq!(params, UrlParams::new().with("$skip", "2"));
}

#[test]
fn test_next_params_v2_field() {
    let cursor = PageCursor::new();
    let body = json!({"@odata.nextLink": "Items?$skip=20"});

    let (token, params) = cursor.next_params(None, &body).unwrap();
    assert!(token.is_some());
    assert_eq!(params.get("$skip"), Some("20"));
}

#[test]
fn test_next_params_no_link_is_done() {
    let cursor = PageCursor::new();
    let (token, params) = cursor.next_params(None, &json!({"value": []})).unwrap();
    assert!(token.is_none());
    assert!(params.is_empty());
}

#[test]
fn test_next_params_empty_link_is_done() {
    let cursor = PageCursor::new();
    let (token, _) = cursor
        .next_params(None, &json!({"odata.nextLink": ""}))
        .unwrap();
    assert!(token.is_none());
}

#[test]
fn test_next_params_do_not_leak_between_pages() {
    let cursor = PageCursor::new();

    let first = json!({"odata.nextLink": "X?$filter=a&$skip=2&extra=1"});
    let (token, first_params) = cursor.next_params(None, &first).unwrap();
    assert!(first_params.contains("extra"));

    let second = json!({"odata.nextLink": "X?$skip=4"});
    let (_, second_params) = cursor.next_params(token.as_deref(), &second).unwrap();

    assert_eq!(second_params, UrlParams::new().with("$skip", "4"));
}

#[test]
fn test_repeated_link_stops_paging() {
    let cursor = PageCursor::new();
    let body = json!({"odata.nextLink": "X?$skip=2"});

    let next = cursor.next_page(Some("X?$skip=2"), &body).unwrap();
    assert!(next.is_done());
}

#[test]
fn test_next_page_continue() {
    let cursor = PageCursor::new();
    let next = cursor
        .next_page(None, &json!({"odata.nextLink": "X?$skip=2"}))
        .unwrap();

    assert_eq!(
        next,
        NextPage::Continue {
            token: "X?$skip=2".to_string(),
            params: UrlParams::new().with("$skip", "2"),
        }
    );
}

#[test]
fn test_custom_field() {
    let cursor = PageCursor::with_field("next");
    let (token, _) = cursor
        .next_params(None, &json!({"next": "X?$skip=1", "odata.nextLink": "ignored"}))
        .unwrap();
    assert_eq!(token.as_deref(), Some("X?$skip=1"));
}

#[test]
fn test_non_string_link_is_ignored() {
    let cursor = PageCursor::new();
    assert!(cursor.next_token(&json!({"odata.nextLink": 5})).is_none());
}
