//! Built-in stream catalog
//!
//! The Service Layer sources this tap extracts, each declared as a named
//! `StreamDefinition` profile.

use crate::error::{Error, Result};
use crate::query::QueryDefinition;
use crate::stream::{ChildLink, StreamDefinition};
use crate::types::{ExtractionContext, Record};

/// Purchase invoice headers
pub const INVOICES: &str = "invoices";
/// Lines of each purchase invoice
pub const INVOICE_LINES: &str = "invoice_lines";
/// Invoice lines joined with item master data
pub const INVOICE_DETAILS: &str = "invoice_details";
/// Invoice lines of one item group
pub const ITEM_GROUP_PURCHASES: &str = "item_group_purchases";

const INVOICE_DETAILS_SQL: &str = "SELECT T0.\"DocEntry\", T0.\"DocNum\", T0.\"DocDate\", \
T0.\"CardCode\", T0.\"CardName\", T1.\"LineNum\", T1.\"ItemCode\", T1.\"Dscription\", \
T1.\"Quantity\", T1.\"Price\", T1.\"LineTotal\", T1.\"Currency\", T2.\"ItmsGrpCod\" \
FROM OPCH T0 \
INNER JOIN PCH1 T1 ON T0.\"DocEntry\" = T1.\"DocEntry\" \
INNER JOIN OITM T2 ON T1.\"ItemCode\" = T2.\"ItemCode\" \
WHERE T0.\"DocDate\" >= :startDate AND T0.\"DocDate\" <= :endDate";

const ITEM_GROUP_PURCHASES_SQL: &str = "SELECT T0.\"DocEntry\", T0.\"DocNum\", T0.\"DocDate\", \
T0.\"CardCode\", T1.\"LineNum\", T1.\"ItemCode\", T1.\"Quantity\", T1.\"LineTotal\", \
T2.\"ItmsGrpCod\", T2.\"ItemName\" \
FROM OPCH T0 \
INNER JOIN PCH1 T1 ON T0.\"DocEntry\" = T1.\"DocEntry\" \
INNER JOIN OITM T2 ON T1.\"ItemCode\" = T2.\"ItemCode\" \
WHERE T0.\"DocDate\" >= :startDate AND T0.\"DocDate\" <= :endDate \
AND T2.\"ItmsGrpCod\" = :groupCode";

/// Set of streams known to the tap
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    streams: Vec<StreamDefinition>,
}

impl Catalog {
    /// Build a catalog from definitions, checking parent/child links
    pub fn new(streams: Vec<StreamDefinition>) -> Result<Self> {
        let catalog = Self { streams };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The streams shipped with the tap
    pub fn builtin() -> Self {
        Self {
            streams: vec![
                invoices(),
                invoice_lines(),
                invoice_details(),
                item_group_purchases(),
            ],
        }
    }

    /// All stream definitions, in declaration order
    pub fn streams(&self) -> &[StreamDefinition] {
        &self.streams
    }

    /// Stream names, in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look up a stream
    pub fn get(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Look up a stream, failing if it is unknown
    pub fn require(&self, name: &str) -> Result<&StreamDefinition> {
        self.get(name).ok_or_else(|| Error::StreamNotFound {
            stream: name.to_string(),
        })
    }

    /// Streams that run without a parent
    pub fn roots(&self) -> impl Iterator<Item = &StreamDefinition> {
        self.streams.iter().filter(|s| !s.is_child())
    }

    /// Check that every child link points at a stream declaring that parent
    pub fn validate(&self) -> Result<()> {
        for stream in &self.streams {
            for link in &stream.children {
                let child = self.require(&link.stream)?;
                if child.parent.as_deref() != Some(stream.name.as_str()) {
                    return Err(Error::config(format!(
                        "stream '{}' is linked from '{}' but does not declare it as parent",
                        child.name, stream.name
                    )));
                }
            }
            if let Some(parent) = &stream.parent {
                let parent = self.require(parent)?;
                if !parent.children.iter().any(|l| l.stream == stream.name) {
                    return Err(Error::config(format!(
                        "stream '{}' declares parent '{}' which has no link to it",
                        stream.name, parent.name
                    )));
                }
            }
        }
        Ok(())
    }
}

fn invoices() -> StreamDefinition {
    StreamDefinition::entity(INVOICES, "/PurchaseInvoices")
        .with_param(
            "$select",
            "DocEntry,DocNum,DocType,DocDate,CardCode,DocTotal,UpdateDate",
        )
        .with_param("$orderby", "DocEntry")
        .with_primary_keys(["DocNum"])
        .with_replication_key("UpdateDate")
        .with_child(ChildLink::new("DocNum", "doc_num", INVOICE_LINES))
}

fn invoice_lines() -> StreamDefinition {
    StreamDefinition::entity(INVOICE_LINES, "/PurchaseInvoices")
        .with_param("$filter", "DocNum eq {{ context.doc_num }}")
        .with_param("$select", "DocEntry,DocNum,DocumentLines")
        .with_records_path("$.value[*].DocumentLines[*]")
        .with_primary_keys(["DocNum", "LineNum"])
        .with_parent(INVOICES)
        .with_transform(stamp_document_number)
}

fn invoice_details() -> StreamDefinition {
    StreamDefinition::query(
        INVOICE_DETAILS,
        QueryDefinition::new("TapInvoiceDetails", "Tap invoice details", INVOICE_DETAILS_SQL),
        false,
    )
    .with_primary_keys(["DocEntry", "LineNum"])
}

fn item_group_purchases() -> StreamDefinition {
    StreamDefinition::query(
        ITEM_GROUP_PURCHASES,
        QueryDefinition::new(
            "TapItemGroupPurchases",
            "Tap item group purchases",
            ITEM_GROUP_PURCHASES_SQL,
        ),
        true,
    )
    .with_primary_keys(["DocEntry", "LineNum"])
}

/// Lines carry no document number of their own; take it from the parent.
/// Text-only lines have no item and are skipped.
fn stamp_document_number(mut line: Record, context: &ExtractionContext) -> Option<Record> {
    match line.get("ItemCode") {
        Some(serde_json::Value::String(code)) if !code.is_empty() => {}
        _ => return None,
    }
    if let Some(doc_num) = context.get("doc_num") {
        line.insert("DocNum".to_string(), doc_num.clone());
    }
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueryStreamOptions, TapConfig};
    use crate::stream::StreamSource;
    use serde_json::json;

    #[test]
    fn test_builtin_catalog_is_consistent() {
        let catalog = Catalog::builtin();
        catalog.validate().unwrap();
        assert_eq!(
            catalog.names(),
            vec![INVOICES, INVOICE_LINES, INVOICE_DETAILS, ITEM_GROUP_PURCHASES]
        );
        let roots: Vec<_> = catalog.roots().map(|s| s.name.as_str()).collect();
        assert_eq!(roots, vec![INVOICES, INVOICE_DETAILS, ITEM_GROUP_PURCHASES]);
    }

    #[test]
    fn test_query_codes_are_distinct() {
        let catalog = Catalog::builtin();
        let mut codes: Vec<_> = catalog
            .streams()
            .iter()
            .filter_map(|s| match &s.source {
                StreamSource::Query(q) => Some(q.definition.code.clone()),
                StreamSource::Entity { .. } => None,
            })
            .collect();
        let total = codes.len();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), total);
        assert_eq!(total, 2);
    }

    #[test]
    fn test_unknown_stream() {
        let err = Catalog::builtin().require("orders").unwrap_err();
        assert!(matches!(err, Error::StreamNotFound { ref stream } if stream == "orders"));
    }

    #[test]
    fn test_dangling_child_link_rejected() {
        let parent = StreamDefinition::entity("a", "/A").with_child(ChildLink::new("Id", "id", "b"));
        assert!(Catalog::new(vec![parent.clone()]).is_err());

        let orphan = StreamDefinition::entity("b", "/B");
        assert!(Catalog::new(vec![parent, orphan]).unwrap_err().is_config());
    }

    #[test]
    fn test_invoice_lines_request_for_parent() {
        let catalog = Catalog::builtin();
        let invoices = catalog.require(INVOICES).unwrap();
        let lines = catalog.require(INVOICE_LINES).unwrap();

        let parent = json!({"DocEntry": 3, "DocNum": 42}).as_object().cloned().unwrap();
        let context = invoices.children[0].derive_context(&parent).unwrap();
        let request = lines.resolve(&context, &TapConfig::default()).unwrap();

        assert_eq!(request.path, "/PurchaseInvoices");
        assert_eq!(request.params.get("$filter"), Some("DocNum eq 42"));
    }

    #[test]
    fn test_invoice_lines_transform() {
        let lines = Catalog::builtin().require(INVOICE_LINES).unwrap().clone();
        let context = ExtractionContext::new().with("doc_num", json!(42));

        let item = json!({"LineNum": 0, "ItemCode": "A100", "Quantity": 2.0});
        let stamped = lines
            .apply_transform(item.as_object().cloned().unwrap(), &context)
            .unwrap();
        assert_eq!(stamped["DocNum"], 42);

        let text_line = json!({"LineNum": 1, "ItemCode": "", "ItemDescription": "Freight note"});
        assert!(lines
            .apply_transform(text_line.as_object().cloned().unwrap(), &context)
            .is_none());
    }

    #[test]
    fn test_item_group_stream_requires_group_code() {
        let stream = Catalog::builtin().require(ITEM_GROUP_PURCHASES).unwrap().clone();
        let mut config = TapConfig::default();
        config.queries.insert(
            ITEM_GROUP_PURCHASES.to_string(),
            QueryStreamOptions {
                group_code: None,
                start_date: Some("2024-01-01".to_string()),
                end_date: None,
            },
        );
        let err = stream.resolve(&ExtractionContext::new(), &config).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_query_streams_lacking_options() {
        let catalog = Catalog::builtin();
        let details = catalog.require(INVOICE_DETAILS).unwrap();
        let groups = catalog.require(ITEM_GROUP_PURCHASES).unwrap();
        let invoices = catalog.require(INVOICES).unwrap();

        let mut config = TapConfig::default();
        assert!(details.lacks_query_options(&config));
        assert!(groups.lacks_query_options(&config));
        assert!(!invoices.lacks_query_options(&config));

        config.start_date = Some("2024-01-01".to_string());
        assert!(!details.lacks_query_options(&config));
        assert!(groups.lacks_query_options(&config));

        config
            .queries
            .insert(ITEM_GROUP_PURCHASES.to_string(), QueryStreamOptions::default());
        assert!(!groups.lacks_query_options(&config));
    }
}
