//! Rendering of event records into report lines.
//!
//! Rendering is a pure function of the record: the same record always
//! yields the same lines.

use serde_json::Value;

use super::kind::EventKind;
use super::record::{read_value_or, EventRecord};

/// Line opening every report.
pub const HEADER_SEPARATOR: &str = "============================";

/// Line closing every report.
pub const FOOTER_SEPARATOR: &str = "----------------------------";

/// Default for missing text fields.
pub const NOT_AVAILABLE: &str = "N/A";

/// Default product name and category.
const UNKNOWN_PRODUCT_FIELD: &str = "Unknown";

/// Renders a record into the lines of its report, separators included.
///
/// # Examples
///
/// ```
/// use laekning_eventhub::report::{render, EventRecord};
///
/// let record = EventRecord::decode(br#"{"EventType":"OrderPlaced","OrderId":"O1"}"#).unwrap();
/// let lines = render(&record);
/// assert_eq!(lines[1], "EventType: OrderPlaced");
/// assert_eq!(lines[2], "OrderId: O1");
/// assert_eq!(lines[5], "GiftWrap: false");
/// ```
pub fn render(record: &EventRecord) -> Vec<String> {
    let kind = record.kind();
    let mut lines = vec![
        HEADER_SEPARATOR.to_string(),
        format!("EventType: {}", kind),
    ];

    match kind {
        EventKind::PrescriptionUploaded => {
            push_text_fields(&mut lines, record, &["PrescriptionId", "FileName", "Timestamp"]);
        }
        EventKind::PrescriptionAnalyzed => {
            push_text_fields(
                &mut lines,
                record,
                &[
                    "PrescriptionId",
                    "FileName",
                    "Timestamp",
                    "ExtractedInscription",
                    "ExtractedPatientDetails",
                ],
            );
        }
        EventKind::ProductsIdentified => {
            push_text_fields(&mut lines, record, &["Timestamp"]);
            match record.get("IdentifiedProducts") {
                Some(Value::Array(products)) => {
                    lines.push("IdentifiedProducts:".to_string());
                    lines.extend(products.iter().map(product_line));
                }
                _ => lines.push("IdentifiedProducts: []".to_string()),
            }
        }
        EventKind::OrderPlaced => {
            push_text_fields(&mut lines, record, &["OrderId", "Customer"]);
            lines.push(format!("ItemCount: {}", record.read_or("ItemCount", 0i64)));
            lines.push(format!("GiftWrap: {}", record.read_or("GiftWrap", false)));
        }
        EventKind::Other(_) => {}
    }

    lines.push(FOOTER_SEPARATOR.to_string());
    lines
}

fn push_text_fields(lines: &mut Vec<String>, record: &EventRecord, keys: &[&str]) {
    for key in keys {
        lines.push(format!("{}: {}", key, record.text_or(key, NOT_AVAILABLE)));
    }
}

fn product_line(product: &Value) -> String {
    let name = read_value_or(product, "Name", UNKNOWN_PRODUCT_FIELD.to_string());
    let category = read_value_or(product, "Category", UNKNOWN_PRODUCT_FIELD.to_string());
    let price = read_value_or(product, "Price", 0.0f64);
    format!("  - Name: {}, Category: {}, Price: {}", name, category, price)
}
