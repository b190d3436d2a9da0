//! Terminal rendering of a processed receipt.
//!
//! Left column: receipt details. Right column: purchased items and the
//! summary block. The full record is available as JSON.

use tillroll_core::ReceiptRecord;
use tillroll_docai::ScanOutcome;

const NA: &str = "N/A";
const GUTTER: &str = "  |  ";

/// `supplier_name` -> `Supplier Name`
pub fn title_case(key: &str) -> String {
    key.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn or_na(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(NA)
}

fn details_column(record: &ReceiptRecord) -> Vec<String> {
    let mut lines = vec!["Receipt Details".to_string(), "---------------".to_string()];
    if record.receipt_details.is_empty() {
        lines.push("(none)".to_string());
    }
    for (key, value) in &record.receipt_details {
        lines.push(format!("{}: {}", title_case(key), or_na(value)));
    }
    lines
}

fn items_column(record: &ReceiptRecord) -> Vec<String> {
    let mut lines = vec!["Purchased Items".to_string(), "---------------".to_string()];
    if record.line_items.is_empty() {
        lines.push("(none)".to_string());
    }
    for (i, item) in record.line_items.iter().enumerate() {
        let desc = item
            .description
            .clone()
            .unwrap_or_else(|| format!("Item {}", i + 1));
        let price = or_na(&item.total_price);
        lines.push(format!("{desc} - {price}"));
        lines.push(format!("  Description: {desc}"));
        lines.push(format!("  Quantity: {}", or_na(&item.quantity)));
        lines.push(format!("  Unit Price: {}", or_na(&item.unit_price)));
        lines.push(format!("  Total Price: {price}"));
    }

    lines.push(String::new());
    lines.push("Summary".to_string());
    lines.push("-------".to_string());
    lines.push(format!("Subtotal: {}", or_na(&record.subtotal)));
    lines.push(format!("Tax: {}", or_na(&record.total_tax_amount)));
    if let Some(discount) = &record.total_discount_amount {
        lines.push(format!("Discount: {discount}"));
    }
    lines.push(format!("Total Amount: {}", or_na(&record.total_amount)));
    if let Some(conf) = record.ocr_confidence {
        lines.push(format!("OCR Confidence: {:.1}%", conf * 100.0));
    }
    lines
}

/// Lay out the record in two columns. Empty fields render as N/A.
pub fn render_record(record: &ReceiptRecord) -> String {
    let left = details_column(record);
    let right = items_column(record);
    let width = left.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for i in 0..left.len().max(right.len()) {
        let l = left.get(i).map(String::as_str).unwrap_or("");
        let r = right.get(i).map(String::as_str).unwrap_or("");
        out.push_str(format!("{l:<width$}{GUTTER}{r}").trim_end());
        out.push('\n');
    }
    out
}

pub fn render_outcome(outcome: &ScanOutcome, raw: bool) -> Result<String, serde_json::Error> {
    let mut out = format!(
        "== {} ({}, sha256 {})\n",
        outcome.filename,
        outcome.mime_type,
        &outcome.content_sha256[..12.min(outcome.content_sha256.len())]
    );
    for warning in &outcome.warnings {
        out.push_str(&format!("warning: {warning}\n"));
    }
    out.push_str(&render_record(&outcome.record));
    if raw {
        out.push('\n');
        out.push_str(&serde_json::to_string_pretty(&outcome.record)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillroll_core::{normalize_with_summary, Entity, LineItem};
    use tillroll_docai::{MimeType, ScanWarning};

    fn sample() -> ReceiptRecord {
        let mut record = ReceiptRecord {
            subtotal: Some("7.50".into()),
            total_amount: Some("8.10".into()),
            ocr_confidence: Some(0.875),
            ..Default::default()
        };
        record.receipt_details.insert("supplier_name".into(), Some("CORNER SHOP".into()));
        record.receipt_details.insert("receipt_time".into(), None);
        record.line_items.push(LineItem {
            description: Some("Milk".into()),
            quantity: Some("3".into()),
            unit_price: Some("2.50".into()),
            total_price: Some("7.50".into()),
        });
        record.line_items.push(LineItem::default());
        record
    }

    #[test]
    fn title_cases_snake_keys() {
        assert_eq!(title_case("supplier_name"), "Supplier Name");
        assert_eq!(title_case("SUPPLIER_CITY"), "Supplier City");
        assert_eq!(title_case("currency"), "Currency");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn renders_both_columns() {
        let out = render_record(&sample());
        let first = out.lines().next().unwrap();
        assert!(first.starts_with("Receipt Details"));
        assert!(first.ends_with("Purchased Items"));
        assert!(out.contains("Supplier Name: CORNER SHOP"));
        assert!(out.contains("Receipt Time: N/A"));
        assert!(out.contains("Milk - 7.50"));
        assert!(out.contains("Item 2 - N/A"));
        assert!(out.contains("Subtotal: 7.50"));
        assert!(out.contains("Tax: N/A"));
        assert!(out.contains("Total Amount: 8.10"));
        assert!(out.contains("OCR Confidence: 87.5%"));
        assert!(!out.contains("Discount:"));
    }

    #[test]
    fn discount_shown_only_when_present() {
        let record = ReceiptRecord { total_discount_amount: Some("1.00".into()), ..sample() };
        assert!(render_record(&record).contains("Discount: 1.00"));
    }

    #[test]
    fn empty_record_still_renders_columns() {
        let out = render_record(&ReceiptRecord::default());
        assert!(out.starts_with("Receipt Details"));
        assert!(out.lines().next().unwrap().ends_with("Purchased Items"));
        assert!(out.contains("Subtotal: N/A"));
        assert!(out.contains("Tax: N/A"));
        assert!(out.contains("Total Amount: N/A"));
        assert!(!out.contains("No data to display"));
        assert!(!out.contains("OCR Confidence"));
    }

    #[test]
    fn outcome_includes_warnings_and_raw_json() {
        let (record, summary) =
            normalize_with_summary(&[Entity::new("total_amount").with_mention("3.00")]);
        let outcome = ScanOutcome {
            filename: "r.png".into(),
            content_sha256: "ab".repeat(32),
            mime_type: MimeType::Png,
            record,
            summary,
            warnings: vec![ScanWarning::EmptyExtraction],
        };
        let out = render_outcome(&outcome, true).unwrap();
        assert!(out.starts_with("== r.png (image/png, sha256 abababababab)"));
        assert!(out.contains("warning: No text was extracted"));
        assert!(out.contains("\"total_amount\": \"3.00\""));
    }
}
