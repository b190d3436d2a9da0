use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: Option<String>,
    pub quantity: Option<String>,
    pub unit_price: Option<String>,
    pub total_price: Option<String>,
}

/// The flattened, display-ready view of one processed receipt.
///
/// Values are kept as the service rendered them; nothing here is parsed into
/// numbers or dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Every non-reserved top-level entity, keyed by its type tag.
    pub receipt_details: BTreeMap<String, Option<String>>,
    pub line_items: Vec<LineItem>,
    pub subtotal: Option<String>,
    pub total_tax_amount: Option<String>,
    pub total_discount_amount: Option<String>,
    pub total_amount: Option<String>,
    /// Mean confidence over all top-level entities; `None` when there were none.
    pub ocr_confidence: Option<f64>,
}

impl ReceiptRecord {
    pub fn is_empty(&self) -> bool {
        self.receipt_details.is_empty()
            && self.line_items.is_empty()
            && self.subtotal.is_none()
            && self.total_tax_amount.is_none()
            && self.total_discount_amount.is_none()
            && self.total_amount.is_none()
    }

    /// Number of reserved aggregate slots holding a value.
    pub fn filled_aggregates(&self) -> usize {
        [
            &self.subtotal,
            &self.total_tax_amount,
            &self.total_discount_amount,
            &self.total_amount,
        ]
        .iter()
        .filter(|slot| slot.is_some())
        .count()
    }
}
