use crate::entity::{Entity, EntityKind, LineItemField};
use crate::record::{LineItem, ReceiptRecord};

/// Counters gathered while flattening, for logging by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeSummary {
    pub entity_count: usize,
    pub line_item_count: usize,
}

/// Best textual value of an entity.
///
/// A non-empty normalized value wins over the mention text; both are trimmed.
/// Returns `None` rather than an empty string when neither is usable.
pub fn entity_text(entity: &Entity) -> Option<String> {
    let normalized = entity
        .normalized_value
        .as_ref()
        .and_then(|v| v.text.as_deref());
    non_empty_trimmed(normalized).or_else(|| non_empty_trimmed(entity.mention_text.as_deref()))
}

fn non_empty_trimmed(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Flatten the service's top-level entities into a `ReceiptRecord`.
pub fn normalize_entities(entities: &[Entity]) -> ReceiptRecord {
    normalize_with_summary(entities).0
}

pub fn normalize_with_summary(entities: &[Entity]) -> (ReceiptRecord, NormalizeSummary) {
    let mut record = ReceiptRecord::default();
    let mut summary = NormalizeSummary::default();

    for entity in entities {
        summary.entity_count += 1;
        match entity.kind() {
            EntityKind::LineItem => {
                summary.line_item_count += 1;
                record.line_items.push(line_item_from(entity));
            }
            EntityKind::Subtotal => record.subtotal = entity_text(entity),
            EntityKind::TotalTaxAmount => record.total_tax_amount = entity_text(entity),
            EntityKind::TotalDiscountAmount => record.total_discount_amount = entity_text(entity),
            EntityKind::TotalAmount => record.total_amount = entity_text(entity),
            EntityKind::Other(tag) => {
                record.receipt_details.insert(tag, entity_text(entity));
            }
        }
    }

    record.ocr_confidence = mean_confidence(entities);
    (record, summary)
}

fn line_item_from(entity: &Entity) -> LineItem {
    let mut item = LineItem::default();
    for prop in &entity.properties {
        let Some(field) = LineItemField::classify(prop.type_tag()) else {
            continue;
        };
        let text = entity_text(prop);
        match field {
            LineItemField::Description => item.description = text,
            LineItemField::Quantity => item.quantity = text,
            LineItemField::UnitPrice => item.unit_price = text,
            LineItemField::TotalPrice => item.total_price = text,
        }
    }
    item
}

/// Mean over every top-level entity; `None` only when there are none.
fn mean_confidence(entities: &[Entity]) -> Option<f64> {
    if entities.is_empty() {
        return None;
    }
    let sum: f64 = entities.iter().map(|e| f64::from(e.confidence)).sum();
    Some(sum / entities.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn normalized_value_beats_mention_text() {
        let e = Entity::new("receipt_date")
            .with_mention("Jan 5, 2024")
            .with_normalized("  2024-01-05 ");
        assert_eq!(entity_text(&e).as_deref(), Some("2024-01-05"));
    }

    #[test]
    fn falls_back_to_mention_text() {
        let e = Entity::new("supplier_name").with_mention("  CORNER SHOP\n");
        assert_eq!(entity_text(&e).as_deref(), Some("CORNER SHOP"));
    }

    #[test]
    fn blank_normalized_value_falls_back() {
        let e = Entity::new("supplier_name")
            .with_mention("Cafe")
            .with_normalized("   ");
        assert_eq!(entity_text(&e).as_deref(), Some("Cafe"));
    }

    #[test]
    fn no_text_is_absent_not_empty() {
        assert_eq!(entity_text(&Entity::new("supplier_name")), None);
        assert_eq!(entity_text(&Entity::new("supplier_name").with_mention("")), None);
    }

    #[test]
    fn line_item_maps_property_aliases() {
        let item = Entity::new("line_item")
            .with_property(Entity::new("quantity").with_mention("3"))
            .with_property(Entity::new("description").with_mention("Milk"))
            .with_property(Entity::new("amount").with_mention("2.50"))
            .with_property(Entity::new("line_item_total").with_mention("7.50"));

        let record = normalize_entities(&[item]);
        assert_eq!(
            record.line_items,
            vec![LineItem {
                description: Some("Milk".into()),
                quantity: Some("3".into()),
                unit_price: Some("2.50".into()),
                total_price: Some("7.50".into()),
            }]
        );
    }

    #[test]
    fn line_item_last_property_wins_and_unknowns_ignored() {
        let item = Entity::new("line_item")
            .with_property(Entity::new("unit_price").with_mention("1.00"))
            .with_property(Entity::new("product_code").with_mention("SKU-9"))
            .with_property(Entity::new("tax_code").with_mention("A"));

        let record = normalize_entities(&[item]);
        assert_eq!(record.line_items[0].unit_price.as_deref(), Some("SKU-9"));
        assert_eq!(record.line_items[0].description, None);
        assert!(record.receipt_details.is_empty());
    }

    #[test]
    fn nested_properties_never_leak_to_top_level() {
        let item = Entity::new("line_item")
            .with_property(Entity::new("total_amount").with_mention("99.00"))
            .with_property(Entity::new("supplier_name").with_mention("Nested"));
        let other = Entity::new("supplier_name")
            .with_mention("Top")
            .with_property(Entity::new("subtotal").with_mention("1.00"));

        let record = normalize_entities(&[item, other]);
        assert_eq!(record.total_amount, None);
        assert_eq!(record.subtotal, None);
        assert_eq!(record.receipt_details.len(), 1);
        assert_eq!(record.receipt_details["supplier_name"].as_deref(), Some("Top"));
        assert_eq!(record.line_items, vec![LineItem::default()]);
    }

    #[test]
    fn duplicate_reserved_type_last_wins() {
        let record = normalize_entities(&[
            Entity::new("total_amount").with_mention("10.00"),
            Entity::new("total_amount").with_mention("12.00"),
        ]);
        assert_eq!(record.total_amount.as_deref(), Some("12.00"));
    }

    #[test]
    fn later_textless_aggregate_clears_earlier_value() {
        let record = normalize_entities(&[
            Entity::new("total_amount").with_mention("10.00"),
            Entity::new("subtotal").with_mention("9.00"),
            Entity::new("total_amount").with_mention("   "),
            Entity::new("subtotal"),
        ]);
        assert_eq!(record.total_amount, None);
        assert_eq!(record.subtotal, None);
        assert!(record.receipt_details.is_empty());
    }

    #[test]
    fn duplicate_detail_key_last_wins() {
        let record = normalize_entities(&[
            Entity::new("currency").with_mention("USD"),
            Entity::new("currency").with_mention("EUR"),
        ]);
        assert_eq!(record.receipt_details.len(), 1);
        assert_eq!(record.receipt_details["currency"].as_deref(), Some("EUR"));
    }

    #[test]
    fn detail_without_text_is_kept_as_absent() {
        let record = normalize_entities(&[Entity::new("receipt_time")]);
        assert_eq!(record.receipt_details.get("receipt_time"), Some(&None));
    }

    #[test]
    fn aggregates_fill_their_slots() {
        let record = normalize_entities(&[
            Entity::new("subtotal").with_mention("9.00"),
            Entity::new("total_tax_amount").with_normalized("0.72"),
            Entity::new("total_discount_amount").with_mention("1.00"),
            Entity::new("total_amount").with_mention("8.72"),
        ]);
        assert_eq!(record.subtotal.as_deref(), Some("9.00"));
        assert_eq!(record.total_tax_amount.as_deref(), Some("0.72"));
        assert_eq!(record.total_discount_amount.as_deref(), Some("1.00"));
        assert_eq!(record.total_amount.as_deref(), Some("8.72"));
        assert!(record.receipt_details.is_empty());
    }

    #[test]
    fn every_entity_is_classified_once() {
        let entities = vec![
            Entity::new("line_item"),
            Entity::new("subtotal").with_mention("1"),
            Entity::new("line_item"),
            Entity::new("supplier_name").with_mention("A"),
            Entity::new("total_amount").with_mention("2"),
            Entity::new("receipt_date").with_mention("2024-01-01"),
            Entity::new("total_tax_amount").with_mention("0.1"),
        ];
        let (record, summary) = normalize_with_summary(&entities);
        assert_eq!(summary.entity_count, entities.len());
        assert_eq!(summary.line_item_count, 2);
        assert_eq!(
            record.line_items.len() + record.filled_aggregates() + record.receipt_details.len(),
            entities.len()
        );
    }

    #[test]
    fn confidence_is_mean_of_top_level() {
        let record = normalize_entities(&[
            Entity::new("subtotal").with_confidence(0.9),
            Entity::new("total_amount").with_confidence(0.8),
            Entity::new("line_item")
                .with_confidence(0.7)
                .with_property(Entity::new("description").with_confidence(0.1)),
        ]);
        assert!(approx(record.ocr_confidence.unwrap(), 0.8));
    }

    #[test]
    fn unscored_entities_count_as_zero() {
        let record = normalize_entities(&[
            Entity::new("subtotal").with_confidence(0.5),
            Entity::new("currency"),
        ]);
        assert!(approx(record.ocr_confidence.unwrap(), 0.25));
    }

    #[test]
    fn omitted_confidence_key_counts_in_mean() {
        let entities: Vec<Entity> = serde_json::from_str(
            r#"[{"type": "total_amount", "confidence": 0.9}, {"type": "supplier_name"}]"#,
        )
        .unwrap();
        let record = normalize_entities(&entities);
        assert!(approx(record.ocr_confidence.unwrap(), 0.45));
    }

    #[test]
    fn confidence_absent_without_entities() {
        assert_eq!(normalize_entities(&[]).ocr_confidence, None);
        assert_eq!(normalize_entities(&[Entity::new("currency")]).ocr_confidence, Some(0.0));
    }

    #[test]
    fn missing_type_lands_in_details_under_empty_key() {
        let record = normalize_entities(&[Entity::default().with_mention("stray")]);
        assert_eq!(record.receipt_details[""].as_deref(), Some("stray"));
    }

    #[test]
    fn normalizing_twice_gives_equal_records() {
        let entities = vec![
            Entity::new("supplier_name").with_mention("Shop").with_confidence(0.6),
            Entity::new("line_item")
                .with_property(Entity::new("description").with_mention("Bread")),
            Entity::new("total_amount").with_normalized("4.20").with_confidence(0.95),
        ];
        assert_eq!(normalize_entities(&entities), normalize_entities(&entities));
    }
}
