use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonicalized rendering the service attaches to some entities
/// (dates, money amounts).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NormalizedValue {
    pub text: Option<String>,
}

/// One classified span returned by the extraction service.
///
/// Every attribute is optional: the service omits fields freely and a partially
/// populated entity must never be treated as an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub mention_text: Option<String>,
    pub normalized_value: Option<NormalizedValue>,
    /// Zero scores are left out of the service's JSON, so a missing key reads as 0.0.
    pub confidence: f32,
    pub properties: Vec<Entity>,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self { entity_type: Some(entity_type.into()), ..Self::default() }
    }

    pub fn with_mention(mut self, text: impl Into<String>) -> Self {
        self.mention_text = Some(text.into());
        self
    }

    pub fn with_normalized(mut self, text: impl Into<String>) -> Self {
        self.normalized_value = Some(NormalizedValue { text: Some(text.into()) });
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_property(mut self, property: Entity) -> Self {
        self.properties.push(property);
        self
    }

    /// The raw type tag, with a missing tag read as the empty string.
    pub fn type_tag(&self) -> &str {
        self.entity_type.as_deref().unwrap_or("")
    }

    pub fn kind(&self) -> EntityKind {
        EntityKind::classify(self.type_tag())
    }
}

/// Top-level entity classification: the five reserved tags plus a catch-all
/// carrying the service's own label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKind {
    LineItem,
    Subtotal,
    TotalTaxAmount,
    TotalDiscountAmount,
    TotalAmount,
    Other(String),
}

impl EntityKind {
    pub fn classify(tag: &str) -> Self {
        match tag {
            "line_item" => EntityKind::LineItem,
            "subtotal" => EntityKind::Subtotal,
            "total_tax_amount" => EntityKind::TotalTaxAmount,
            "total_discount_amount" => EntityKind::TotalDiscountAmount,
            "total_amount" => EntityKind::TotalAmount,
            other => EntityKind::Other(other.to_string()),
        }
    }

    pub fn is_reserved(&self) -> bool {
        !matches!(self, EntityKind::Other(_))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::LineItem => write!(f, "line_item"),
            EntityKind::Subtotal => write!(f, "subtotal"),
            EntityKind::TotalTaxAmount => write!(f, "total_tax_amount"),
            EntityKind::TotalDiscountAmount => write!(f, "total_discount_amount"),
            EntityKind::TotalAmount => write!(f, "total_amount"),
            EntityKind::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Which `LineItem` slot a nested property fills, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineItemField {
    Description,
    Quantity,
    UnitPrice,
    TotalPrice,
}

impl LineItemField {
    pub fn classify(tag: &str) -> Option<Self> {
        match tag {
            "description" => Some(LineItemField::Description),
            "quantity" => Some(LineItemField::Quantity),
            "unit_price" | "amount" | "product_code" => Some(LineItemField::UnitPrice),
            "total_price" | "price" | "line_item_total" => Some(LineItemField::TotalPrice),
            _ => None,
        }
    }
}
