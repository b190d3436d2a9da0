pub mod config;
pub mod entity;
pub mod normalize;
pub mod record;

pub use config::{ConfigError, CredentialSource, ProcessorName, ScannerConfig, ValidatedConfig};
pub use entity::{Entity, EntityKind, LineItemField, NormalizedValue};
pub use normalize::{entity_text, normalize_entities, normalize_with_summary, NormalizeSummary};
pub use record::{LineItem, ReceiptRecord};
