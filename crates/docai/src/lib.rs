pub mod client;
pub mod credentials;
pub mod hash;
pub mod pipeline;
pub mod request;
pub mod service;

pub use client::DocumentAiClient;
pub use credentials::{Credentials, CredentialsError, ServiceAccountKey, Session};
pub use hash::fingerprint;
pub use pipeline::{
    spawn_intake_watcher, IntakeDebouncer, ReceiptPipeline, ScanError, ScanOutcome, ScanWarning,
    DEFAULT_SETTLE,
};
pub use request::{build_request, process_url, FileTypePolicy, MimeType, RawDocument, RequestError};
pub use service::{ExtractedDocument, ExtractionService, MockService, ServiceError};
