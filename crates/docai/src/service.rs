use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tillroll_core::{Entity, ProcessorName};

use crate::credentials::CredentialsError;
use crate::request::RawDocument;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Authentication failed: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("Request to extraction service failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Extraction service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Malformed response from extraction service: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Extraction service did not return a document")]
    MissingDocument,
    #[error("Extraction service error: {0}")]
    Other(String),
}

impl ServiceError {
    /// Connection problems, throttling and server-side faults are worth
    /// retrying; configuration and permission problems are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Http(e) => e.is_timeout() || e.is_connect(),
            ServiceError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// What the service hands back: the recognized text and the entity tree.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedDocument {
    pub text: Option<String>,
    pub entities: Vec<Entity>,
}

impl ExtractedDocument {
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// A document-understanding backend.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn process(
        &self,
        processor: &ProcessorName,
        document: &RawDocument,
    ) -> Result<ExtractedDocument, ServiceError>;
}

// ── Mock backend (used for tests) ─────────────────────────────────────────────

/// Replays a fixed response and counts how often it was asked.
pub struct MockService {
    response: Result<ExtractedDocument, String>,
    calls: AtomicUsize,
}

impl MockService {
    pub fn new(document: ExtractedDocument) -> Self {
        Self { response: Ok(document), calls: AtomicUsize::new(0) }
    }

    pub fn with_entities(text: impl Into<String>, entities: Vec<Entity>) -> Self {
        Self::new(ExtractedDocument { text: Some(text.into()), entities })
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { response: Err(message.into()), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionService for MockService {
    async fn process(
        &self,
        _processor: &ProcessorName,
        _document: &RawDocument,
    ) -> Result<ExtractedDocument, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone().map_err(ServiceError::Other)
    }
}
