use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tillroll_core::ProcessorName;
use tracing::debug;

use crate::credentials::{Credentials, Session};
use crate::request::{process_url, ProcessRequestBody, RawDocument};
use crate::service::{ExtractedDocument, ExtractionService, ServiceError};

#[derive(Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    document: Option<ExtractedDocument>,
}

/// Google API error envelope: `{"error": {"code", "message", "status"}}`.
#[derive(Deserialize, Default)]
#[serde(default)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Document AI over its REST `:process` method.
pub struct DocumentAiClient {
    http: Client,
    base_url: String,
    session: Session,
}

impl DocumentAiClient {
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            session: Session::new(credentials, http.clone()),
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ExtractionService for DocumentAiClient {
    async fn process(
        &self,
        processor: &ProcessorName,
        document: &RawDocument,
    ) -> Result<ExtractedDocument, ServiceError> {
        let url = process_url(&self.base_url, processor);
        let token = self.session.bearer_token().await?;
        debug!(%url, mime_type = %document.mime_type, bytes = document.content.len(), "Sending process request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&ProcessRequestBody::new(document))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let envelope: ErrorEnvelope = serde_json::from_slice(&body).unwrap_or_default();
            let message = match envelope.error {
                Some(ErrorBody { message: Some(m), status: Some(s) }) => format!("{s}: {m}"),
                Some(ErrorBody { message: Some(m), .. }) => m,
                _ => String::from_utf8_lossy(&body).trim().to_string(),
            };
            return Err(ServiceError::Status { status: status.as_u16(), message });
        }

        let parsed: ProcessResponse = serde_json::from_slice(&body)?;
        parsed.document.ok_or(ServiceError::MissingDocument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{build_request, FileTypePolicy};
    use axum::extract::{Json, Path};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::Router;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use tokio::sync::oneshot;

    /// Minimal stand-in for the Document AI REST endpoint. The processor id
    /// selects the behaviour under test.
    struct MockDocumentAi {
        addr: SocketAddr,
        shutdown_tx: Option<oneshot::Sender<()>>,
    }

    impl MockDocumentAi {
        async fn start() -> Self {
            let app = Router::new().route(
                "/v1/projects/{project}/locations/{location}/processors/{processor}",
                post(handle_process),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        shutdown_rx.await.ok();
                    })
                    .await
                    .unwrap();
            });
            Self { addr, shutdown_tx: Some(shutdown_tx) }
        }

        fn url(&self) -> String {
            format!("http://{}", self.addr)
        }
    }

    impl Drop for MockDocumentAi {
        fn drop(&mut self) {
            if let Some(tx) = self.shutdown_tx.take() {
                let _ = tx.send(());
            }
        }
    }

    async fn handle_process(
        Path((_project, _location, processor)): Path<(String, String, String)>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> impl IntoResponse {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer ya29.test") {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": {"code": 401, "message": "Request had invalid authentication credentials.", "status": "UNAUTHENTICATED"}})),
            );
        }
        assert_eq!(body["rawDocument"]["mimeType"], "image/jpeg");
        assert_eq!(body["rawDocument"]["content"], "/9j/");

        match processor.as_str() {
            "receipts:process" => (
                StatusCode::OK,
                Json(json!({
                    "document": {
                        "text": "CORNER SHOP\nMilk 3 x 2.50 7.50\nTOTAL 7.50",
                        "entities": [
                            {"type": "supplier_name", "mentionText": "CORNER SHOP", "confidence": 0.9},
                            {"type": "line_item", "confidence": 0.7, "properties": [
                                {"type": "description", "mentionText": "Milk"},
                                {"type": "line_item_total", "mentionText": "7.50"}
                            ]},
                            {"type": "total_amount", "mentionText": "7.50", "normalizedValue": {"text": "7.5"}, "confidence": 0.8}
                        ]
                    }
                })),
            ),
            "empty:process" => (StatusCode::OK, Json(json!({}))),
            "missing:process" => (
                StatusCode::NOT_FOUND,
                Json(json!({"error": {"code": 404, "message": "Processor not found.", "status": "NOT_FOUND"}})),
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!("boom"))),
        }
    }

    fn jpeg() -> RawDocument {
        build_request(vec![0xff, 0xd8, 0xff], "receipt.jpg", FileTypePolicy::default()).unwrap()
    }

    fn client(server: &MockDocumentAi, token: &str) -> DocumentAiClient {
        DocumentAiClient::new(
            &server.url(),
            Credentials::AccessToken(token.into()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn returns_entity_tree() {
        let server = MockDocumentAi::start().await;
        let doc = client(&server, "ya29.test")
            .process(&ProcessorName::new("acme", "us", "receipts"), &jpeg())
            .await
            .unwrap();

        assert!(doc.has_text());
        assert_eq!(doc.entities.len(), 3);
        assert_eq!(doc.entities[1].properties.len(), 2);

        let record = tillroll_core::normalize_entities(&doc.entities);
        assert_eq!(record.total_amount.as_deref(), Some("7.5"));
        assert_eq!(record.line_items[0].description.as_deref(), Some("Milk"));
    }

    #[tokio::test]
    async fn missing_document_is_an_error() {
        let server = MockDocumentAi::start().await;
        let err = client(&server, "ya29.test")
            .process(&ProcessorName::new("acme", "us", "empty"), &jpeg())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MissingDocument));
    }

    #[tokio::test]
    async fn error_envelope_becomes_status_error() {
        let server = MockDocumentAi::start().await;
        let err = client(&server, "ya29.test")
            .process(&ProcessorName::new("acme", "us", "missing"), &jpeg())
            .await
            .unwrap_err();
        match err {
            ServiceError::Status { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "NOT_FOUND: Processor not found.");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_token_does_not_echo_it() {
        let server = MockDocumentAi::start().await;
        let err = client(&server, "ya29.wrong-secret")
            .process(&ProcessorName::new("acme", "us", "receipts"), &jpeg())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Status { status: 401, .. }));
        assert!(!err.to_string().contains("wrong-secret"));
    }

    #[tokio::test]
    async fn server_fault_is_transient() {
        let server = MockDocumentAi::start().await;
        let err = client(&server, "ya29.test")
            .process(&ProcessorName::new("acme", "us", "flaky"), &jpeg())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn unreachable_host_is_http_error() {
        let c = DocumentAiClient::new(
            "http://127.0.0.1:1",
            Credentials::AccessToken("ya29.test".into()),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = c
            .process(&ProcessorName::new("acme", "us", "receipts"), &jpeg())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Http(_)));
    }
}
