use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tillroll_core::{
    normalize_with_summary, ConfigError, NormalizeSummary, ProcessorName, ReceiptRecord,
    ScannerConfig,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::DocumentAiClient;
use crate::credentials::{Credentials, CredentialsError};
use crate::hash;
use crate::request::{build_request, FileTypePolicy, MimeType, RequestError};
use crate::service::{ExtractionService, ServiceError};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("Credential error: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("Unsupported file type: '{extension}' (expected {supported})")]
    UnsupportedFileType {
        extension: String,
        supported: &'static str,
    },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<RequestError> for ScanError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::UnsupportedFileType { extension, supported } => {
                ScanError::UnsupportedFileType { extension, supported }
            }
        }
    }
}

/// Non-fatal findings attached to a successful scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanWarning {
    /// The service answered but recognized no text in the document.
    EmptyExtraction,
}

impl std::fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanWarning::EmptyExtraction => {
                write!(f, "No text was extracted from the document; check image quality")
            }
        }
    }
}

/// The result of a single receipt processing run.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub filename: String,
    /// SHA-256 hex digest of the uploaded bytes.
    pub content_sha256: String,
    pub mime_type: MimeType,
    pub record: ReceiptRecord,
    pub summary: NormalizeSummary,
    pub warnings: Vec<ScanWarning>,
}

/// Orchestrates: classify file type → extraction service → normalize.
pub struct ReceiptPipeline<S: ExtractionService> {
    service: S,
    processor: ProcessorName,
    policy: FileTypePolicy,
}

impl ReceiptPipeline<DocumentAiClient> {
    /// Validate settings, load credentials and build a Document AI backed
    /// pipeline. Fails before anything is sent if configuration is incomplete.
    pub fn from_config(config: ScannerConfig) -> Result<Self, ScanError> {
        let config = config.validate()?;
        let credentials = Credentials::from_source(&config.credentials)?;
        let client = DocumentAiClient::new(
            &config.base_url(),
            credentials,
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(processor = %config.processor, endpoint = client.base_url(), "Document AI pipeline ready");
        Ok(Self::new(
            client,
            config.processor,
            FileTypePolicy::from_accept_pdf(config.accept_pdf),
        ))
    }
}

impl<S: ExtractionService> ReceiptPipeline<S> {
    pub fn new(service: S, processor: ProcessorName, policy: FileTypePolicy) -> Self {
        Self { service, processor, policy }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn processor(&self) -> &ProcessorName {
        &self.processor
    }

    /// Process a file on disk. The file type is checked before it is read.
    pub async fn process_file(&self, path: &Path) -> Result<ScanOutcome, ScanError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        MimeType::from_filename(&filename, self.policy)?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ScanError::Io { path: path.to_path_buf(), source })?;
        self.process_bytes(bytes, &filename).await
    }

    /// Process raw bytes from an upload.
    pub async fn process_bytes(
        &self,
        data: Vec<u8>,
        filename: &str,
    ) -> Result<ScanOutcome, ScanError> {
        let document = build_request(data, filename, self.policy)?;
        let content_sha256 = hash::fingerprint(&document.content);
        info!(file = filename, sha256 = %content_sha256, mime_type = %document.mime_type, "Processing receipt");

        let extracted = self.service.process(&self.processor, &document).await?;

        let mut warnings = Vec::new();
        if !extracted.has_text() {
            warn!(file = filename, "Extraction service returned no text");
            warnings.push(ScanWarning::EmptyExtraction);
        }

        let (record, summary) = normalize_with_summary(&extracted.entities);
        info!(
            "Processed {} entities, including {} line items",
            summary.entity_count, summary.line_item_count
        );

        Ok(ScanOutcome {
            filename: filename.to_string(),
            content_sha256,
            mime_type: document.mime_type,
            record,
            summary,
            warnings,
        })
    }
}

// ── Watch-folder integration ──────────────────────────────────────────────────

/// How long a file's size must hold still before it is handed on.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);

struct PendingFile {
    size: u64,
    last_change: Instant,
}

/// Holds files reported by the watcher until their writer is done with them.
///
/// A file is released once it is non-empty and its size has not changed for
/// the settle period. Paths that vanish or turn out not to be regular files
/// are dropped.
pub struct IntakeDebouncer {
    pending: HashMap<PathBuf, PendingFile>,
    settle: Duration,
}

impl IntakeDebouncer {
    pub fn new(settle: Duration) -> Self {
        Self { pending: HashMap::new(), settle }
    }

    /// Record filesystem activity on `path`.
    pub fn touch(&mut self, path: PathBuf, now: Instant) {
        let size = file_size(&path).unwrap_or(0);
        self.pending.insert(path, PendingFile { size, last_change: now });
    }

    /// Paths whose size has settled, each returned once.
    pub fn ready(&mut self, now: Instant) -> Vec<PathBuf> {
        let settle = self.settle;
        let mut ready = Vec::new();
        self.pending.retain(|path, pending| {
            let Some(size) = file_size(path) else {
                return false;
            };
            if size != pending.size {
                pending.size = size;
                pending.last_change = now;
                return true;
            }
            if size > 0 && now.duration_since(pending.last_change) >= settle {
                ready.push(path.clone());
                return false;
            }
            true
        });
        ready.sort();
        ready
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

/// Creation, content writes, close-after-write and renames into the folder.
fn is_intake_event(kind: &notify::EventKind) -> bool {
    use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
    use notify::EventKind;

    matches!(
        kind,
        EventKind::Create(CreateKind::File | CreateKind::Any)
            | EventKind::Modify(
                ModifyKind::Data(_)
                    | ModifyKind::Any
                    | ModifyKind::Name(RenameMode::To | RenameMode::Both | RenameMode::Any)
            )
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
    )
}

/// Spawn a notify watcher on `watch_dir` that sends files to `tx` once they
/// have been completely written (see [`IntakeDebouncer`]).
///
/// Must be called from within a tokio runtime. The returned watcher must be
/// kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    settle: Duration,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{RecursiveMode, Watcher};

    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<PathBuf>();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        match event {
            Ok(ev) if is_intake_event(&ev.kind) => {
                for path in ev.paths {
                    if raw_tx.send(path).is_err() {
                        debug!("Intake debouncer stopped; dropping file event");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Intake watcher error: {e}"),
        }
    })?;
    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;

    tokio::spawn(async move {
        let mut debouncer = IntakeDebouncer::new(settle);
        let mut tick = tokio::time::interval((settle / 4).max(Duration::from_millis(50)));
        loop {
            tokio::select! {
                maybe_path = raw_rx.recv() => match maybe_path {
                    Some(path) => debouncer.touch(path, Instant::now()),
                    // Watcher dropped.
                    None => break,
                },
                _ = tick.tick() => {
                    for path in debouncer.ready(Instant::now()) {
                        debug!("Intake file settled: {}", path.display());
                        if tx.send(path).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    });

    Ok(watcher)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
