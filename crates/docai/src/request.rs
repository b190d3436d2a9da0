use base64::Engine;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tillroll_core::ProcessorName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Unsupported file type: '{extension}' (expected {supported})")]
    UnsupportedFileType {
        extension: String,
        supported: &'static str,
    },
}

/// Which uploads are accepted. Some processors only take images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileTypePolicy {
    #[default]
    ImagesAndPdf,
    ImagesOnly,
}

impl FileTypePolicy {
    pub fn from_accept_pdf(accept_pdf: bool) -> Self {
        if accept_pdf {
            FileTypePolicy::ImagesAndPdf
        } else {
            FileTypePolicy::ImagesOnly
        }
    }

    fn supported(self) -> &'static str {
        match self {
            FileTypePolicy::ImagesAndPdf => "JPG, PNG, TIFF or PDF",
            FileTypePolicy::ImagesOnly => "JPG, PNG or TIFF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MimeType {
    Jpeg,
    Png,
    Tiff,
    Pdf,
}

impl MimeType {
    pub fn as_str(self) -> &'static str {
        match self {
            MimeType::Jpeg => "image/jpeg",
            MimeType::Png => "image/png",
            MimeType::Tiff => "image/tiff",
            MimeType::Pdf => "application/pdf",
        }
    }

    /// Pick the transport content type from a filename's extension, ignoring case.
    pub fn from_filename(filename: &str, policy: FileTypePolicy) -> Result<Self, RequestError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match (ext.as_str(), policy) {
            ("jpg" | "jpeg", _) => Ok(MimeType::Jpeg),
            ("png", _) => Ok(MimeType::Png),
            ("tif" | "tiff", _) => Ok(MimeType::Tiff),
            ("pdf", FileTypePolicy::ImagesAndPdf) => Ok(MimeType::Pdf),
            _ => Err(RequestError::UnsupportedFileType {
                extension: if ext.is_empty() { String::new() } else { format!(".{ext}") },
                supported: policy.supported(),
            }),
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single document ready to hand to the extraction service. The bytes are
/// exactly what was uploaded.
#[derive(Clone)]
pub struct RawDocument {
    pub filename: String,
    pub content: Vec<u8>,
    pub mime_type: MimeType,
}

impl fmt::Debug for RawDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawDocument")
            .field("filename", &self.filename)
            .field("content_len", &self.content.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

pub fn build_request(
    content: Vec<u8>,
    filename: &str,
    policy: FileTypePolicy,
) -> Result<RawDocument, RequestError> {
    let mime_type = MimeType::from_filename(filename, policy)?;
    Ok(RawDocument { filename: filename.to_string(), content, mime_type })
}

/// `{base}/v1/projects/../processors/{id}:process`
pub fn process_url(base_url: &str, processor: &ProcessorName) -> String {
    format!("{}/v1/{}:process", base_url.trim_end_matches('/'), processor.resource())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProcessRequestBody<'a> {
    raw_document: RawDocumentBody<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocumentBody<'a> {
    content: String,
    mime_type: &'a str,
}

impl<'a> ProcessRequestBody<'a> {
    pub(crate) fn new(document: &'a RawDocument) -> Self {
        Self {
            raw_document: RawDocumentBody {
                content: base64::engine::general_purpose::STANDARD.encode(&document.content),
                mime_type: document.mime_type.as_str(),
            },
        }
    }
}
