use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_LOCATION: &str = "us";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings as read from `tillroll.toml` and command-line overrides.
/// Nothing is checked until [`ScannerConfig::validate`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub project_id: Option<String>,
    pub location: String,
    pub processor_id: Option<String>,
    /// Path to a service account JSON key.
    pub credentials_path: Option<PathBuf>,
    /// Pre-obtained OAuth2 bearer token; used when no key file is given.
    pub access_token: Option<String>,
    pub accept_pdf: bool,
    /// Replaces the regional `https://{location}-documentai.googleapis.com` host.
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: DEFAULT_LOCATION.to_string(),
            processor_id: None,
            credentials_path: None,
            access_token: None,
            accept_pdf: true,
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for ScannerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScannerConfig")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("processor_id", &self.processor_id)
            .field("credentials_path", &self.credentials_path)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("accept_pdf", &self.accept_pdf)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ScannerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load a config file. A missing file yields the defaults so that flags and
    /// environment variables alone are enough to run.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(s) => Self::from_toml_str(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path: path.to_path_buf(), source }),
        }
    }

    /// Check that every required setting is present, reporting all missing
    /// ones at once.
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let project_id = present(self.project_id);
        let location = present(Some(self.location));
        let processor_id = present(self.processor_id);
        let credentials = match (self.credentials_path, present(self.access_token)) {
            (Some(path), _) => Some(CredentialSource::ServiceAccountFile(path)),
            (None, Some(token)) => Some(CredentialSource::AccessToken(token)),
            (None, None) => None,
        };

        let mut missing = Vec::new();
        if project_id.is_none() {
            missing.push("project_id");
        }
        if location.is_none() {
            missing.push("location");
        }
        if processor_id.is_none() {
            missing.push("processor_id");
        }
        if credentials.is_none() {
            missing.push("credentials_path or access_token");
        }

        match (project_id, location, processor_id, credentials) {
            (Some(project_id), Some(location), Some(processor_id), Some(credentials)) => {
                Ok(ValidatedConfig {
                    processor: ProcessorName { project_id, location, processor_id },
                    credentials,
                    accept_pdf: self.accept_pdf,
                    endpoint: self.endpoint.and_then(|e| present(Some(e))),
                    timeout_secs: self.timeout_secs,
                })
            }
            _ => Err(ConfigError::Missing(missing)),
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Fully qualified identity of a Document AI processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorName {
    pub project_id: String,
    pub location: String,
    pub processor_id: String,
}

impl ProcessorName {
    pub fn new(project_id: &str, location: &str, processor_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: location.to_string(),
            processor_id: processor_id.to_string(),
        }
    }

    /// Resource path, e.g. `projects/p/locations/us/processors/abc`.
    pub fn resource(&self) -> String {
        format!(
            "projects/{}/locations/{}/processors/{}",
            self.project_id, self.location, self.processor_id
        )
    }

    /// Regional API host for this processor.
    pub fn regional_endpoint(&self) -> String {
        format!("https://{}-documentai.googleapis.com", self.location)
    }
}

impl fmt::Display for ProcessorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource())
    }
}

/// Where the session credential comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    ServiceAccountFile(PathBuf),
    AccessToken(String),
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::ServiceAccountFile(p) => {
                f.debug_tuple("ServiceAccountFile").field(p).finish()
            }
            CredentialSource::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub processor: ProcessorName,
    pub credentials: CredentialSource,
    pub accept_pdf: bool,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl ValidatedConfig {
    /// Base URL requests are sent to: the override if set, else the regional host.
    pub fn base_url(&self) -> String {
        self.endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| self.processor.regional_endpoint())
    }
}
