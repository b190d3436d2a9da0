use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tillroll_core::CredentialSource;
use tokio::sync::Mutex;
use tracing::debug;

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Errors never carry key or token material.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Failed to read service account key {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid service account key: {0}")]
    InvalidKey(String),
    #[error("Failed to sign token request: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("Token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token endpoint rejected credentials ({status}): {message}")]
    Rejected { status: u16, message: String },
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a Google service account JSON key that matter for signing.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, CredentialsError> {
        serde_json::from_str(json).map_err(|e| CredentialsError::InvalidKey(describe_json_error(&e)))
    }

    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let json = std::fs::read_to_string(path)
            .map_err(|source| CredentialsError::Read { path: path.to_path_buf(), source })?;
        Self::from_json(&json)
    }

    /// RS256-signed JWT used to exchange the key for an access token.
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String, CredentialsError> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(&header, &claims, &key)?)
    }
}

/// serde_json messages for type errors quote the offending value, which may be
/// key material; only position is reported for those.
fn describe_json_error(e: &serde_json::Error) -> String {
    use serde_json::error::Category;
    match e.classify() {
        Category::Data if !e.to_string().starts_with("missing field") => {
            format!("unexpected value at line {} column {}", e.line(), e.column())
        }
        _ => e.to_string(),
    }
}

#[derive(Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    AccessToken(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServiceAccount(key) => f.debug_tuple("ServiceAccount").field(key).finish(),
            Credentials::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
        }
    }
}

impl Credentials {
    pub fn from_source(source: &CredentialSource) -> Result<Self, CredentialsError> {
        match source {
            CredentialSource::ServiceAccountFile(path) => {
                Ok(Credentials::ServiceAccount(ServiceAccountKey::load(path)?))
            }
            CredentialSource::AccessToken(token) => Ok(Credentials::AccessToken(token.clone())),
        }
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// Holds one set of credentials and the access token minted from them.
///
/// Each client owns its session; nothing is shared through the process
/// environment.
pub struct Session {
    credentials: Credentials,
    http: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl Session {
    pub fn new(credentials: Credentials, http: Client) -> Self {
        Self { credentials, http, cached: Mutex::new(None) }
    }

    /// A bearer token valid for at least the refresh margin.
    pub async fn bearer_token(&self) -> Result<String, CredentialsError> {
        let key = match &self.credentials {
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::ServiceAccount(key) => key,
        };

        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(tok) = cached.as_ref() {
            if tok.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(tok.token.clone());
            }
        }

        let fresh = self.exchange(key, now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn exchange(
        &self,
        key: &ServiceAccountKey,
        now: DateTime<Utc>,
    ) -> Result<CachedToken, CredentialsError> {
        debug!(client_email = %key.client_email, token_uri = %key.token_uri, "Requesting access token");
        let assertion = key.assertion(now)?;
        let response = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: TokenErrorResponse = response.json().await.unwrap_or_default();
            let message = body
                .error_description
                .or(body.error)
                .unwrap_or_else(|| "no error description".to_string());
            return Err(CredentialsError::Rejected { status: status.as_u16(), message });
        }

        let body: TokenResponse = response.json().await?;
        let lifetime = body.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        Ok(CachedToken {
            token: body.access_token,
            expires_at: now + Duration::seconds(lifetime),
        })
    }
}
