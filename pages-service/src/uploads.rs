//! Presigned upload URLs for page assets.
//!
//! The service never signs object-store requests itself. It builds the object
//! key, checks the caller, and asks an [`UploadUrlIssuer`] for a URL.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_http_errors::ApiError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const MAX_FILE_NAME_LEN: usize = 128;

#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub file_name: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresignedUpload {
    pub url: String,
    pub object_key: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file name has no usable characters")]
    InvalidFileName,
    #[error("uploads are not configured")]
    Unavailable,
    #[error("presign request failed: {0}")]
    Issuer(String),
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::InvalidFileName => {
                ApiError::bad_request("invalid_file_name", err.to_string())
            }
            UploadError::Unavailable => ApiError::ServiceUnavailable {
                code: "uploads_unavailable",
            },
            UploadError::Issuer(detail) => ApiError::internal(detail),
        }
    }
}

#[async_trait]
pub trait UploadUrlIssuer: Send + Sync {
    async fn presign_put(
        &self,
        bucket: &str,
        object_key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<PresignedUpload, UploadError>;
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(raw: &str) -> Result<String, UploadError> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_NAME_LEN)
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        return Err(UploadError::InvalidFileName);
    }
    Ok(trimmed.to_string())
}

pub fn object_key(page_id: i64, file_name: &str) -> Result<String, UploadError> {
    let file = sanitize_file_name(file_name)?;
    Ok(format!("pages/{page_id}/{}-{file}", Uuid::new_v4()))
}

/// Delegates signing to an external presign endpoint over HTTP.
pub struct HttpPresigner {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct PresignPayload<'a> {
    bucket: &'a str,
    key: &'a str,
    content_type: &'a str,
    expires_in: u64,
}

#[derive(Deserialize)]
struct PresignReply {
    url: String,
}

impl HttpPresigner {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl UploadUrlIssuer for HttpPresigner {
    async fn presign_put(
        &self,
        bucket: &str,
        object_key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<PresignedUpload, UploadError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&PresignPayload {
                bucket,
                key: object_key,
                content_type,
                expires_in: expires_in.as_secs(),
            })
            .send()
            .await
            .map_err(|err| UploadError::Issuer(err.to_string()))?;
        if !response.status().is_success() {
            return Err(UploadError::Issuer(format!(
                "presign endpoint returned {}",
                response.status()
            )));
        }
        let reply: PresignReply = response
            .json()
            .await
            .map_err(|err| UploadError::Issuer(err.to_string()))?;
        let ttl = chrono::Duration::from_std(expires_in)
            .map_err(|err| UploadError::Issuer(err.to_string()))?;
        Ok(PresignedUpload {
            url: reply.url,
            object_key: object_key.to_string(),
            expires_at: Utc::now() + ttl,
        })
    }
}
