use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("no signing key registered for kid '{0}'")]
    UnknownSigningKey(String),
    #[error("token signature verification failed")]
    InvalidSignature,
    #[error("token has expired")]
    TokenExpired,
    #[error("token is not an {expected} token")]
    WrongTokenPurpose {
        expected: &'static str,
        actual: Option<String>,
    },
    #[error("token audience does not match the configured client")]
    AudienceMismatch,
    #[error("invalid token issuer")]
    IssuerMismatch,
    #[error("authorization header missing or malformed")]
    MissingCredential,
    #[error("claim '{0}' not found in token")]
    MissingClaim(&'static str),
    #[error("timed out fetching signing keys after {0}s")]
    KeyFetchTimeout(u64),
    #[error("unable to fetch signing keys: {0}")]
    KeyProviderUnavailable(String),
}

impl AuthError {
    /// Transport mapping: provider outages are 503, everything else is a
    /// credential problem and maps to 401.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::KeyFetchTimeout(_) | AuthError::KeyProviderUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::UnknownSigningKey(_) => "unknown_signing_key",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::WrongTokenPurpose { .. } => "wrong_token_purpose",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::MissingCredential => "missing_credential",
            AuthError::MissingClaim(_) => "missing_claim",
            AuthError::KeyFetchTimeout(_) => "key_fetch_timeout",
            AuthError::KeyProviderUnavailable(_) => "key_provider_unavailable",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match value.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::RsaFailedSigning => AuthError::InvalidSignature,
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::MalformedToken(value.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        response
            .headers_mut()
            .insert("X-Error-Code", HeaderValue::from_static(code));
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert("WWW-Authenticate", HeaderValue::from_static("Bearer"));
        }
        response
    }
}
