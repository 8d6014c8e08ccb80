use std::sync::Arc;

use crate::claims::{TokenClaims, TokenUse};
use crate::error::{AuthError, AuthResult};
use crate::verifier::JwtVerifier;

/// Request-time authorization check shared by route handlers.
#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<JwtVerifier>,
}

impl AuthGate {
    pub fn new(verifier: Arc<JwtVerifier>) -> Self {
        Self { verifier }
    }

    pub fn verifier(&self) -> &Arc<JwtVerifier> {
        &self.verifier
    }

    /// Validates the `Authorization` header value as a bearer access token.
    pub async fn require_access_token(&self, raw_header: Option<&str>) -> AuthResult<TokenClaims> {
        self.require(raw_header, TokenUse::Access).await
    }

    /// Validates the `Authorization` header value as a bearer identity token.
    pub async fn require_identity_token(
        &self,
        raw_header: Option<&str>,
    ) -> AuthResult<TokenClaims> {
        self.require(raw_header, TokenUse::Id).await
    }

    async fn require(&self, raw_header: Option<&str>, purpose: TokenUse) -> AuthResult<TokenClaims> {
        let token = parse_bearer(raw_header.ok_or(AuthError::MissingCredential)?)?;
        self.verifier.verify(token, purpose).await
    }
}

/// Username of the caller, from `username` (access tokens) or
/// `cognito:username` (identity tokens).
pub fn current_subject(claims: &TokenClaims) -> AuthResult<String> {
    claims
        .username()
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .ok_or(AuthError::MissingClaim("username"))
}

pub(crate) fn parse_bearer(raw: &str) -> AuthResult<&str> {
    let raw = raw.trim();
    let (scheme, token) = raw.split_once(' ').ok_or(AuthError::MissingCredential)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingCredential);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}
