use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};

use crate::claims::TokenClaims;
use crate::error::{AuthError, AuthResult};
use crate::gate::{current_subject, AuthGate};

/// Verified claims of a bearer access token.
#[derive(Debug, Clone)]
pub struct AccessClaims(pub TokenClaims);

/// Verified claims of a bearer identity token.
#[derive(Debug, Clone)]
pub struct IdentityClaims(pub TokenClaims);

/// Username of the caller, taken from a verified access token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
    pub claims: TokenClaims,
}

fn authorization_header(parts: &Parts) -> AuthResult<Option<&str>> {
    match parts.headers.get(AUTHORIZATION) {
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| AuthError::MissingCredential),
        None => Ok(None),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AccessClaims
where
    Arc<AuthGate>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<AuthGate>::from_ref(state);
        let header = authorization_header(parts)?;
        gate.require_access_token(header).await.map(Self)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for IdentityClaims
where
    Arc<AuthGate>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<AuthGate>::from_ref(state);
        let header = authorization_header(parts)?;
        gate.require_identity_token(header).await.map(Self)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<AuthGate>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AccessClaims(claims) = AccessClaims::from_request_parts(parts, state).await?;
        let username = current_subject(&claims)?;
        Ok(Self { username, claims })
    }
}
