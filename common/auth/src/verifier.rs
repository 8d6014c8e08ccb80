use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde_json::{Map, Value};
use tracing::debug;

use crate::cache::{KeyCache, SigningKeySet};
use crate::claims::{TokenClaims, TokenUse};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// Verifies RS256 tokens issued by the configured user pool.
pub struct JwtVerifier {
    config: JwtConfig,
    issuer: String,
    keys: Arc<KeyCache>,
}

impl JwtVerifier {
    pub fn new(config: JwtConfig) -> Self {
        let keys = Arc::new(KeyCache::from_config(&config));
        Self::with_cache(config, keys)
    }

    pub fn with_cache(config: JwtConfig, keys: Arc<KeyCache>) -> Self {
        let issuer = config.issuer();
        Self {
            config,
            issuer,
            keys,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.keys
    }

    /// Checks run in a fixed order and stop at the first failure: header and
    /// `kid`, key lookup (one forced refresh on a miss), signature, expiry,
    /// `token_use`, audience (identity tokens only), issuer.
    pub async fn verify(&self, token: &str, expected: TokenUse) -> AuthResult<TokenClaims> {
        let header = decode_header(token)
            .map_err(|err| AuthError::MalformedToken(format!("invalid header: {err}")))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::MalformedToken("token header missing kid".into()))?;

        let keys = self.keys_for(&kid).await?;
        let key = keys
            .get(&kid)
            .ok_or_else(|| AuthError::UnknownSigningKey(kid.clone()))?;

        let token_data = decode::<Map<String, Value>>(token, key, &signature_only())?;
        let claims = TokenClaims::new(token_data.claims);

        let expiry = claims.expiry().ok_or(AuthError::MissingClaim("exp"))?;
        if Utc::now().timestamp() > expiry {
            return Err(AuthError::TokenExpired);
        }

        if claims.token_use() != Some(expected.as_str()) {
            return Err(AuthError::WrongTokenPurpose {
                expected: expected.as_str(),
                actual: claims.token_use().map(str::to_owned),
            });
        }

        if expected == TokenUse::Id
            && !claims
                .audience()
                .iter()
                .any(|aud| *aud == self.config.client_id)
        {
            return Err(AuthError::AudienceMismatch);
        }

        if claims.issuer() != Some(self.issuer.as_str()) {
            return Err(AuthError::IssuerMismatch);
        }

        debug!(kid, token_use = %expected, "verified JWT successfully");
        Ok(claims)
    }

    /// Key set containing `kid`, refreshing once if the cached set lacks it.
    async fn keys_for(&self, kid: &str) -> AuthResult<Arc<SigningKeySet>> {
        let keys = self.keys.get_keys().await?;
        if keys.contains(kid) {
            return Ok(keys);
        }

        debug!(
            kid,
            known = ?keys.kids().collect::<Vec<_>>(),
            "kid not in cached key set; forcing refresh"
        );
        let refreshed = self.keys.refresh().await?;
        if refreshed.contains(kid) {
            Ok(refreshed)
        } else {
            Err(AuthError::UnknownSigningKey(kid.to_owned()))
        }
    }
}

/// Validation limited to the RS256 signature; claim checks are done by
/// `verify` so each failure maps to its own error.
fn signature_only() -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation.leeway = 0;
    validation
}
