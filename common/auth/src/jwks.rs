use jsonwebtoken::DecodingKey;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::error::{AuthError, AuthResult};

/// Fetches the identity provider's published RSA signing keys.
#[derive(Clone)]
pub struct JwksFetcher {
    client: Client,
    url: String,
}

impl JwksFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> AuthResult<Vec<(String, DecodingKey)>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| AuthError::KeyProviderUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyProviderUnavailable(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: JwksResponse = response
            .json()
            .await
            .map_err(|err| AuthError::KeyProviderUnavailable(err.to_string()))?;

        Ok(decode_keys(body))
    }
}

fn decode_keys(body: JwksResponse) -> Vec<(String, DecodingKey)> {
    let mut keys = Vec::with_capacity(body.keys.len());
    for key in body.keys.into_iter() {
        let Some(kid) = key.kid else {
            warn!("skipping JWKS entry without kid");
            continue;
        };
        let kty = key.kty.as_deref().unwrap_or("RSA");
        if kty != "RSA" {
            warn!(kid, kty, "skipping JWKS entry with unsupported key type");
            continue;
        }
        if let Some(alg) = key.alg.as_deref() {
            if alg != "RS256" {
                warn!(kid, alg, "skipping JWKS entry with unsupported alg");
                continue;
            }
        }
        let (Some(modulus), Some(exponent)) = (key.n, key.e) else {
            warn!(kid, "skipping JWKS entry missing RSA components");
            continue;
        };

        match DecodingKey::from_rsa_components(&modulus, &exponent) {
            Ok(decoding_key) => keys.push((kid, decoding_key)),
            Err(err) => warn!(kid, error = %err, "skipping unparseable JWKS entry"),
        }
    }
    keys
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkEntry>,
}

#[derive(Debug, Deserialize)]
struct JwkEntry {
    kid: Option<String>,
    kty: Option<String>,
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
}
