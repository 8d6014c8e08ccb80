use std::time::Duration;

const DEFAULT_KEY_TTL_SECONDS: u64 = 3600;
const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Runtime configuration for verifying tokens issued by a hosted user pool.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Region hosting the user pool (e.g. `us-east-1`).
    pub region: String,
    /// User pool identifier; together with the region it forms the issuer.
    pub user_pool_id: String,
    /// App client identifier expected in the `aud` claim of identity tokens.
    pub client_id: String,
    /// How long a fetched key set is served before a refetch is attempted.
    pub key_ttl: Duration,
    /// Upper bound on a single key fetch.
    pub fetch_timeout: Duration,
    /// Explicit JWKS endpoint; derived from the issuer when unset.
    pub jwks_url: Option<String>,
}

impl JwtConfig {
    /// Construct config with defaults (1 hour key freshness, 10 second fetch timeout).
    pub fn new(
        region: impl Into<String>,
        user_pool_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            user_pool_id: user_pool_id.into(),
            client_id: client_id.into(),
            key_ttl: Duration::from_secs(DEFAULT_KEY_TTL_SECONDS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
            jwks_url: None,
        }
    }

    pub fn with_key_ttl(mut self, ttl: Duration) -> Self {
        self.key_ttl = ttl;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    /// Expected `iss` claim.
    pub fn issuer(&self) -> String {
        format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.region, self.user_pool_id
        )
    }

    pub fn jwks_url(&self) -> String {
        match &self.jwks_url {
            Some(url) => url.clone(),
            None => format!("{}/.well-known/jwks.json", self.issuer()),
        }
    }
}
