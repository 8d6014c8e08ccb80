use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use common_auth::JwtConfig;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub pages_table: String,
    pub analytics_table: String,
    pub upload_bucket: Option<String>,
    pub upload_presign_endpoint: Option<String>,
    pub upload_url_ttl: Duration,
    pub cors_allowed_origins: Vec<String>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("{name} must be set"))
        };
        let seconds = |name: &str, default: u64| {
            lookup(name)
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(default)
        };

        let region = required("AWS_REGION")?;
        let user_pool_id = required("COGNITO_USER_POOL_ID")?;
        let client_id = required("COGNITO_APP_CLIENT_ID")?;
        let mut jwt = JwtConfig::new(region, user_pool_id, client_id)
            .with_key_ttl(Duration::from_secs(seconds("JWKS_CACHE_TTL_SECONDS", 3600).max(1)))
            .with_fetch_timeout(Duration::from_secs(
                seconds("JWKS_FETCH_TIMEOUT_SECONDS", 10).max(1),
            ));
        if let Some(url) = lookup("JWT_JWKS_URL").filter(|url| !url.is_empty()) {
            jwt = jwt.with_jwks_url(url);
        }

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT '{raw}' is not a valid port"))?,
            None => 8000,
        };
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            jwt,
            pages_table: lookup("PAGES_TABLE").unwrap_or_else(|| "AppPages".to_string()),
            analytics_table: lookup("ANALYTICS_TABLE").unwrap_or_else(|| "Analytics".to_string()),
            upload_bucket: lookup("UPLOAD_BUCKET").filter(|bucket| !bucket.is_empty()),
            upload_presign_endpoint: lookup("UPLOAD_PRESIGN_ENDPOINT")
                .filter(|endpoint| !endpoint.is_empty()),
            upload_url_ttl: Duration::from_secs(seconds("UPLOAD_URL_TTL_SECONDS", 900).max(1)),
            cors_allowed_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServiceConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("AWS_REGION", "eu-north-1"),
        ("COGNITO_USER_POOL_ID", "eu-north-1_Pool"),
        ("COGNITO_APP_CLIENT_ID", "client"),
    ];

    #[test]
    fn defaults_apply() {
        let cfg = config(&REQUIRED).unwrap();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.pages_table, "AppPages");
        assert_eq!(cfg.analytics_table, "Analytics");
        assert_eq!(cfg.upload_bucket, None);
        assert_eq!(cfg.upload_url_ttl, Duration::from_secs(900));
        assert_eq!(cfg.cors_allowed_origins, vec!["http://localhost:5173"]);
        assert_eq!(cfg.jwt.key_ttl, Duration::from_secs(3600));
        assert_eq!(
            cfg.jwt.jwks_url(),
            "https://cognito-idp.eu-north-1.amazonaws.com/eu-north-1_Pool/.well-known/jwks.json"
        );
    }

    #[test]
    fn overrides_are_read() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("PORT", "9100"),
            ("JWT_JWKS_URL", "http://localhost:9999/jwks"),
            ("JWKS_CACHE_TTL_SECONDS", "60"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ("UPLOAD_BUCKET", "assets"),
        ]);
        let cfg = config(&vars).unwrap();
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.jwt.jwks_url(), "http://localhost:9999/jwks");
        assert_eq!(cfg.jwt.key_ttl, Duration::from_secs(60));
        assert_eq!(
            cfg.cors_allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(cfg.upload_bucket.as_deref(), Some("assets"));
    }

    #[test]
    fn missing_pool_is_an_error() {
        let err = config(&REQUIRED[..1]).unwrap_err();
        assert!(err.to_string().contains("COGNITO_USER_POOL_ID"));
    }

    #[test]
    fn invalid_port_is_an_error() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "eighty"));
        assert!(config(&vars).is_err());
    }
}
