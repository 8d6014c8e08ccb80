#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use common_auth::{JwtConfig, JwtVerifier};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use once_cell::sync::Lazy;
use pages_service::metrics::ServiceMetrics;
use pages_service::store::MemoryStore;
use pages_service::uploads::{PresignedUpload, UploadError, UploadUrlIssuer};
use pages_service::{build_router, AppState, UploadSettings};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use tower::util::ServiceExt;

pub const REGION: &str = "eu-west-1";
pub const POOL_ID: &str = "eu-west-1_PagesPool";
pub const CLIENT_ID: &str = "pages-web";
pub const ISSUER: &str = "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_PagesPool";
pub const KID: &str = "pages-key";

struct KeyMaterial {
    encoding: EncodingKey,
    modulus: String,
    exponent: String,
}

static SIGNING_KEY: Lazy<KeyMaterial> = Lazy::new(|| {
    let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation");
    let public_key = private_key.to_public_key();
    let pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .expect("private pem");
    KeyMaterial {
        encoding: EncodingKey::from_rsa_pem(pem.as_bytes()).expect("encoding key"),
        modulus: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        exponent: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    }
});

pub struct TestApp {
    pub server: MockServer,
    pub state: AppState,
    pub router: Router,
}

/// Issues deterministic URLs so tests can assert on them.
pub struct StaticIssuer;

#[async_trait]
impl UploadUrlIssuer for StaticIssuer {
    async fn presign_put(
        &self,
        bucket: &str,
        object_key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> Result<PresignedUpload, UploadError> {
        Ok(PresignedUpload {
            url: format!("https://{bucket}.objects.test/{object_key}?signed"),
            object_key: object_key.to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in.as_secs() as i64),
        })
    }
}

async fn build(with_uploads: bool) -> TestApp {
    let server = MockServer::start_async().await;
    let body = json!({
        "keys": [{
            "kid": KID,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": SIGNING_KEY.modulus,
            "e": SIGNING_KEY.exponent,
        }]
    });
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/.well-known/jwks.json");
            then.status(200).json_body(body);
        })
        .await;

    let config = JwtConfig::new(REGION, POOL_ID, CLIENT_ID)
        .with_jwks_url(format!("{}/.well-known/jwks.json", server.base_url()));
    let verifier = Arc::new(JwtVerifier::new(config));
    let metrics = Arc::new(ServiceMetrics::new().expect("metrics"));
    let mut state = AppState::new(
        verifier,
        Arc::new(MemoryStore::new()),
        "AppPages",
        "Analytics",
        metrics,
    );
    if with_uploads {
        state = state.with_uploads(UploadSettings {
            issuer: Arc::new(StaticIssuer),
            bucket: "page-assets".into(),
            ttl: Duration::from_secs(900),
        });
    }
    let router = build_router(state.clone(), &["http://localhost:5173".to_string()]);
    TestApp {
        server,
        state,
        router,
    }
}

pub async fn test_app() -> TestApp {
    build(false).await
}

pub async fn test_app_with_uploads() -> TestApp {
    build(true).await
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, path, token, None).await
    }
}

fn sign(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    encode(&header, claims, &SIGNING_KEY.encoding).expect("sign token")
}

fn now() -> i64 {
    Utc::now().timestamp()
}

pub fn access_token(username: &str) -> String {
    sign(&json!({
        "sub": "a3f1d6c0-2222-4000-8000-0000000000aa",
        "iss": ISSUER,
        "client_id": CLIENT_ID,
        "token_use": "access",
        "scope": "openid pages/write",
        "username": username,
        "cognito:groups": ["editors"],
        "exp": now() + 600,
        "iat": now(),
    }))
}

pub fn expired_access_token(username: &str) -> String {
    sign(&json!({
        "sub": "a3f1d6c0-2222-4000-8000-0000000000aa",
        "iss": ISSUER,
        "client_id": CLIENT_ID,
        "token_use": "access",
        "username": username,
        "exp": now() - 60,
        "iat": now() - 3600,
    }))
}

pub fn identity_token(username: &str) -> String {
    sign(&json!({
        "sub": "a3f1d6c0-2222-4000-8000-0000000000aa",
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "token_use": "id",
        "cognito:username": username,
        "email": format!("{username}@example.com"),
        "email_verified": true,
        "exp": now() + 600,
        "iat": now(),
    }))
}
