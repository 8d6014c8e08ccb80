#![allow(dead_code)]

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use common_auth::{AuthGate, JwtConfig, JwtVerifier};
use httpmock::prelude::*;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use once_cell::sync::Lazy;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

pub const REGION: &str = "us-west-2";
pub const POOL_ID: &str = "us-west-2_GatePool";
pub const CLIENT_ID: &str = "gate-client";
pub const ISSUER: &str = "https://cognito-idp.us-west-2.amazonaws.com/us-west-2_GatePool";
pub const KID: &str = "gate-key";

pub struct KeyMaterial {
    pub encoding: EncodingKey,
    pub modulus: String,
    pub exponent: String,
}

pub static SIGNING_KEY: Lazy<KeyMaterial> = Lazy::new(|| {
    let mut rng = OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
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

pub fn jwks_body() -> Value {
    json!({
        "keys": [{
            "kid": KID,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": SIGNING_KEY.modulus,
            "e": SIGNING_KEY.exponent,
        }]
    })
}

pub async fn serve_jwks(server: &MockServer) {
    let body = jwks_body();
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/.well-known/jwks.json");
            then.status(200).json_body(body);
        })
        .await;
}

pub fn gate_for(server: &MockServer) -> Arc<AuthGate> {
    let config = JwtConfig::new(REGION, POOL_ID, CLIENT_ID)
        .with_jwks_url(format!("{}/.well-known/jwks.json", server.base_url()));
    Arc::new(AuthGate::new(Arc::new(JwtVerifier::new(config))))
}

pub fn sign(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    encode(&header, claims, &SIGNING_KEY.encoding).expect("sign token")
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn access_token(username: &str) -> String {
    sign(&json!({
        "sub": "0b7c2c8e-1111-4000-8000-00000000beef",
        "iss": ISSUER,
        "client_id": CLIENT_ID,
        "token_use": "access",
        "scope": "openid",
        "username": username,
        "exp": now() + 600,
        "iat": now(),
    }))
}

pub fn identity_token(username: &str) -> String {
    sign(&json!({
        "sub": "0b7c2c8e-1111-4000-8000-00000000beef",
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "token_use": "id",
        "cognito:username": username,
        "email": format!("{username}@example.com"),
        "exp": now() + 600,
        "iat": now(),
    }))
}
