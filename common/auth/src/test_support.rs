use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use once_cell::sync::Lazy;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

pub(crate) const REGION: &str = "us-east-1";
pub(crate) const POOL_ID: &str = "us-east-1_TestPool";
pub(crate) const CLIENT_ID: &str = "test-client";
pub(crate) const ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_TestPool";

pub(crate) struct KeyMaterial {
    pub encoding: EncodingKey,
    pub modulus: String,
    pub exponent: String,
}

fn generate_key_material() -> KeyMaterial {
    let mut rng = OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
    let public_key = private_key.to_public_key();
    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .expect("private pem");

    KeyMaterial {
        encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
        modulus: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        exponent: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    }
}

pub(crate) static TEST_KEY: Lazy<KeyMaterial> = Lazy::new(generate_key_material);
pub(crate) static OTHER_KEY: Lazy<KeyMaterial> = Lazy::new(generate_key_material);

pub(crate) fn jwks_body(keys: &[(&str, &KeyMaterial)]) -> Value {
    let keys: Vec<Value> = keys
        .iter()
        .map(|(kid, material)| {
            json!({
                "kid": kid,
                "kty": "RSA",
                "alg": "RS256",
                "use": "sig",
                "n": material.modulus,
                "e": material.exponent,
            })
        })
        .collect();
    json!({ "keys": keys })
}

pub(crate) fn sign(material: &KeyMaterial, kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &material.encoding).expect("sign token")
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub(crate) fn access_claims(username: &str) -> Value {
    json!({
        "sub": "4f1c7d52-0000-4000-8000-000000000001",
        "iss": ISSUER,
        "client_id": CLIENT_ID,
        "token_use": "access",
        "scope": "aws.cognito.signin.user.admin",
        "username": username,
        "exp": now() + 600,
        "iat": now(),
    })
}

pub(crate) fn identity_claims(username: &str) -> Value {
    json!({
        "sub": "4f1c7d52-0000-4000-8000-000000000001",
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "token_use": "id",
        "cognito:username": username,
        "email": format!("{username}@example.com"),
        "email_verified": true,
        "exp": now() + 600,
        "iat": now(),
    })
}
