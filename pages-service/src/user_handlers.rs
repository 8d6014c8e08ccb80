use axum::Json;
use common_auth::{AccessClaims, CurrentUser, IdentityClaims};
use serde_json::{json, Value};

pub async fn public() -> Json<Value> {
    Json(json!({ "message": "This is a public endpoint" }))
}

pub async fn protected(AccessClaims(claims): AccessClaims) -> Json<Value> {
    Json(json!({
        "message": "This is a protected endpoint",
        "user": claims.username(),
        "scopes": claims.scopes(),
    }))
}

/// Profile attributes only exist on identity tokens.
pub async fn profile(IdentityClaims(claims): IdentityClaims) -> Json<Value> {
    Json(json!({
        "username": claims.username(),
        "email": claims.email(),
        "email_verified": claims.get("email_verified"),
        "sub": claims.subject(),
    }))
}

pub async fn me(user: CurrentUser) -> Json<Value> {
    Json(json!({
        "username": user.username,
        "groups": user.claims.groups(),
        "scopes": user.claims.scopes(),
    }))
}
