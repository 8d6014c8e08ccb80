use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Purpose tag carried in the `token_use` claim. Access and identity tokens
/// are not interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Id,
}

impl TokenUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenUse::Access => "access",
            TokenUse::Id => "id",
        }
    }
}

impl fmt::Display for TokenUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims of a verified token. Holds the decoded payload verbatim; the
/// accessors are views over it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TokenClaims {
    raw: Map<String, Value>,
}

impl TokenClaims {
    pub fn new(raw: Map<String, Value>) -> Self {
        Self { raw }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.raw.get(name).and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.raw
    }

    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    pub fn token_use(&self) -> Option<&str> {
        self.get_str("token_use")
    }

    /// `aud` for identity tokens. Accepts both the single-string and list forms.
    pub fn audience(&self) -> Vec<&str> {
        match self.raw.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// App client the access token was issued to.
    pub fn client_id(&self) -> Option<&str> {
        self.get_str("client_id")
    }

    /// Raw `exp` in epoch seconds.
    pub fn expiry(&self) -> Option<i64> {
        match self.raw.get("exp") {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry()
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    pub fn username(&self) -> Option<&str> {
        self.get_str("username")
            .or_else(|| self.get_str("cognito:username"))
    }

    pub fn email(&self) -> Option<&str> {
        self.get_str("email")
    }

    pub fn groups(&self) -> Vec<&str> {
        self.raw
            .get("cognito:groups")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Space separated `scope` claim split into its parts.
    pub fn scopes(&self) -> Vec<&str> {
        self.get_str("scope")
            .map(|scope| scope.split_whitespace().collect())
            .unwrap_or_default()
    }
}

impl From<Map<String, Value>> for TokenClaims {
    fn from(value: Map<String, Value>) -> Self {
        Self::new(value)
    }
}
