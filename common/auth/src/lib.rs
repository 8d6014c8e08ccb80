pub mod cache;
pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod gate;
pub mod jwks;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{KeyCache, SigningKeySet};
pub use claims::{TokenClaims, TokenUse};
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::{AccessClaims, CurrentUser, IdentityClaims};
pub use gate::{current_subject, AuthGate};
pub use jwks::JwksFetcher;
pub use verifier::JwtVerifier;
