//! Bearer-token authentication
//!
//! Handlers never see raw tokens. The [`AuthUser`](crate::http::extractors::AuthUser)
//! extractor pulls the bearer token and hands it to an [`IdentityVerifier`];
//! production uses [`FirebaseVerifier`], tests use [`StaticVerifier`].

mod firebase;

pub use firebase::FirebaseVerifier;

use std::collections::HashMap;

use async_trait::async_trait;

/// Verified caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable identity-provider user id
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Signing keys could not be fetched; not the caller's fault.
    #[error("could not fetch signing keys: {0}")]
    KeyFetch(String),
}

/// Turns a bearer token into an [`Identity`]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Fixed token → identity table, for tests and local tooling
#[derive(Debug, Default, Clone)]
pub struct StaticVerifier {
    tokens: HashMap<String, Identity>,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, uid: &str, email: Option<&str>) -> Self {
        self.tokens.insert(
            token.to_owned(),
            Identity {
                uid: uid.to_owned(),
                email: email.map(str::to_owned),
            },
        );
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("unknown token".into()))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
///
/// The scheme is case-insensitive; an empty token counts as missing.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
