//! Firebase ID token verification
//!
//! Tokens are RS256 JWTs signed by Google. Public keys come from a JWK set
//! that is cached for the `max-age` the endpoint advertises and refetched
//! early when a token names a key id we have not seen (key rotation).

use std::time::Duration;

use async_trait::async_trait;
use enrollalert_core::config::AuthSection;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{AuthError, Identity, IdentityVerifier};

const DEFAULT_KEY_TTL: Duration = Duration::from_secs(60 * 60);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Unknown key ids may force a refetch at most this often
const MIN_FORCED_REFRESH: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
    ttl: Duration,
}

impl CachedKeys {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }

    /// Whether resolving `kid` warrants a fetch. A fresh set missing `kid`
    /// is only refetched once `MIN_FORCED_REFRESH` has passed, so tokens
    /// with made-up key ids cannot keep the key endpoint busy.
    fn needs_refresh(&self, kid: &str) -> bool {
        if !self.is_fresh() {
            return true;
        }
        self.set.find(kid).is_none() && self.fetched_at.elapsed() >= MIN_FORCED_REFRESH
    }
}

/// Verifies Firebase ID tokens for one project
pub struct FirebaseVerifier {
    project_id: String,
    jwks_url: String,
    client: reqwest::Client,
    keys: RwLock<Option<CachedKeys>>,
}

impl FirebaseVerifier {
    pub fn new(project_id: impl Into<String>, jwks_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            project_id: project_id.into(),
            jwks_url: jwks_url.into(),
            client,
            keys: RwLock::new(None),
        }
    }

    pub fn from_config(config: &AuthSection) -> Self {
        Self::new(&config.firebase_project_id, &config.jwks_url)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!(
            "https://securetoken.google.com/{}",
            self.project_id
        )]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);
        validation
    }

    /// Decoding key for `kid`, refreshing the key set when it is stale or
    /// (rate limited) does not contain `kid`.
    async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cached = self.keys.read().await;
            if let Some(cached) = cached.as_ref().filter(|c| c.is_fresh()) {
                if let Some(jwk) = cached.set.find(kid) {
                    return DecodingKey::from_jwk(jwk)
                        .map_err(|e| AuthError::InvalidToken(e.to_string()));
                }
            }
        }

        let mut cached = self.keys.write().await;
        // Another request may have refreshed while we waited
        let stale = cached.as_ref().map_or(true, |c| c.needs_refresh(kid));
        if stale {
            *cached = Some(self.fetch_keys().await?);
        }

        let jwk = cached
            .as_ref()
            .and_then(|c| c.set.find(kid))
            .ok_or_else(|| AuthError::InvalidToken(format!("unknown key id '{kid}'")))?;

        DecodingKey::from_jwk(jwk).map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    async fn fetch_keys(&self) -> Result<CachedKeys, AuthError> {
        tracing::debug!(url = %self.jwks_url, "fetching signing keys");

        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        let ttl = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(max_age)
            .unwrap_or(DEFAULT_KEY_TTL);

        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        tracing::info!(keys = set.keys.len(), ttl_secs = ttl.as_secs(), "signing keys refreshed");

        Ok(CachedKeys {
            set,
            fetched_at: Instant::now(),
            ttl,
        })
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("missing key id".into()))?;

        let key = self.key_for(&kid).await?;
        let data = decode::<FirebaseClaims>(token, &key, &self.validation())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken("empty subject".into()));
        }

        Ok(Identity {
            uid: claims.sub,
            email: claims.email.filter(|e| !e.is_empty()),
        })
    }
}

/// `max-age` from a Cache-Control value.
fn max_age(cache_control: &str) -> Option<Duration> {
    cache_control
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    // {"alg":"RS256","kid":"missing-kid","typ":"JWT"} . {"sub":"u1",...} . "sig"
    const RS256_WITH_KID: &str = "eyJhbGciOiJSUzI1NiIsImtpZCI6Im1pc3Npbmcta2lkIiwidHlwIjoiSldUIn0.eyJzdWIiOiJ1MSIsImF1ZCI6ImRlbW8iLCJpc3MiOiJodHRwczovL3NlY3VyZXRva2VuLmdvb2dsZS5jb20vZGVtbyIsImV4cCI6NDEwMjQ0NDgwMH0.c2ln";
    // same payload, header without a kid
    const RS256_NO_KID: &str = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiJ1MSIsImF1ZCI6ImRlbW8iLCJpc3MiOiJodHRwczovL3NlY3VyZXRva2VuLmdvb2dsZS5jb20vZGVtbyIsImV4cCI6NDEwMjQ0NDgwMH0.c2ln";

    fn verifier() -> FirebaseVerifier {
        // nothing listens on port 1
        FirebaseVerifier::new("demo", "http://127.0.0.1:1/jwks")
    }

    #[test]
    fn reads_max_age() {
        assert_eq!(
            max_age("public, max-age=19845, must-revalidate, no-transform"),
            Some(Duration::from_secs(19845))
        );
        assert_eq!(max_age("no-cache"), None);
        assert_eq!(max_age("max-age=soon"), None);
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let err = verifier().verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn rejects_symmetric_tokens_without_fetching_keys() {
        #[derive(Serialize)]
        struct Claims<'a> {
            sub: &'a str,
            exp: u64,
        }
        let token = encode(
            &Header::default(),
            &Claims {
                sub: "u1",
                exp: 4_102_444_800,
            },
            &EncodingKey::from_secret(b"shared"),
        )
        .unwrap();

        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(msg) if msg.contains("HS256")));
    }

    #[tokio::test]
    async fn requires_key_id() {
        let err = verifier().verify(RS256_NO_KID).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(msg) if msg.contains("key id")));
    }

    #[tokio::test]
    async fn unreachable_key_endpoint_is_an_upstream_failure() {
        let err = verifier().verify(RS256_WITH_KID).await.unwrap_err();
        assert!(matches!(err, AuthError::KeyFetch(_)));
    }

    fn fresh_empty_set() -> CachedKeys {
        CachedKeys {
            set: JwkSet { keys: Vec::new() },
            fetched_at: Instant::now(),
            ttl: DEFAULT_KEY_TTL,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_kid_refetch_is_rate_limited() {
        let keys = fresh_empty_set();
        assert!(!keys.needs_refresh("rotated"));

        tokio::time::advance(MIN_FORCED_REFRESH).await;
        assert!(keys.is_fresh());
        assert!(keys.needs_refresh("rotated"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_set_is_refetched() {
        let keys = fresh_empty_set();
        tokio::time::advance(DEFAULT_KEY_TTL).await;
        assert!(!keys.is_fresh());
        assert!(keys.needs_refresh("rotated"));
    }

    #[tokio::test]
    async fn recent_key_set_answers_unknown_kid_without_fetching() {
        let verifier = verifier();
        *verifier.keys.write().await = Some(fresh_empty_set());

        // a fetch would fail with KeyFetch; the cached set answers instead
        let err = verifier.verify(RS256_WITH_KID).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(msg) if msg.contains("unknown key id")));
    }

    #[test]
    fn validation_pins_project() {
        let v = verifier().validation();
        assert!(v.aud.as_ref().is_some_and(|a| a.contains("demo")));
        assert!(v
            .iss
            .as_ref()
            .is_some_and(|i| i.contains("https://securetoken.google.com/demo")));
    }
}
