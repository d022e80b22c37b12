use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::domain::Term;

/// Google's public JWK set for Firebase ID tokens.
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Centralized configuration for the EnrollAlert API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub catalog: CatalogSection,
    pub auth: AuthSection,
    pub email: EmailSection,
    pub limits: LimitsSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: SocketAddr,
    /// Allow any origin. Only for development.
    pub cors_permissive: bool,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3030)),
            cors_permissive: false,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3030".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:3030".to_string(),
            ],
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub max_connections: u32,
    /// Queries allowed in flight at once, independent of pool size.
    pub query_concurrency: usize,
    pub acquire_timeout_ms: u64,
    pub max_retries: u32,
    /// Linear backoff step; attempt `n` sleeps `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            query_concurrency: 8,
            acquire_timeout_ms: 2_000,
            max_retries: 3,
            retry_backoff_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub term: Term,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub firebase_project_id: String,
    pub jwks_url: String,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            firebase_project_id: String::new(),
            jwks_url: FIREBASE_JWKS_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSection {
    pub from: String,
    /// Without a host, outgoing mail is only logged.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
}

impl Default for EmailSection {
    fn default() -> Self {
        Self {
            from: "EnrollAlert <noreply@enrollalert.com>".to_string(),
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_saved_alerts: u32,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_saved_alerts: 10,
            rate_limit_requests: 40,
            rate_limit_window_secs: 60,
        }
    }
}

impl AppConfig {
    /// Load config from an explicit path, `$ENROLLALERT_CONFIG`, or
    /// ~/.enrollalert/config.toml, then apply environment overrides.
    ///
    /// A missing default file is fine; a missing explicit file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env(|key| env::var(key).ok());
        config.expand_variables(|key| env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file without applying overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&content).context("Failed to parse config file (invalid TOML)")
    }

    /// Get config file path: $ENROLLALERT_CONFIG or ~/.enrollalert/config.toml
    pub fn config_path() -> PathBuf {
        if let Ok(path) = env::var("ENROLLALERT_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".enrollalert/config.toml")
    }

    /// Apply environment overrides. `lookup` is injected so tests don't
    /// mutate the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL").or_else(|| lookup("POSTGRES_URL")) {
            self.database.url = url;
        }
        if let Some(bind) = lookup("ENROLLALERT_BIND") {
            match bind.parse() {
                Ok(addr) => self.server.bind = addr,
                Err(_) => tracing::warn!(value = %bind, "ignoring invalid ENROLLALERT_BIND"),
            }
        }
        if let Some(term) = lookup("ENROLLALERT_TERM") {
            match term.parse() {
                Ok(term) => self.catalog.term = term,
                Err(e) => tracing::warn!(error = %e, "ignoring invalid ENROLLALERT_TERM"),
            }
        }
        if let Some(project) = lookup("FIREBASE_PROJECT_ID") {
            self.auth.firebase_project_id = project;
        }
        if let Some(from) = lookup("EMAIL_FROM") {
            self.email.from = from;
        }
        if let Some(host) = lookup("SMTP_HOST") {
            self.email.smtp_host = Some(host);
        }
        if let Some(port) = lookup("SMTP_PORT").and_then(|p| p.parse().ok()) {
            self.email.smtp_port = port;
        }
        if let Some(user) = lookup("SMTP_USERNAME") {
            self.email.smtp_username = Some(user);
        }
        if let Some(password) = lookup("SMTP_PASSWORD") {
            self.email.smtp_password = Some(password);
        }
    }

    /// Expand ${var} references in string settings
    pub fn expand_variables<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.database.url = expand_string(&self.database.url, &lookup);
        self.auth.firebase_project_id = expand_string(&self.auth.firebase_project_id, &lookup);
        self.email.from = expand_string(&self.email.from, &lookup);
        for value in [
            &mut self.email.smtp_host,
            &mut self.email.smtp_username,
            &mut self.email.smtp_password,
        ]
        .into_iter()
        .flatten()
        {
            *value = expand_string(value, &lookup);
        }
    }

    /// Check settings the server cannot start without
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.database.url.trim().is_empty() {
            errors.push("  ✗ database.url is empty (set DATABASE_URL)".to_string());
        }
        if self.database.query_concurrency == 0 {
            errors.push("  ✗ database.query_concurrency must be at least 1".to_string());
        }
        if self.limits.rate_limit_requests == 0 || self.limits.rate_limit_window_secs == 0 {
            errors.push("  ✗ limits.rate_limit_* must be positive".to_string());
        }
        if self.auth.firebase_project_id.trim().is_empty() {
            errors.push("  ✗ auth.firebase_project_id is empty (set FIREBASE_PROJECT_ID)".to_string());
        }

        if !errors.is_empty() {
            anyhow::bail!("Config validation failed:\n{}", errors.join("\n"));
        }

        Ok(())
    }

    /// Render as TOML with credentials masked
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut redacted = self.clone();
        redacted.database.url = redact_url(&redacted.database.url);
        if redacted.email.smtp_password.is_some() {
            redacted.email.smtp_password = Some("********".to_string());
        }

        toml::to_string_pretty(&redacted).context("Failed to serialize config to TOML")
    }
}

/// Expand ${var} references in a string
fn expand_string<F>(s: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                result.push_str(&lookup(key).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);

    result
}

/// Mask the password component of a connection URL
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:********@{host}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind.port(), 3030);
        assert_eq!(config.catalog.term, Term(1262));
        assert_eq!(config.limits.max_saved_alerts, 10);
        assert_eq!(config.limits.rate_limit_requests, 40);
        assert_eq!(config.limits.rate_limit_window_secs, 60);
        assert_eq!(config.database.query_concurrency, 8);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[catalog]\nterm = 1264\n\n[limits]\nmax_saved_alerts = 3\n"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.catalog.term, Term(1264));
        assert_eq!(config.limits.max_saved_alerts, 3);
        assert_eq!(config.limits.rate_limit_requests, 40);
        assert_eq!(config.email.smtp_port, 587);
    }

    #[test]
    fn env_overrides_win() {
        let mut config = AppConfig::default();
        config.apply_env(lookup_from(&[
            ("POSTGRES_URL", "postgres://fallback/db"),
            ("ENROLLALERT_TERM", "1264"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
        ]));
        assert_eq!(config.database.url, "postgres://fallback/db");
        assert_eq!(config.catalog.term, Term(1264));
        assert_eq!(config.email.smtp_host.as_deref(), Some("smtp.example.com"));
        assert_eq!(config.email.smtp_port, 2525);

        config.apply_env(lookup_from(&[("DATABASE_URL", "postgres://primary/db")]));
        assert_eq!(config.database.url, "postgres://primary/db");
    }

    #[test]
    fn invalid_term_override_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(lookup_from(&[("ENROLLALERT_TERM", "fall")]));
        assert_eq!(config.catalog.term, Term(1262));
    }

    #[test]
    fn expands_variables() {
        let lookup = lookup_from(&[("DB_PASS", "hunter2")]);
        assert_eq!(
            expand_string("postgres://app:${DB_PASS}@db/enroll", &lookup),
            "postgres://app:hunter2@db/enroll"
        );
        assert_eq!(expand_string("${MISSING}x", &lookup), "x");
        assert_eq!(expand_string("open ${brace", &lookup), "open ${brace");
    }

    #[test]
    fn validate_lists_every_problem() {
        let err = AppConfig::default().validate().unwrap_err().to_string();
        assert!(err.contains("database.url"));
        assert!(err.contains("firebase_project_id"));

        let mut config = AppConfig::default();
        config.database.url = "postgres://localhost/enrollalert".into();
        config.auth.firebase_project_id = "enrollalert".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn redacts_credentials() {
        let mut config = AppConfig::default();
        config.database.url = "postgres://app:secret@db:5432/enroll".into();
        config.email.smtp_password = Some("smtp-secret".into());

        let rendered = config.to_redacted_toml().unwrap();
        assert!(!rendered.contains("secret@"));
        assert!(!rendered.contains("smtp-secret"));
        assert!(rendered.contains("postgres://app:********@db:5432/enroll"));
    }
}
