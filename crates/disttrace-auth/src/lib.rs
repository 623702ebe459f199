//! Agent credential checks and operator bearer tokens — the two orthogonal
//! authentication schemes spec component C describes.
//!
//! Token scheme grounded on `authorize.go`'s use of HS256 over a three-field
//! claim set (`iss`, `sub`, `iat`/`exp`); reimplemented directly on `hmac` +
//! `sha2` rather than pulling in a JWT crate, since this workspace never
//! needs anything past fixed-claim HS256 sign/verify.

#![forbid(unsafe_code)]

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use disttrace_proto::{hash_password, AgentCredentials, User};
use disttrace_store::{Store, StoreError};

/// Delay inserted before replying 401 to a bad agent credential, per spec
/// §4.C — a fixed anti-probe rate control, not exponential backoff.
pub const AGENT_AUTH_DELAY: Duration = Duration::from_secs(2);

/// Delay inserted before replying 401 to a bad operator login.
pub const OPERATOR_AUTH_DELAY: Duration = Duration::from_secs(3);

const TOKEN_ISSUER: &str = "disttrace";
const TOKEN_TTL_SECS: i64 = 3600;
const HMAC_KEY_LEN: usize = 100;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token is malformed")]
    TokenMalformed,
    #[error("token signature does not verify")]
    TokenInvalid,
    #[error("token has expired")]
    TokenExpired,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Checks `(name, secret)` against the `agents` table. Case-sensitive
/// equality, matching the original's direct SQL comparison. On mismatch,
/// sleeps [`AGENT_AUTH_DELAY`] before returning so the caller's 401 carries
/// the delay intrinsically.
pub async fn check_agent_credentials(
    store: &Store,
    creds: &AgentCredentials,
) -> Result<Uuid, AuthError> {
    let row = store.query_row(
        "SELECT id FROM agents WHERE name = ?1 AND secret = ?2",
        rusqlite::params![creds.name, creds.secret],
        |row| row.get::<_, String>(0),
    )?;

    match row.and_then(|s| Uuid::parse_str(&s).ok()) {
        Some(id) => Ok(id),
        None => {
            warn!(name = %creds.name, "agent credential check failed");
            tokio::time::sleep(AGENT_AUTH_DELAY).await;
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Verifies an operator's username/password against the `users` table. On
/// mismatch or unknown user, sleeps [`OPERATOR_AUTH_DELAY`] before returning.
pub async fn check_operator_login(
    store: &Store,
    name: &str,
    password: &str,
) -> Result<User, AuthError> {
    let row = store.query_row(
        "SELECT id, name, password_hash, salt, password_needs_change FROM users WHERE name = ?1",
        rusqlite::params![name],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, bool>(4)?,
            ))
        },
    )?;

    if let Some((id, name, password_hash, salt, password_needs_change)) = row {
        if hash_password(password, salt) == password_hash {
            return Ok(User {
                id: Uuid::parse_str(&id).map_err(|_| AuthError::InvalidCredentials)?,
                name,
                password_hash,
                salt,
                password_needs_change,
            });
        }
    }

    warn!(user = %name, "operator login failed");
    tokio::time::sleep(OPERATOR_AUTH_DELAY).await;
    Err(AuthError::InvalidCredentials)
}

/// Signed claim set carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies operator bearer tokens. The signing key is a
/// 100-byte cryptographically random value generated once per process —
/// losing it across restarts is acceptable (spec §4.C) since it only forces
/// reauthentication.
pub struct TokenAuthority {
    key: Vec<u8>,
}

impl TokenAuthority {
    pub fn new() -> Self {
        let mut key = vec![0u8; HMAC_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Issues a token valid for one hour from `now`.
    pub fn issue(&self, username: &str, now: chrono::DateTime<chrono::Utc>) -> String {
        let claims = Claims {
            iss: TOKEN_ISSUER.to_string(),
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + TOKEN_TTL_SECS,
        };
        let payload = serde_json::to_vec(&claims).expect("claims always serialize");
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);

        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(payload_b64.as_bytes());
        let tag = mac.finalize().into_bytes();
        let tag_b64 = URL_SAFE_NO_PAD.encode(tag);

        format!("{payload_b64}.{tag_b64}")
    }

    /// Verifies signature, issuer, and `iat`/`exp` bounds against `now`.
    pub fn verify(&self, token: &str, now: chrono::DateTime<chrono::Utc>) -> Result<Claims, AuthError> {
        let (payload_b64, tag_b64) = token.split_once('.').ok_or(AuthError::TokenMalformed)?;

        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|_| AuthError::TokenMalformed)?;

        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&tag).map_err(|_| {
            debug!("token signature verification failed");
            AuthError::TokenInvalid
        })?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::TokenMalformed)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::TokenMalformed)?;

        if claims.iss != TOKEN_ISSUER {
            return Err(AuthError::TokenInvalid);
        }
        let now_ts = now.timestamp();
        if now_ts < claims.iat || now_ts > claims.exp {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    /// Parses the `Authorization: Bearer <token>` header value, if present.
    pub fn token_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ")
    }
}

impl Default for TokenAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    #[test]
    fn token_round_trips() {
        let authority = TokenAuthority::new();
        let now = Utc::now();
        let token = authority.issue("admin", now);
        let claims = authority.verify(&token, now).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.iss, "disttrace");
    }

    #[test]
    fn token_rejected_after_expiry() {
        let authority = TokenAuthority::new();
        let now = Utc::now();
        let token = authority.issue("admin", now);
        let later = now + ChronoDuration::hours(2);
        let err = authority.verify(&token, later).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn token_rejected_with_wrong_key() {
        let a = TokenAuthority::new();
        let b = TokenAuthority::new();
        let now = Utc::now();
        let token = a.issue("admin", now);
        let err = b.verify(&token, now).unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    #[test]
    fn token_from_header_strips_bearer_prefix() {
        assert_eq!(
            TokenAuthority::token_from_header("Bearer abc.def"),
            Some("abc.def")
        );
        assert_eq!(TokenAuthority::token_from_header("abc.def"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn agent_credential_mismatch_delays_before_erroring() {
        let store = Store::open_in_memory().unwrap();
        store
            .execute(
                "INSERT INTO agents (id, name, secret) VALUES ('00000000-0000-0000-0000-000000000001', 'falbala', '1234')",
                [],
            )
            .unwrap();

        let creds = AgentCredentials {
            id: Uuid::nil(),
            name: "falbala".to_string(),
            secret: "wrong".to_string(),
        };

        let start = tokio::time::Instant::now();
        let result = check_agent_credentials(&store, &creds).await;
        assert!(result.is_err());
        assert!(start.elapsed() >= AGENT_AUTH_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn agent_credential_match_succeeds_without_delay() {
        let store = Store::open_in_memory().unwrap();
        store
            .execute(
                "INSERT INTO agents (id, name, secret) VALUES ('00000000-0000-0000-0000-000000000001', 'falbala', '1234')",
                [],
            )
            .unwrap();

        let creds = AgentCredentials {
            id: Uuid::nil(),
            name: "falbala".to_string(),
            secret: "1234".to_string(),
        };

        let id = check_agent_credentials(&store, &creds).await.unwrap();
        assert_eq!(id, Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap());
    }
}
