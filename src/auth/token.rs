//! Stateless bearer tokens.
//!
//! Format: `base64url(claims json) "." base64url(HMAC-SHA256(claims part))`.
//! Nothing is stored server-side; a token is valid while its MAC checks out
//! and `exp` lies in the future.

use crate::auth::store::Account;
use crate::error::{Result, TodoError};
use crate::storage::epoch_secs;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::Path;

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime: 24 hours (seconds).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 3600;

/// Signing secret length for generated secrets.
const SECRET_BYTES: usize = 32;

/// Payload carried inside a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: i64,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies signed tokens with a single server secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_secs: Option<u64>) -> Self {
        let ttl = ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        Self {
            secret: secret.into(),
            ttl_secs: i64::try_from(ttl).unwrap_or(i64::MAX),
        }
    }

    pub fn issue(&self, account: &Account) -> Result<String> {
        self.issue_at(account, epoch_secs())
    }

    fn issue_at(&self, account: &Account, now: i64) -> Result<String> {
        let claims = Claims {
            sub: account.id,
            username: account.username.clone(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes())?);
        Ok(format!("{payload}.{signature}"))
    }

    /// Verify signature and expiry. Any failure is `Forbidden`.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_at(token, epoch_secs())
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<Claims> {
        let rejected = || TodoError::Forbidden("Invalid or expired token".into());

        let (payload, signature) = token.split_once('.').ok_or_else(rejected)?;
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| rejected())?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| rejected())?;

        let raw = URL_SAFE_NO_PAD.decode(payload).map_err(|_| rejected())?;
        let claims: Claims = serde_json::from_slice(&raw).map_err(|_| rejected())?;
        if claims.exp <= now {
            tracing::debug!(account_id = claims.sub, "token expired");
            return Err(rejected());
        }
        Ok(claims)
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| TodoError::Internal(format!("hmac key: {e}")))
    }
}

/// Read the hex-encoded signing secret at `path`, generating and persisting
/// a fresh one when the file does not exist yet.
pub fn load_or_generate_secret(path: &Path) -> anyhow::Result<Vec<u8>> {
    use anyhow::Context;

    if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading signing secret {}", path.display()))?;
        return hex::decode(raw.trim())
            .with_context(|| format!("signing secret {} is not valid hex", path.display()));
    }

    let mut secret = vec![0u8; SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut secret);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, hex::encode(&secret))
        .with_context(|| format!("writing signing secret {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(path = %path.display(), "generated new token signing secret");
    Ok(secret)
}
