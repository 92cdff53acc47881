//! Account authentication.
//!
//! Provides:
//! - Registration with username/password (iterated SHA-256, 100k rounds + per-account salt)
//! - Login returning a signed, stateless bearer token (HMAC-SHA256, 24h lifetime)
//! - Token verification for every protected request
//!
//! ## Design Decisions
//! - Tokens are not stored server-side; logout is a client-side concern.
//! - A missing token is `Auth` (401); a present but bad or expired token is
//!   `Forbidden` (403).

pub mod store;
pub mod token;

pub use store::{Account, AccountStore};
pub use token::{Claims, TokenSigner};

use crate::error::{Result, TodoError};

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account_id: i64,
    pub username: String,
}

/// Successful login: the token plus the canonical username.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub username: String,
}

/// Registration, login and token checks over one account store and signer.
pub struct AuthService {
    accounts: AccountStore,
    signer: TokenSigner,
}

impl AuthService {
    pub fn new(accounts: AccountStore, signer: TokenSigner) -> Self {
        Self { accounts, signer }
    }

    /// Create an account. No token is issued; the caller logs in separately.
    pub fn register(&self, username: &str, password: &str) -> Result<i64> {
        self.accounts.register(username, password)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(TodoError::Validation(
                "Username and password are required".into(),
            ));
        }
        let account = self.accounts.authenticate(username, password)?;
        let token = self.signer.issue(&account)?;
        tracing::info!(account_id = account.id, "login succeeded");
        Ok(LoginOutcome {
            token,
            username: account.username,
        })
    }

    /// Resolve a bearer token (if any) to the identity it was issued for.
    pub fn authenticate(&self, token: Option<&str>) -> Result<Identity> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TodoError::Auth("Missing Authorization header".into()))?;
        let claims = self.signer.verify(token)?;
        Ok(Identity {
            account_id: claims.sub,
            username: claims.username,
        })
    }
}
