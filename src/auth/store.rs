//! SQLite-backed account store.
//!
//! Accounts are created by registration and only ever read afterwards.
//! Passwords are stored as iterated, salted SHA-256 digests.

use crate::error::{Result, TodoError};
use crate::storage::{epoch_secs, Database};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Salt byte length for password hashing.
const SALT_BYTES: usize = 16;

/// Number of SHA-256 iterations for password stretching.
const HASH_ITERATIONS: u32 = 100_000;

/// Message shared by every login failure so callers cannot tell which part was wrong.
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub created_at: i64,
}

pub struct AccountStore {
    db: Database,
}

impl AccountStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a new account. Returns the account id.
    pub fn register(&self, username: &str, password: &str) -> Result<i64> {
        let trimmed = username.trim();
        if trimmed.is_empty() || password.is_empty() {
            return Err(TodoError::Validation(
                "Username and password are required".into(),
            ));
        }
        if trimmed.len() > 64 {
            return Err(TodoError::Validation(
                "Username too long (max 64 characters)".into(),
            ));
        }

        let salt = generate_salt();
        let password_hash = hash_password(password, &salt);

        let conn = self.db.lock();
        let result = conn.execute(
            "INSERT INTO accounts (username, password_hash, salt, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![trimmed, password_hash, salt, epoch_secs()],
        );

        match result {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                tracing::info!(account_id = id, username = trimmed, "account registered");
                Ok(id)
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(TodoError::Conflict(format!(
                    "Username '{trimmed}' is already taken"
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check a username + password pair. Returns the `Account` on success.
    ///
    /// The connection lock is released before the password is stretched.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Account> {
        let row = {
            let conn = self.db.lock();
            let row = conn.query_row(
                "SELECT id, username, password_hash, salt, created_at
                 FROM accounts WHERE username = ?1 COLLATE NOCASE",
                rusqlite::params![username.trim()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            );
            row
        };

        match row {
            Ok((id, stored_username, stored_hash, salt, created_at)) => {
                let attempt_hash = hash_password(password, &salt);
                if !constant_time_eq(stored_hash.as_bytes(), attempt_hash.as_bytes()) {
                    tracing::debug!(account_id = id, "password mismatch");
                    return Err(TodoError::Auth(INVALID_CREDENTIALS.into()));
                }
                Ok(Account {
                    id,
                    username: stored_username,
                    created_at,
                })
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                // Dummy hash keeps the unknown-user path as slow as a mismatch
                let _ = hash_password(password, "00000000000000000000000000000000");
                Err(TodoError::Auth(INVALID_CREDENTIALS.into()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ── Cryptographic Helpers ───────────────────────────────────────────

/// Generate a random salt (hex-encoded).
fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a password with salt using iterated SHA-256.
fn hash_password(password: &str, salt: &str) -> String {
    let mut hash = Sha256::new();
    hash.update(salt.as_bytes());
    hash.update(password.as_bytes());
    let mut result = hash.finalize();

    for _ in 1..HASH_ITERATIONS {
        let mut h = Sha256::new();
        h.update(result);
        h.update(salt.as_bytes());
        result = h.finalize();
    }

    hex::encode(result)
}

/// Constant-time byte comparison.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> AccountStore {
        AccountStore::new(Database::in_memory().unwrap())
    }

    #[test]
    fn register_and_authenticate() {
        let store = test_store();

        let id = store.register("alice", "pw1").unwrap();
        let account = store.authenticate("alice", "pw1").unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.username, "alice");
    }

    #[test]
    fn register_duplicate_username_is_conflict() {
        let store = test_store();

        store.register("alice", "pw1").unwrap();
        let err = store.register("alice", "other").unwrap_err();
        assert!(matches!(err, TodoError::Conflict(_)));
        assert!(err.to_string().contains("already taken"));
    }

    #[test]
    fn register_case_insensitive_duplicate_fails() {
        let store = test_store();

        store.register("Alice", "pw1").unwrap();
        assert!(matches!(
            store.register("alice", "pw2"),
            Err(TodoError::Conflict(_))
        ));
    }

    #[test]
    fn register_empty_fields_is_validation_error() {
        let store = test_store();

        assert!(matches!(
            store.register("", "pw"),
            Err(TodoError::Validation(_))
        ));
        assert!(matches!(
            store.register("   ", "pw"),
            Err(TodoError::Validation(_))
        ));
        assert!(matches!(
            store.register("bob", ""),
            Err(TodoError::Validation(_))
        ));
        let count: i64 = store
            .db
            .lock()
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn wrong_password_and_unknown_user_look_identical() {
        let store = test_store();
        store.register("alice", "pw1").unwrap();

        let wrong = store.authenticate("alice", "nope").unwrap_err();
        let ghost = store.authenticate("ghost", "pw1").unwrap_err();
        assert!(matches!(wrong, TodoError::Auth(_)));
        assert!(matches!(ghost, TodoError::Auth(_)));
        assert_eq!(wrong.to_string(), ghost.to_string());
    }

    #[test]
    fn password_is_not_stored_in_plaintext() {
        let db = Database::in_memory().unwrap();
        let store = AccountStore::new(db.clone());
        store.register("alice", "hunter2").unwrap();

        let stored: String = db
            .lock()
            .query_row("SELECT password_hash FROM accounts", [], |row| row.get(0))
            .unwrap();
        assert_ne!(stored, "hunter2");
        assert_eq!(stored.len(), 64);
    }

    #[test]
    fn authenticate_does_not_hold_the_database_during_hashing() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::time::{Duration, Instant};

        let db = Database::in_memory().unwrap();
        let store = Arc::new(AccountStore::new(db.clone()));
        store.register("alice", "pw1").unwrap();

        let started = Instant::now();
        let _ = hash_password("pw1", "calibration");
        let one_hash = started.elapsed();

        let done = Arc::new(AtomicBool::new(false));
        let login = {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let ok = store.authenticate("alice", "pw1").is_ok();
                let ghost = store.authenticate("ghost", "pw1").is_err();
                done.store(true, Ordering::SeqCst);
                ok && ghost
            })
        };

        let mut longest_wait = Duration::ZERO;
        while !done.load(Ordering::SeqCst) {
            let asked = Instant::now();
            let conn = db.lock();
            longest_wait = longest_wait.max(asked.elapsed());
            drop(conn);
            std::thread::sleep(Duration::from_millis(1));
        }

        assert!(login.join().unwrap());
        assert!(
            longest_wait < one_hash / 2,
            "database waited {longest_wait:?} behind a login (one hash takes {one_hash:?})"
        );
    }

    #[test]
    fn password_hash_is_deterministic_with_same_salt() {
        let h1 = hash_password("test_password", "fixed_salt_value");
        let h2 = hash_password("test_password", "fixed_salt_value");
        assert_eq!(h1, h2);
    }

    #[test]
    fn password_hash_differs_with_different_salt() {
        let h1 = hash_password("test_password", "salt_a");
        let h2 = hash_password("test_password", "salt_b");
        assert_ne!(h1, h2);
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
