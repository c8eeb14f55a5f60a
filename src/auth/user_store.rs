//! User Storage
//! Mission: Durable accounts with case-insensitive unique email and soft deactivation

use crate::auth::db::{db_timestamp, parse_db_timestamp, AuthDb, StoreError};
use crate::auth::models::Account;
use crate::auth::validation::normalize_email;
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, first_name, last_name, created_at, \
                               updated_at, email_verified, is_active";

/// Account storage with SQLite backend
#[derive(Clone)]
pub struct UserStore {
    db: AuthDb,
}

impl UserStore {
    pub fn new(db: AuthDb) -> Self {
        Self { db }
    }

    /// Create a new account.
    ///
    /// The existence pre-check only saves a write; the UNIQUE COLLATE NOCASE
    /// constraint is what actually decides a concurrent race.
    pub fn create_account(
        &self,
        email: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Account, StoreError> {
        let email = normalize_email(email);
        // Stored with millisecond precision; keep the returned value identical
        let now = Utc::now().trunc_subsecs(3);
        let account = Account {
            id: Uuid::new_v4(),
            email,
            password_hash: password_hash.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            created_at: now,
            updated_at: now,
            email_verified: false,
            is_active: true,
        };

        self.db.with_conn(|conn| {
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                params![account.email],
                |row| row.get(0),
            )?;
            if taken {
                return Err(StoreError::Conflict);
            }

            let stamp = db_timestamp(now);
            conn.execute(
                "INSERT INTO users (id, email, password_hash, first_name, last_name,
                                    created_at, updated_at, email_verified, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, 0, 1)",
                params![
                    account.id.to_string(),
                    account.email,
                    account.password_hash,
                    account.first_name,
                    account.last_name,
                    stamp,
                ],
            )?;
            Ok(())
        })?;

        info!(account_id = %account.id, "✅ Created account");
        Ok(account)
    }

    /// Look up an active account by email (trimmed + lowercased before lookup)
    /// Whether any account, active or not, already holds `email`
    pub fn email_taken(&self, email: &str) -> Result<bool, StoreError> {
        let email = normalize_email(email);
        self.db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                params![email],
                |row| row.get(0),
            )?)
        })
    }

    pub fn find_active_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let email = normalize_email(email);
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM users WHERE email = ?1 AND is_active = 1",
                    ACCOUNT_COLUMNS
                ),
                params![email],
                raw_account,
            )
            .optional()?
            .map(RawAccount::into_account)
            .transpose()
        })
    }

    pub fn find_active_by_id(&self, id: &Uuid) -> Result<Option<Account>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM users WHERE id = ?1 AND is_active = 1",
                    ACCOUNT_COLUMNS
                ),
                params![id.to_string()],
                raw_account,
            )
            .optional()?
            .map(RawAccount::into_account)
            .transpose()
        })
    }

    /// Update name fields; returns false when no active account matched
    pub fn update_profile(
        &self,
        id: &Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<bool, StoreError> {
        let stamp = db_timestamp(Utc::now());
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE users
                 SET first_name = ?1, last_name = ?2, updated_at = MAX(updated_at, ?3)
                 WHERE id = ?4 AND is_active = 1",
                params![first_name, last_name, stamp, id.to_string()],
            )?)
        })?;

        debug!(account_id = %id, changed, "Profile update");
        Ok(changed == 1)
    }

    /// Replace the password hash; returns false when no active account matched
    pub fn update_password_hash(&self, id: &Uuid, new_hash: &str) -> Result<bool, StoreError> {
        let stamp = db_timestamp(Utc::now());
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE users SET password_hash = ?1, updated_at = MAX(updated_at, ?2)
                 WHERE id = ?3 AND is_active = 1",
                params![new_hash, stamp, id.to_string()],
            )?)
        })?;

        if changed == 1 {
            info!(account_id = %id, "🔑 Password hash updated");
        }
        Ok(changed == 1)
    }

    /// Flip the soft activity flag. Deactivated accounts disappear from every
    /// lookup above, which also locks out sessions on their next request.
    pub fn set_active(&self, email: &str, active: bool) -> Result<bool, StoreError> {
        let email = normalize_email(email);
        let stamp = db_timestamp(Utc::now());
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE users SET is_active = ?1, updated_at = MAX(updated_at, ?2)
                 WHERE email = ?3",
                params![active as i64, stamp, email],
            )?)
        })?;

        if changed == 1 {
            info!(active, "Account activity flag changed");
        }
        Ok(changed == 1)
    }
}

/// Row as read from SQLite, before the text columns are parsed
struct RawAccount {
    id: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    created_at: String,
    updated_at: String,
    email_verified: i64,
    is_active: i64,
}

fn raw_account(row: &Row<'_>) -> rusqlite::Result<RawAccount> {
    Ok(RawAccount {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        email_verified: row.get(7)?,
        is_active: row.get(8)?,
    })
}

impl RawAccount {
    fn into_account(self) -> Result<Account, StoreError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StoreError::Corrupt(format!("bad account id {:?}: {}", self.id, e)))?;
        let created_at: DateTime<Utc> = parse_db_timestamp(&self.created_at)?;
        let updated_at: DateTime<Utc> = parse_db_timestamp(&self.updated_at)?;

        Ok(Account {
            id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            created_at,
            updated_at,
            email_verified: self.email_verified != 0,
            is_active: self.is_active != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db = AuthDb::open(temp_file.path().to_str().unwrap()).unwrap();
        (UserStore::new(db), temp_file)
    }

    #[test]
    fn test_create_and_retrieve_account() {
        let (store, _temp) = create_test_store();

        let created = store
            .create_account("Alice@Example.com", "hash", "Alice", "Liddell")
            .unwrap();
        assert_eq!(created.email, "alice@example.com");
        assert!(created.is_active);
        assert!(!created.email_verified);

        let by_email = store.find_active_by_email("  ALICE@example.COM ").unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.first_name, "Alice");

        let by_id = store.find_active_by_id(&created.id).unwrap().unwrap();
        assert_eq!(by_id.email, "alice@example.com");
        assert_eq!(by_id.password_hash, "hash");
    }

    #[test]
    fn test_email_taken_includes_deactivated_accounts() {
        let (store, _temp) = create_test_store();
        assert!(!store.email_taken("dan@example.com").unwrap());

        store.create_account("dan@example.com", "h", "", "").unwrap();
        assert!(store.email_taken(" DAN@example.com").unwrap());

        store.set_active("dan@example.com", false).unwrap();
        assert!(store.email_taken("dan@example.com").unwrap());
    }

    #[test]
    fn test_duplicate_email_any_casing_conflicts() {
        let (store, _temp) = create_test_store();

        store.create_account("bob@example.com", "h", "", "").unwrap();
        let again = store.create_account("BOB@Example.com", "h", "", "");
        assert!(matches!(again, Err(StoreError::Conflict)));
    }

    #[test]
    fn test_unique_constraint_holds_under_concurrent_inserts() {
        let (store, _temp) = create_test_store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let email = if i % 2 == 0 { "race@example.com" } else { "RACE@example.com" };
                    store.create_account(email, "h", "", "").is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }

    #[test]
    fn test_missing_account() {
        let (store, _temp) = create_test_store();
        assert!(store.find_active_by_email("nobody@example.com").unwrap().is_none());
        assert!(store.find_active_by_id(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_update_profile_and_password_touch_updated_at() {
        let (store, _temp) = create_test_store();
        let account = store.create_account("carol@example.com", "old", "C", "").unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(store.update_profile(&account.id, "Carol", "King").unwrap());
        let after_profile = store.find_active_by_id(&account.id).unwrap().unwrap();
        assert_eq!(after_profile.first_name, "Carol");
        assert_eq!(after_profile.last_name, "King");
        assert!(after_profile.updated_at > account.updated_at);
        assert_eq!(after_profile.created_at, account.created_at);

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(store.update_password_hash(&account.id, "new").unwrap());
        let after_password = store.find_active_by_id(&account.id).unwrap().unwrap();
        assert_eq!(after_password.password_hash, "new");
        assert!(after_password.updated_at > after_profile.updated_at);
    }

    #[test]
    fn test_deactivated_account_is_invisible() {
        let (store, _temp) = create_test_store();
        let account = store.create_account("dave@example.com", "h", "", "").unwrap();

        assert!(store.set_active("DAVE@example.com", false).unwrap());
        assert!(store.find_active_by_email("dave@example.com").unwrap().is_none());
        assert!(store.find_active_by_id(&account.id).unwrap().is_none());
        assert!(!store.update_password_hash(&account.id, "x").unwrap());

        // still occupies the email
        let again = store.create_account("dave@example.com", "h", "", "");
        assert!(matches!(again, Err(StoreError::Conflict)));

        assert!(store.set_active("dave@example.com", true).unwrap());
        assert!(store.find_active_by_id(&account.id).unwrap().is_some());
    }

    #[test]
    fn test_set_active_unknown_email() {
        let (store, _temp) = create_test_store();
        assert!(!store.set_active("ghost@example.com", false).unwrap());
    }
}
