//! Password Reset Ledger
//! Mission: Single-use, expiring reset tokens with invalidate-on-reissue

use crate::auth::db::{db_timestamp, parse_db_timestamp, AuthDb, StoreError};
use crate::auth::models::ResetToken;
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

/// 32 bytes = 256 bits of randomness, hex encoded to 64 characters
const TOKEN_BYTES: usize = 32;

/// Durable ledger of reset tokens. Rows are never deleted; consumed and
/// superseded tokens stay behind with `used = 1`.
#[derive(Clone)]
pub struct ResetLedger {
    db: AuthDb,
    ttl: Duration,
}

impl ResetLedger {
    pub fn new(db: AuthDb, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    /// Issue a fresh token for `account_id`, retiring every earlier unused one
    pub fn issue(&self, account_id: &Uuid) -> Result<ResetToken, StoreError> {
        self.issue_at(account_id, Utc::now())
    }

    pub fn issue_at(&self, account_id: &Uuid, now: DateTime<Utc>) -> Result<ResetToken, StoreError> {
        let token = generate_token();
        let expires_at = now + self.ttl;

        let (id, superseded) = self.db.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let superseded = tx.execute(
                "UPDATE password_resets SET used = 1 WHERE user_id = ?1 AND used = 0",
                params![account_id.to_string()],
            )?;

            tx.execute(
                "INSERT INTO password_resets (user_id, token, expires_at, used, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![
                    account_id.to_string(),
                    token,
                    db_timestamp(expires_at),
                    db_timestamp(now),
                ],
            )?;
            let id = tx.last_insert_rowid();

            tx.commit()?;
            Ok((id, superseded))
        })?;

        info!(
            account_id = %account_id,
            reset_id = id,
            superseded,
            "📨 Password reset token issued"
        );

        Ok(ResetToken {
            id,
            account_id: *account_id,
            token,
            expires_at,
            used: false,
            created_at: now,
        })
    }

    /// Redeem `token`: set the owning account's password hash and mark the
    /// token used, both or neither.
    /// Read-only check for an unused, unexpired token. `consume` still decides.
    pub fn is_live(&self, token: &str) -> Result<bool, StoreError> {
        self.is_live_at(token, Utc::now())
    }

    pub fn is_live_at(&self, token: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let now_stamp = db_timestamp(now);
        self.db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM password_resets
                               WHERE token = ?1 AND used = 0 AND expires_at > ?2)",
                params![token, now_stamp],
                |row| row.get(0),
            )?)
        })
    }

    pub fn consume(&self, token: &str, new_password_hash: &str) -> Result<Uuid, StoreError> {
        self.consume_at(token, new_password_hash, Utc::now())
    }

    pub fn consume_at(
        &self,
        token: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let now_stamp = db_timestamp(now);

        let account_id = self.db.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let row: Option<(i64, String)> = tx
                .query_row(
                    "SELECT id, user_id FROM password_resets
                     WHERE token = ?1 AND used = 0 AND expires_at > ?2",
                    params![token, now_stamp],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((reset_id, user_id)) = row else {
                return Err(StoreError::InvalidOrExpired);
            };

            // Deactivated accounts cannot be reset back into use.
            let updated = tx.execute(
                "UPDATE users SET password_hash = ?1, updated_at = MAX(updated_at, ?2)
                 WHERE id = ?3 AND is_active = 1",
                params![new_password_hash, now_stamp, user_id],
            )?;
            if updated != 1 {
                return Err(StoreError::InvalidOrExpired);
            }

            let marked = tx.execute(
                "UPDATE password_resets SET used = 1 WHERE id = ?1 AND used = 0",
                params![reset_id],
            )?;
            if marked != 1 {
                return Err(StoreError::InvalidOrExpired);
            }

            tx.commit()?;

            Uuid::parse_str(&user_id)
                .map_err(|e| StoreError::Corrupt(format!("bad account id {:?}: {}", user_id, e)))
        })?;

        info!(account_id = %account_id, "🔑 Password reset completed");
        Ok(account_id)
    }

    /// Every reset row for an account, newest first
    pub fn tokens_for_account(&self, account_id: &Uuid) -> Result<Vec<ResetToken>, StoreError> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, token, expires_at, used, created_at
                 FROM password_resets WHERE user_id = ?1 ORDER BY id DESC",
            )?;
            let rows = stmt
                .query_map(params![account_id.to_string()], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        debug!(account_id = %account_id, count = rows.len(), "Listed reset tokens");

        rows.into_iter()
            .map(|(id, user_id, token, expires_at, used, created_at)| {
                Ok(ResetToken {
                    id,
                    account_id: Uuid::parse_str(&user_id).map_err(|e| {
                        StoreError::Corrupt(format!("bad account id {:?}: {}", user_id, e))
                    })?,
                    token,
                    expires_at: parse_db_timestamp(&expires_at)?,
                    used: used != 0,
                    created_at: parse_db_timestamp(&created_at)?,
                })
            })
            .collect()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
