//! Password Hashing
//! Mission: bcrypt off the async worker threads

use anyhow::{Context, Result};
use bcrypt::{hash, verify};
use tracing::debug;

/// Adaptive one-way hashing with a tunable cost factor.
///
/// bcrypt is CPU-bound (cost 12 is roughly a quarter second), so every call
/// runs on tokio's blocking pool instead of the executor threads that accept
/// requests.
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    // Verified against when the account does not exist so that login timing
    // looks the same either way.
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self> {
        let dummy_hash =
            hash("dummy-password-for-timing", cost).context("Failed to hash dummy password")?;
        Ok(Self { cost, dummy_hash })
    }

    pub async fn hash(&self, password: &str) -> Result<String> {
        let password = password.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || hash(password, cost))
            .await
            .context("Password hashing task panicked")?
            .context("Failed to hash password")
    }

    pub async fn verify(&self, password: &str, password_hash: &str) -> Result<bool> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        tokio::task::spawn_blocking(move || verify(password, &password_hash))
            .await
            .context("Password verification task panicked")?
            .context("Failed to verify password")
    }

    /// Burn the same work as a real verification and always report a mismatch
    pub async fn verify_dummy(&self, password: &str) -> bool {
        if let Err(e) = self.verify(password, &self.dummy_hash).await {
            debug!("Dummy password verification failed: {:#}", e);
        }
        false
    }
}
