//! Password policy and bcrypt digests
//!
//! bcrypt is CPU bound; hashing and verification run on the blocking pool.

use super::token::generate_token;
use crate::error::{Error, Result};

/// Shortest password accepted
pub const MIN_PASSWORD_LEN: usize = 6;

/// bcrypt only looks at the first 72 bytes
pub const MAX_PASSWORD_LEN: usize = 72;

/// Check a password and its confirmation against the policy
pub fn check_policy(password: &str, confirmation: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::policy(
            "Password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }

    if password.len() > MAX_PASSWORD_LEN {
        return Err(Error::policy(
            "Password",
            format!("must be at most {} bytes", MAX_PASSWORD_LEN),
        ));
    }

    if password != confirmation {
        return Err(Error::policy("ConfirmationPassword", "does not match password"));
    }

    Ok(())
}

/// Hashes and verifies passwords at a fixed bcrypt cost
#[derive(Debug, Clone, Copy)]
pub struct CredentialManager {
    cost: u32,
}

impl CredentialManager {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Validate the policy, then compute a salted digest of `password`
    pub async fn create_digest(&self, password: &str, confirmation: &str) -> Result<String> {
        check_policy(password, confirmation)?;

        let password = password.to_string();
        let cost = self.cost;
        let digest = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        Ok(digest)
    }

    /// Digest of a random secret, verified against when a login names an
    /// unknown email so both failure paths pay the same hashing cost
    pub fn decoy_digest(&self) -> Result<String> {
        Ok(bcrypt::hash(generate_token(), self.cost)?)
    }

    /// `Ok(false)` on mismatch; `Err` only when the digest itself is unusable
    pub async fn verify(&self, digest: &str, candidate: &str) -> Result<bool> {
        let digest = digest.to_string();
        let candidate = candidate.to_string();
        let matches =
            tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &digest)).await??;
        Ok(matches)
    }
}
