//! Password-reset tokens.
//!
//! The raw token only ever leaves the process through the reset mail; the
//! database keeps its SHA-256 digest and an expiry instant.

use anyhow::Context;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

pub const RESET_TOKEN_TTL: Duration = Duration::minutes(10);

const RESET_TOKEN_BYTES: usize = 32;

/// A freshly issued token: `raw` goes to the user, `digest` and `expires_at`
/// go to the store.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub raw: String,
    pub digest: String,
    pub expires_at: OffsetDateTime,
}

pub fn generate_reset_token(now: OffsetDateTime) -> anyhow::Result<ResetToken> {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate reset token")?;
    let raw = hex::encode(bytes);
    let digest = digest_reset_token(&raw);
    Ok(ResetToken {
        raw,
        digest,
        expires_at: now + RESET_TOKEN_TTL,
    })
}

/// Hex SHA-256 of the raw token, the form used for lookups.
pub fn digest_reset_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Link the user follows to pick a new password.
pub fn build_reset_url(frontend_base_url: &str, raw: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/reset-password/{raw}")
}
