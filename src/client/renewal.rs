//! When a client should swap its token for a fresh one.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use std::time::Duration;

/// Renew once less than this much lifetime is left.
pub const DEFAULT_RENEWAL_THRESHOLD: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFreshness {
    Fresh,
    NeedsRenewal,
    /// Past expiry: the server would refuse a renewal, log in again.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalPolicy {
    pub threshold: Duration,
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_RENEWAL_THRESHOLD,
        }
    }
}

impl RenewalPolicy {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn assess(&self, expires_at: u64, now: u64) -> TokenFreshness {
        if now > expires_at {
            TokenFreshness::Expired
        } else if expires_at - now < self.threshold.as_secs() {
            TokenFreshness::NeedsRenewal
        } else {
            TokenFreshness::Fresh
        }
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: u64,
}

/// Reads `exp` from a JWT payload without checking the signature.
/// Only the server can verify a token, the client just needs the timing.
pub fn token_expiry(token: &str) -> Option<u64> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<ExpiryClaim>(&decoded)
        .ok()
        .map(|claim| claim.exp)
}
