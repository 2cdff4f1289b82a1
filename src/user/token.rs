//! Stateless session tokens.
//!
//! Tokens are HS256 JWTs carrying the account name (`sub`), the issue time
//! (`iat`) and the expiry (`exp`), all in epoch seconds. Nothing is stored
//! server side: a token is valid as long as its signature checks out and the
//! clock has not passed `exp`. There is no revocation.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

use super::Account;

/// Default session lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, malformed payload or expired. Callers get no detail.
    #[error("invalid or expired token")]
    Invalid,

    #[error("could not sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

/// A freshly signed token together with its decoded claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub value: String,
    pub subject: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// The claims of a token that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// Time source for issuing and checking tokens, in epoch seconds.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_secs: u64) -> Self {
        Self {
            now: AtomicU64::new(now_secs),
        }
    }

    pub fn set(&self, now_secs: u64) {
        self.now.store(now_secs, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_secs(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self::with_clock(secret, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &[u8], ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock in verify().
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, account: &Account) -> Result<SessionToken, TokenError> {
        self.issue_for(&account.username, None)
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|err| {
            debug!("Rejecting token: {}", err);
            TokenError::Invalid
        })?;
        let claims = data.claims;

        let now = self.clock.now_secs();
        if now > claims.exp {
            debug!(
                "Rejecting expired token for {} ({}s past expiry)",
                claims.sub,
                now - claims.exp
            );
            return Err(TokenError::Invalid);
        }
        if claims.sub.is_empty() {
            return Err(TokenError::Invalid);
        }

        Ok(VerifiedToken {
            subject: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    /// Swaps a still-valid token for a new one with a full lifetime.
    /// Expired tokens are not renewable, the client has to log in again.
    pub fn renew(&self, token: &str) -> Result<SessionToken, TokenError> {
        let verified = self.verify(token)?;
        self.issue_for(&verified.subject, Some(verified.expires_at))
    }

    fn issue_for(
        &self,
        subject: &str,
        previous_expiry: Option<u64>,
    ) -> Result<SessionToken, TokenError> {
        let now = self.clock.now_secs();
        let mut expires_at = now.saturating_add(self.ttl.as_secs());
        // A renewal must always push the expiry forward, even within the same second.
        if let Some(previous) = previous_expiry {
            expires_at = expires_at.max(previous.saturating_add(1));
        }

        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: expires_at,
        };
        let value = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(SessionToken {
            value,
            subject: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}
