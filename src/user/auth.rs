//! Account credentials and secret hashing.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, warn};

/// A login identity. The set of accounts is fixed at process start.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Account {
    pub username: String,
    pub secret_hash: String,
}

mod media_argon2 {
    use anyhow::{anyhow, Result};
    use argon2::{
        password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
        Argon2,
    };

    pub fn hash(plain: &[u8]) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash_string = Argon2::default()
            .hash_password(plain, &salt)
            .map_err(|err| anyhow!("{}", err))?
            .to_string();
        Ok(hash_string)
    }

    pub fn verify(plain: &[u8], target_hash: &str) -> Result<bool> {
        let password_hash = PasswordHash::new(target_hash).map_err(|err| anyhow!("{}", err))?;
        Ok(Argon2::default()
            .verify_password(plain, &password_hash)
            .is_ok())
    }
}

mod media_sha256 {
    use super::{Digest, Sha256};

    pub fn hash(plain: &[u8]) -> String {
        format!("{:x}", Sha256::digest(plain))
    }

    pub fn verify(plain: &[u8], target_hash: &str) -> bool {
        let computed = hash(plain);
        constant_time_eq(
            computed.as_bytes(),
            target_hash.to_ascii_lowercase().as_bytes(),
        )
    }

    fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

/// One-way hash used to store account secrets.
///
/// `Sha256` is the plain hex digest format older deployments were provisioned
/// with; `Argon2` produces a salted PHC string and is what `cli-auth` emits
/// by default.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum SecretHasher {
    Argon2,
    Sha256,
}

impl FromStr for SecretHasher {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "argon2" => Ok(SecretHasher::Argon2),
            "sha256" => Ok(SecretHasher::Sha256),
            _ => bail!("Unknown hasher {}", s),
        }
    }
}

impl std::fmt::Display for SecretHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretHasher::Argon2 => write!(f, "argon2"),
            SecretHasher::Sha256 => write!(f, "sha256"),
        }
    }
}

impl SecretHasher {
    /// Picks the hasher that produced `stored_hash`.
    pub fn detect(stored_hash: &str) -> SecretHasher {
        if stored_hash.starts_with("$argon2") {
            SecretHasher::Argon2
        } else {
            SecretHasher::Sha256
        }
    }

    pub fn hash<T: AsRef<str>>(&self, plain: T) -> Result<String> {
        let plain = plain.as_ref().as_bytes();
        match self {
            SecretHasher::Argon2 => media_argon2::hash(plain),
            SecretHasher::Sha256 => Ok(media_sha256::hash(plain)),
        }
    }

    pub fn verify(&self, plain: &str, target_hash: &str) -> Result<bool> {
        let plain = plain.as_bytes();
        match self {
            SecretHasher::Argon2 => media_argon2::verify(plain, target_hash),
            SecretHasher::Sha256 => Ok(media_sha256::verify(plain, target_hash)),
        }
    }
}

/// Source of truth for who may log in.
pub trait CredentialStore: Send + Sync {
    /// Returns the account if `secret` hashes to the stored hash for `username`.
    /// Unknown users and wrong secrets are indistinguishable to the caller.
    fn verify(&self, username: &str, secret: &str) -> Option<Account>;
}

/// Credential store over a fixed list of accounts loaded from configuration.
pub struct StaticCredentialStore {
    accounts: HashMap<String, Account>,
    dummy_hash: String,
}

impl StaticCredentialStore {
    pub fn new(accounts: Vec<Account>) -> Result<Self> {
        let mut by_username = HashMap::with_capacity(accounts.len());
        for account in accounts {
            if account.username.is_empty() {
                bail!("Account usernames cannot be empty.");
            }
            if by_username.contains_key(&account.username) {
                bail!("Duplicate account {}", account.username);
            }
            by_username.insert(account.username.clone(), account);
        }

        // Unknown users are checked against this so that a miss costs the same
        // hash computation as a hit.
        let uses_argon2 = by_username
            .values()
            .any(|a| SecretHasher::detect(&a.secret_hash) == SecretHasher::Argon2);
        let dummy_hasher = if uses_argon2 {
            SecretHasher::Argon2
        } else {
            SecretHasher::Sha256
        };
        let dummy_hash = dummy_hasher.hash("not-a-real-secret")?;

        Ok(Self {
            accounts: by_username,
            dummy_hash,
        })
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl CredentialStore for StaticCredentialStore {
    fn verify(&self, username: &str, secret: &str) -> Option<Account> {
        let (account, target_hash) = match self.accounts.get(username) {
            Some(account) => (Some(account), account.secret_hash.as_str()),
            None => (None, self.dummy_hash.as_str()),
        };

        let hasher = SecretHasher::detect(target_hash);
        let matches = match hasher.verify(secret, target_hash) {
            Ok(matches) => matches,
            Err(err) => {
                warn!("Could not verify secret for {}: {}", username, err);
                false
            }
        };

        match account {
            Some(account) if matches => Some(account.clone()),
            _ => {
                debug!("Credentials rejected for {}", username);
                None
            }
        }
    }
}
