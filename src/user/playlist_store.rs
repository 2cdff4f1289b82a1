//! Persistence of account settings documents.
//!
//! Every account owns one JSON document under the settings directory, named
//! `<account>.json`. Documents are only ever replaced as a whole. Writes go to
//! a temporary file in the same directory that is then renamed over the
//! target, so readers observe either the old or the new document.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::settings::{AccountSettings, SettingsError};
use crate::names::is_safe_name;

const SETTINGS_EXTENSION: &str = "json";

/// Outcome of removing a media reference from every account.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    /// Accounts whose document changed and was saved.
    pub updated: Vec<String>,
    /// Accounts whose document could not be read or written, with the reason.
    pub failed: Vec<(String, String)>,
}

impl PruneReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub trait PlaylistStore: Send + Sync {
    /// Returns the account's document, or Ok(None) if it was never created.
    fn get(&self, account: &str) -> Result<Option<AccountSettings>, SettingsError>;

    /// Validates and stores `settings` as the account's whole document.
    /// Returns the document as stored, with repeated songs dropped.
    fn replace(
        &self,
        account: &str,
        settings: AccountSettings,
    ) -> Result<AccountSettings, SettingsError>;

    /// Removes `media_name` from every playlist of every account.
    /// A broken document is reported and skipped, it never stops the others.
    fn prune_reference(&self, media_name: &str) -> PruneReport;
}

pub struct FilePlaylistStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FilePlaylistStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Could not create settings directory {:?}", dir))?;
        info!("Account settings stored in {:?}", dir);
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, account: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", account, SETTINGS_EXTENSION))
    }

    fn lock_for(&self, account: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(account.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn check_account(account: &str) -> Result<(), SettingsError> {
        if is_safe_name(account) {
            Ok(())
        } else {
            Err(SettingsError::InvalidAccountName(account.to_string()))
        }
    }

    fn read_document(&self, account: &str) -> Result<Option<AccountSettings>, SettingsError> {
        let content = match fs::read_to_string(self.document_path(account)) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write_document(
        &self,
        account: &str,
        settings: &AccountSettings,
    ) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(settings)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.document_path(account))
            .map_err(|err| err.error)?;
        Ok(())
    }

    /// Names of every account that has a settings document.
    fn stored_accounts(&self) -> std::io::Result<Vec<String>> {
        let mut accounts = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SETTINGS_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_safe_name(stem) {
                    accounts.push(stem.to_string());
                }
            }
        }
        accounts.sort();
        Ok(accounts)
    }

    fn prune_account(&self, account: &str, media_name: &str) -> Result<bool, SettingsError> {
        let lock = self.lock_for(account);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut settings = match self.read_document(account)? {
            Some(settings) => settings,
            None => return Ok(false),
        };
        if !settings.prune_song(media_name) {
            return Ok(false);
        }
        self.write_document(account, &settings)?;
        Ok(true)
    }
}

impl PlaylistStore for FilePlaylistStore {
    fn get(&self, account: &str) -> Result<Option<AccountSettings>, SettingsError> {
        Self::check_account(account)?;
        let lock = self.lock_for(account);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_document(account)
    }

    fn replace(
        &self,
        account: &str,
        settings: AccountSettings,
    ) -> Result<AccountSettings, SettingsError> {
        Self::check_account(account)?;
        let settings = settings.normalized()?;

        let lock = self.lock_for(account);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_document(account, &settings)?;
        debug!(
            "Saved {} playlists for account {}",
            settings.playlists.len(),
            account
        );
        Ok(settings)
    }

    fn prune_reference(&self, media_name: &str) -> PruneReport {
        let mut report = PruneReport::default();

        let accounts = match self.stored_accounts() {
            Ok(accounts) => accounts,
            Err(err) => {
                warn!("Could not list settings directory {:?}: {}", self.dir, err);
                report.failed.push(("*".to_string(), err.to_string()));
                return report;
            }
        };

        for account in accounts {
            match self.prune_account(&account, media_name) {
                Ok(true) => {
                    debug!("Removed {} from playlists of {}", media_name, account);
                    report.updated.push(account);
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        "Could not remove {} from playlists of {}: {}",
                        media_name, account, err
                    );
                    report.failed.push((account, err.to_string()));
                }
            }
        }

        report
    }
}
