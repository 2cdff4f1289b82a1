//! Account settings document: the named playlists of one account.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("duplicate playlist name: {0}")]
    DuplicatePlaylistName(String),

    #[error("playlist names cannot be empty")]
    EmptyPlaylistName,

    #[error("invalid account name: {0}")]
    InvalidAccountName(String),

    #[error("settings storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SettingsError {
    /// True for errors caused by the submitted document rather than by storage.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SettingsError::DuplicatePlaylistName(_)
                | SettingsError::EmptyPlaylistName
                | SettingsError::InvalidAccountName(_)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    #[serde(default)]
    pub songs: Vec<String>,
}

impl Playlist {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            songs: vec![],
        }
    }

    /// Appends `song` unless it is already in the playlist.
    /// Returns whether the playlist changed.
    pub fn add_song<T: Into<String>>(&mut self, song: T) -> bool {
        let song = song.into();
        if self.contains(&song) {
            return false;
        }
        self.songs.push(song);
        true
    }

    /// Removes every occurrence of `song`. Returns whether the playlist changed.
    pub fn remove_song(&mut self, song: &str) -> bool {
        let before = self.songs.len();
        self.songs.retain(|s| s != song);
        self.songs.len() != before
    }

    pub fn contains(&self, song: &str) -> bool {
        self.songs.iter().any(|s| s == song)
    }

    fn dedup_songs(&mut self) {
        let mut seen = HashSet::with_capacity(self.songs.len());
        self.songs.retain(|s| seen.insert(s.clone()));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSettings {
    #[serde(default)]
    pub playlists: Vec<Playlist>,
}

impl AccountSettings {
    pub fn new(playlists: Vec<Playlist>) -> Self {
        Self { playlists }
    }

    pub fn playlist(&self, name: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.name == name)
    }

    pub fn playlist_mut(&mut self, name: &str) -> Option<&mut Playlist> {
        self.playlists.iter_mut().find(|p| p.name == name)
    }

    /// Checks that every playlist has a non-empty name unique within the document.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut names = HashSet::with_capacity(self.playlists.len());
        for playlist in &self.playlists {
            if playlist.name.trim().is_empty() {
                return Err(SettingsError::EmptyPlaylistName);
            }
            if !names.insert(playlist.name.as_str()) {
                return Err(SettingsError::DuplicatePlaylistName(playlist.name.clone()));
            }
        }
        Ok(())
    }

    /// Validates the document and drops repeated songs, keeping the first
    /// occurrence of each.
    pub fn normalized(mut self) -> Result<Self, SettingsError> {
        self.validate()?;
        for playlist in &mut self.playlists {
            playlist.dedup_songs();
        }
        Ok(self)
    }

    /// Removes `song` from every playlist. Returns whether anything changed.
    pub fn prune_song(&mut self, song: &str) -> bool {
        let mut changed = false;
        for playlist in &mut self.playlists {
            changed |= playlist.remove_song(song);
        }
        changed
    }
}
