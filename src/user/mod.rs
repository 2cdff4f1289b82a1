pub mod auth;
mod playlist_store;
pub mod settings;
pub mod token;

pub use auth::{Account, CredentialStore, SecretHasher, StaticCredentialStore};
pub use playlist_store::{FilePlaylistStore, PlaylistStore, PruneReport};
pub use settings::{AccountSettings, Playlist, SettingsError};
pub use token::{
    Clock, ManualClock, SessionToken, SystemClock, TokenError, TokenService, VerifiedToken,
    DEFAULT_TOKEN_TTL,
};
