use axum::extract::FromRef;

use crate::blob_store::BlobStore;
use crate::selection::SelectionRegister;
use crate::user::{CredentialStore, PlaylistStore, TokenService};
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedCredentialStore = Arc<dyn CredentialStore>;
pub type GuardedTokenService = Arc<TokenService>;
pub type GuardedSelection = Arc<SelectionRegister>;
pub type GuardedPlaylistStore = Arc<dyn PlaylistStore>;
pub type GuardedBlobStore = Arc<dyn BlobStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub credentials: GuardedCredentialStore,
    pub tokens: GuardedTokenService,
    pub selection: GuardedSelection,
    pub playlists: GuardedPlaylistStore,
    pub blobs: GuardedBlobStore,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        credentials: GuardedCredentialStore,
        tokens: GuardedTokenService,
        selection: GuardedSelection,
        playlists: GuardedPlaylistStore,
        blobs: GuardedBlobStore,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            hash: env!("GIT_HASH").to_owned(),
            credentials,
            tokens,
            selection,
            playlists,
            blobs,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedCredentialStore {
    fn from_ref(input: &ServerState) -> Self {
        input.credentials.clone()
    }
}

impl FromRef<ServerState> for GuardedTokenService {
    fn from_ref(input: &ServerState) -> Self {
        input.tokens.clone()
    }
}

impl FromRef<ServerState> for GuardedSelection {
    fn from_ref(input: &ServerState) -> Self {
        input.selection.clone()
    }
}

impl FromRef<ServerState> for GuardedPlaylistStore {
    fn from_ref(input: &ServerState) -> Self {
        input.playlists.clone()
    }
}

impl FromRef<ServerState> for GuardedBlobStore {
    fn from_ref(input: &ServerState) -> Self {
        input.blobs.clone()
    }
}
