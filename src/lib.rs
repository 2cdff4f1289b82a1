//! Media Display Server Library
//!
//! Controllers upload media, curate playlists and pick the item that display
//! clients poll and render. This library exposes the internal modules for
//! the server binary, the controller/display clients and the tests.

pub mod blob_store;
pub mod client;
pub mod config;
pub mod names;
pub mod selection;
pub mod server;
pub mod user;

// Re-export commonly used types for convenience
pub use blob_store::{BlobStore, FsBlobStore};
pub use selection::SelectionRegister;
pub use server::{run_server, RequestsLoggingLevel};
pub use user::{
    Account, CredentialStore, FilePlaylistStore, PlaylistStore, StaticCredentialStore,
    TokenService,
};
