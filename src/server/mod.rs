pub mod config;
pub mod error;
mod http_layers;
pub mod media_routes;
pub mod metrics;
pub mod server;
pub mod session;
pub mod settings_routes;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
