pub mod config;
mod error;
pub mod metrics;
mod music_routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{build_server_state, make_app, make_metrics_app, run_server};
pub use state::ServerState;
