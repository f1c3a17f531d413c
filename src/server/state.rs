use axum::extract::FromRef;

use crate::catalog::CatalogService;
use crate::playback::StreamProxy;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedCatalogService = Arc<CatalogService>;
pub type GuardedStreamProxy = Arc<StreamProxy>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub catalog: GuardedCatalogService,
    pub stream_proxy: GuardedStreamProxy,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedCatalogService {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog.clone()
    }
}

impl FromRef<ServerState> for GuardedStreamProxy {
    fn from_ref(input: &ServerState) -> Self {
        input.stream_proxy.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
