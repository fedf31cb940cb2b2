use std::sync::Arc;

use reqwest::Client;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::Config;
use crate::proxy::ProxyTable;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Rule table built once from the resolved backend URL; read-only afterwards.
    pub proxy_table: Arc<ProxyTable>,
    /// Upstream HTTP client. Never follows redirects.
    pub http: Client,
    /// Built SPA assets, falling back to the shell for client-side routes.
    pub assets: ServeDir<ServeFile>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let proxy_table = Arc::new(ProxyTable::new(&config.backend_url));
        let http = crate::proxy::forward::build_client()?;
        let assets = ServeDir::new(&config.static_dir).fallback(ServeFile::new(config.index_html()));
        Ok(Self {
            config,
            proxy_table,
            http,
            assets,
        })
    }
}
