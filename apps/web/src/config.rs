use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Backend origin used for local development when nothing else is configured.
pub const DEV_BACKEND_URL: &str = "http://localhost:8000";

/// Application configuration loaded from environment variables.
/// Built once at startup and never reloaded.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub static_dir: PathBuf,
    pub production: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key: &str| std::env::var(key).ok())
    }

    /// Builds the config from any environment lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let production = is_production(&lookup);
        let backend_url = resolve_backend_url(&lookup);

        if production && backend_url.is_empty() {
            bail!("No backend URL configured: set BACKEND_URL, RENDER_EXTERNAL_URL or BASE_URL");
        }

        Ok(Config {
            backend_url,
            static_dir: lookup("STATIC_DIR")
                .unwrap_or_else(|| "dist/public".to_string())
                .into(),
            production,
            port: lookup("PORT")
                .unwrap_or_else(|| "5000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Path of the SPA shell document inside the static directory.
    pub fn index_html(&self) -> PathBuf {
        self.static_dir.join("index.html")
    }
}

/// Resolves the backend origin. The order is fixed: each later source is a
/// fallback for the ones before it.
///
/// 1. `BACKEND_URL`
/// 2. `RENDER_EXTERNAL_URL`
/// 3. in production, `BASE_URL` or the empty string
/// 4. [`DEV_BACKEND_URL`]
pub fn resolve_backend_url<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let url = non_empty("BACKEND_URL")
        .or_else(|| non_empty("RENDER_EXTERNAL_URL"))
        .unwrap_or_else(|| {
            if is_production(&lookup) {
                non_empty("BASE_URL").unwrap_or_default()
            } else {
                DEV_BACKEND_URL.to_string()
            }
        });

    url.trim().trim_end_matches('/').to_string()
}

fn is_production<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production"))
}
