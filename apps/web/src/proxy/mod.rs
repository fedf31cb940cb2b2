//! Reverse proxy for backend-owned path prefixes.
//!
//! Requests under a prefix in [`ProxyTable`] go to the backend origin with
//! their cookies intact; everything else stays with the static layer.

pub mod forward;
pub mod table;
pub mod websocket;

pub use table::{ProxyRule, ProxyTable, PROXIED_PREFIXES};
