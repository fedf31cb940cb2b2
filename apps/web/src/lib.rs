//! GrowIQ web gateway.
//!
//! Serves the single-page application, forwards backend-owned prefixes to the
//! backend origin, and provides the navigation transition coordinator used by
//! page transitions.

pub mod config;
pub mod errors;
pub mod proxy;
pub mod routes;
pub mod state;
pub mod transition;
