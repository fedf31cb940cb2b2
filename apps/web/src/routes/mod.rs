pub mod health;
pub mod spa;

use axum::{
    body::Body,
    extract::{ws::WebSocketUpgrade, Request, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceExt;

use crate::proxy::{forward, websocket};
use crate::state::AppState;

/// Paths answered with the SPA shell before any proxy or static handling.
pub const SPA_ENTRY_PATHS: [&str; 3] = ["/", "/home", "/login"];

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(health::health_handler));
    for path in SPA_ENTRY_PATHS {
        router = router.route(path, get(spa::spa_shell));
    }
    router.fallback(dispatch).with_state(state)
}

/// Backend-owned prefixes are proxied (upgrading to a WebSocket bridge when
/// asked); everything else is a static asset or the SPA fallback.
async fn dispatch(
    State(state): State<AppState>,
    ws: Option<WebSocketUpgrade>,
    req: Request,
) -> Response {
    let Some(rule) = state.proxy_table.match_path(req.uri().path()) else {
        return serve_static(&state, req).await;
    };

    let result = match ws {
        Some(ws) if rule.supports_websocket => {
            websocket::bridge(ws, rule, req.uri(), req.headers()).await
        }
        _ => forward::forward(&state.http, rule, req).await,
    };
    result.into_response()
}

async fn serve_static(state: &AppState, req: Request) -> Response {
    match state.assets.clone().oneshot(req).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}
