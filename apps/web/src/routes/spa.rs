use std::io::ErrorKind;

use axum::{extract::State, response::Html};

use crate::errors::AppError;
use crate::state::AppState;

/// GET /, /home, /login
/// Serves the SPA shell; the client router picks the view.
pub async fn spa_shell(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let path = state.config.index_html();
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Ok(Html(html)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound(format!(
            "SPA shell {} is missing",
            path.display()
        ))),
        Err(e) => Err(AppError::Internal(anyhow::Error::new(e).context(format!(
            "Failed to read SPA shell {}",
            path.display()
        )))),
    }
}
