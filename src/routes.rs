use axum::{middleware, routing::get, Router};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::{acl, AppState};

/// Routes for the PCB tree, mounted under /pcbs when a directory is configured.
fn pcb_routes() -> Router<AppState> {
    Router::new()
        .route("/pcbs", get(handlers::list_pcbs))
        .route("/pcbs/", get(handlers::list_pcbs))
        .route("/pcbs/*path", get(handlers::get_pcb))
}

/// Build the full router: the optional /pcbs tree plus the web UI fallback,
/// all behind the allowlist middleware.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new();

    if state.index.is_some() {
        app = app.merge(pcb_routes());
    }

    let app = match &state.web_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app.fallback(handlers::bundled_ui),
    };

    app.layer(middleware::from_fn_with_state(
        state.clone(),
        acl::require_allowed,
    ))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
