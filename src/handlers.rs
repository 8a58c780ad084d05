use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::error::ServeError;
use crate::index::{IndexSnapshot, PcbIndex};
use crate::AppState;

/// Bundled web UI, used when no override directory is configured.
const INDEX_HTML: &str = include_str!("../web/index.html");
const APP_JS: &str = include_str!("../web/app.js");
const STYLE_CSS: &str = include_str!("../web/style.css");

/// Query parameters for the PCB listing endpoint
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Rescan the PCB directory before answering (`?refresh`)
    pub refresh: Option<String>,
}

fn pcb_index(state: &AppState) -> Result<&Arc<PcbIndex>, ServeError> {
    // The /pcbs routes are only mounted when a directory is configured, so
    // this is unreachable in practice.
    state
        .index
        .as_ref()
        .ok_or_else(|| ServeError::NotFound("pcbs".to_string()))
}

/// GET /pcbs/ - JSON listing of indexed files, optionally rebuilding first.
pub async fn list_pcbs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ServeError> {
    let index = pcb_index(&state)?;

    let snapshot: Arc<IndexSnapshot> = if query.refresh.is_some() {
        let index = index.clone();
        tokio::task::spawn_blocking(move || index.rebuild())
            .await
            .map_err(|err| {
                ServeError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    err.to_string(),
                ))
            })??
    } else {
        index.snapshot()
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        snapshot.json.clone(),
    )
        .into_response())
}

/// GET /pcbs/{path} - Stream one indexed file.
///
/// Only paths present in the current index snapshot are served; anything else
/// is rejected outright. Membership also doubles as the traversal guard, since
/// every indexed path came out of our own walk of the tree.
pub async fn get_pcb(
    State(state): State<AppState>,
    Path(rel_path): Path<String>,
) -> Result<Response, ServeError> {
    let index = pcb_index(&state)?;

    if !index.snapshot().contains(&rel_path) {
        warn!("rejecting request for unindexed path {rel_path:?}");
        return Err(ServeError::Forbidden);
    }

    let path = index.root().join(&rel_path);
    debug!("streaming PCB file: {}", path.display());

    let metadata = fs::metadata(&path).await?;
    let file = fs::File::open(&path).await?;
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let mime = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
        ],
        body,
    )
        .into_response())
}

/// Fallback handler serving the bundled web UI.
pub async fn bundled_ui(uri: Uri) -> Response {
    match uri.path() {
        "/" | "/index.html" => Html(INDEX_HTML).into_response(),
        "/app.js" => ([(header::CONTENT_TYPE, "text/javascript")], APP_JS).into_response(),
        "/style.css" => ([(header::CONTENT_TYPE, "text/css")], STYLE_CSS).into_response(),
        other => ServeError::NotFound(other.to_string()).into_response(),
    }
}
