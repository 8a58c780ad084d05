use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::index::IndexError;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("403 Forbidden")]
    Forbidden,

    #[error("404 Not Found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index rebuild failed: {0}")]
    Index(#[from] IndexError),
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServeError::Forbidden => StatusCode::FORBIDDEN,
            ServeError::NotFound(_) => StatusCode::NOT_FOUND,
            ServeError::Io(err) if err.kind() == std::io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            ServeError::Io(_) | ServeError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Plain-text bodies; the clients of this server are browsers and
        // scripts that only look at the status line.
        (status, self.to_string()).into_response()
    }
}
