use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

/// Everything that can go wrong while serving a repository request. The
/// endpoints return this directly; the HTTP status mapping lives here so no
/// handler invents its own.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("not a valid Maven repository path: {0}")]
    InvalidRequest(String),

    #[error("artifact not found in any configured repository")]
    NotFound,

    #[error("resolution did not complete within the configured deadline")]
    Timeout,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            ProxyError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("internal error handling repository request: {:#}", self);
        }
        (status, self.to_string()).into_response()
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;
