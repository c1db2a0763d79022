use std::io;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

pub type VfsResult<T> = Result<T, VfsError>;

#[derive(Error, Debug)]
pub enum VfsError {
    /// The request path cannot be resolved inside the root.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Directory mutation, concurrent modification, or a failed delete.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Unexpected(#[from] io::Error),
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NameUnknown,
    Conflict,
    Internal,
}

impl VfsError {
    /// Classify an I/O failure that happened while touching `what`.
    ///
    /// `NotFound` keeps its meaning, lock contention and "already exists"
    /// races become conflicts, everything else is unexpected.
    pub fn from_io(err: io::Error, what: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
                VfsError::NotFound(what.to_string())
            }
            io::ErrorKind::AlreadyExists
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::IsADirectory => {
                VfsError::Conflict(format!("{what} is in use or was replaced"))
            }
            _ => VfsError::Unexpected(err),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPath(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidPath(_) | Self::NotFound(_) => ErrorCode::NameUnknown,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::Unexpected(_) => ErrorCode::Internal,
        }
    }

    /// Message safe to show to clients. Invalid paths read like missing ones
    /// so the layout around the root is not revealed.
    fn public_message(&self) -> String {
        match self {
            Self::InvalidPath(_) => "resource not found".to_string(),
            Self::NotFound(_) => "resource not found".to_string(),
            Self::Conflict(reason) => reason.clone(),
            Self::Unexpected(_) => "an internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for VfsError {
    fn into_response(self) -> Response {
        match &self {
            Self::Unexpected(err) => tracing::error!("unexpected filesystem failure: {err:?}"),
            other => tracing::debug!("generating response for VfsError: {other}"),
        }

        let body = json!({
            "errors": [{
                "code": self.code(),
                "message": self.public_message(),
            }]
        });
        (self.status_code(), Json(body)).into_response()
    }
}
