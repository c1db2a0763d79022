pub mod response;

use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::ALLOW;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use tower_http::trace::TraceLayer;

use crate::error::VfsError;
use crate::service::conditional::Preconditions;
use crate::service::vfs::VfsRequest;
use crate::utils::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // `/{*tail}` does not match the bare root.
        .route("/", any(dispatch_handler))
        .route("/{*tail}", any(dispatch_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn dispatch_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, VfsError> {
    let (parts, body) = request.into_parts();
    let vfs_request = VfsRequest::new(parts.uri.path())
        .with_query(parts.uri.query())
        .with_preconditions(Preconditions::from_headers(&parts.headers));

    match parts.method {
        // Read a file or list a directory
        Method::GET => {
            let outcome = state.vfs.read(&vfs_request).await?;
            response::read_response(outcome, false).await
        }
        Method::HEAD => {
            let outcome = state.vfs.read(&vfs_request).await?;
            response::read_response(outcome, true).await
        }
        // Create or replace a file
        Method::PUT => {
            let outcome = state
                .vfs
                .write(&vfs_request, body.into_data_stream())
                .await?;
            Ok(response::write_response(outcome, &vfs_request))
        }
        // Delete a file or an empty directory
        Method::DELETE => {
            let outcome = state.vfs.delete(&vfs_request).await?;
            Ok(response::delete_response(outcome))
        }
        // Unsupported methods
        _ => Ok((
            StatusCode::METHOD_NOT_ALLOWED,
            [(ALLOW, "GET, HEAD, PUT, DELETE")],
        )
            .into_response()),
    }
}
