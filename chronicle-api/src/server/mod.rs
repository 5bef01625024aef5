use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
};
use chronicle_common::{
    model::{
        Id,
        auth::{AuthTokenDecodeError, AuthTokenHashError, PasswordHashError},
        group::GroupSlug,
        post::PostMarker,
        user::Username,
    },
    pagination::Paginator,
    util::PositiveDuration,
};
use chronicle_db::store::{DbError, Store};
use json::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

mod auth;
mod forms;
mod json;
mod query;
mod routes;
mod template;
#[cfg(test)]
mod test_util;
mod views;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub settings: Settings,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Settings {
    pub paginator: Paginator,
    /// Lifetime of issued auth tokens; `None` issues tokens that never expire.
    pub token_lifetime: Option<PositiveDuration>,
}

/// The complete service: routes, viewer resolution and request tracing.
pub fn app(state: ServerState) -> Router {
    routes()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::resolve_viewer,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("The authorization header was invalid: {0}")]
    InvalidAuthorizationHeader(headers::Error),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error("Username or password was incorrect")]
    InvalidCredentials,
    #[error("A login-only handler was reached without an authenticated viewer")]
    MissingViewer,
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("Group with slug {0} was not found.")]
    GroupBySlugNotFound(GroupSlug),
    #[error("User with username {0} was not found.")]
    UserByUsernameNotFound(Username),
    #[error("Not following user {0}.")]
    NotFollowing(Username),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::Database(DbError::UnknownPost(_))
            | ServerError::PostByIdNotFound(_)
            | ServerError::GroupBySlugNotFound(_)
            | ServerError::UserByUsernameNotFound(_)
            | ServerError::NotFollowing(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_)
            | ServerError::MissingViewer
            | ServerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(error_response)).into_response()
    }
}
