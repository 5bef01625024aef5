use crate::server::{Result, ServerError};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chronicle_common::model::{
    Id,
    auth::{AuthToken, AuthTokenHash},
    user::UserMarker,
};
use chronicle_db::store::Store;
use headers::{Authorization, HeaderMapExt, authorization::Bearer};
use std::{convert::Infallible, sync::Arc};
use time::UtcDateTime;
use tracing::debug;

pub const LOGIN_PATH: &str = "/auth/login/";

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
    token_hash: AuthTokenHash,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.id
    }

    #[must_use]
    pub fn token_hash(&self) -> &AuthTokenHash {
        &self.token_hash
    }
}

/// The identity behind a request, `None` for anonymous requests.
///
/// Inserted into the request extensions by [`resolve_viewer`].
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Viewer(pub Option<AuthenticatedUser>);

impl Viewer {
    #[must_use]
    pub fn user_id(&self) -> Option<Id<UserMarker>> {
        self.0.as_ref().map(AuthenticatedUser::user_id)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Viewer>()
            .and_then(|viewer| viewer.0.clone())
            .ok_or(ServerError::MissingViewer)
    }
}

/// Resolves the bearer token of a request into a [`Viewer`].
///
/// Unknown and expired tokens resolve to an anonymous viewer; tokens that do not parse are rejected.
pub async fn resolve_viewer(
    State(store): State<Arc<dyn Store>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let authorization = request
        .headers()
        .typed_try_get::<Authorization<Bearer>>()
        .map_err(ServerError::InvalidAuthorizationHeader)?;

    let viewer = match authorization {
        Some(authorization) => authenticate(store.as_ref(), authorization.token()).await?,
        None => Viewer(None),
    };

    request.extensions_mut().insert(viewer);

    Ok(next.run(request).await)
}

async fn authenticate(store: &dyn Store, token: &str) -> Result<Viewer> {
    let request_token: AuthToken = token.parse()?;
    let token_hash = request_token.hash()?;

    let Some(authentication) = store.fetch_auth(&token_hash).await? else {
        debug!(user_id = %request_token.user_id, "Unknown auth token");
        return Ok(Viewer(None));
    };

    if authentication.user != request_token.user_id {
        debug!(user_id = %request_token.user_id, "Auth token belongs to another user");
        return Ok(Viewer(None));
    }

    if authentication.is_expired_at(UtcDateTime::now()) {
        store.delete_auth(&token_hash).await?;
        debug!(user_id = %authentication.user, "Removed expired auth token");
        return Ok(Viewer(None));
    }

    Ok(Viewer(Some(AuthenticatedUser {
        id: authentication.user,
        token_hash,
    })))
}

/// Guard layer for login-only routes: anonymous viewers are sent to the login page.
pub async fn require_login(viewer: Viewer, request: Request, next: Next) -> Response {
    if viewer.0.is_some() {
        return next.run(request).await;
    }

    let next_path = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path(), |path_and_query| path_and_query.as_str());

    Redirect::to(&login_url(next_path)).into_response()
}

#[must_use]
pub fn login_url(next: &str) -> String {
    format!("{LOGIN_PATH}?next={}", urlencoding::encode(next))
}
