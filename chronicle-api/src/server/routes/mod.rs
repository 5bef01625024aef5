use crate::server::{ServerRouter, auth::require_login};
use axum::{Router, middleware};

mod about;
mod follows;
mod groups;
mod posts;
mod profiles;
mod users;

/// Public routes merged with the login-only routes behind [`require_login`].
pub fn routes() -> ServerRouter {
    let protected = Router::new()
        .merge(posts::protected_routes())
        .merge(follows::routes())
        .merge(users::protected_routes())
        .route_layer(middleware::from_fn(require_login));

    Router::new()
        .merge(posts::routes())
        .merge(groups::routes())
        .merge(profiles::routes())
        .merge(users::routes())
        .merge(about::routes())
        .merge(protected)
}
