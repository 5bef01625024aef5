use crate::server::{
    Result, ServerError, ServerRouter, Settings,
    auth::AuthenticatedUser,
    query::{PageQuery, Query},
    routes::profiles::{ProfilePath, fetch_user_by_username},
    template::Template,
    views::{FollowView, LATEST_UPDATES},
};
use axum::{extract::State, response::Redirect};
use axum_extra::routing::{RouterExt, TypedPath};
use chronicle_common::model::{follow::Follow, user::Username};
use chronicle_db::{feed::fetch_follow_feed, store::Store};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(follow_index)
        .typed_get(follow)
        .typed_get(unfollow)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follow/")]
struct FollowIndexPath;

async fn follow_index(
    _: FollowIndexPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Settings>,
    user: AuthenticatedUser,
    Query(page): Query<PageQuery>,
) -> Result<Template<FollowView>> {
    let page_obj = fetch_follow_feed(
        store.as_ref(),
        user.user_id(),
        settings.paginator,
        page.requested(),
    )
    .await?;

    Ok(Template(FollowView {
        title: LATEST_UPDATES,
        page_obj,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/follow/", rejection(ServerError))]
struct FollowPath {
    username: Username,
}

async fn follow(
    FollowPath { username }: FollowPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Redirect> {
    let author = fetch_user_by_username(store.as_ref(), username).await?;

    match Follow::new(user.user_id(), author.id) {
        Some(follow) => {
            if store.create_follow(follow).await? {
                info!(follower = %follow.follower(), author = %follow.author(), "Created follow");
            } else {
                debug!(follower = %follow.follower(), author = %follow.author(), "Already following");
            }
        }
        None => debug!(user_id = %author.id, "Ignored self-follow"),
    }

    Ok(redirect_to_profile(author.username))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/unfollow/", rejection(ServerError))]
struct UnfollowPath {
    username: Username,
}

async fn unfollow(
    UnfollowPath { username }: UnfollowPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Redirect> {
    let author = fetch_user_by_username(store.as_ref(), username).await?;

    let removed = match Follow::new(user.user_id(), author.id) {
        Some(follow) => store.delete_follow(follow).await?,
        None => false,
    };
    if !removed {
        return Err(ServerError::NotFollowing(author.username));
    }
    info!(follower = %user.user_id(), author = %author.id, "Removed follow");

    Ok(redirect_to_profile(author.username))
}

fn redirect_to_profile(username: Username) -> Redirect {
    Redirect::to(&ProfilePath { username }.to_string())
}

#[cfg(test)]
mod tests {
    use crate::server::test_util::{TestApp, body_json, location};
    use axum::http::StatusCode;
    use chronicle_common::model::follow::Follow;
    use chronicle_db::store::Store;

    #[tokio::test]
    async fn feed_follows_the_edges() {
        let app = TestApp::new();
        let leo = app.user("leo").await;
        let anna = app.user("anna").await;
        let kitty = app.user("kitty").await;
        app.publish(&anna, "anna one", None).await;
        app.publish(&anna, "anna two", None).await;
        app.publish(&kitty, "kitty", None).await;
        let token = app.login(&leo).await;

        let body = body_json(app.get("/follow/", Some(&token)).await).await;
        assert_eq!(body["template"], "posts/follow.html");
        assert!(body["context"]["page_obj"]["items"].as_array().unwrap().is_empty());

        let response = app.get("/profile/anna/follow/", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/profile/anna/");

        let body = body_json(app.get("/follow/", Some(&token)).await).await;
        let items = body["context"]["page_obj"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|post| post["author"]["username"] == "anna"));

        let response = app.get("/profile/anna/unfollow/", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/profile/anna/");

        let body = body_json(app.get("/follow/", Some(&token)).await).await;
        assert!(body["context"]["page_obj"]["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn following_twice_keeps_one_edge() {
        let app = TestApp::new();
        let leo = app.user("leo").await;
        let anna = app.user("anna").await;
        let token = app.login(&leo).await;

        app.get("/profile/anna/follow/", Some(&token)).await;
        app.get("/profile/anna/follow/", Some(&token)).await;

        let follow = Follow::new(leo.id, anna.id).unwrap();
        assert!(app.store.is_following(follow).await.unwrap());
        assert!(app.store.delete_follow(follow).await.unwrap());
        assert!(!app.store.is_following(follow).await.unwrap());
    }

    #[tokio::test]
    async fn self_follow_is_ignored() {
        let app = TestApp::new();
        let leo = app.user("leo").await;
        app.publish(&leo, "mine", None).await;
        let token = app.login(&leo).await;

        let response = app.get("/profile/leo/follow/", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/profile/leo/");

        let body = body_json(app.get("/follow/", Some(&token)).await).await;
        assert!(body["context"]["page_obj"]["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unfollow_without_edge_is_not_found() {
        let app = TestApp::new();
        let leo = app.user("leo").await;
        let anna = app.user("anna").await;
        let token = app.login(&leo).await;

        let response = app.get("/profile/anna/unfollow/", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(
            !app.store
                .is_following(Follow::new(leo.id, anna.id).unwrap())
                .await
                .unwrap()
        );

        let response = app.get("/profile/nobody/follow/", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn follow_routes_require_login() {
        let app = TestApp::new();
        app.user("anna").await;

        let response = app.get("/follow/?page=2", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            "/auth/login/?next=%2Ffollow%2F%3Fpage%3D2"
        );

        let response = app.get("/profile/anna/follow/", None).await;
        assert_eq!(
            location(&response),
            "/auth/login/?next=%2Fprofile%2Fanna%2Ffollow%2F"
        );
    }
}
