use crate::server::{
    Result, ServerError, ServerRouter, Settings,
    auth::Viewer,
    query::{PageQuery, Query},
    template::Template,
    views::ProfileView,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use chronicle_common::model::{
    follow::Follow,
    post::PostFilter,
    user::{User, Username},
};
use chronicle_db::{feed::fetch_post_page, store::Store};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(profile)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/", rejection(ServerError))]
pub(crate) struct ProfilePath {
    pub(crate) username: Username,
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Settings>,
    viewer: Viewer,
    Query(page): Query<PageQuery>,
) -> Result<Template<ProfileView>> {
    let author = fetch_user_by_username(store.as_ref(), username).await?;

    let page_obj = fetch_post_page(
        store.as_ref(),
        PostFilter::Author(author.id),
        settings.paginator,
        page.requested(),
    )
    .await?;

    let following = match viewer
        .user_id()
        .and_then(|viewer_id| Follow::new(viewer_id, author.id))
    {
        Some(follow) => store.is_following(follow).await?,
        None => false,
    };

    Ok(Template(ProfileView {
        title: format!("Profile of {}", author.display_name()),
        posts_amount: page_obj.count,
        author,
        page_obj,
        following,
    }))
}

pub(crate) async fn fetch_user_by_username(store: &dyn Store, username: Username) -> Result<User> {
    store
        .fetch_user_by_username(&username)
        .await?
        .ok_or(ServerError::UserByUsernameNotFound(username))
}
