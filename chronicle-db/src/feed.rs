//! Paginated post listings.
//!
//! Every listing (global, group, profile and the follow feed) is a filter,
//! a count and one window of the most-recent-first sequence.

use crate::store::{Result, Store};
use chronicle_common::{
    model::{
        Id,
        post::{Post, PostFilter},
        user::UserMarker,
    },
    pagination::{Page, Paginator},
};

pub async fn fetch_post_page(
    store: &dyn Store,
    filter: PostFilter,
    paginator: Paginator,
    requested_page: Option<&str>,
) -> Result<Page<Post>> {
    let count = store.count_posts(filter).await?;
    let window = paginator.window(count, requested_page);
    let posts = store
        .list_posts(filter, window.offset(), window.limit())
        .await?;

    Ok(Page::new(posts, window))
}

/// Posts by every author `viewer` follows. Following nobody yields an empty page.
pub async fn fetch_follow_feed(
    store: &dyn Store,
    viewer: Id<UserMarker>,
    paginator: Paginator,
    requested_page: Option<&str>,
) -> Result<Page<Post>> {
    fetch_post_page(
        store,
        PostFilter::FollowedBy(viewer),
        paginator,
        requested_page,
    )
    .await
}
