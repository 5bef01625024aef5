use crate::server::{
    Result, ServerError, ServerRouter, Settings,
    query::{PageQuery, Query},
    template::Template,
    views::GroupListView,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use chronicle_common::model::{group::GroupSlug, post::PostFilter};
use chronicle_db::{feed::fetch_post_page, store::Store};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(group_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(ServerError))]
struct GroupPath {
    slug: GroupSlug,
}

async fn group_posts(
    GroupPath { slug }: GroupPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Settings>,
    Query(page): Query<PageQuery>,
) -> Result<Template<GroupListView>> {
    let group = store
        .fetch_group_by_slug(&slug)
        .await?
        .ok_or(ServerError::GroupBySlugNotFound(slug))?;

    let page_obj = fetch_post_page(
        store.as_ref(),
        PostFilter::Group(group.id),
        settings.paginator,
        page.requested(),
    )
    .await?;

    Ok(Template(GroupListView {
        title: group.title.clone(),
        posts_amount: page_obj.count,
        group,
        page_obj,
    }))
}
