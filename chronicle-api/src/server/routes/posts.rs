use crate::server::{
    Result, ServerError, ServerRouter, Settings,
    auth::AuthenticatedUser,
    forms::{BoundForm, CommentForm, PostForm},
    json::Json,
    query::{PageQuery, Query},
    routes::profiles::ProfilePath,
    template::Template,
    views::{IndexView, LATEST_UPDATES, PostDetailView, PostFormView},
};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use chronicle_common::model::{
    Id,
    comment::NewComment,
    post::{Post, PostFilter, PostMarker},
};
use chronicle_db::{feed::fetch_post_page, store::Store};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(index)
        .typed_get(post_detail)
}

pub fn protected_routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(create_form)
        .typed_post(create_post)
        .typed_get(edit_form)
        .typed_post(edit_post)
        .typed_post(add_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/")]
struct IndexPath;

async fn index(
    _: IndexPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Settings>,
    Query(page): Query<PageQuery>,
) -> Result<Template<IndexView>> {
    let page_obj = fetch_post_page(
        store.as_ref(),
        PostFilter::All,
        settings.paginator,
        page.requested(),
    )
    .await?;

    Ok(Template(IndexView {
        title: LATEST_UPDATES,
        page_obj,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/", rejection(ServerError))]
struct PostDetailPath {
    id: Id<PostMarker>,
}

async fn post_detail(
    PostDetailPath { id }: PostDetailPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Template<PostDetailView>> {
    let post = fetch_post(store.as_ref(), id).await?;
    let posts_amount = store.count_posts(PostFilter::Author(post.author.id)).await?;
    let comments = store.list_comments(id).await?;

    Ok(Template(PostDetailView {
        title: PostDetailView::title_for(&post),
        post,
        posts_amount,
        comments,
        form: BoundForm::default(),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/create/")]
struct CreatePath;

async fn create_form(_: CreatePath, State(store): State<Arc<dyn Store>>) -> Result<Response> {
    post_form(store.as_ref(), BoundForm::default(), None).await
}

async fn create_post(
    _: CreatePath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(form): Json<PostForm>,
) -> Result<Response> {
    let content = match form.clean(store.as_ref(), None).await? {
        Ok(content) => content,
        Err(errors) => {
            debug!(user_id = %user.user_id(), "Rejected invalid post form");
            return post_form(store.as_ref(), BoundForm::with_errors(form, errors), None).await;
        }
    };

    let post = store.create_post(user.user_id(), &content).await?;
    info!(post_id = %post.id, user_id = %post.author.id, "Created post");

    let profile = ProfilePath {
        username: post.author.username,
    };
    Ok(Redirect::to(&profile.to_string()).into_response())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/edit/", rejection(ServerError))]
struct EditPostPath {
    id: Id<PostMarker>,
}

async fn edit_form(
    EditPostPath { id }: EditPostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Response> {
    let post = fetch_post(store.as_ref(), id).await?;
    if let Some(redirect) = edit_gate(&post, &user) {
        return Ok(redirect.into_response());
    }

    let form = BoundForm::unbound(PostForm::from_post(&post));
    post_form(store.as_ref(), form, Some(post)).await
}

async fn edit_post(
    EditPostPath { id }: EditPostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    form: Result<Json<PostForm>, ServerError>,
) -> Result<Response> {
    let post = fetch_post(store.as_ref(), id).await?;
    if let Some(redirect) = edit_gate(&post, &user) {
        return Ok(redirect.into_response());
    }
    let Json(form) = form?;

    let content = match form.clean(store.as_ref(), post.image.as_ref()).await? {
        Ok(content) => content,
        Err(errors) => {
            debug!(post_id = %id, "Rejected invalid post form");
            let form = BoundForm::with_errors(form, errors);
            return post_form(store.as_ref(), form, Some(post)).await;
        }
    };

    store
        .update_post(id, &content)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    info!(post_id = %id, "Edited post");

    Ok(Redirect::to(&PostDetailPath { id }.to_string()).into_response())
}

/// Only the author may edit a post. Everybody else is sent to the read-only detail view.
fn edit_gate(post: &Post, user: &AuthenticatedUser) -> Option<Redirect> {
    (post.author.id != user.user_id()).then(|| {
        debug!(post_id = %post.id, user_id = %user.user_id(), "Edit by non-author redirected");
        Redirect::to(&PostDetailPath { id: post.id }.to_string())
    })
}

async fn post_form(
    store: &dyn Store,
    form: BoundForm<PostForm>,
    post: Option<Post>,
) -> Result<Response> {
    let groups = store.list_groups().await?;

    Ok(Template(PostFormView {
        form,
        groups,
        is_edit: post.is_some(),
        post,
    })
    .into_response())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comment/", rejection(ServerError))]
struct AddCommentPath {
    id: Id<PostMarker>,
}

async fn add_comment(
    AddCommentPath { id }: AddCommentPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(form): Json<CommentForm>,
) -> Result<Redirect> {
    fetch_post(store.as_ref(), id).await?;

    match form.clean() {
        Ok(text) => {
            let comment = store
                .create_comment(&NewComment {
                    post: id,
                    author: user.user_id(),
                    text,
                })
                .await?;
            info!(comment_id = %comment.id, post_id = %id, "Added comment");
        }
        Err(_) => debug!(post_id = %id, "Dropped blank comment"),
    }

    Ok(Redirect::to(&PostDetailPath { id }.to_string()))
}

async fn fetch_post(store: &dyn Store, id: Id<PostMarker>) -> Result<Post> {
    store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))
}

#[cfg(test)]
mod tests {
    use crate::server::test_util::{TestApp, body_json, location};
    use axum::http::StatusCode;
    use chronicle_common::model::post::PostFilter;
    use chronicle_db::store::Store;
    use serde_json::json;

    #[tokio::test]
    async fn index_paginates_most_recent_first() {
        let app = TestApp::new();
        let leo = app.user("leo").await;
        for number in 0..13 {
            app.publish(&leo, &format!("post {number}"), None).await;
        }

        let response = app.get("/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["template"], "posts/index.html");
        assert_eq!(body["context"]["title"], "Latest updates");
        let page = &body["context"]["page_obj"];
        assert_eq!(page["items"].as_array().unwrap().len(), 10);
        assert_eq!(page["items"][0]["text"], "post 12");
        assert_eq!(page["has_next"], true);

        let body = body_json(app.get("/?page=2", None).await).await;
        let page = &body["context"]["page_obj"];
        assert_eq!(page["number"], 2);
        assert_eq!(page["items"].as_array().unwrap().len(), 3);

        let body = body_json(app.get("/?page=99", None).await).await;
        assert_eq!(body["context"]["page_obj"]["number"], 2);

        let body = body_json(app.get("/?page=abc", None).await).await;
        assert_eq!(body["context"]["page_obj"]["number"], 1);
    }

    #[tokio::test]
    async fn post_detail_lists_comments_and_author_count() {
        let app = TestApp::new();
        let leo = app.user("leo").await;
        let anna = app.user("anna").await;
        let post = app
            .publish(&leo, "A rather long first post about many things", None)
            .await;
        app.publish(&leo, "second", None).await;
        app.publish(&anna, "other", None).await;
        let token = app.login(&anna).await;

        let response = app
            .post_json(
                &format!("/posts/{}/comment/", post.id),
                Some(&token),
                json!({ "text": "Nice!" }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), format!("/posts/{}/", post.id));

        let body = body_json(app.get(&format!("/posts/{}/", post.id), None).await).await;
        let context = &body["context"];
        assert_eq!(body["template"], "posts/post_detail.html");
        assert_eq!(context["title"], "Post A rather long first post about");
        assert_eq!(context["posts_amount"], 2);
        assert_eq!(context["comments"].as_array().unwrap().len(), 1);
        assert_eq!(context["comments"][0]["author"]["username"], "anna");
        assert_eq!(context["comments"][0]["text"], "Nice!");
    }

    #[tokio::test]
    async fn unknown_or_malformed_post_is_not_found() {
        let app = TestApp::new();

        let response = app.get("/posts/404/", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({ "status": 404 }));

        let response = app.get("/posts/abc/", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.get("/no/such/page/", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn anonymous_create_redirects_to_login() {
        let app = TestApp::new();

        let response = app
            .post_json("/create/", None, json!({ "text": "Hello" }))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login/?next=%2Fcreate%2F");
        assert_eq!(app.store.count_posts(PostFilter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_post_redirects_to_profile() {
        let app = TestApp::new();
        let leo = app.user("leo").await;
        let cats = app.group("cats");
        let token = app.login(&leo).await;

        let form = app.get("/create/", Some(&token)).await;
        let form = body_json(form).await;
        assert_eq!(form["template"], "posts/create.html");
        assert_eq!(form["context"]["is_edit"], false);
        assert_eq!(form["context"]["groups"][0]["slug"], "cats");

        let response = app
            .post_json(
                "/create/",
                Some(&token),
                json!({ "text": " Hello ", "group": cats.id }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/profile/leo/");

        let posts = app.store.list_posts(PostFilter::All, 0, 10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].text.get(), "Hello");
        assert_eq!(posts[0].author, leo);
        assert_eq!(posts[0].group, Some(cats));
    }

    #[tokio::test]
    async fn invalid_post_form_is_redisplayed() {
        let app = TestApp::new();
        let leo = app.user("leo").await;
        let token = app.login(&leo).await;

        let response = app
            .post_json("/create/", Some(&token), json!({ "text": "  ", "group": 77 }))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let form = &body["context"]["form"];
        assert_eq!(form["values"]["group"], 77);
        assert_eq!(form["errors"]["text"][0], "This field is required.");
        assert!(form["errors"]["group"].is_array());
        assert_eq!(app.store.count_posts(PostFilter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn only_the_author_can_edit() {
        let app = TestApp::new();
        let leo = app.user("leo").await;
        let anna = app.user("anna").await;
        let post = app.publish(&leo, "original", None).await;
        let detail = format!("/posts/{}/", post.id);
        let edit = format!("/posts/{}/edit/", post.id);

        let anna_token = app.login(&anna).await;
        let response = app.get(&edit, Some(&anna_token)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), detail);

        let response = app
            .post_json(&edit, Some(&anna_token), json!({ "text": "hijacked" }))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), detail);
        let unchanged = app.store.fetch_post(post.id).await.unwrap().unwrap();
        assert_eq!(unchanged.text.get(), "original");

        let leo_token = app.login(&leo).await;
        let form = body_json(app.get(&edit, Some(&leo_token)).await).await;
        assert_eq!(form["context"]["is_edit"], true);
        assert_eq!(form["context"]["form"]["values"]["text"], "original");

        let response = app
            .post_json(&edit, Some(&leo_token), json!({ "text": "edited" }))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), detail);
        let edited = app.store.fetch_post(post.id).await.unwrap().unwrap();
        assert_eq!(edited.text.get(), "edited");
        assert_eq!(edited.author, leo);
    }

    #[tokio::test]
    async fn non_author_with_malformed_body_is_redirected() {
        let app = TestApp::new();
        let leo = app.user("leo").await;
        let anna = app.user("anna").await;
        let post = app.publish(&leo, "original", None).await;
        let anna_token = app.login(&anna).await;
        let edit = format!("/posts/{}/edit/", post.id);

        let response = app
            .post_json(&edit, Some(&anna_token), json!({ "text": 5 }))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), format!("/posts/{}/", post.id));

        let leo_token = app.login(&leo).await;
        let response = app
            .post_json(&edit, Some(&leo_token), json!({ "text": 5 }))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let unchanged = app.store.fetch_post(post.id).await.unwrap().unwrap();
        assert_eq!(unchanged.text.get(), "original");
    }

    #[tokio::test]
    async fn comments_are_counted_and_blank_ones_dropped() {
        let app = TestApp::new();
        let leo = app.user("leo").await;
        let post = app.publish(&leo, "post", None).await;
        let token = app.login(&leo).await;
        let uri = format!("/posts/{}/comment/", post.id);

        app.post_json(&uri, Some(&token), json!({ "text": "first" })).await;
        let response = app.post_json(&uri, Some(&token), json!({ "text": " " })).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let comments = app.store.list_comments(post.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author, leo);

        let response = app
            .post_json("/posts/999/comment/", Some(&token), json!({ "text": "lost" }))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let app = TestApp::new();
        let leo = app.user("leo").await;
        let token = app.login(&leo).await;

        let response = app
            .post_json("/create/", Some(&token), json!({ "text": 5 }))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
