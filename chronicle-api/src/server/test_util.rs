use crate::server::{ServerState, Settings, app};
use axum::{
    Router,
    body::Body,
    http::{Request, header},
    response::Response,
};
use chronicle_common::{
    model::{
        auth::{AuthToken, Authentication, PasswordDigest},
        group::{Group, GroupSlug},
        post::{Post, PostContent},
        user::{NewUser, User, Username},
    },
    util::NonBlankText,
};
use chronicle_db::{memory::MemoryStore, store::Store};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use time::UtcDateTime;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "correct horse";

/// The full router running against an in-memory store.
pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let router = app(ServerState {
            store: store.clone(),
            settings: Settings::default(),
        });

        Self { router, store }
    }

    /// Creates a user whose full name is the capitalized username followed by "Example".
    pub async fn user(&self, username: &str) -> User {
        let mut chars = username.chars();
        let capitalized: String = chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect())
            .unwrap_or_default();

        self.store
            .create_user(&NewUser {
                username: Username::new(username.to_owned()).unwrap(),
                full_name: format!("{capitalized} Example"),
                password: PasswordDigest::hash(TEST_PASSWORD).unwrap(),
            })
            .await
            .unwrap()
    }

    /// Issues a non-expiring bearer token for `user` without going through the login route.
    pub async fn login(&self, user: &User) -> String {
        let token = AuthToken::generate_random(user.id);
        self.store
            .create_auth(&Authentication {
                user: user.id,
                token_hash: token.hash().unwrap(),
                created_at: UtcDateTime::now(),
                expires_after: None,
            })
            .await
            .unwrap();

        token.as_token_str()
    }

    pub fn group(&self, slug: &str) -> Group {
        self.store
            .insert_group(
                &format!("Group {slug}"),
                GroupSlug::new(slug.to_owned()).unwrap(),
                "",
            )
            .unwrap()
    }

    pub async fn publish(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        self.store
            .create_post(
                author.id,
                &PostContent {
                    text: NonBlankText::new(text).unwrap(),
                    group: group.map(|group| group.id),
                    image: None,
                },
            )
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        let request = with_token(Request::get(uri), token)
            .body(Body::empty())
            .unwrap();

        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> Response {
        let request = with_token(Request::post(uri), token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

fn with_token(
    builder: axum::http::request::Builder,
    token: Option<&str>,
) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}
