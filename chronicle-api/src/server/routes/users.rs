use crate::server::{
    Result, ServerError, ServerRouter, Settings,
    auth::AuthenticatedUser,
    forms::{BoundForm, LoginForm, SignupForm, USERNAME_TAKEN},
    json::Json,
    query::Query,
    template::Template,
    views::{LoginView, SignupView},
};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use chronicle_common::model::{
    auth::{AuthToken, Authentication, PasswordDigest},
    user::{NewUser, Username},
};
use chronicle_db::store::{DbError, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::UtcDateTime;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(login_form)
        .typed_post(login)
        .typed_get(signup_form)
        .typed_post(signup)
}

pub fn protected_routes() -> ServerRouter {
    ServerRouter::new().typed_post(logout)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login/")]
struct LoginPath;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

async fn login_form(_: LoginPath, Query(query): Query<LoginQuery>) -> Template<LoginView> {
    let form = LoginForm {
        next: query.next.clone(),
        ..LoginForm::default()
    };

    Template(LoginView {
        next: query.next,
        form: BoundForm::unbound(form),
    })
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct LoginResponse {
    token: String,
    next: String,
}

async fn login(
    _: LoginPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Settings>,
    Json(form): Json<LoginForm>,
) -> Result<Json<LoginResponse>> {
    let username = Username::new(form.username).map_err(|_| ServerError::InvalidCredentials)?;

    let credentials = store
        .fetch_credentials(&username)
        .await?
        .filter(|credentials| credentials.password.verify(&form.password))
        .ok_or_else(|| {
            debug!(%username, "Rejected login");
            ServerError::InvalidCredentials
        })?;

    let token = AuthToken::generate_random(credentials.user.id);
    let authentication = Authentication {
        user: credentials.user.id,
        token_hash: token.hash()?,
        created_at: UtcDateTime::now(),
        expires_after: settings.token_lifetime,
    };
    store.create_auth(&authentication).await?;
    info!(user_id = %credentials.user.id, "Logged in");

    Ok(Json(LoginResponse {
        token: token.as_token_str(),
        next: safe_next(form.next.as_deref()).to_owned(),
    }))
}

/// Only local paths are accepted as a post-login destination.
fn safe_next(next: Option<&str>) -> &str {
    next.filter(|next| {
        next.starts_with('/') && !next.starts_with("//") && !next.starts_with("/\\")
    })
    .unwrap_or("/")
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/signup/")]
struct SignupPath;

async fn signup_form(_: SignupPath) -> Template<SignupView> {
    Template(SignupView {
        form: BoundForm::default(),
    })
}

async fn signup(
    _: SignupPath,
    State(store): State<Arc<dyn Store>>,
    Json(form): Json<SignupForm>,
) -> Result<Response> {
    let username = match form.clean() {
        Ok(username) => username,
        Err(errors) => {
            return Ok(Template(SignupView {
                form: BoundForm::with_errors(form, errors),
            })
            .into_response());
        }
    };

    let new_user = NewUser {
        username,
        full_name: form.full_name.trim().to_owned(),
        password: PasswordDigest::hash(&form.password)?,
    };

    match store.create_user(&new_user).await {
        Ok(user) => {
            info!(user_id = %user.id, username = %user.username, "Signed up");
            Ok(Redirect::to(LoginPath.to_string().as_str()).into_response())
        }
        Err(DbError::UsernameTaken(username)) => {
            debug!(%username, "Rejected signup with taken username");
            let mut form = BoundForm::unbound(form);
            form.errors.add("username", USERNAME_TAKEN);
            Ok(Template(SignupView { form }).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/logout/")]
struct LogoutPath;

async fn logout(
    _: LogoutPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Redirect> {
    store.delete_auth(user.token_hash()).await?;
    info!(user_id = %user.user_id(), "Logged out");

    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use crate::server::{
        routes::users::safe_next,
        test_util::{TEST_PASSWORD, TestApp, body_json, location},
    };
    use axum::http::StatusCode;
    use chronicle_common::model::user::Username;
    use chronicle_db::store::Store;
    use serde_json::json;

    #[test]
    fn next_must_be_local() {
        assert_eq!(safe_next(None), "/");
        assert_eq!(safe_next(Some("/create/")), "/create/");
        assert_eq!(safe_next(Some("https://example.com/")), "/");
        assert_eq!(safe_next(Some("//example.com/")), "/");
    }

    #[tokio::test]
    async fn login_form_echoes_next() {
        let app = TestApp::new();

        let body = body_json(app.get("/auth/login/?next=%2Fcreate%2F", None).await).await;
        assert_eq!(body["template"], "users/login.html");
        assert_eq!(body["context"]["next"], "/create/");
        assert_eq!(body["context"]["form"]["values"]["next"], "/create/");
    }

    #[tokio::test]
    async fn login_issues_a_working_token() {
        let app = TestApp::new();
        let leo = app.user("leo").await;

        let response = app
            .post_json(
                "/auth/login/",
                None,
                json!({ "username": "leo", "password": TEST_PASSWORD, "next": "/create/" }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["next"], "/create/");

        let token = body["token"].as_str().unwrap();
        assert!(token.starts_with(&format!("{}:", leo.id)));
        let response = app.get("/create/", Some(token)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_credentials_are_unauthorized() {
        let app = TestApp::new();
        app.user("leo").await;

        let wrong_password = app
            .post_json(
                "/auth/login/",
                None,
                json!({ "username": "leo", "password": "guess" }),
            )
            .await;
        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);

        let unknown_user = app
            .post_json(
                "/auth/login/",
                None,
                json!({ "username": "nobody", "password": TEST_PASSWORD }),
            )
            .await;
        assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signup_creates_user_and_rejects_duplicates() {
        let app = TestApp::new();

        let body = body_json(app.get("/auth/signup/", None).await).await;
        assert_eq!(body["template"], "users/signup.html");

        let signup = json!({ "username": "leo", "full_name": "Leo T", "password": "secret" });
        let response = app.post_json("/auth/signup/", None, signup.clone()).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login/");

        let username = Username::new("leo".to_owned()).unwrap();
        let user = app.store.fetch_user_by_username(&username).await.unwrap();
        assert_eq!(user.unwrap().full_name, "Leo T");

        let response = app.post_json("/auth/signup/", None, signup).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(
            body["context"]["form"]["errors"]["username"][0],
            "A user with that username already exists."
        );
        assert_eq!(body["context"]["form"]["values"]["username"], "leo");
        assert!(body["context"]["form"]["values"].get("password").is_none());
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let app = TestApp::new();
        let leo = app.user("leo").await;
        let token = app.login(&leo).await;

        let response = app.post_json("/auth/logout/", Some(&token), json!({})).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let response = app.get("/create/", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login/?next=%2Fcreate%2F");
    }

    #[tokio::test]
    async fn malformed_token_is_bad_request() {
        let app = TestApp::new();

        let response = app.get("/", Some("not-a-token")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
