use async_trait::async_trait;
use chronicle_common::model::{
    Id, ModelValidationError,
    auth::{AuthTokenHash, Authentication},
    comment::{Comment, NewComment},
    follow::Follow,
    group::{Group, GroupMarker, GroupSlug},
    post::{Post, PostContent, PostFilter, PostMarker},
    user::{Credentials, NewUser, User, UserMarker, Username},
};
use std::fmt::Debug;
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("The username {0} is already taken")]
    UsernameTaken(Username),
    #[error("The group slug {0} is already taken")]
    GroupSlugTaken(GroupSlug),
    #[error("Post with id {0} does not exist")]
    UnknownPost(Id<PostMarker>),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Repository-style access to users, groups, posts, comments and follow edges.
///
/// Listings of posts are ordered most recent first, comments oldest first.
#[async_trait]
pub trait Store: Debug + Send + Sync {
    async fn create_user(&self, user: &NewUser) -> Result<User>;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>>;

    async fn fetch_credentials(&self, username: &Username) -> Result<Option<Credentials>>;

    async fn create_auth(&self, authentication: &Authentication) -> Result<()>;

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;

    /// Returns whether a matching authentication existed.
    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool>;

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>>;

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>>;

    async fn list_groups(&self) -> Result<Vec<Group>>;

    async fn create_post(&self, author: Id<UserMarker>, content: &PostContent) -> Result<Post>;

    /// Replaces the editable part of a post. The author never changes.
    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn count_posts(&self, filter: PostFilter) -> Result<u64>;

    async fn list_posts(&self, filter: PostFilter, offset: u64, limit: u64) -> Result<Vec<Post>>;

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment>;

    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    /// Inserts the edge unless it already exists. Returns whether it was inserted.
    async fn create_follow(&self, follow: Follow) -> Result<bool>;

    /// Returns whether an edge was removed.
    async fn delete_follow(&self, follow: Follow) -> Result<bool>;

    async fn is_following(&self, follow: Follow) -> Result<bool>;
}
