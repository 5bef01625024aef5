use crate::{
    record::{
        AuthenticationRecord, CommentRecord, CredentialsRecord, FullPostRecord, GroupRecord,
        PostFilterBinds, UserRecord, to_primitive,
    },
    store::{DbError, Result, Store},
};
use async_trait::async_trait;
use chronicle_common::model::{
    Id,
    auth::{AuthTokenHash, Authentication},
    comment::{Comment, CommentMarker, NewComment},
    follow::Follow,
    group::{Group, GroupMarker, GroupSlug},
    post::{Post, PostContent, PostFilter, PostImage, PostMarker},
    user::{Credentials, NewUser, User, UserMarker, Username},
};
use sqlx::{
    PgPool, migrate::Migrator, postgres::PgPoolOptions, query, query_as, query_scalar,
};
use time::UtcDateTime;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const SELECT_FULL_POSTS: &str = "
    SELECT
        posts.post_id,
        posts.text,
        posts.created_at,
        posts.image,
        users.user_id,
        users.username,
        users.full_name,
        groups.group_id,
        groups.title AS group_title,
        groups.slug AS group_slug,
        groups.description AS group_description
    FROM
        posts.posts
        JOIN users.users ON users.user_id = posts.author_id
        LEFT JOIN posts.groups ON groups.group_id = posts.group_id
";

/// Matches every post when all three binds are NULL.
const POST_FILTER: &str = "
    ($1::BIGINT IS NULL OR posts.group_id = $1)
    AND ($2::BIGINT IS NULL OR posts.author_id = $2)
    AND ($3::BIGINT IS NULL OR EXISTS (
        SELECT 1
        FROM users.follows
        WHERE follows.follower_id = $3 AND follows.author_id = posts.author_id
    ))
";

const SELECT_COMMENTS: &str = "
    SELECT
        comments.comment_id,
        comments.post_id,
        comments.text,
        comments.created_at,
        users.user_id,
        users.username,
        users.full_name
    FROM
        posts.comments
        JOIN users.users ON users.user_id = comments.author_id
";

#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        info!("Database migrations are up to date");

        Ok(())
    }

    async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>> {
        let record = query_as::<_, CommentRecord>(&format!(
            "{SELECT_COMMENTS} WHERE comments.comment_id = $1"
        ))
        .bind(comment_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let comment = record.map(Comment::try_from).transpose()?;
        Ok(comment)
    }
}

#[async_trait]
impl Store for DbClient {
    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let result = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (username, full_name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING user_id, username, full_name
            ",
        )
        .bind(user.username.get())
        .bind(&user.full_name)
        .bind(user.password.get())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(User::try_from(record)?),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(DbError::UsernameTaken(user.username.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.username,
                users.full_name
            FROM
                users.users
            WHERE
                users.user_id = $1
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.username,
                users.full_name
            FROM
                users.users
            WHERE
                users.username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_credentials(&self, username: &Username) -> Result<Option<Credentials>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT
                users.user_id,
                users.username,
                users.full_name,
                users.password_hash
            FROM
                users.users
            WHERE
                users.username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(Credentials::try_from).transpose()?;
        Ok(credentials)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO users.authentications
                (token_hash, user_id, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&authentication.token_hash.0[..])
        .bind(authentication.user.get())
        .bind(to_primitive(authentication.created_at))
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.get().whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                authentications.user_id,
                authentications.token_hash,
                authentications.created_at,
                authentications.expires_after_seconds
            FROM
                users.authentications
            WHERE
                authentications.token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let deleted = query("DELETE FROM users.authentications WHERE token_hash = $1")
            .bind(&token_hash.0[..])
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM posts.groups
            WHERE group_id = $1
            ",
        )
        .bind(group_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM posts.groups
            WHERE slug = $1
            ",
        )
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let records = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM posts.groups
            ORDER BY title, group_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = records
            .into_iter()
            .map(Group::try_from)
            .collect::<Result<_, _>>()?;
        Ok(groups)
    }

    async fn create_post(&self, author: Id<UserMarker>, content: &PostContent) -> Result<Post> {
        let post_id: i64 = query_scalar(
            "
            INSERT INTO posts.posts (text, created_at, author_id, group_id, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING post_id
            ",
        )
        .bind(content.text.get())
        .bind(to_primitive(UtcDateTime::now()))
        .bind(author.get())
        .bind(content.group.map(Id::get))
        .bind(content.image.as_ref().map(PostImage::bytes))
        .fetch_one(&self.pool)
        .await?;

        let post_id = post_id.into();
        self.fetch_post(post_id)
            .await?
            .ok_or(DbError::UnknownPost(post_id))
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let updated = query(
            "
            UPDATE posts.posts
            SET text = $2, group_id = $3, image = $4
            WHERE post_id = $1
            ",
        )
        .bind(post_id.get())
        .bind(content.text.get())
        .bind(content.group.map(Id::get))
        .bind(content.image.as_ref().map(PostImage::bytes))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        self.fetch_post(post_id).await
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, FullPostRecord>(&format!(
            "{SELECT_FULL_POSTS} WHERE posts.post_id = $1"
        ))
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let binds = PostFilterBinds::from(filter);

        let count: i64 = query_scalar(&format!(
            "SELECT COUNT(*) FROM posts.posts WHERE {POST_FILTER}"
        ))
        .bind(binds.group_id)
        .bind(binds.author_id)
        .bind(binds.follower_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.cast_unsigned())
    }

    async fn list_posts(&self, filter: PostFilter, offset: u64, limit: u64) -> Result<Vec<Post>> {
        let binds = PostFilterBinds::from(filter);

        let records = query_as::<_, FullPostRecord>(&format!(
            "
            {SELECT_FULL_POSTS}
            WHERE {POST_FILTER}
            ORDER BY posts.created_at DESC, posts.post_id DESC
            LIMIT $4 OFFSET $5
            "
        ))
        .bind(binds.group_id)
        .bind(binds.author_id)
        .bind(binds.follower_id)
        .bind(limit.cast_signed())
        .bind(offset.cast_signed())
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        let result = query_scalar::<_, i64>(
            "
            INSERT INTO posts.comments (post_id, author_id, text, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING comment_id
            ",
        )
        .bind(comment.post.get())
        .bind(comment.author.get())
        .bind(comment.text.get())
        .bind(to_primitive(UtcDateTime::now()))
        .fetch_one(&self.pool)
        .await;

        let comment_id = match result {
            Ok(comment_id) => Id::new(comment_id),
            Err(sqlx::Error::Database(err)) if err.is_foreign_key_violation() => {
                return Err(DbError::UnknownPost(comment.post));
            }
            Err(err) => return Err(err.into()),
        };

        self.fetch_comment(comment_id)
            .await?
            .ok_or(DbError::UnknownPost(comment.post))
    }

    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(&format!(
            "
            {SELECT_COMMENTS}
            WHERE comments.post_id = $1
            ORDER BY comments.created_at, comments.comment_id
            "
        ))
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    async fn create_follow(&self, follow: Follow) -> Result<bool> {
        let inserted = query(
            "
            INSERT INTO users.follows (follower_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT (follower_id, author_id) DO NOTHING
            ",
        )
        .bind(follow.follower().get())
        .bind(follow.author().get())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(inserted > 0)
    }

    async fn delete_follow(&self, follow: Follow) -> Result<bool> {
        let deleted = query(
            "
            DELETE FROM users.follows
            WHERE follower_id = $1 AND author_id = $2
            ",
        )
        .bind(follow.follower().get())
        .bind(follow.author().get())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted > 0)
    }

    async fn is_following(&self, follow: Follow) -> Result<bool> {
        let exists = query_scalar(
            "
            SELECT EXISTS (
                SELECT 1
                FROM users.follows
                WHERE follower_id = $1 AND author_id = $2
            )
            ",
        )
        .bind(follow.follower().get())
        .bind(follow.author().get())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
