//! A [`Store`] kept entirely in process memory.
//!
//! Backs the test-suites of this crate and of the server.
//! It mirrors the constraints of the PostgreSQL schema: unique usernames and
//! group slugs, one follow edge per pair, comments only on existing posts.

use crate::store::{DbError, Result, Store};
use async_trait::async_trait;
use chronicle_common::model::{
    Id,
    auth::{AuthTokenHash, Authentication, PasswordDigest},
    comment::{Comment, NewComment},
    follow::Follow,
    group::{Group, GroupMarker, GroupSlug},
    post::{Post, PostContent, PostFilter, PostImage, PostMarker},
    user::{Credentials, NewUser, User, UserMarker, Username},
};
use chronicle_common::util::NonBlankText;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use time::UtcDateTime;

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

#[derive(Debug, Default)]
struct MemoryData {
    last_id: i64,
    users: Vec<UserRow>,
    authentications: Vec<Authentication>,
    groups: Vec<Group>,
    posts: Vec<PostRow>,
    comments: Vec<CommentRow>,
    follows: BTreeSet<Follow>,
}

#[derive(Debug)]
struct UserRow {
    user: User,
    password: PasswordDigest,
}

#[derive(Debug)]
struct PostRow {
    id: Id<PostMarker>,
    text: NonBlankText,
    created_at: UtcDateTime,
    author: Id<UserMarker>,
    group: Option<Id<GroupMarker>>,
    image: Option<PostImage>,
}

#[derive(Debug)]
struct CommentRow {
    id: i64,
    post: Id<PostMarker>,
    author: Id<UserMarker>,
    text: NonBlankText,
    created_at: UtcDateTime,
}

impl MemoryData {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn user(&self, user_id: Id<UserMarker>) -> Option<&User> {
        self.users
            .iter()
            .map(|row| &row.user)
            .find(|user| user.id == user_id)
    }

    fn group(&self, group_id: Id<GroupMarker>) -> Option<&Group> {
        self.groups.iter().find(|group| group.id == group_id)
    }

    fn matches(&self, row: &PostRow, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group) => row.group == Some(group),
            PostFilter::Author(author) => row.author == author,
            PostFilter::FollowedBy(follower) => {
                Follow::new(follower, row.author).is_some_and(|edge| self.follows.contains(&edge))
            }
        }
    }

    fn full_post(&self, row: &PostRow) -> Option<Post> {
        Some(Post {
            id: row.id,
            text: row.text.clone(),
            created_at: row.created_at,
            author: self.user(row.author)?.clone(),
            group: row.group.and_then(|group| self.group(group)).cloned(),
            image: row.image.clone(),
        })
    }

    fn full_comment(&self, row: &CommentRow) -> Option<Comment> {
        Some(Comment {
            id: row.id.into(),
            post: row.post,
            author: self.user(row.author)?.clone(),
            text: row.text.clone(),
            created_at: row.created_at,
        })
    }

    /// Matching posts, most recent first.
    fn filtered_posts(&self, filter: PostFilter) -> Vec<&PostRow> {
        let mut rows: Vec<_> = self
            .posts
            .iter()
            .filter(|row| self.matches(row, filter))
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups have no creation path in the application; they are seeded here.
    pub fn insert_group(&self, title: &str, slug: GroupSlug, description: &str) -> Result<Group> {
        let mut data = self.data.write();
        if data.groups.iter().any(|group| group.slug == slug) {
            return Err(DbError::GroupSlugTaken(slug));
        }

        let group = Group {
            id: data.next_id().into(),
            title: title.to_owned(),
            slug,
            description: description.to_owned(),
        };
        data.groups.push(group.clone());

        Ok(group)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let mut data = self.data.write();
        if data
            .users
            .iter()
            .any(|row| row.user.username == user.username)
        {
            return Err(DbError::UsernameTaken(user.username.clone()));
        }

        let created = User {
            id: data.next_id().into(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
        };
        data.users.push(UserRow {
            user: created.clone(),
            password: user.password.clone(),
        });

        Ok(created)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.data.read().user(user_id).cloned())
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        let data = self.data.read();
        let user = data
            .users
            .iter()
            .find(|row| &row.user.username == username)
            .map(|row| row.user.clone());

        Ok(user)
    }

    async fn fetch_credentials(&self, username: &Username) -> Result<Option<Credentials>> {
        let data = self.data.read();
        let credentials = data
            .users
            .iter()
            .find(|row| &row.user.username == username)
            .map(|row| Credentials {
                user: row.user.clone(),
                password: row.password.clone(),
            });

        Ok(credentials)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        self.data.write().authentications.push(authentication.clone());
        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let data = self.data.read();
        let authentication = data
            .authentications
            .iter()
            .find(|authentication| &authentication.token_hash == token_hash)
            .cloned();

        Ok(authentication)
    }

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let mut data = self.data.write();
        let before = data.authentications.len();
        data.authentications
            .retain(|authentication| &authentication.token_hash != token_hash);

        Ok(data.authentications.len() < before)
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        Ok(self.data.read().group(group_id).cloned())
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let data = self.data.read();
        let group = data.groups.iter().find(|group| &group.slug == slug).cloned();

        Ok(group)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let mut groups = self.data.read().groups.clone();
        groups.sort_by(|a, b| (&a.title, a.id).cmp(&(&b.title, b.id)));

        Ok(groups)
    }

    async fn create_post(&self, author: Id<UserMarker>, content: &PostContent) -> Result<Post> {
        let mut data = self.data.write();
        let id = data.next_id().into();
        let row = PostRow {
            id,
            text: content.text.clone(),
            created_at: UtcDateTime::now(),
            author,
            group: content.group,
            image: content.image.clone(),
        };

        let post = data.full_post(&row).ok_or(DbError::UnknownPost(id))?;
        data.posts.push(row);

        Ok(post)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let mut data = self.data.write();
        let Some(row) = data.posts.iter_mut().find(|row| row.id == post_id) else {
            return Ok(None);
        };

        row.text = content.text.clone();
        row.group = content.group;
        row.image = content.image.clone();

        let data = &*data;
        Ok(data
            .posts
            .iter()
            .find(|row| row.id == post_id)
            .and_then(|row| data.full_post(row)))
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let data = self.data.read();
        let post = data
            .posts
            .iter()
            .find(|row| row.id == post_id)
            .and_then(|row| data.full_post(row));

        Ok(post)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let data = self.data.read();
        let count = data
            .posts
            .iter()
            .filter(|row| data.matches(row, filter))
            .count();

        Ok(count as u64)
    }

    async fn list_posts(&self, filter: PostFilter, offset: u64, limit: u64) -> Result<Vec<Post>> {
        let data = self.data.read();
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        let posts = data
            .filtered_posts(filter)
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|row| data.full_post(row))
            .collect();

        Ok(posts)
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        let mut data = self.data.write();
        if !data.posts.iter().any(|row| row.id == comment.post) {
            return Err(DbError::UnknownPost(comment.post));
        }

        let row = CommentRow {
            id: data.next_id(),
            post: comment.post,
            author: comment.author,
            text: comment.text.clone(),
            created_at: UtcDateTime::now(),
        };
        let created = data
            .full_comment(&row)
            .ok_or(DbError::UnknownPost(comment.post))?;
        data.comments.push(row);

        Ok(created)
    }

    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let data = self.data.read();
        let comments = data
            .comments
            .iter()
            .filter(|row| row.post == post_id)
            .filter_map(|row| data.full_comment(row))
            .collect();

        Ok(comments)
    }

    async fn create_follow(&self, follow: Follow) -> Result<bool> {
        Ok(self.data.write().follows.insert(follow))
    }

    async fn delete_follow(&self, follow: Follow) -> Result<bool> {
        Ok(self.data.write().follows.remove(&follow))
    }

    async fn is_following(&self, follow: Follow) -> Result<bool> {
        Ok(self.data.read().follows.contains(&follow))
    }
}
