//! One view model per page.

use crate::server::{
    forms::{BoundForm, CommentForm, LoginForm, PostForm, SignupForm},
    template::View,
};
use chronicle_common::{
    model::{comment::Comment, group::Group, post::Post, user::User},
    pagination::Page,
};
use serde::Serialize;

pub const LATEST_UPDATES: &str = "Latest updates";
const POST_TITLE_CHARS: usize = 30;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct IndexView {
    pub title: &'static str,
    pub page_obj: Page<Post>,
}

impl View for IndexView {
    const TEMPLATE: &'static str = "posts/index.html";
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct GroupListView {
    pub title: String,
    pub group: Group,
    pub page_obj: Page<Post>,
    pub posts_amount: u64,
}

impl View for GroupListView {
    const TEMPLATE: &'static str = "posts/group_list.html";
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct ProfileView {
    pub title: String,
    pub author: User,
    pub page_obj: Page<Post>,
    pub posts_amount: u64,
    /// Whether the viewer follows `author`. Always false for anonymous viewers.
    pub following: bool,
}

impl View for ProfileView {
    const TEMPLATE: &'static str = "posts/profile.html";
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PostDetailView {
    pub title: String,
    pub post: Post,
    /// Total number of posts by the post's author.
    pub posts_amount: u64,
    pub comments: Vec<Comment>,
    pub form: BoundForm<CommentForm>,
}

impl PostDetailView {
    #[must_use]
    pub fn title_for(post: &Post) -> String {
        format!("Post {}", post.text.excerpt(POST_TITLE_CHARS))
    }
}

impl View for PostDetailView {
    const TEMPLATE: &'static str = "posts/post_detail.html";
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PostFormView {
    pub form: BoundForm<PostForm>,
    pub groups: Vec<Group>,
    pub is_edit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Post>,
}

impl View for PostFormView {
    const TEMPLATE: &'static str = "posts/create.html";
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct FollowView {
    pub title: &'static str,
    pub page_obj: Page<Post>,
}

impl View for FollowView {
    const TEMPLATE: &'static str = "posts/follow.html";
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct LoginView {
    pub next: Option<String>,
    pub form: BoundForm<LoginForm>,
}

impl View for LoginView {
    const TEMPLATE: &'static str = "users/login.html";
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct SignupView {
    pub form: BoundForm<SignupForm>,
}

impl View for SignupView {
    const TEMPLATE: &'static str = "users/signup.html";
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct AboutAuthorView {
    pub title: &'static str,
}

impl View for AboutAuthorView {
    const TEMPLATE: &'static str = "about/author.html";
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct AboutTechView {
    pub title: &'static str,
}

impl View for AboutTechView {
    const TEMPLATE: &'static str = "about/tech.html";
}
