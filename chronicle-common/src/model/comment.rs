use crate::{
    model::{
        Id,
        post::PostMarker,
        user::{User, UserMarker},
    },
    util::{NonBlankText, timestamp},
};
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post: Id<PostMarker>,
    pub author: User,
    pub text: NonBlankText,
    #[serde(with = "timestamp")]
    pub created_at: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewComment {
    pub post: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub text: NonBlankText,
}
