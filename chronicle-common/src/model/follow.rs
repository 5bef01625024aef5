use crate::model::{Id, user::UserMarker};

/// A directed edge: `follower` sees the posts of `author` in their feed.
///
/// An edge never points from a user to themselves.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Follow {
    follower: Id<UserMarker>,
    author: Id<UserMarker>,
}

impl Follow {
    /// Returns `None` for a self-follow.
    #[must_use]
    pub fn new(follower: Id<UserMarker>, author: Id<UserMarker>) -> Option<Self> {
        (follower != author).then_some(Self { follower, author })
    }

    #[must_use]
    pub fn follower(self) -> Id<UserMarker> {
        self.follower
    }

    #[must_use]
    pub fn author(self) -> Id<UserMarker> {
        self.author
    }
}
