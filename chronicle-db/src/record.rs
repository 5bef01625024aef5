use chronicle_common::{
    model::{
        ModelValidationError,
        auth::{Authentication, PasswordDigest},
        comment::Comment,
        group::{Group, GroupSlug},
        post::{Post, PostFilter, PostImage},
        user::{Credentials, User, Username},
    },
    util::NonBlankText,
};
use sqlx::FromRow;
use time::{Duration, PrimitiveDateTime, UtcDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct GroupRecord {
    pub group_id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// A post joined with its author and, if tagged, its group.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_id: i64,
    pub text: String,
    pub created_at: PrimitiveDateTime,
    pub image: Option<Vec<u8>>,
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    pub group_id: Option<i64>,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
    pub group_description: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_id: i64,
    pub post_id: i64,
    pub text: String,
    pub created_at: PrimitiveDateTime,
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

/// Bind values for the shared post filter clause, see [`crate::client`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub(crate) struct PostFilterBinds {
    pub group_id: Option<i64>,
    pub author_id: Option<i64>,
    pub follower_id: Option<i64>,
}

impl From<PostFilter> for PostFilterBinds {
    fn from(value: PostFilter) -> Self {
        match value {
            PostFilter::All => Self::default(),
            PostFilter::Group(group) => Self {
                group_id: Some(group.get()),
                ..Self::default()
            },
            PostFilter::Author(author) => Self {
                author_id: Some(author.get()),
                ..Self::default()
            },
            PostFilter::FollowedBy(follower) => Self {
                follower_id: Some(follower.get()),
                ..Self::default()
            },
        }
    }
}

pub(crate) fn to_primitive(value: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(value.date(), value.time())
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            username: Username::new(value.username)?,
            full_name: value.full_name,
        })
    }
}

impl TryFrom<CredentialsRecord> for Credentials {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: User {
                id: value.user_id.into(),
                username: Username::new(value.username)?,
                full_name: value.full_name,
            },
            password: PasswordDigest::try_from(value.password_hash)?,
        })
    }
}

impl TryFrom<GroupRecord> for Group {
    type Error = ModelValidationError;

    fn try_from(value: GroupRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.group_id.into(),
            title: value.title,
            slug: GroupSlug::new(value.slug)?,
            description: value.description,
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        let group = match (
            value.group_id,
            value.group_title,
            value.group_slug,
            value.group_description,
        ) {
            (Some(group_id), Some(title), Some(slug), Some(description)) => Some(Group {
                id: group_id.into(),
                title,
                slug: GroupSlug::new(slug)?,
                description,
            }),
            _ => None,
        };

        Ok(Self {
            id: value.post_id.into(),
            text: NonBlankText::new(&value.text)?,
            created_at: value.created_at.as_utc(),
            author: User {
                id: value.user_id.into(),
                username: Username::new(value.username)?,
                full_name: value.full_name,
            },
            group,
            image: value.image.map(PostImage::new).transpose()?,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.comment_id.into(),
            post: value.post_id.into(),
            author: User {
                id: value.user_id.into(),
                username: Username::new(value.username)?,
                full_name: value.full_name,
            },
            text: NonBlankText::new(&value.text)?,
            created_at: value.created_at.as_utc(),
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_id.into(),
            token_hash: value.token_hash.into_boxed_slice().try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}
