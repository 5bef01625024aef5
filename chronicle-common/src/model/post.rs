use crate::{
    model::{
        Id,
        group::{Group, GroupMarker},
        user::{User, UserMarker},
    },
    util::{NonBlankText, timestamp},
};
use base64::{DecodeError, Engine, prelude::BASE64_STANDARD};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{Error, Unexpected},
};
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: NonBlankText,
    #[serde(with = "timestamp")]
    pub created_at: UtcDateTime,
    pub author: User,
    pub group: Option<Group>,
    pub image: Option<PostImage>,
}

/// The author-editable part of a post.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub text: NonBlankText,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<PostImage>,
}

/// Which posts a listing is restricted to.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostFilter {
    All,
    Group(Id<GroupMarker>),
    Author(Id<UserMarker>),
    /// Posts by every author the given user follows.
    FollowedBy(Id<UserMarker>),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Gif,
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Gif => "image/gif",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

/// Raw bytes of an image attached to a post, serialized as base64.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PostImage {
    format: ImageFormat,
    bytes: Vec<u8>,
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum InvalidPostImageError {
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The data is not a recognised image format")]
    UnknownFormat,
}

impl PostImage {
    pub fn new(bytes: Vec<u8>) -> Result<Self, InvalidPostImageError> {
        let format = ImageFormat::detect(&bytes).ok_or(InvalidPostImageError::UnknownFormat)?;
        Ok(Self { format, bytes })
    }

    pub fn from_base64(encoded: &str) -> Result<Self, InvalidPostImageError> {
        Self::new(BASE64_STANDARD.decode(encoded)?)
    }

    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.bytes)
    }
}

impl Debug for PostImage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostImage")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Wire form of a [`PostImage`]: the detected MIME type next to the base64 data.
#[derive(Serialize)]
struct EncodedImage<'a> {
    mime_type: &'static str,
    data: &'a str,
}

#[derive(Deserialize)]
struct DecodedImage {
    data: String,
}

impl Serialize for PostImage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        EncodedImage {
            mime_type: self.format().mime_type(),
            data: &self.to_base64(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PostImage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let DecodedImage { data } = DecodedImage::deserialize(deserializer)?;
        PostImage::from_base64(&data)
            .map_err(|_| Error::invalid_value(Unexpected::Str(&data), &"base64 encoded image"))
    }
}
