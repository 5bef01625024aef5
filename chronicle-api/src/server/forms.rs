//! Submitted forms, their validation and the messages shown next to invalid fields.

use chronicle_common::{
    model::{
        Id,
        group::GroupMarker,
        post::{Post, PostContent, PostImage},
        user::Username,
    },
    util::NonBlankText,
};
use chronicle_db::store::{DbError, Store};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const IMAGE_AND_CLEAR: &str =
    "Please either submit a file or check the clear checkbox, not both.";
pub const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, \
    numbers, and @/./+/-/_ characters.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";

/// Error messages keyed by field name.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<&'static str, Vec<&'static str>>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: &'static str) {
        self.0.entry(field).or_default().push(message);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn field(&self, field: &str) -> &[&'static str] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    fn into_result<T>(self, value: Option<T>) -> Result<T, Self> {
        match value {
            Some(value) if self.is_empty() => Ok(value),
            _ => Err(self),
        }
    }
}

/// A form as shown to the user: the submitted (or prefilled) values and their errors.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct BoundForm<F> {
    pub values: F,
    pub errors: FormErrors,
}

impl<F> BoundForm<F> {
    pub fn unbound(values: F) -> Self {
        Self {
            values,
            errors: FormErrors::default(),
        }
    }

    pub fn with_errors(values: F, errors: FormErrors) -> Self {
        Self { values, errors }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PostForm {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    /// Base64 encoded image bytes. Never echoed back.
    #[serde(skip_serializing)]
    pub image: Option<String>,
    pub clear_image: bool,
}

impl PostForm {
    #[must_use]
    pub fn from_post(post: &Post) -> Self {
        Self {
            text: post.text.get().to_owned(),
            group: post.group.as_ref().map(|group| group.id),
            image: None,
            clear_image: false,
        }
    }

    /// Validates the form. `existing_image` is kept unless a new image is uploaded or
    /// `clear_image` is set.
    pub async fn clean(
        &self,
        store: &dyn Store,
        existing_image: Option<&PostImage>,
    ) -> Result<Result<PostContent, FormErrors>, DbError> {
        let mut errors = FormErrors::default();

        let text = NonBlankText::new(&self.text)
            .inspect_err(|_| errors.add("text", REQUIRED))
            .ok();

        if let Some(group_id) = self.group
            && store.fetch_group(group_id).await?.is_none()
        {
            errors.add("group", INVALID_CHOICE);
        }

        let upload = self.image.as_deref().filter(|encoded| !encoded.is_empty());
        let image = match upload {
            Some(_) if self.clear_image => {
                errors.add("image", IMAGE_AND_CLEAR);
                None
            }
            Some(encoded) => PostImage::from_base64(encoded)
                .inspect_err(|_| errors.add("image", INVALID_IMAGE))
                .ok(),
            None if self.clear_image => None,
            None => existing_image.cloned(),
        };

        Ok(errors.into_result(text.map(|text| PostContent {
            text,
            group: self.group,
            image,
        })))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    pub fn clean(&self) -> Result<NonBlankText, FormErrors> {
        NonBlankText::new(&self.text).map_err(|_| {
            let mut errors = FormErrors::default();
            errors.add("text", REQUIRED);
            errors
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl SignupForm {
    pub fn clean(&self) -> Result<Username, FormErrors> {
        let mut errors = FormErrors::default();

        let username = if self.username.is_empty() {
            errors.add("username", REQUIRED);
            None
        } else {
            Username::new(self.username.clone())
                .inspect_err(|_| errors.add("username", INVALID_USERNAME))
                .ok()
        };

        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }

        errors.into_result(username)
    }
}

#[cfg(test)]
mod tests {
    use crate::server::forms::{
        CommentForm, IMAGE_AND_CLEAR, INVALID_CHOICE, INVALID_IMAGE, INVALID_USERNAME, PostForm,
        REQUIRED, SignupForm,
    };
    use chronicle_common::model::{Id, group::GroupSlug, post::PostImage};
    use chronicle_db::memory::MemoryStore;

    const SMALL_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";

    #[tokio::test]
    async fn post_form_reports_each_invalid_field() {
        let store = MemoryStore::new();
        let form = PostForm {
            text: "   ".to_owned(),
            group: Some(Id::new(42)),
            image: Some("bm90IGFuIGltYWdl".to_owned()),
            clear_image: false,
        };

        let errors = form.clean(&store, None).await.unwrap().unwrap_err();

        assert_eq!(errors.field("text"), [REQUIRED]);
        assert_eq!(errors.field("group"), [INVALID_CHOICE]);
        assert_eq!(errors.field("image"), [INVALID_IMAGE]);
    }

    #[tokio::test]
    async fn post_form_image_handling() {
        let store = MemoryStore::new();
        let group = store
            .insert_group("Cats", GroupSlug::new("cats".to_owned()).unwrap(), "")
            .unwrap();
        let existing = PostImage::new(SMALL_GIF.to_vec()).unwrap();

        let keep = PostForm {
            text: " hello ".to_owned(),
            group: Some(group.id),
            ..PostForm::default()
        };
        let content = keep.clean(&store, Some(&existing)).await.unwrap().unwrap();
        assert_eq!(content.text.get(), "hello");
        assert_eq!(content.group, Some(group.id));
        assert_eq!(content.image, Some(existing.clone()));

        let clear = PostForm {
            clear_image: true,
            ..keep.clone()
        };
        let content = clear.clean(&store, Some(&existing)).await.unwrap().unwrap();
        assert_eq!(content.image, None);

        let both = PostForm {
            image: Some(existing.to_base64()),
            ..clear
        };
        let errors = both.clean(&store, None).await.unwrap().unwrap_err();
        assert_eq!(errors.field("image"), [IMAGE_AND_CLEAR]);
    }

    #[test]
    fn comment_form_requires_text() {
        assert!(CommentForm::default().clean().is_err());
        assert_eq!(
            CommentForm {
                text: "nice".to_owned()
            }
            .clean()
            .unwrap()
            .get(),
            "nice"
        );
    }

    #[test]
    fn signup_form_validation() {
        let errors = SignupForm {
            username: "no spaces".to_owned(),
            full_name: String::new(),
            password: String::new(),
        }
        .clean()
        .unwrap_err();

        assert_eq!(errors.field("username"), [INVALID_USERNAME]);
        assert_eq!(errors.field("password"), [REQUIRED]);
        assert!(errors.field("full_name").is_empty());
    }
}
