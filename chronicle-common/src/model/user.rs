use crate::model::{Id, auth::PasswordDigest};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const USERNAME_MAX_LEN: usize = 150;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub full_name: String,
}

impl User {
    /// The full name, or the username for users who never set one.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            self.username.get()
        } else {
            &self.full_name
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewUser {
    pub username: Username,
    pub full_name: String,
    pub password: PasswordDigest,
}

/// A user together with their stored password digest, only used to verify logins.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Credentials {
    pub user: User,
    pub password: PasswordDigest,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The username is invalid: {0}")]
pub struct InvalidUsernameError(String);

impl Username {
    pub fn new(username: String) -> Result<Self, InvalidUsernameError> {
        let valid_chars = username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
        let len = username.chars().count();

        if valid_chars && (1..=USERNAME_MAX_LEN).contains(&len) {
            Ok(Username(username))
        } else {
            Err(InvalidUsernameError(username))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Username::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Username"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        user::{USERNAME_MAX_LEN, User, Username},
    };

    #[test]
    fn username_charset() {
        for valid in ["leo", "test_user", "a.b+c-d@e", "Лев"] {
            assert!(Username::new(valid.to_owned()).is_ok(), "{valid}");
        }
        for invalid in ["", "with space", "slash/", "semi;colon"] {
            assert!(Username::new(invalid.to_owned()).is_err(), "{invalid}");
        }
    }

    #[test]
    fn username_length() {
        assert!(Username::new("a".repeat(USERNAME_MAX_LEN)).is_ok());
        assert!(Username::new("a".repeat(USERNAME_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user = User {
            id: Id::new(1),
            username: Username::new("leo".to_owned()).unwrap(),
            full_name: String::new(),
        };
        assert_eq!(user.display_name(), "leo");

        user.full_name = "Leo Tolstoy".to_owned();
        assert_eq!(user.display_name(), "Leo Tolstoy");
    }
}
