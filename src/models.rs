//! Data shared between the kernel, the store drivers and the HTTP surface.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

/// A user account. `username` is the primary identity and is case-sensitive.
///
/// `password` carries the plaintext on the way in (signup, login, update) and the
/// stored hash inside the store; it is emptied before a user leaves the kernel.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

impl User {
    /// Drop the password (or hash) so the user can be handed to a caller.
    #[must_use]
    pub fn stripped(mut self) -> Self {
        self.password.clear();
        self
    }
}

/// The unit of permission. Names are stored lowercase.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub allow_registration: bool,
}

/// Role of a user inside a group. `User < Admin`; no edge means no role at all.
#[derive(
    ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Answer to an access-check query, also used as the body of `PUT /group/{g}/{u}`.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccessStatus {
    pub group: String,
    pub username: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl AccessStatus {
    #[must_use]
    pub fn denied(group: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            username: username.into(),
            allowed: false,
            role: None,
        }
    }

    #[must_use]
    pub fn granted(group: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        Self {
            group: group.into(),
            username: username.into(),
            allowed: true,
            role: Some(role),
        }
    }
}

/// A group membership as seen from the user side.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GroupWithRole {
    pub group: Group,
    pub role: Role,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyResponse {
    pub public_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering() {
        assert!(Role::User < Role::Admin);
        assert_eq!(Role::User.max(Role::Admin), Role::Admin);
    }

    #[test]
    fn role_wire_format() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&Role::Admin)?, r#""admin""#);
        assert_eq!(serde_json::from_str::<Role>(r#""user""#)?, Role::User);
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("root".parse::<Role>().is_err());
        Ok(())
    }

    #[test]
    fn stripped_user_omits_password() -> Result<(), serde_json::Error> {
        let user = User {
            username: "alice".to_string(),
            password: "$argon2id$v=19$...".to_string(),
            email: "a@x".to_string(),
        }
        .stripped();

        let json = serde_json::to_value(&user)?;
        assert_eq!(json.get("password"), None);
        assert_eq!(json["username"], "alice");
        Ok(())
    }

    #[test]
    fn denied_access_has_no_role() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(AccessStatus::denied("eng", "bob"))?;
        assert_eq!(json["allowed"], false);
        assert_eq!(json.get("role"), None);
        Ok(())
    }
}
