use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Avatar value for users who never uploaded one. Never deleted from storage.
pub const DEFAULT_AVATAR: &str = "default";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            other => anyhow::bail!("unknown role {other:?}"),
        }
    }
}

/// Sanitized user record. Has no secret fields, so anything that serializes a
/// `User` cannot leak the password digest or reset token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub avatar: String,
    pub bio: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_active_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A user together with the argon2 digest, for credential checks only.
#[derive(Clone)]
pub struct UserWithSecret {
    pub user: User,
    pub password_hash: String,
}

impl fmt::Debug for UserWithSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserWithSecret")
            .field("user", &self.user)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub avatar: String,
    pub bio: Option<String>,
    pub last_active_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            role: r.role.parse().unwrap_or_default(),
            avatar: r.avatar,
            bio: r.bio,
            last_active_at: r.last_active_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct UserWithSecretRow {
    #[sqlx(flatten)]
    pub user: UserRow,
    pub password_hash: String,
}

impl From<UserWithSecretRow> for UserWithSecret {
    fn from(r: UserWithSecretRow) -> Self {
        Self {
            user: r.user.into(),
            password_hash: r.password_hash,
        }
    }
}

/// Result of a profile write: the stored user and the avatar key it held
/// immediately before this write.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub user: User,
    pub previous_avatar: String,
}

#[derive(Debug, FromRow)]
pub struct ProfileUpdateRow {
    #[sqlx(flatten)]
    pub user: UserRow,
    pub previous_avatar: String,
}

impl From<ProfileUpdateRow> for ProfileUpdate {
    fn from(r: ProfileUpdateRow) -> Self {
        Self {
            user: r.user.into(),
            previous_avatar: r.previous_avatar,
        }
    }
}

/// Validated input for account creation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Validated partial update. `None` leaves the column untouched; for `bio`,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<Option<String>>,
}
