use serde::{Deserialize, Deserializer};

use super::repo_types::Role;

/// Request body for account creation. Fields are optional so that a missing
/// one is reported as a validation error rather than a parse failure.
#[derive(Debug, Default, Deserialize)]
pub struct SignUpRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignInRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Partial profile update. An absent key leaves the field alone; a present
/// key is applied even when it holds an empty string.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Base64 image, plain or as a `data:` URI.
    pub avatar: Option<String>,
    /// `null` clears the bio.
    #[serde(default, deserialize_with = "present")]
    pub bio: Option<Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
}

/// Wraps whatever was sent, `null` included, in `Some` so it can be told
/// apart from a missing key.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
