use std::time::Duration;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    avatar,
    dto::{
        ChangePasswordRequest, ForgotPasswordRequest, ResetPasswordRequest, SignInRequest,
        SignUpRequest, UpdateProfileRequest,
    },
    repo_types::{NewUser, ProfileChanges, User},
};
use crate::{
    auth::{
        jwt::JwtKeys,
        password::{hash_password, verify_password, MIN_PASSWORD_LEN},
        reset::{digest_reset_token, generate_reset_token},
    },
    error::AppError,
    state::AppState,
};

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const INVALID_RESET_TOKEN: &str = "Token is invalid or has expired";

/// A signed-in user plus the session token to hand back as a cookie.
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub token: String,
    pub max_age: Duration,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Present and not blank.
fn required(value: Option<String>, message: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::validation(message)),
    }
}

/// Present and non-empty. Passwords are never trimmed, so whitespace counts.
fn required_secret(value: Option<String>, message: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::validation(message)),
    }
}

fn checked_email(raw: &str) -> Result<String, AppError> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    Ok(email)
}

fn checked_new_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn issue_session(st: &AppState, user: User) -> Result<Session, AppError> {
    let keys = JwtKeys::from_ref(st);
    let token = keys.sign(user.id)?;
    Ok(Session {
        user,
        token,
        max_age: keys.ttl,
    })
}

pub async fn sign_up(st: &AppState, req: SignUpRequest) -> Result<Session, AppError> {
    const MISSING: &str = "Name, email and password are required";
    let name = required(req.name, MISSING)?;
    let email = required(req.email, MISSING)?;
    let password = required_secret(req.password, MISSING)?;
    let email = checked_email(&email)?;
    checked_new_password(&password)?;

    if st.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("Email is already registered".into()));
    }

    let password_hash = hash_password(&password)?;
    let user = st
        .users
        .create(NewUser {
            name: name.trim().to_string(),
            email,
            password_hash,
            role: req.role.unwrap_or_default(),
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user signed up");
    issue_session(st, user)
}

pub async fn sign_in(st: &AppState, req: SignInRequest) -> Result<Session, AppError> {
    const MISSING: &str = "Email and password are required";
    let email = normalize_email(&required(req.email, MISSING)?);
    let password = required_secret(req.password, MISSING)?;

    let Some(found) = st.users.find_with_secret_by_email(&email).await? else {
        warn!(%email, "sign-in for unknown email");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };
    if !verify_password(&password, &found.password_hash)? {
        warn!(user_id = %found.user.id, "sign-in with wrong password");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let mut user = found.user;
    let now = OffsetDateTime::now_utc();
    st.users.touch_last_active(user.id, now).await?;
    user.last_active_at = now;

    info!(user_id = %user.id, "user signed in");
    issue_session(st, user)
}

pub async fn get_profile(st: &AppState, user_id: Uuid) -> Result<User, AppError> {
    st.users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn update_profile(
    st: &AppState,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> Result<User, AppError> {
    let current = get_profile(st, user_id).await?;

    let mut changes = ProfileChanges {
        bio: req.bio,
        ..ProfileChanges::default()
    };
    if let Some(name) = req.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Name cannot be empty"));
        }
        changes.name = Some(name.to_string());
    }
    if let Some(email) = req.email {
        let email = checked_email(&email)?;
        if email != current.email && st.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email is already registered".into()));
        }
        changes.email = Some(email);
    }

    let new_avatar = match req.avatar {
        Some(payload) => {
            let upload = avatar::decode_avatar(&payload)?;
            Some(avatar::upload_avatar(st, user_id, upload).await?)
        }
        None => None,
    };
    changes.avatar = new_avatar.clone();

    let updated = match st.users.update_profile(user_id, changes).await {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            if let Some(key) = &new_avatar {
                avatar::discard_avatar(st, key).await;
            }
            return Err(AppError::not_found("User not found"));
        }
        Err(e) => {
            if let Some(key) = &new_avatar {
                avatar::discard_avatar(st, key).await;
            }
            return Err(e);
        }
    };

    if new_avatar.is_some() {
        avatar::discard_avatar(st, &updated.previous_avatar).await;
    }

    info!(user_id = %user_id, "profile updated");
    Ok(updated.user)
}

pub async fn change_password(
    st: &AppState,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> Result<(), AppError> {
    let current = required_secret(req.current_password, "Current password is required")?;
    let new = required_secret(req.new_password, "New password is required")?;
    checked_new_password(&new)?;

    let found = st
        .users
        .find_with_secret_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    if !verify_password(&current, &found.password_hash)? {
        warn!(%user_id, "password change with wrong current password");
        return Err(AppError::unauthorized("Current password is incorrect"));
    }

    let password_hash = hash_password(&new)?;
    st.users.set_password(user_id, &password_hash).await?;

    info!(%user_id, "password changed");
    Ok(())
}

pub async fn request_password_reset(
    st: &AppState,
    req: ForgotPasswordRequest,
) -> Result<(), AppError> {
    let email = normalize_email(&required(req.email, "Email is required")?);

    let user = st
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found("No user with that email"))?;

    let token = generate_reset_token(OffsetDateTime::now_utc())?;
    st.users
        .set_reset_token(user.id, &token.digest, token.expires_at)
        .await?;

    if let Err(e) = st.mailer.send_reset(&user.email, &token.raw).await {
        warn!(error = %e, user_id = %user.id, "failed to deliver reset token");
    }

    info!(user_id = %user.id, "password reset requested");
    Ok(())
}

pub async fn reset_password(
    st: &AppState,
    raw_token: &str,
    req: ResetPasswordRequest,
) -> Result<(), AppError> {
    let password = required_secret(req.password, "Password is required")?;
    checked_new_password(&password)?;

    let digest = digest_reset_token(raw_token);
    let password_hash = hash_password(&password)?;
    let user_id = st
        .users
        .consume_reset_token(&digest, &password_hash, OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| {
            warn!("reset with invalid or expired token");
            AppError::unauthorized(INVALID_RESET_TOKEN)
        })?;

    info!(%user_id, "password reset completed");
    Ok(())
}

pub async fn delete_account(st: &AppState, user_id: Uuid) -> Result<(), AppError> {
    st.users.delete(user_id).await?;
    info!(%user_id, "account deleted");
    Ok(())
}
