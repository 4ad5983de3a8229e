use axum::{
    extract::{Path, State},
    http::{header::SET_COOKIE, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::instrument;

use super::{
    dto::{
        ChangePasswordRequest, ForgotPasswordRequest, ResetPasswordRequest, SignInRequest,
        SignUpRequest, UpdateProfileRequest,
    },
    service::{self, Session},
};
use crate::{
    api::{ApiJson, ApiResponse},
    auth::{
        jwt::AuthUser,
        session::{cleared_session_cookie, session_cookie},
    },
    error::AppError,
    state::AppState,
};

type SetCookie = [(HeaderName, HeaderValue); 1];

fn set_session(state: &AppState, session: &Session) -> Result<SetCookie, AppError> {
    let cookie = session_cookie(&session.token, &state.config.cookie, session.max_age)?;
    Ok([(SET_COOKIE, cookie)])
}

fn clear_session(state: &AppState) -> Result<SetCookie, AppError> {
    Ok([(SET_COOKIE, cleared_session_cookie(&state.config.cookie)?)])
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = service::sign_up(&state, payload).await?;
    let cookie = set_session(&state, &session)?;
    Ok((StatusCode::CREATED, cookie, Json(ApiResponse::data(session.user))))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignInRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = service::sign_in(&state, payload).await?;
    let cookie = set_session(&state, &session)?;
    Ok((StatusCode::OK, cookie, Json(ApiResponse::data(session.user))))
}

#[instrument(skip(state))]
pub async fn sign_out(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok((
        StatusCode::OK,
        clear_session(&state)?,
        Json(ApiResponse::message("Signed out")),
    ))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = service::get_profile(&state, user_id).await?;
    Ok(Json(ApiResponse::data(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = service::update_profile(&state, user_id, payload).await?;
    Ok(Json(ApiResponse::data(user)))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    service::change_password(&state, user_id, payload).await?;
    Ok(Json(ApiResponse::message("Password updated")))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    service::request_password_reset(&state, payload).await?;
    Ok(Json(ApiResponse::message("Password reset link sent")))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    service::reset_password(&state, &token, payload).await?;
    Ok(Json(ApiResponse::message("Password has been reset")))
}

#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    service::delete_account(&state, user_id).await?;
    Ok((
        StatusCode::OK,
        clear_session(&state)?,
        Json(ApiResponse::message("Account deleted")),
    ))
}
