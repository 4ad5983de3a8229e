mod avatar;
mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
mod service;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Router,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(handlers::sign_up))
        .route("/users/signin", post(handlers::sign_in))
        .route("/users/signout", post(handlers::sign_out))
        .route(
            "/users/profile",
            get(handlers::get_profile)
                .patch(handlers::update_profile)
                .layer(DefaultBodyLimit::max(8 * 1024 * 1024)), // base64 avatars
        )
        .route("/users/password", patch(handlers::change_password))
        .route("/users/forgot-password", post(handlers::forgot_password))
        .route("/users/reset-password/:token", post(handlers::reset_password))
        .route("/users/account", delete(handlers::delete_account))
}
