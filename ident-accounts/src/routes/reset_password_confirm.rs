use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use ident_shared::errors::{AppError, AppResult};

use crate::services::{account_service, auth_service, token_service, validation};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResetPasswordConfirmRequest {
    pub uid: String,
    pub token: String,
    pub new_password: String,
    pub re_new_password: String,
}

pub async fn reset_password_confirm(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordConfirmRequest>,
) -> AppResult<StatusCode> {
    let mut errors = validation::FieldErrors::new();
    if req.new_password != req.re_new_password {
        errors.push("re_new_password", "the two password fields didn't match");
    }
    errors.into_result()?;

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let user =
        token_service::resolve_uid(&mut conn, &req.uid).ok_or_else(AppError::invalid_token)?;

    if !state.reset_tokens.check_token(&user, &req.token) {
        return Err(AppError::invalid_token());
    }

    let mut errors = validation::FieldErrors::new();
    errors.extend(
        "new_password",
        auth_service::validate_password(&req.new_password, &user.username, &user.email),
    );
    errors.into_result()?;

    let password_hash = auth_service::hash_password(&req.new_password)?;
    account_service::consume_reset_token(&mut conn, user.id, &password_hash)?;

    tracing::info!(user_id = user.id, "password reset confirmed");

    Ok(StatusCode::NO_CONTENT)
}
