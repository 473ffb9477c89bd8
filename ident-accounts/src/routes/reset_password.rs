use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;

use ident_shared::errors::{AppError, AppResult};

use crate::models::EmailKind;
use crate::services::{account_service, throttle_service};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<StatusCode> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let user = account_service::find_by_email(&mut conn, &req.email.trim().to_lowercase());

    // Unknown addresses get the identical 204, so the response never says
    // whether an account exists.
    let Ok(user) = user else {
        return Ok(StatusCode::NO_CONTENT);
    };

    throttle_service::check(&mut conn, &state.throttle, user.id, EmailKind::PasswordReset)?;

    let token = state.reset_tokens.make_token(&user);

    // Token write and ledger row land together; the stored token is never
    // visible without its log entry.
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        account_service::store_reset_token(conn, user.id, &token)?;
        throttle_service::record(conn, user.id, EmailKind::PasswordReset)?;
        Ok(())
    })?;

    crate::events::publisher::publish_email_requested(
        &state.rabbitmq,
        user.id,
        &user.email,
        EmailKind::PasswordReset,
    )
    .await;

    tracing::info!(user_id = user.id, "password reset requested");

    Ok(StatusCode::NO_CONTENT)
}
