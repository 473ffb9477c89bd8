use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;

use ident_shared::errors::{AppError, AppResult};
use ident_shared::types::auth::AuthUser;

use crate::models::User;
use crate::schema::users;
use crate::services::{account_service, auth_service, validation};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    /// Required when `set_password_requires_current` is on (the default);
    /// ignored otherwise, which gives the simple new+retype variant.
    #[serde(default)]
    pub current_password: Option<String>,
    pub new_password: String,
    pub re_new_password: String,
}

pub async fn set_password(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetPasswordRequest>,
) -> AppResult<StatusCode> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let account: User = users::table
        .find(user.id)
        .first(&mut conn)
        .map_err(|_| AppError::unauthorized("unknown account"))?;

    let mut errors = validation::FieldErrors::new();

    if req.new_password != req.re_new_password {
        errors.push("re_new_password", "the two password fields didn't match");
    }

    if state.config.set_password_requires_current {
        match &req.current_password {
            None => errors.push("current_password", "this field is required"),
            Some(current) => {
                if !auth_service::verify_password(current, &account.password_hash)? {
                    errors.push("current_password", "invalid password");
                }
            }
        }
    }

    errors.extend(
        "new_password",
        auth_service::validate_password(&req.new_password, &account.username, &account.email),
    );
    errors.into_result()?;

    let password_hash = auth_service::hash_password(&req.new_password)?;
    account_service::set_password(&mut conn, user.id, &password_hash)?;

    // Any outstanding reset token was minted over the old hash and is now
    // unverifiable; no cleanup needed.

    tracing::info!(user_id = user.id, "password changed");

    Ok(StatusCode::NO_CONTENT)
}
