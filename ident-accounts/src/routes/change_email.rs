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
use crate::services::{account_service, validation};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangeEmailRequest {
    pub email: String,
}

/// Change the registered email address. The account drops back to
/// unverified and its old verification ledger rows are discarded, so a new
/// verification cycle starts clean.
pub async fn change_email(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangeEmailRequest>,
) -> AppResult<StatusCode> {
    let email = req.email.trim().to_lowercase();

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let account: User = users::table
        .find(user.id)
        .first(&mut conn)
        .map_err(|_| AppError::unauthorized("unknown account"))?;

    let mut errors = validation::FieldErrors::new();
    if let Err(e) = validation::validate_email(&email) {
        errors.push("email", e);
    }

    if errors.is_empty() {
        // Resubmitting the current address changes nothing.
        if email == account.email {
            return Ok(StatusCode::NO_CONTENT);
        }

        let taken: i64 = users::table
            .filter(users::email.eq(&email))
            .count()
            .get_result(&mut conn)?;
        if taken > 0 {
            errors.push("email", "This email is used before.");
        }
    }
    errors.into_result()?;

    account_service::change_email(&mut conn, user.id, &email)?;

    tracing::info!(user_id = user.id, "email changed, verification reset");

    Ok(StatusCode::NO_CONTENT)
}
