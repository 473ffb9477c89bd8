use axum::extract::{Path, State};
use axum::http::StatusCode;
use diesel::prelude::*;
use std::sync::Arc;

use ident_shared::errors::{AppError, AppResult, ErrorCode};
use ident_shared::types::auth::AuthUser;

use crate::models::{EmailKind, User};
use crate::schema::users;
use crate::services::{account_service, throttle_service};
use crate::AppState;

/// Resend the activation email for `username`. Only the account owner or a
/// staff member may trigger it; everyone else gets a 403 regardless of the
/// target's state.
pub async fn request_activation_email(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> AppResult<StatusCode> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let target = account_service::find_by_username(&mut conn, &username)
        .map_err(|_| AppError::not_found("user not found"))?;

    if target.id != user.id {
        // staff per the account row, not the token claim
        let acting: User = users::table
            .find(user.id)
            .first(&mut conn)
            .map_err(|_| AppError::unauthorized("unknown account"))?;
        if !acting.is_staff {
            return Err(AppError::forbidden(
                "cannot request an activation email for another user",
            ));
        }
    }

    if target.is_email_activated {
        return Err(AppError::new(
            ErrorCode::AlreadyActivated,
            "email is already activated",
        ));
    }

    throttle_service::check(&mut conn, &state.throttle, target.id, EmailKind::Verification)?;

    throttle_service::record(&mut conn, target.id, EmailKind::Verification)?;
    crate::events::publisher::publish_email_requested(
        &state.rabbitmq,
        target.id,
        &target.email,
        EmailKind::Verification,
    )
    .await;

    tracing::info!(user_id = target.id, requested_by = user.id, "activation email requested");

    Ok(StatusCode::NO_CONTENT)
}
