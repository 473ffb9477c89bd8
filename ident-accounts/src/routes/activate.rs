use axum::extract::{Path, State};
use axum::http::StatusCode;
use std::sync::Arc;

use ident_shared::errors::{AppError, AppResult};

use crate::services::{account_service, token_service};
use crate::AppState;

/// Confirm an email address from an activation link.
///
/// Every failure mode -- unknown uid, expired token, wrong user, already
/// activated -- collapses into the same generic 400 so the response never
/// says which account states exist.
pub async fn activate(
    State(state): State<Arc<AppState>>,
    Path((uid, token)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let user =
        token_service::resolve_uid(&mut conn, &uid).ok_or_else(AppError::invalid_token)?;

    if !state.verification_tokens.check_token(&user, &token) {
        return Err(AppError::invalid_token());
    }

    account_service::activate(&mut conn, user.id)?;

    tracing::info!(user_id = user.id, "email activated");

    Ok(StatusCode::NO_CONTENT)
}
