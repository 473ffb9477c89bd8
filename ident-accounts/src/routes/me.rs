use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;

use ident_shared::errors::{AppError, AppResult, ErrorCode};
use ident_shared::types::auth::AuthUser;
use ident_shared::types::ApiResponse;

use crate::schema::users;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_email_activated: bool,
    pub date_joined: chrono::DateTime<chrono::Utc>,
}

pub async fn me(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<MeResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let account: crate::models::User = users::table
        .find(user.id)
        .first(&mut conn)
        .map_err(|_| AppError::new(ErrorCode::NotFound, "user not found"))?;

    Ok(Json(ApiResponse::ok(MeResponse {
        id: account.id,
        username: account.username,
        email: account.email,
        is_email_activated: account.is_email_activated,
        date_joined: account.date_joined,
    })))
}
