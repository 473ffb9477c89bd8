use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;

use ident_shared::errors::{AppError, AppResult, ErrorCode};
use ident_shared::types::auth::AccessToken;
use ident_shared::types::ApiResponse;

use crate::models::User;
use crate::schema::users;
use crate::services::{auth_service, token_service};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email address.
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<AccessToken>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let ident = req.username.trim();
    let user = users::table
        .filter(
            users::username
                .eq(ident)
                .or(users::email.eq(ident.to_lowercase())),
        )
        .first::<User>(&mut conn);

    let user = match user {
        Ok(user) => user,
        Err(_) => {
            // Run the hasher once anyway to reduce the timing difference
            // between an existing and a nonexistent user.
            let _ = auth_service::hash_password(&req.password);
            return Err(AppError::new(
                ErrorCode::InvalidCredentials,
                "invalid username or password",
            ));
        }
    };

    if !auth_service::verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::new(
            ErrorCode::InvalidCredentials,
            "invalid username or password",
        ));
    }

    if !user.is_active {
        return Err(AppError::new(ErrorCode::AccountDisabled, "this account is disabled"));
    }

    let access_token = token_service::create_access_token(
        user.id,
        user.is_staff,
        &state.config.jwt_secret,
        state.config.jwt_access_ttl,
    )?;

    tracing::info!(user_id = user.id, "user logged in");

    Ok(Json(ApiResponse::ok(AccessToken::new(
        access_token,
        state.config.jwt_access_ttl,
    ))))
}
