use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use ident_shared::errors::{AppError, AppResult, ErrorCode};
use ident_shared::types::ApiResponse;

use crate::models::{EmailKind, NewUser, User};
use crate::schema::users;
use crate::services::{auth_service, throttle_service, validation};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<RegisteredUser>>)> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();

    let mut errors = validation::FieldErrors::new();
    if let Err(e) = validation::validate_username(&username) {
        errors.push("username", e);
    }
    if let Err(e) = validation::validate_email(&email) {
        errors.push("email", e);
    }
    errors.extend(
        "password",
        auth_service::validate_password(&req.password, &username, &email),
    );

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    // Uniqueness rides the same per-field surface as the syntax checks.
    if errors.is_empty() {
        let username_taken: i64 = users::table
            .filter(users::username.eq(&username))
            .count()
            .get_result(&mut conn)?;
        if username_taken > 0 {
            errors.push("username", "This username is already occupied.");
        }

        let email_taken: i64 = users::table
            .filter(users::email.eq(&email))
            .count()
            .get_result(&mut conn)?;
        if email_taken > 0 {
            errors.push("email", "This email is used before.");
        }
    }
    errors.into_result()?;

    let password_hash = auth_service::hash_password(&req.password)?;

    let user: User = diesel::insert_into(users::table)
        .values(&NewUser {
            username,
            email,
            password_hash,
        })
        .get_result(&mut conn)
        .map_err(|e| match e {
            // Lost the race against a concurrent registration with the same
            // username or email: the pre-check passed but the constraint fired.
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => AppError::new(ErrorCode::ValidationError, "unable to create account"),
            other => AppError::from(other),
        })?;

    // One verification email per fresh account: ledger row plus queued job.
    // Both are best effort; the 201 does not depend on either.
    if let Err(e) = throttle_service::record(&mut conn, user.id, EmailKind::Verification) {
        tracing::error!(error = %e, user_id = user.id, "failed to record verification email log");
    }
    crate::events::publisher::publish_email_requested(
        &state.rabbitmq,
        user.id,
        &user.email,
        EmailKind::Verification,
    )
    .await;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(RegisteredUser {
            id: user.id,
            username: user.username,
            email: user.email,
        })),
    ))
}
