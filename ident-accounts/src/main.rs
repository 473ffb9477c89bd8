use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod events;
mod models;
mod routes;
mod schema;
mod services;

use config::AppConfig;
use ident_shared::clients::db::{create_pool, DbPool};
use ident_shared::clients::email::EmailClient;
use ident_shared::clients::rabbitmq::RabbitMQClient;
use services::throttle_service::ThrottlePolicy;
use services::token_service::{EmailVerificationTokens, PasswordResetTokens};

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub email: EmailClient,
    pub verification_tokens: EmailVerificationTokens,
    pub reset_tokens: PasswordResetTokens,
    pub throttle: ThrottlePolicy,
    pub metrics: metrics_exporter_prometheus::PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ident_shared::middleware::init_tracing("ident-accounts");

    let config = AppConfig::load()?;
    let port = config.port;

    let db = create_pool(&config.database_url);
    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;
    let email = EmailClient::new(&config.resend_api_key, &config.from_email, "Ident");
    let metrics = ident_shared::middleware::init_metrics();

    let verification_tokens =
        EmailVerificationTokens::new(config.secret_key.clone(), config.token_validity_days);
    let reset_tokens =
        PasswordResetTokens::new(config.secret_key.clone(), config.token_validity_days);
    let throttle = ThrottlePolicy::new(config.email_lifetime_cap, config.email_cooldown_secs);

    let state = Arc::new(AppState {
        db,
        config,
        rabbitmq,
        email,
        verification_tokens,
        reset_tokens,
        throttle,
        metrics,
    });

    // Spawn the email work-queue consumer
    let sub_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_email_requested(sub_state).await {
            tracing::error!(error = %e, "email subscriber failed");
        }
    });

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/users/", post(routes::register::register))
        .route("/users/login/", post(routes::login::login))
        .route("/users/me/", get(routes::me::me))
        .route("/users/me/email/", put(routes::change_email::change_email))
        .route("/users/activate/:uid/:token", get(routes::activate::activate))
        .route(
            "/users/:username/request-activation-email/",
            get(routes::request_activation::request_activation_email),
        )
        .route("/users/set-password/", post(routes::set_password::set_password))
        .route("/users/reset-password/", post(routes::reset_password::reset_password))
        .route(
            "/users/reset-password-confirm/",
            post(routes::reset_password_confirm::reset_password_confirm),
        )
        .layer(axum::middleware::from_fn(
            ident_shared::middleware::metrics_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "ident-accounts starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
