use std::sync::Arc;

use futures_lite::StreamExt;
use lapin::options::BasicAckOptions;

use ident_shared::types::event::{payloads, routing_keys, Event};

use crate::models::{EmailKind, User};
use crate::services::token_service;
use crate::AppState;

/// Consume queued email work and deliver it. Everything that can go wrong
/// here -- a vanished user, a render problem, a transport failure -- is
/// logged, acked, and swallowed; delivery never fails a request.
pub async fn listen_email_requested(state: Arc<AppState>) -> anyhow::Result<()> {
    let consumer = state
        .rabbitmq
        .subscribe(
            "ident-accounts.email.requested",
            &[routing_keys::ACCOUNTS_EMAIL_REQUESTED],
        )
        .await?;

    tracing::info!("listening for email.requested events");

    let mut consumer = consumer;
    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                match serde_json::from_slice::<Event<payloads::EmailRequested>>(&delivery.data) {
                    Ok(event) => {
                        send_requested_email(&state, &event.data).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to deserialize email.requested event");
                    }
                }
                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "consumer error");
            }
        }
    }

    Ok(())
}

async fn send_requested_email(state: &Arc<AppState>, job: &payloads::EmailRequested) {
    let kind: EmailKind = match job.kind.parse() {
        Ok(kind) => kind,
        Err(e) => {
            tracing::error!(error = %e, "dropping email job");
            return;
        }
    };

    let mut conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(error = %e, "failed to get db connection");
            return;
        }
    };

    use crate::schema::users;
    use diesel::prelude::*;

    let user: User = match users::table.find(job.user_id).first(&mut conn) {
        Ok(user) => user,
        Err(_) => {
            tracing::warn!(user_id = job.user_id, "user gone before email dispatch");
            return;
        }
    };

    let site = state.config.site_url.trim_end_matches('/');
    let uid = token_service::encode_uid(user.id);

    let result = match kind {
        EmailKind::Verification => {
            if user.is_email_activated {
                tracing::debug!(user_id = user.id, "already activated, skipping email");
                return;
            }
            // The token is minted here, at send time, over the user's
            // current state.
            let token = state.verification_tokens.make_token(&user);
            let url = format!("{site}/users/activate/{uid}/{token}");
            state
                .email
                .send_activation_link(&job.email, &user.username, &url)
                .await
        }
        EmailKind::PasswordReset => {
            // The reset token was persisted by the requesting workflow.
            let Some(token) = user.password_reset_token.as_deref() else {
                tracing::warn!(user_id = user.id, "no outstanding reset token, skipping email");
                return;
            };
            let url = format!("{site}/users/reset-password-confirm/?uid={uid}&token={token}");
            state
                .email
                .send_password_reset_link(&job.email, &user.username, &url)
                .await
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, user_id = user.id, kind = %kind, "failed to send email");
    }
}
