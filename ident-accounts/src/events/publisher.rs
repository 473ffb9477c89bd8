use ident_shared::clients::rabbitmq::RabbitMQClient;
use ident_shared::types::event::{payloads, routing_keys, Event};

use crate::models::EmailKind;

/// Enqueue one unit of email work. Fire and forget: a publish failure is
/// logged and the originating request proceeds.
pub async fn publish_email_requested(
    rabbitmq: &RabbitMQClient,
    user_id: i64,
    email: &str,
    kind: EmailKind,
) {
    let event = Event::new(
        "ident-accounts",
        routing_keys::ACCOUNTS_EMAIL_REQUESTED,
        payloads::EmailRequested {
            user_id,
            email: email.to_string(),
            kind: kind.as_str().to_string(),
        },
    )
    .with_user(user_id);

    if let Err(e) = rabbitmq
        .publish(routing_keys::ACCOUNTS_EMAIL_REQUESTED, &event)
        .await
    {
        tracing::error!(error = %e, "failed to publish email.requested event");
    }
}
