use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ event envelope wrapping queued work and domain events.
///
/// Routing key format: `ident.{service}.{entity}.{action}`
/// Example: `ident.accounts.email.requested`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<i64>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    pub const ACCOUNTS_EMAIL_REQUESTED: &str = "ident.accounts.email.requested";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};

    /// A unit of email work: the consumer resolves the user, renders the
    /// message, and sends. `kind` is the string form of the service's
    /// `EmailKind` ("verification" or "password_reset").
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct EmailRequested {
        pub user_id: i64,
        pub email: String,
        pub kind: String,
    }
}
