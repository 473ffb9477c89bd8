use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::{email_logs, users};

// --- Users ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub is_email_activated: bool,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

// --- Email logs ---

/// Append-only ledger of dispatched emails. Doubles as the throttle state:
/// rows are only ever inserted, or bulk-deleted when a verification cycle is
/// invalidated by an email change.
#[derive(Debug, Queryable, Identifiable, Serialize)]
#[diesel(table_name = email_logs)]
pub struct EmailLog {
    pub id: i64,
    pub user_id: i64,
    pub email_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = email_logs)]
pub struct NewEmailLog {
    pub user_id: i64,
    pub email_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    PasswordReset,
}

impl EmailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailKind::Verification => "verification",
            EmailKind::PasswordReset => "password_reset",
        }
    }
}

impl std::fmt::Display for EmailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmailKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verification" => Ok(EmailKind::Verification),
            "password_reset" => Ok(EmailKind::PasswordReset),
            _ => Err(format!("unknown email kind: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_kind_round_trips_through_its_string_form() {
        for kind in [EmailKind::Verification, EmailKind::PasswordReset] {
            assert_eq!(kind.as_str().parse::<EmailKind>(), Ok(kind));
        }
        assert!("promo".parse::<EmailKind>().is_err());
    }
}
