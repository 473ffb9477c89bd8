use chrono::{DateTime, Duration, Utc};
use diesel::dsl::max;
use diesel::pg::PgConnection;
use diesel::prelude::*;

use ident_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{EmailKind, NewEmailLog};
use crate::schema::email_logs;

/// Bounds how often and how many times one kind of email goes to one user.
/// The EmailLog ledger is the only state; nothing else is counted.
#[derive(Debug, Clone)]
pub struct ThrottlePolicy {
    lifetime_cap: i64,
    cooldown: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allowed,
    RateLimited { wait_secs: i64 },
    VolumeExceeded,
}

impl ThrottlePolicy {
    pub fn new(lifetime_cap: i64, cooldown_secs: i64) -> Self {
        Self {
            lifetime_cap,
            cooldown: Duration::seconds(cooldown_secs),
        }
    }

    /// Pure decision over the ledger summary for one `(user, kind)` pair:
    /// how many rows exist and when the most recent one was written.
    pub fn evaluate(
        &self,
        sent_count: i64,
        last_sent_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ThrottleDecision {
        if sent_count > self.lifetime_cap {
            return ThrottleDecision::VolumeExceeded;
        }

        if let Some(last) = last_sent_at {
            let elapsed = now - last;
            if elapsed < self.cooldown {
                let wait = self.cooldown - elapsed;
                // never report zero: a sub-second remainder still means wait
                let wait_secs = wait.num_seconds().max(1);
                return ThrottleDecision::RateLimited { wait_secs };
            }
        }

        ThrottleDecision::Allowed
    }
}

/// Apply the policy against the ledger. The check and the later insert are
/// deliberately not one atomic unit: a concurrent duplicate request can slip
/// through and double-send, which the design tolerates as a soft limit.
pub fn check(
    conn: &mut PgConnection,
    policy: &ThrottlePolicy,
    user_id: i64,
    kind: EmailKind,
) -> AppResult<()> {
    let sent_count: i64 = email_logs::table
        .filter(email_logs::user_id.eq(user_id))
        .filter(email_logs::email_type.eq(kind.as_str()))
        .count()
        .get_result(conn)?;

    let last_sent_at: Option<DateTime<Utc>> = email_logs::table
        .filter(email_logs::user_id.eq(user_id))
        .filter(email_logs::email_type.eq(kind.as_str()))
        .select(max(email_logs::created_at))
        .get_result(conn)?;

    match policy.evaluate(sent_count, last_sent_at, Utc::now()) {
        ThrottleDecision::Allowed => Ok(()),
        ThrottleDecision::RateLimited { wait_secs } => Err(AppError::with_details(
            ErrorCode::EmailRateLimited,
            "please wait before requesting another email",
            serde_json::json!({ "wait_time": wait_secs }),
        )),
        ThrottleDecision::VolumeExceeded => Err(AppError::new(
            ErrorCode::EmailVolumeExceeded,
            "email limit reached for this account",
        )),
    }
}

/// Append the ledger row for an email that is about to be dispatched.
pub fn record(conn: &mut PgConnection, user_id: i64, kind: EmailKind) -> QueryResult<usize> {
    diesel::insert_into(email_logs::table)
        .values(&NewEmailLog {
            user_id,
            email_type: kind.as_str().to_string(),
        })
        .execute(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy() -> ThrottlePolicy {
        ThrottlePolicy::new(20, 900)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_770_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn an_empty_ledger_is_allowed() {
        assert_eq!(policy().evaluate(0, None, at(0)), ThrottleDecision::Allowed);
    }

    #[test]
    fn a_second_request_inside_the_cooldown_reports_the_remaining_wait() {
        let decision = policy().evaluate(1, Some(at(0)), at(600));
        assert_eq!(decision, ThrottleDecision::RateLimited { wait_secs: 300 });
    }

    #[test]
    fn the_wait_time_is_always_positive() {
        let decision = policy().evaluate(1, Some(at(0)), at(899));
        match decision {
            ThrottleDecision::RateLimited { wait_secs } => assert!(wait_secs >= 1),
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn requests_past_the_cooldown_are_allowed() {
        assert_eq!(
            policy().evaluate(1, Some(at(0)), at(900)),
            ThrottleDecision::Allowed
        );
        assert_eq!(
            policy().evaluate(5, Some(at(0)), at(3600)),
            ThrottleDecision::Allowed
        );
    }

    #[test]
    fn the_lifetime_cap_trumps_spacing() {
        // far past the cooldown, but over the cap
        assert_eq!(
            policy().evaluate(21, Some(at(0)), at(1_000_000)),
            ThrottleDecision::VolumeExceeded
        );
    }

    #[test]
    fn twenty_spaced_requests_pass_and_the_twenty_first_is_capped() {
        // Registration writes the first ledger row; each granted request
        // appends one more. Requests arrive well beyond the cooldown.
        let policy = policy();
        let mut ledger: Vec<DateTime<Utc>> = vec![at(0)];

        for request in 1..=21 {
            let now = at(request * 3600);
            let decision = policy.evaluate(ledger.len() as i64, ledger.last().copied(), now);
            if request <= 20 {
                assert_eq!(decision, ThrottleDecision::Allowed, "request {request}");
                ledger.push(now);
            } else {
                assert_eq!(decision, ThrottleDecision::VolumeExceeded);
            }
        }
    }

    #[test]
    fn a_cleared_ledger_starts_the_cycle_over() {
        // After an email change bulk-deletes the verification rows, the
        // count the policy sees is back to zero.
        assert_eq!(policy().evaluate(0, None, at(0)), ThrottleDecision::Allowed);
    }
}
