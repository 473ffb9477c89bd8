use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::models::{EmailKind, User};
use crate::schema::{email_logs, users};

/// Account activation transitions. The only two that exist:
/// unverified -> verified on a successful token check, and verified ->
/// unverified as a side effect of an email change.

pub fn activate(conn: &mut PgConnection, user_id: i64) -> QueryResult<usize> {
    diesel::update(users::table.filter(users::id.eq(user_id)))
        .set(users::is_email_activated.eq(true))
        .execute(conn)
}

/// Swap the registered address and drop the account back to unverified.
/// The stale verification ledger rows go with it, so the throttle counters
/// start over for the new address. One transaction: readers never see the
/// new address still marked activated, or a half-cleared ledger.
pub fn change_email(conn: &mut PgConnection, user_id: i64, new_email: &str) -> QueryResult<()> {
    conn.transaction(|conn| {
        diesel::update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::email.eq(new_email),
                users::is_email_activated.eq(false),
            ))
            .execute(conn)?;

        diesel::delete(
            email_logs::table
                .filter(email_logs::user_id.eq(user_id))
                .filter(email_logs::email_type.eq(EmailKind::Verification.as_str())),
        )
        .execute(conn)?;

        Ok(())
    })
}

pub fn store_reset_token(conn: &mut PgConnection, user_id: i64, token: &str) -> QueryResult<usize> {
    diesel::update(users::table.filter(users::id.eq(user_id)))
        .set(users::password_reset_token.eq(Some(token)))
        .execute(conn)
}

/// Consume the outstanding reset token and install the new password hash.
/// One transaction: the token is cleared exactly once, together with the
/// hash it authorized.
pub fn consume_reset_token(
    conn: &mut PgConnection,
    user_id: i64,
    new_password_hash: &str,
) -> QueryResult<()> {
    conn.transaction(|conn| {
        diesel::update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::password_reset_token.eq(None::<String>),
                users::password_hash.eq(new_password_hash),
            ))
            .execute(conn)?;
        Ok(())
    })
}

pub fn set_password(conn: &mut PgConnection, user_id: i64, password_hash: &str) -> QueryResult<usize> {
    diesel::update(users::table.filter(users::id.eq(user_id)))
        .set(users::password_hash.eq(password_hash))
        .execute(conn)
}

pub fn find_by_username(conn: &mut PgConnection, username: &str) -> QueryResult<User> {
    users::table
        .filter(users::username.eq(username))
        .first(conn)
}

pub fn find_by_email(conn: &mut PgConnection, email: &str) -> QueryResult<User> {
    users::table.filter(users::email.eq(email)).first(conn)
}
