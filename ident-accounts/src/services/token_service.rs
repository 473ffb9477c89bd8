use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use hmac::{Hmac, Mac};
use jsonwebtoken::{encode, EncodingKey, Header};
use sha2::Sha256;

use ident_shared::errors::AppError;
use ident_shared::types::auth::Claims;

use crate::models::User;
use crate::schema::users;

type HmacSha256 = Hmac<Sha256>;

// --- Session tokens ---

pub fn create_access_token(
    user_id: i64,
    staff: bool,
    secret: &str,
    ttl_secs: i64,
) -> Result<String, AppError> {
    let claims = Claims::new(user_id, staff, ttl_secs);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))
}

// --- uid encoding ---

/// URL-safe encoding of a user's primary key. Safe transport, not a secret.
pub fn encode_uid(id: i64) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

fn decode_uid(uid: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uid).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    text.parse().ok()
}

/// Resolve a user from an encoded uid. Bad encoding, a non-numeric payload,
/// and an unknown id all collapse into `None`.
pub fn resolve_uid(conn: &mut PgConnection, uid: &str) -> Option<User> {
    let id = decode_uid(uid)?;
    users::table.find(id).first(conn).ok()
}

// --- Workflow tokens ---
//
// A token is `<base36 day bucket>-<truncated hex HMAC-SHA256>`. The MAC is
// keyed with the server secret plus a per-purpose salt and covers a
// fingerprint of the account state at mint time, so a state change silently
// invalidates every token minted over the old state.

const SECONDS_PER_DAY: i64 = 86_400;
const MAC_BYTES: usize = 16;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn day_bucket(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(SECONDS_PER_DAY)
}

fn to_base36(mut n: i64) -> String {
    if n <= 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).expect("base36 digits are ASCII")
}

fn from_base36(s: &str) -> Option<i64> {
    if s.is_empty() || s.len() > 12 {
        return None;
    }
    let mut n: i64 = 0;
    for c in s.bytes() {
        let digit = match c {
            b'0'..=b'9' => (c - b'0') as i64,
            b'a'..=b'z' => (c - b'a') as i64 + 10,
            _ => return None,
        };
        n = n.checked_mul(36)?.checked_add(digit)?;
    }
    Some(n)
}

fn sign(secret: &str, key_salt: &str, value: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(key_salt.as_bytes());
    mac.update(value.as_bytes());
    let digest = mac.finalize().into_bytes();
    hex::encode(&digest[..MAC_BYTES])
}

fn verify_mac(secret: &str, key_salt: &str, value: &str, candidate_hex: &str) -> bool {
    let Ok(candidate) = hex::decode(candidate_hex) else {
        return false;
    };
    // Exactly the minted length: a shorter prefix must not verify.
    if candidate.len() != MAC_BYTES {
        return false;
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(key_salt.as_bytes());
    mac.update(value.as_bytes());
    mac.verify_truncated_left(&candidate).is_ok()
}

fn split_token(token: &str) -> Option<(i64, &str)> {
    let (bucket, mac) = token.split_once('-')?;
    Some((from_base36(bucket)?, mac))
}

/// Tokens for activating an email address.
///
/// The MAC covers the `is_email_activated` flag, so every outstanding token
/// dies the moment the account is activated. No storage needed.
#[derive(Clone)]
pub struct EmailVerificationTokens {
    secret: String,
    validity_days: i64,
}

impl EmailVerificationTokens {
    const KEY_SALT: &'static str = "ident.accounts.email-verification";

    pub fn new(secret: impl Into<String>, validity_days: i64) -> Self {
        Self {
            secret: secret.into(),
            validity_days,
        }
    }

    pub fn make_token(&self, user: &User) -> String {
        self.make_token_at(user, Utc::now())
    }

    pub fn check_token(&self, user: &User, token: &str) -> bool {
        self.check_token_at(user, token, Utc::now())
    }

    fn make_token_at(&self, user: &User, now: DateTime<Utc>) -> String {
        let bucket = day_bucket(now);
        let mac = sign(&self.secret, Self::KEY_SALT, &self.fingerprint(user, bucket));
        format!("{}-{mac}", to_base36(bucket))
    }

    fn check_token_at(&self, user: &User, token: &str, now: DateTime<Utc>) -> bool {
        let Some((bucket, mac)) = split_token(token) else {
            return false;
        };
        let age = day_bucket(now) - bucket;
        if age < 0 || age > self.validity_days {
            return false;
        }
        verify_mac(&self.secret, Self::KEY_SALT, &self.fingerprint(user, bucket), mac)
    }

    fn fingerprint(&self, user: &User, bucket: i64) -> String {
        format!("{}{}{}", user.is_email_activated, user.id, bucket)
    }
}

/// Tokens for resetting a password.
///
/// Minting is not idempotent: the caller persists the minted string onto
/// `users.password_reset_token`, and only the stored value verifies, so the
/// newest request wins. The MAC additionally covers the password hash, which
/// invalidates outstanding tokens when the password changes by any path.
#[derive(Clone)]
pub struct PasswordResetTokens {
    secret: String,
    validity_days: i64,
}

impl PasswordResetTokens {
    const KEY_SALT: &'static str = "ident.accounts.password-reset";

    pub fn new(secret: impl Into<String>, validity_days: i64) -> Self {
        Self {
            secret: secret.into(),
            validity_days,
        }
    }

    pub fn make_token(&self, user: &User) -> String {
        self.make_token_at(user, Utc::now())
    }

    pub fn check_token(&self, user: &User, token: &str) -> bool {
        self.check_token_at(user, token, Utc::now())
    }

    fn make_token_at(&self, user: &User, now: DateTime<Utc>) -> String {
        let bucket = day_bucket(now);
        let mac = sign(&self.secret, Self::KEY_SALT, &self.fingerprint(user, bucket));
        format!("{}-{mac}", to_base36(bucket))
    }

    fn check_token_at(&self, user: &User, token: &str, now: DateTime<Utc>) -> bool {
        // The submitted token must be the one currently stored on the user.
        match user.password_reset_token.as_deref() {
            Some(stored) if stored == token => {}
            _ => return false,
        }

        // And it must carry a valid, unexpired MAC over the current account
        // state, independent of what is stored.
        let Some((bucket, mac)) = split_token(token) else {
            return false;
        };
        let age = day_bucket(now) - bucket;
        if age < 0 || age > self.validity_days {
            return false;
        }
        verify_mac(&self.secret, Self::KEY_SALT, &self.fingerprint(user, bucket), mac)
    }

    fn fingerprint(&self, user: &User, bucket: i64) -> String {
        format!(
            "{}{}{}{}",
            user.id, bucket, user.is_active, user.password_hash
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const SECRET: &str = "unit-test-secret";

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHQ$aGFzaGJ5dGVz".into(),
            is_staff: false,
            is_active: true,
            is_email_activated: false,
            password_reset_token: None,
            date_joined: fixed_now(),
        }
    }

    #[test]
    fn uid_round_trips() {
        for id in [1_i64, 42, 7_000_000_000] {
            assert_eq!(decode_uid(&encode_uid(id)), Some(id));
        }
    }

    #[test]
    fn uid_decode_failures_yield_none() {
        // not base64
        assert_eq!(decode_uid("!!!"), None);
        // base64 of a non-numeric payload
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode("abc")), None);
        // base64 of non-utf8 bytes
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode([0xff, 0xfe])), None);
        assert_eq!(decode_uid(""), None);
    }

    #[test]
    fn base36_round_trips() {
        for n in [0_i64, 1, 35, 36, 20_000, 1_000_000] {
            assert_eq!(from_base36(&to_base36(n)), Some(n));
        }
        assert_eq!(from_base36("ZZ"), None); // uppercase is not minted
        assert_eq!(from_base36(""), None);
        assert_eq!(from_base36("zzzzzzzzzzzzz"), None); // overlong
    }

    #[test]
    fn verification_token_verifies_right_after_minting() {
        let tokens = EmailVerificationTokens::new(SECRET, 3);
        let u = user(1);
        let token = tokens.make_token_at(&u, fixed_now());
        assert!(tokens.check_token_at(&u, &token, fixed_now()));
    }

    #[test]
    fn verification_token_dies_when_account_activates() {
        let tokens = EmailVerificationTokens::new(SECRET, 3);
        let mut u = user(1);
        let token = tokens.make_token_at(&u, fixed_now());

        u.is_email_activated = true;
        assert!(!tokens.check_token_at(&u, &token, fixed_now()));
    }

    #[test]
    fn verification_token_expires_after_the_validity_window() {
        let tokens = EmailVerificationTokens::new(SECRET, 3);
        let u = user(1);
        let token = tokens.make_token_at(&u, fixed_now());

        // still good at the edge of the window
        assert!(tokens.check_token_at(&u, &token, fixed_now() + Duration::days(3)));
        // gone one day past it
        assert!(!tokens.check_token_at(&u, &token, fixed_now() + Duration::days(4)));
    }

    #[test]
    fn future_dated_tokens_are_rejected() {
        let tokens = EmailVerificationTokens::new(SECRET, 3);
        let u = user(1);
        let token = tokens.make_token_at(&u, fixed_now() + Duration::days(2));
        assert!(!tokens.check_token_at(&u, &token, fixed_now()));
    }

    #[test]
    fn verification_token_is_bound_to_one_user() {
        let tokens = EmailVerificationTokens::new(SECRET, 3);
        let token = tokens.make_token_at(&user(1), fixed_now());
        assert!(!tokens.check_token_at(&user(2), &token, fixed_now()));
    }

    #[test]
    fn malformed_and_forged_tokens_are_rejected() {
        let tokens = EmailVerificationTokens::new(SECRET, 3);
        let u = user(1);
        let good = tokens.make_token_at(&u, fixed_now());

        for bad in ["", "-", "nodash", "??-abcdef", "1-nothex"] {
            assert!(!tokens.check_token_at(&u, bad, fixed_now()));
        }

        // flip one MAC character
        let mut forged = good.clone();
        let last = forged.pop().unwrap();
        forged.push(if last == '0' { '1' } else { '0' });
        assert!(!tokens.check_token_at(&u, &forged, fixed_now()));

        // truncated MAC must not verify as a prefix
        let truncated = &good[..good.len() - 2];
        assert!(!tokens.check_token_at(&u, truncated, fixed_now()));

        // token minted under another secret
        let other = EmailVerificationTokens::new("another-secret", 3);
        let foreign = other.make_token_at(&u, fixed_now());
        assert!(!tokens.check_token_at(&u, &foreign, fixed_now()));
    }

    #[test]
    fn reset_token_requires_the_stored_value() {
        let tokens = PasswordResetTokens::new(SECRET, 3);
        let mut u = user(1);
        let token = tokens.make_token_at(&u, fixed_now());

        // nothing stored yet: a structurally valid token is still refused
        assert!(!tokens.check_token_at(&u, &token, fixed_now()));

        u.password_reset_token = Some(token.clone());
        assert!(tokens.check_token_at(&u, &token, fixed_now()));
    }

    #[test]
    fn newest_reset_token_wins() {
        let tokens = PasswordResetTokens::new(SECRET, 3);
        let mut u = user(1);
        let first = tokens.make_token_at(&u, fixed_now());
        let second = tokens.make_token_at(&u, fixed_now() + Duration::days(1));

        // storing the second overwrites the first
        u.password_reset_token = Some(second.clone());
        let later = fixed_now() + Duration::days(1);
        assert!(!tokens.check_token_at(&u, &first, later));
        assert!(tokens.check_token_at(&u, &second, later));
    }

    #[test]
    fn consumed_reset_token_fails() {
        let tokens = PasswordResetTokens::new(SECRET, 3);
        let mut u = user(1);
        let token = tokens.make_token_at(&u, fixed_now());
        u.password_reset_token = Some(token.clone());
        assert!(tokens.check_token_at(&u, &token, fixed_now()));

        // consumption clears the stored value
        u.password_reset_token = None;
        assert!(!tokens.check_token_at(&u, &token, fixed_now()));
    }

    #[test]
    fn password_change_invalidates_a_stored_reset_token() {
        let tokens = PasswordResetTokens::new(SECRET, 3);
        let mut u = user(1);
        let token = tokens.make_token_at(&u, fixed_now());
        u.password_reset_token = Some(token.clone());

        u.password_hash = "$argon2id$v=19$m=19456,t=2,p=1$b3RoZXJzYWx0$b3RoZXJoYXNo".into();
        assert!(!tokens.check_token_at(&u, &token, fixed_now()));
    }

    #[test]
    fn reset_token_expires_even_while_stored() {
        let tokens = PasswordResetTokens::new(SECRET, 3);
        let mut u = user(1);
        let token = tokens.make_token_at(&u, fixed_now());
        u.password_reset_token = Some(token.clone());

        assert!(!tokens.check_token_at(&u, &token, fixed_now() + Duration::days(4)));
    }
}
