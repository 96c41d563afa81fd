//! Signed session cookie: `userid-expiry-signature`.
//!
//! The signature is the SHA-1 hex digest of `userid:passwd:expiry:secret`, where
//! `passwd` is the user's stored password digest. Changing the password therefore
//! invalidates every outstanding cookie.

use crate::error::AppError;
use crate::models::User;
use sha1::{Digest, Sha1};
use std::future::Future;
use subtle::ConstantTimeEq;

pub const COOKIE_NAME: &str = "awesession";
/// Cookie lifetime in seconds.
pub const SESSION_MAX_AGE: i64 = 86400;

/// Hex SHA-1 of `input`.
pub fn sha1_hex(input: &str) -> String {
    format!("{:x}", Sha1::digest(input.as_bytes()))
}

/// Parsed cookie value; not yet checked against the user's stored digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionToken {
    pub user_id: String,
    pub expires: i64,
    pub signature: String,
}

#[derive(Clone)]
pub struct SessionCodec {
    secret: String,
}

impl SessionCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        SessionCodec {
            secret: secret.into(),
        }
    }

    fn signature(&self, user_id: &str, passwd: &str, expires: i64) -> String {
        sha1_hex(&format!("{}:{}:{}:{}", user_id, passwd, expires, self.secret))
    }

    /// Cookie value for `user`, valid for `max_age` seconds from `now`.
    pub fn encode(&self, user: &User, max_age: i64, now: i64) -> String {
        let expires = now + max_age;
        format!(
            "{}-{}-{}",
            user.id(),
            expires,
            self.signature(user.id(), user.passwd(), expires)
        )
    }

    /// Split and check expiry. `None` for malformed or expired values.
    pub fn parse(&self, cookie: &str, now: i64) -> Option<SessionToken> {
        let mut parts = cookie.split('-');
        let (Some(user_id), Some(expires), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };
        let expires: i64 = expires.parse().ok()?;
        if expires < now || user_id.is_empty() {
            return None;
        }
        Some(SessionToken {
            user_id: user_id.to_string(),
            expires,
            signature: signature.to_string(),
        })
    }

    /// Whether `token` was issued for `user` with its current password digest.
    pub fn verify(&self, token: &SessionToken, user: &User) -> bool {
        if token.user_id != user.id() {
            return false;
        }
        let expected = self.signature(user.id(), user.passwd(), token.expires);
        expected.as_bytes().ct_eq(token.signature.as_bytes()).into()
    }
}

/// Cookie value for `user` valid for `max_age` seconds from now.
pub fn user2cookie(codec: &SessionCodec, user: &User, max_age: i64) -> String {
    codec.encode(user, max_age, chrono::Utc::now().timestamp())
}

/// Resolve a cookie to its user. `load` fetches a user by id. Returns the user with
/// the password masked, or `None` when the cookie is malformed, expired, forged, or
/// names an unknown user. Lookup failures are logged and treated as no session.
pub async fn cookie2user<F, Fut>(codec: &SessionCodec, cookie: &str, now: i64, load: F) -> Option<User>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<Option<User>, AppError>>,
{
    if cookie.is_empty() {
        return None;
    }
    let token = codec.parse(cookie, now)?;
    let mut user = match load(token.user_id.clone()).await {
        Ok(Some(user)) => user,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(error = %e, "session lookup failed");
            return None;
        }
    };
    if !codec.verify(&token, &user) {
        tracing::info!("invalid session signature");
        return None;
    }
    user.mask_passwd();
    Some(user)
}

/// `Set-Cookie` value carrying a session.
pub fn session_cookie_header(value: &str, max_age: i64) -> String {
    format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly",
        COOKIE_NAME, value, max_age
    )
}

/// Find a cookie by name in a `Cookie` request header.
pub fn cookie_from_header<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then_some(v)
    })
}
