//! JSON API: users, authentication, blogs.

use crate::error::{ApiError, AppError};
use crate::handlers::pages::blog_page;
use crate::handlers::validation::{check_admin, is_email, is_sha1, non_blank};
use crate::models::{next_id, Blog, User};
use crate::orm::{FindAll, Model};
use crate::session::{session_cookie_header, sha1_hex, user2cookie, SESSION_MAX_AGE};
use crate::state::AppState;
use crate::web::{Call, Reply};
use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use md5::{Digest, Md5};
use serde_json::{json, Value};

/// Gravatar URL for an email address.
pub fn gravatar(email: &str) -> String {
    format!(
        "http://www.gravatar.com/avatar/{:x}?d=mm&s=120",
        Md5::digest(email.as_bytes())
    )
}

/// Stored password digest: SHA-1 of `id:client_digest`.
pub fn password_digest(user_id: &str, passwd: &str) -> String {
    sha1_hex(&format!("{}:{}", user_id, passwd))
}

/// JSON body of the masked user, with a fresh session cookie.
fn signed_in(state: &AppState, mut user: User) -> Result<Response, AppError> {
    let cookie = user2cookie(&state.sessions, &user, SESSION_MAX_AGE);
    user.mask_passwd();
    let body = serde_json::to_string(&user)?;
    Ok((
        [
            (header::SET_COOKIE, session_cookie_header(&cookie, SESSION_MAX_AGE)),
            (header::CONTENT_TYPE, "application/json;charset=utf-8".to_string()),
        ],
        body,
    )
        .into_response())
}

async fn users_by_email(call: &Call, email: &str) -> Result<Vec<User>, AppError> {
    User::find_all(
        &call.state.pool,
        FindAll::new().filter("email = ?", vec![Value::String(email.to_string())]),
    )
    .await
}

pub async fn api_get_users(call: Call) -> Result<Reply, AppError> {
    let mut users = User::find_all(&call.state.pool, FindAll::new().order_by("created_at desc")).await?;
    for u in users.iter_mut() {
        u.mask_passwd();
    }
    Reply::json(&json!({ "users": users }))
}

pub async fn authenticate(call: Call) -> Result<Reply, AppError> {
    let email = call.text_or("email", "");
    let passwd = call.text_or("passwd", "");
    if email.is_empty() {
        return Err(ApiError::value_invalid("email", "Invalid email.").into());
    }
    if passwd.is_empty() {
        return Err(ApiError::value_invalid("passwd", "Invalid password.").into());
    }
    let Some(user) = users_by_email(&call, &email).await?.into_iter().next() else {
        return Err(ApiError::value_invalid("email", "Email not exist.").into());
    };
    if user.passwd() != password_digest(user.id(), &passwd) {
        return Err(ApiError::value_invalid("passwd", "Invalid password.").into());
    }
    tracing::info!(email = %email, "user signed in");
    Ok(signed_in(&call.state, user)?.into())
}

pub async fn api_register_user(call: Call) -> Result<Reply, AppError> {
    let name = non_blank("name", call.text("name"), "Invalid name.")?;
    let email = call.text_or("email", "");
    if !is_email(&email)? {
        return Err(ApiError::value_invalid("email", "Invalid email.").into());
    }
    let passwd = call.text_or("passwd", "");
    if !is_sha1(&passwd)? {
        return Err(ApiError::value_invalid("passwd", "Invalid password.").into());
    }
    if !users_by_email(&call, &email).await?.is_empty() {
        return Err(ApiError::new("register:failed", "email", "Email is already in use.").into());
    }
    let uid = next_id();
    let mut user = User::new()
        .with("id", uid.as_str())
        .with("name", name)
        .with("email", email.as_str())
        .with("passwd", password_digest(&uid, &passwd))
        .with("image", gravatar(&email));
    user.save(&call.state.pool).await?;
    tracing::info!(email = %email, "user registered");
    Ok(signed_in(&call.state, user)?.into())
}

pub async fn api_blogs(call: Call) -> Result<Reply, AppError> {
    let (page, blogs) = blog_page(&call).await?;
    Reply::json(&json!({ "page": page, "blogs": blogs }))
}

pub async fn api_get_blog(call: Call) -> Result<Reply, AppError> {
    let id = call.text_or("id", "");
    match Blog::find(&call.state.pool, Value::String(id)).await? {
        Some(blog) => Reply::json(&blog),
        None => Err(ApiError::not_found("blog", "Blog not found.").into()),
    }
}

pub async fn api_create_blog(call: Call) -> Result<Reply, AppError> {
    check_admin(call.user())?;
    let name = non_blank("name", call.text("name"), "name cannot be empty.")?;
    let summary = non_blank("summary", call.text("summary"), "summary cannot be empty.")?;
    let content = non_blank("content", call.text("content"), "content cannot be empty.")?;
    let Some(author) = call.user() else {
        return Err(ApiError::permission("admin only").into());
    };
    let mut blog = Blog::new()
        .with("user_id", author.id())
        .with("user_name", author.name())
        .with("user_image", author.image())
        .with("name", name)
        .with("summary", summary)
        .with("content", content);
    blog.save(&call.state.pool).await?;
    Reply::json(&blog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gravatar_uses_md5_of_email() {
        assert_eq!(
            gravatar("test@example.com"),
            "http://www.gravatar.com/avatar/55502f40dc8b7c769880b10874abc9d0?d=mm&s=120"
        );
    }

    #[test]
    fn stored_digest_binds_user_id() {
        let d = password_digest("u1", "abc");
        assert_eq!(d, sha1_hex("u1:abc"));
        assert_ne!(d, password_digest("u2", "abc"));
    }
}
