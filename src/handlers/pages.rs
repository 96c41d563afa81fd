//! HTML pages.

use crate::error::{ApiError, AppError};
use crate::handlers::page::{get_page_index, Page, PAGE_SIZE};
use crate::models::{Blog, Comment};
use crate::orm::{FindAll, Model};
use crate::session::COOKIE_NAME;
use crate::web::{Call, Reply};
use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};
use pulldown_cmark::{html, Parser};
use serde_json::{json, Value};

/// Plain text to HTML paragraphs, one per non-blank line, with `&`, `<` and `>` escaped.
pub fn text2html(text: &str) -> String {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            format!(
                "<p>{}</p>",
                line.replace('&', "&amp;")
                    .replace('<', "&lt;")
                    .replace('>', "&gt;")
            )
        })
        .collect()
}

pub fn markdown(text: &str) -> String {
    let mut out = String::new();
    html::push_html(&mut out, Parser::new(text));
    out
}

/// Total blog count and the requested page of blogs, newest first.
pub(crate) async fn blog_page(call: &Call) -> Result<(Page, Vec<Blog>), AppError> {
    let page_index = get_page_index(call.text("page").as_deref());
    let num = Blog::find_number(&call.state.pool, "count(id)", None, vec![])
        .await?
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    let page = Page::new(num, page_index, PAGE_SIZE);
    if page.limit == 0 {
        return Ok((page, Vec::new()));
    }
    let blogs = Blog::find_all(
        &call.state.pool,
        FindAll::new()
            .order_by("created_at desc")
            .limit((page.offset, page.limit)),
    )
    .await?;
    Ok((page, blogs))
}

pub async fn index(call: Call) -> Result<Reply, AppError> {
    let (page, blogs) = blog_page(&call).await?;
    Ok(Reply::template(
        "blogs.html",
        json!({ "page": page, "blogs": serde_json::to_value(&blogs)? }),
    ))
}

pub async fn get_blog(call: Call) -> Result<Reply, AppError> {
    let id = call.text_or("id", "");
    let pool = &call.state.pool;
    let mut blog = Blog::find(pool, Value::String(id.clone()))
        .await?
        .ok_or_else(|| ApiError::not_found("blog", "Blog not found."))?;
    let mut comments = Comment::find_all(
        pool,
        FindAll::new()
            .filter("blog_id = ?", vec![Value::String(id)])
            .order_by("created_at desc"),
    )
    .await?;
    for c in comments.iter_mut() {
        let html = text2html(c.content());
        c.set("html_content", html);
    }
    let html = markdown(blog.content());
    blog.set("html_content", html);
    Ok(Reply::template(
        "blog.html",
        json!({
            "blog": serde_json::to_value(&blog)?,
            "comments": serde_json::to_value(&comments)?,
        }),
    ))
}

pub async fn register(_call: Call) -> Result<Reply, AppError> {
    Ok(Reply::template("register.html", json!({})))
}

pub async fn signin(_call: Call) -> Result<Reply, AppError> {
    Ok(Reply::template("signin.html", json!({})))
}

/// Clear the session cookie and go back where the user came from.
pub async fn signout(call: Call) -> Result<Reply, AppError> {
    let referer = call
        .request()
        .and_then(|r| r.header("referer"))
        .filter(|r| !r.is_empty())
        .unwrap_or("/")
        .to_string();
    tracing::info!("user signed out.");
    let cookie = format!("{}=-deleted-; Max-Age=0; Path=/; HttpOnly", COOKIE_NAME);
    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, referer), (header::SET_COOKIE, cookie)],
    )
        .into_response()
        .into())
}

pub async fn manage_blogs(call: Call) -> Result<Reply, AppError> {
    Ok(Reply::template(
        "manage_blogs.html",
        json!({ "page_index": get_page_index(call.text("page").as_deref()) }),
    ))
}

pub async fn manage_create_blog(_call: Call) -> Result<Reply, AppError> {
    Ok(Reply::template(
        "manage_blog_edit.html",
        json!({ "id": "", "action": "/api/blogs" }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text2html_escapes_and_skips_blank_lines() {
        assert_eq!(
            text2html("a < b & c\n\n  \nsecond > line"),
            "<p>a &lt; b &amp; c</p><p>second &gt; line</p>"
        );
        assert_eq!(text2html(""), "");
    }

    #[test]
    fn markdown_renders_html() {
        let out = markdown("# Title\n\nSome *emphasis*.");
        assert!(out.contains("<h1>Title</h1>"));
        assert!(out.contains("<em>emphasis</em>"));
    }
}
