//! Converting handler results into HTTP responses.

use crate::error::AppError;
use crate::models::User;
use crate::templates::TemplateRenderer;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use hyper::ext::ReasonPhrase;
use serde::Serialize;
use serde_json::{Map, Value};

pub const REDIRECT_PREFIX: &str = "redirect:";
/// Mapping key naming the template to render with the rest of the mapping.
pub const TEMPLATE_KEY: &str = "__template__";
/// Context key carrying the signed-in user when a template is rendered.
pub const USER_KEY: &str = "__user__";

/// Whatever a handler returns.
#[derive(Debug)]
pub enum Reply {
    Response(Response),
    Bytes(Vec<u8>),
    Text(String),
    Value(Value),
}

impl Reply {
    /// Render `name` with the object `context`.
    pub fn template(name: &str, context: Value) -> Self {
        let mut map = match context {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.insert(TEMPLATE_KEY.to_string(), Value::String(name.to_string()));
        Reply::Value(Value::Object(map))
    }

    pub fn redirect(location: &str) -> Self {
        Reply::Text(format!("{}{}", REDIRECT_PREFIX, location))
    }

    pub fn json<T: Serialize>(value: &T) -> Result<Self, AppError> {
        Ok(Reply::Value(serde_json::to_value(value)?))
    }
}

impl From<Response> for Reply {
    fn from(r: Response) -> Self {
        Reply::Response(r)
    }
}

impl From<Vec<u8>> for Reply {
    fn from(b: Vec<u8>) -> Self {
        Reply::Bytes(b)
    }
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Reply::Text(s)
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

impl From<Value> for Reply {
    fn from(v: Value) -> Self {
        Reply::Value(v)
    }
}

impl From<u16> for Reply {
    fn from(code: u16) -> Self {
        Reply::Value(Value::from(code))
    }
}

fn status_code(v: &Value) -> Option<StatusCode> {
    let n = v.as_i64().filter(|n| (100..600).contains(n))?;
    StatusCode::from_u16(n as u16).ok()
}

fn plain_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn text_reply(s: String) -> Response {
    match s.strip_prefix(REDIRECT_PREFIX) {
        Some(location) => (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response(),
        None => ([(header::CONTENT_TYPE, "text/html;charset=utf-8")], s).into_response(),
    }
}

/// Turn a handler's reply into a response. Checks run in a fixed order; see [`Reply`].
pub fn normalize(
    reply: Reply,
    renderer: &dyn TemplateRenderer,
    user: Option<&User>,
) -> Result<Response, AppError> {
    let value = match reply {
        Reply::Response(r) => return Ok(r),
        Reply::Bytes(b) => {
            return Ok(([(header::CONTENT_TYPE, "application/octet-stream")], b).into_response())
        }
        Reply::Text(s) => return Ok(text_reply(s)),
        Reply::Value(v) => v,
    };
    match value {
        Value::String(s) => Ok(text_reply(s)),
        Value::Object(mut map) => match map.remove(TEMPLATE_KEY) {
            Some(name) => {
                let name = plain_text(&name);
                if let Some(u) = user {
                    map.insert(USER_KEY.to_string(), serde_json::to_value(u)?);
                }
                let html = renderer.render(&name, &Value::Object(map))?;
                Ok(([(header::CONTENT_TYPE, "text/html;charset=utf-8")], html).into_response())
            }
            None => {
                let body = serde_json::to_string(&map)?;
                Ok(([(header::CONTENT_TYPE, "application/json;charset=utf-8")], body).into_response())
            }
        },
        ref n @ Value::Number(_) if status_code(n).is_some() => {
            Ok(status_code(n).unwrap_or(StatusCode::OK).into_response())
        }
        Value::Array(items) if items.len() == 2 && status_code(&items[0]).is_some() => {
            let status = status_code(&items[0]).unwrap_or(StatusCode::OK);
            let reason = plain_text(&items[1]);
            let mut resp = (status, reason.clone()).into_response();
            // Control characters cannot go on the status line; the standard phrase is kept then.
            if let Ok(phrase) = ReasonPhrase::try_from(reason) {
                resp.extensions_mut().insert(phrase);
            }
            Ok(resp)
        }
        other => Ok((
            [(header::CONTENT_TYPE, "text/plain;charset=utf-8")],
            plain_text(&other),
        )
            .into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Echoes the template name and context instead of reading files.
    struct EchoRenderer;

    impl TemplateRenderer for EchoRenderer {
        fn render(&self, name: &str, context: &Value) -> Result<String, AppError> {
            Ok(format!("{}|{}", name, context))
        }
    }

    async fn body(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn content_type(resp: &Response) -> &str {
        resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap()
    }

    fn run(reply: impl Into<Reply>) -> Response {
        normalize(reply.into(), &EchoRenderer, None).unwrap()
    }

    #[tokio::test]
    async fn template_mapping_renders_remaining_keys() {
        let resp = run(json!({ "__template__": "x.html", "a": 1 }));
        assert_eq!(content_type(&resp), "text/html;charset=utf-8");
        assert_eq!(body(resp).await, r#"x.html|{"a":1}"#);
    }

    #[tokio::test]
    async fn template_context_gets_signed_in_user() {
        let user = User::new().with("id", "u1").with("name", "Ann");
        let resp = normalize(Reply::template("t.html", json!({})), &EchoRenderer, Some(&user)).unwrap();
        assert_eq!(body(resp).await, r#"t.html|{"__user__":{"id":"u1","name":"Ann"}}"#);
    }

    #[tokio::test]
    async fn plain_mapping_is_json() {
        let resp = run(json!({ "a": 1 }));
        assert_eq!(content_type(&resp), "application/json;charset=utf-8");
        assert_eq!(body(resp).await, r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn strings_are_html_or_redirects() {
        let resp = run("redirect:/login");
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");

        let resp = run(Value::String("redirect:/".into()));
        assert_eq!(resp.status(), StatusCode::FOUND);

        let resp = run("<h1>hi</h1>");
        assert_eq!(content_type(&resp), "text/html;charset=utf-8");
        assert_eq!(body(resp).await, "<h1>hi</h1>");
    }

    #[tokio::test]
    async fn bytes_status_codes_and_fallback() {
        let resp = run(vec![1u8, 2, 3]);
        assert_eq!(content_type(&resp), "application/octet-stream");

        assert_eq!(run(404u16).status(), StatusCode::NOT_FOUND);

        let resp = run(json!([418, "teapot"]));
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(resp.extensions().get::<ReasonPhrase>().unwrap().as_bytes(), b"teapot");
        assert_eq!(body(resp).await, "teapot");

        let resp = run(json!([400, "line\nbreak"]));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(resp.extensions().get::<ReasonPhrase>().is_none());

        let resp = run(json!(42));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(content_type(&resp), "text/plain;charset=utf-8");
        assert_eq!(body(resp).await, "42");

        let resp = run(json!([1, 2, 3]));
        assert_eq!(body(resp).await, "[1,2,3]");
    }

    #[tokio::test]
    async fn prebuilt_response_passes_through() {
        let resp = run(StatusCode::ACCEPTED.into_response());
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }
}
