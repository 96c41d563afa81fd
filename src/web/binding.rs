//! Turning an HTTP request into handler arguments.

use crate::error::{AppError, RouteError};
use crate::models::User;
use crate::state::AppState;
use axum::{
    extract::{multipart::MultipartError, FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode, Uri},
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Name that can only be bound through [`Binding::wants_request`].
pub const REQUEST_PARAM: &str = "request";

/// What a handler accepts: keyword names (required or optional), whether unknown
/// keywords pass through, and whether it receives the raw request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Binding {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub var_kw: bool,
    pub wants_request: bool,
}

impl Binding {
    pub fn named(&self) -> impl Iterator<Item = &str> {
        self.required.iter().chain(self.optional.iter()).map(String::as_str)
    }

    pub fn has_named(&self) -> bool {
        !self.required.is_empty() || !self.optional.is_empty()
    }

    /// Whether the body or query string has to be read at all.
    pub fn needs_keywords(&self) -> bool {
        self.var_kw || self.has_named()
    }

    pub fn validate(&self, method: &Method, path: &str) -> Result<(), RouteError> {
        let mut seen: Vec<&str> = Vec::new();
        for name in self.named() {
            if name == REQUEST_PARAM {
                return Err(RouteError::ReservedParameter {
                    method: method.to_string(),
                    path: path.to_string(),
                });
            }
            if seen.contains(&name) {
                return Err(RouteError::DuplicateParameter {
                    method: method.to_string(),
                    path: path.to_string(),
                    name: name.to_string(),
                });
            }
            seen.push(name);
        }
        Ok(())
    }
}

/// The raw request as handed to handlers that ask for it. Body already consumed.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub user: Option<User>,
}

impl RequestContext {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }
}

/// One handler invocation: shared state, bound keyword arguments, optional request.
#[derive(Clone)]
pub struct Call {
    pub state: AppState,
    pub args: Map<String, Value>,
    pub request: Option<RequestContext>,
}

impl Call {
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Argument as text; numbers and booleans are formatted, null is absent.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.args.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn text_or(&self, name: &str, default: &str) -> String {
        self.text(name).unwrap_or_else(|| default.to_string())
    }

    pub fn request(&self) -> Option<&RequestContext> {
        self.request.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.request.as_ref().and_then(RequestContext::user)
    }
}

/// Collect keyword arguments for `binding` from the request body, query string
/// and path captures. Fails with a 4xx error on unusable input or when a
/// required keyword is missing.
pub async fn bind(
    binding: &Binding,
    req: Request,
    path_params: HashMap<String, String>,
    user: Option<User>,
) -> Result<(Map<String, Value>, Option<RequestContext>), AppError> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let headers = req.headers().clone();

    let mut collected: Option<Map<String, Value>> = None;
    if binding.needs_keywords() {
        if method == Method::POST {
            collected = Some(read_body(req, &headers).await?);
        } else if method == Method::GET {
            if let Some(qs) = uri.query().filter(|q| !q.is_empty()) {
                collected = Some(first_wins(qs.as_bytes()));
            }
        }
    }

    let args = match collected {
        None => path_params
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
        Some(mut kw) => {
            if !binding.var_kw && binding.has_named() {
                let named: Vec<&str> = binding.named().collect();
                kw.retain(|k, _| named.contains(&k.as_str()));
            }
            for (k, v) in path_params {
                if kw.contains_key(&k) {
                    tracing::warn!(arg = %k, "duplicate arg name in named arg and kw args");
                }
                kw.insert(k, Value::String(v));
            }
            kw
        }
    };

    let request = binding.wants_request.then(|| RequestContext {
        method,
        uri,
        headers,
        user,
    });

    if let Some(missing) = binding.required.iter().find(|name| !args.contains_key(name.as_str())) {
        return Err(AppError::BadRequest(format!("Missing argument: {}", missing)));
    }
    Ok((args, request))
}

async fn read_body(req: Request, headers: &HeaderMap) -> Result<Map<String, Value>, AppError> {
    let ct = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing Content-Type.".into()))?;

    if ct.starts_with("application/json") {
        let bytes = read_bytes(req).await?;
        return match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(AppError::BadRequest("JSON body must be object.".into())),
            Err(e) => Err(AppError::BadRequest(format!("Invalid JSON body: {}", e))),
        };
    }
    if ct.starts_with("application/x-www-form-urlencoded") {
        let bytes = read_bytes(req).await?;
        return Ok(first_wins(&bytes));
    }
    if ct.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let mut map = Map::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(multipart_error)?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let text = field.text().await.map_err(multipart_error)?;
            map.entry(name).or_insert(Value::String(text));
        }
        return Ok(map);
    }
    Err(AppError::BadRequest(format!("Unsupported Content-Type: {}", ct)))
}

async fn read_bytes(req: Request) -> Result<axum::body::Bytes, AppError> {
    axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .map_err(|e| {
            if over_limit(&e) {
                AppError::PayloadTooLarge(format!("request body too large: {}", e))
            } else {
                AppError::BadRequest(format!("failed to read body: {}", e))
            }
        })
}

/// True when a body error comes from a length limit somewhere down the source chain.
fn over_limit(e: &(dyn std::error::Error + 'static)) -> bool {
    let mut cur = Some(e);
    while let Some(err) = cur {
        if err.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        cur = err.source();
    }
    false
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// Decode `a=1&b=2` pairs; the first occurrence of a key wins, blank values are kept.
fn first_wins(input: &[u8]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in url::form_urlencoded::parse(input) {
        if !map.contains_key(k.as_ref()) {
            map.insert(k.into_owned(), Value::String(v.into_owned()));
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde_json::json;

    fn binding(required: &[&str], optional: &[&str]) -> Binding {
        Binding {
            required: required.iter().map(|s| s.to_string()).collect(),
            optional: optional.iter().map(|s| s.to_string()).collect(),
            ..Binding::default()
        }
    }

    fn post(ct: Option<&str>, body: &str) -> Request {
        let mut b = Request::builder().method("POST").uri("/api/users");
        if let Some(ct) = ct {
            b = b.header(CONTENT_TYPE, ct);
        }
        b.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn bad_request(err: AppError) -> String {
        match err {
            AppError::BadRequest(msg) => msg,
            other => panic!("expected bad request, got {:?}", other),
        }
    }

    #[test]
    fn request_is_reserved_and_names_are_unique() {
        let b = binding(&["request"], &[]);
        assert!(matches!(
            b.validate(&Method::GET, "/x"),
            Err(RouteError::ReservedParameter { .. })
        ));
        let b = binding(&["name"], &["name"]);
        assert!(matches!(
            b.validate(&Method::POST, "/x"),
            Err(RouteError::DuplicateParameter { name, .. }) if name == "name"
        ));
        assert!(binding(&["email"], &["name"]).validate(&Method::POST, "/x").is_ok());
    }

    #[tokio::test]
    async fn json_body_is_filtered_to_named_keywords() {
        let b = binding(&["email", "passwd"], &[]);
        let req = post(
            Some("application/json"),
            r#"{"email":"a@b.io","passwd":"x","extra":true}"#,
        );
        let (args, request) = bind(&b, req, HashMap::new(), None).await.unwrap();
        assert_eq!(Value::Object(args), json!({ "email": "a@b.io", "passwd": "x" }));
        assert!(request.is_none());
    }

    #[tokio::test]
    async fn catch_all_keeps_unknown_keys() {
        let b = Binding {
            var_kw: true,
            ..binding(&["email"], &[])
        };
        let req = post(Some("application/json"), r#"{"email":"e","extra":1}"#);
        let (args, _) = bind(&b, req, HashMap::new(), None).await.unwrap();
        assert_eq!(args.get("extra"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn missing_required_keywords_are_rejected() {
        let b = binding(&["name", "email"], &[]);
        let req = post(Some("application/json"), "{}");
        let msg = bad_request(bind(&b, req, HashMap::new(), None).await.unwrap_err());
        assert_eq!(msg, "Missing argument: name");
    }

    #[tokio::test]
    async fn post_body_errors() {
        let b = binding(&["name"], &[]);
        let msg = bad_request(bind(&b, post(None, "{}"), HashMap::new(), None).await.unwrap_err());
        assert_eq!(msg, "Missing Content-Type.");

        let msg = bad_request(
            bind(&b, post(Some("application/json"), "[1, 2]"), HashMap::new(), None)
                .await
                .unwrap_err(),
        );
        assert_eq!(msg, "JSON body must be object.");

        let msg = bad_request(
            bind(&b, post(Some("text/plain"), "name=x"), HashMap::new(), None)
                .await
                .unwrap_err(),
        );
        assert_eq!(msg, "Unsupported Content-Type: text/plain");
    }

    #[tokio::test]
    async fn form_and_multipart_bodies() {
        let b = binding(&["name"], &["email"]);
        let req = post(
            Some("application/x-www-form-urlencoded"),
            "name=Ann+Lee&name=Bob&email=",
        );
        let (args, _) = bind(&b, req, HashMap::new(), None).await.unwrap();
        assert_eq!(Value::Object(args), json!({ "name": "Ann Lee", "email": "" }));

        let body = "--XYZ\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nAnn\r\n--XYZ--\r\n";
        let req = post(Some("multipart/form-data; boundary=XYZ"), body);
        let (args, _) = bind(&b, req, HashMap::new(), None).await.unwrap();
        assert_eq!(args.get("name"), Some(&json!("Ann")));
    }

    #[tokio::test]
    async fn query_string_first_value_wins() {
        let b = binding(&[], &["page"]);
        let (args, _) = bind(&b, get("/?page=2&page=3&x=1"), HashMap::new(), None)
            .await
            .unwrap();
        assert_eq!(Value::Object(args), json!({ "page": "2" }));
    }

    #[tokio::test]
    async fn path_captures_fill_in_or_override() {
        let b = binding(&["id"], &[]);
        let (args, _) = bind(&b, get("/api/blogs/b1"), params(&[("id", "b1")]), None)
            .await
            .unwrap();
        assert_eq!(args.get("id"), Some(&json!("b1")));

        let b = binding(&["id"], &["page"]);
        let (args, _) = bind(&b, get("/blog/b1?id=other&page=1"), params(&[("id", "b1")]), None)
            .await
            .unwrap();
        assert_eq!(Value::Object(args), json!({ "id": "b1", "page": "1" }));
    }

    #[tokio::test]
    async fn request_context_is_provided_on_demand() {
        let b = Binding {
            wants_request: true,
            ..Binding::default()
        };
        let req = Request::builder()
            .uri("/signout")
            .header("Referer", "/blog/1")
            .body(Body::empty())
            .unwrap();
        let (args, ctx) = bind(&b, req, HashMap::new(), None).await.unwrap();
        assert!(args.is_empty());
        let ctx = ctx.unwrap();
        assert_eq!(ctx.header("referer"), Some("/blog/1"));
        assert_eq!(ctx.uri.path(), "/signout");
    }

    fn limited_post(ct: &str, body: &str, limit: usize) -> Request {
        let body = http_body_util::Limited::new(Body::from(body.to_string()), limit);
        Request::builder()
            .method("POST")
            .uri("/api/users")
            .header(CONTENT_TYPE, ct)
            .body(Body::new(body))
            .unwrap()
    }

    #[tokio::test]
    async fn body_over_the_limit_is_413() {
        let b = binding(&["name"], &[]);
        let req = limited_post("application/json", r#"{"name":"a long enough name"}"#, 8);
        let err = bind(&b, req, HashMap::new(), None).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)), "{:?}", err);

        let body = "--XYZ\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nAnn\r\n--XYZ--\r\n";
        let req = limited_post("multipart/form-data; boundary=XYZ", body, 8);
        let err = bind(&b, req, HashMap::new(), None).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)), "{:?}", err);

        let err = bind(&b, post(Some("application/json"), "{"), HashMap::new(), None)
            .await
            .unwrap_err();
        assert!(bad_request(err).starts_with("Invalid JSON body"));
    }
}
