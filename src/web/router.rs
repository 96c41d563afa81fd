//! Route table: handler registration and dispatch through axum.

use crate::error::{AppError, RouteError};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::web::binding::{bind, Binding, Call};
use crate::web::reply::{normalize, Reply};
use axum::{
    extract::{Path, Request, State},
    http::Method,
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter},
    Router,
};
use futures_util::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

pub type HandlerFn = Arc<dyn Fn(Call) -> BoxFuture<'static, Result<Reply, AppError>> + Send + Sync>;

/// A handler bound to a method and a path pattern such as `/blog/{id}`.
#[derive(Clone)]
pub struct RouteDef {
    pub method: Method,
    pub path: String,
    pub binding: Binding,
    handler: HandlerFn,
}

fn route<F, Fut>(method: Method, path: &str, handler: F) -> RouteDef
where
    F: Fn(Call) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, AppError>> + Send + 'static,
{
    RouteDef {
        method,
        path: path.to_string(),
        binding: Binding::default(),
        handler: Arc::new(move |call| Box::pin(handler(call))),
    }
}

pub fn get<F, Fut>(path: &str, handler: F) -> RouteDef
where
    F: Fn(Call) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, AppError>> + Send + 'static,
{
    route(Method::GET, path, handler)
}

pub fn post<F, Fut>(path: &str, handler: F) -> RouteDef
where
    F: Fn(Call) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, AppError>> + Send + 'static,
{
    route(Method::POST, path, handler)
}

impl RouteDef {
    pub fn required(mut self, names: &[&str]) -> Self {
        self.binding.required.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn optional(mut self, names: &[&str]) -> Self {
        self.binding.optional.extend(names.iter().map(|s| s.to_string()));
        self
    }

    /// Pass keywords through even when they are not declared.
    pub fn var_kw(mut self) -> Self {
        self.binding.var_kw = true;
        self
    }

    pub fn with_request(mut self) -> Self {
        self.binding.wants_request = true;
        self
    }
}

/// `/blog/{id}` to axum's `/blog/:id`.
fn axum_path(path: &str) -> String {
    path.split('/')
        .map(|seg| match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => format!(":{}", name),
            None => seg.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Arc<RouteDef>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a route. Registration errors are fatal at startup.
    pub fn add(&mut self, def: RouteDef) -> Result<(), RouteError> {
        def.binding.validate(&def.method, &def.path)?;
        if self
            .routes
            .iter()
            .any(|r| r.method == def.method && r.path == def.path)
        {
            return Err(RouteError::DuplicateRoute {
                method: def.method.to_string(),
                path: def.path.clone(),
            });
        }
        tracing::info!(
            method = %def.method,
            path = %def.path,
            required = ?def.binding.required,
            optional = ?def.binding.optional,
            "add route"
        );
        self.routes.push(Arc::new(def));
        Ok(())
    }

    pub fn routes(&self) -> &[Arc<RouteDef>] {
        &self.routes
    }

    pub fn into_router(self) -> Router<AppState> {
        let mut by_path: BTreeMap<String, MethodRouter<AppState>> = BTreeMap::new();
        for def in self.routes {
            let filter = if def.method == Method::POST {
                MethodFilter::POST
            } else {
                MethodFilter::GET
            };
            let path = axum_path(&def.path);
            let handler = move |State(state): State<AppState>,
                                CurrentUser(user): CurrentUser,
                                params: Option<Path<HashMap<String, String>>>,
                                req: Request| {
                let def = def.clone();
                async move {
                    let params = params.map(|Path(p)| p).unwrap_or_default();
                    dispatch(&def, state, user, params, req).await
                }
            };
            let method_router = by_path
                .remove(&path)
                .unwrap_or_else(MethodRouter::new)
                .on(filter, handler);
            by_path.insert(path, method_router);
        }
        by_path
            .into_iter()
            .fold(Router::new(), |router, (path, mr)| router.route(&path, mr))
    }
}

async fn dispatch(
    def: &RouteDef,
    state: AppState,
    user: Option<crate::models::User>,
    params: HashMap<String, String>,
    req: Request,
) -> Response {
    tracing::debug!(method = %def.method, path = %def.path, "dispatch");
    let (args, request) = match bind(&def.binding, req, params, user.clone()).await {
        Ok(bound) => bound,
        Err(e) => return e.into_response(),
    };
    let call = Call {
        state: state.clone(),
        args,
        request,
    };
    let reply = match (def.handler)(call).await {
        Ok(reply) => reply,
        Err(e) => return e.into_response(),
    };
    normalize(reply, state.templates.as_ref(), user.as_ref()).unwrap_or_else(IntoResponse::into_response)
}
