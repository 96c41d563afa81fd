//! Connection pool handle. Every statement acquires one connection and gives it back on all paths.

use crate::config::DbConfig;
use crate::error::AppError;
use crate::orm::builder::to_native_placeholders;
use crate::orm::params::{ColumnKind, PgBindValue};
use futures_util::TryStreamExt;
use serde_json::{Map, Value};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::PgPool;

/// Shared database pool. Cheap to clone; clones refer to the same connections.
#[derive(Clone, Debug)]
pub struct Pool {
    inner: PgPool,
}

fn connect_options(cfg: &DbConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.database)
        .options([("client_encoding", cfg.charset.as_str())])
}

fn pool_options(cfg: &DbConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .min_connections(cfg.min_connections)
        .max_connections(cfg.max_connections)
}

impl Pool {
    /// Connect and return a new pool. Each call yields an independent pool.
    pub async fn create(cfg: &DbConfig) -> Result<Self, AppError> {
        tracing::info!(host = %cfg.host, port = cfg.port, db = %cfg.database, "creating database connection pool");
        let inner = pool_options(cfg).connect_with(connect_options(cfg)).await?;
        Ok(Pool { inner })
    }

    /// Pool that opens connections on first use.
    pub fn lazy(cfg: &DbConfig) -> Self {
        Pool {
            inner: pool_options(cfg)
                .min_connections(0)
                .connect_lazy_with(connect_options(cfg)),
        }
    }

    pub fn from_pg(inner: PgPool) -> Self {
        Pool { inner }
    }

    pub fn pg(&self) -> &PgPool {
        &self.inner
    }

    /// Run one query and return up to `size` rows (all rows when `None`) as JSON objects.
    pub async fn select(
        &self,
        sql: &str,
        args: &[PgBindValue],
        size: Option<usize>,
    ) -> Result<Vec<Map<String, Value>>, AppError> {
        let sql = to_native_placeholders(sql);
        tracing::info!(sql = %sql, "SQL");
        tracing::debug!(args = ?args, "SQL args");
        let mut conn = self.inner.acquire().await?;
        let mut query = sqlx::query(&sql).persistent(cacheable(args));
        for a in args {
            query = query.bind(a.clone());
        }
        let rows: Vec<PgRow> = match size {
            Some(n) => {
                let mut out = Vec::with_capacity(n);
                let mut stream = query.fetch(&mut *conn);
                while out.len() < n {
                    match stream.try_next().await? {
                        Some(row) => out.push(row),
                        None => break,
                    }
                }
                out
            }
            None => query.fetch_all(&mut *conn).await?,
        };
        tracing::info!(rows = rows.len(), "rows returned");
        Ok(rows.iter().map(row_to_json).collect())
    }

    /// Run one write statement in its own transaction and return the affected-row count.
    pub async fn execute(&self, sql: &str, args: &[PgBindValue]) -> Result<u64, AppError> {
        let sql = to_native_placeholders(sql);
        tracing::info!(sql = %sql, "SQL");
        tracing::debug!(args = ?args, "SQL args");
        let mut tx = self.inner.begin().await?;
        let mut query = sqlx::query(&sql).persistent(cacheable(args));
        for a in args {
            query = query.bind(a.clone());
        }
        let affected = query.execute(&mut *tx).await?.rows_affected();
        tx.commit().await?;
        tracing::debug!(affected, "execute");
        Ok(affected)
    }

    /// Close the pool and wait until every connection is released.
    pub async fn close(&self) {
        tracing::info!("closing database connection pool");
        self.inner.close().await;
    }
}

/// Statements are cached by SQL text with the parameter types of their first use.
/// A NULL of unknown type would pin whatever the server infers, so such statements are not kept.
fn cacheable(args: &[PgBindValue]) -> bool {
    !args.iter().any(|a| *a == PgBindValue::Null(ColumnKind::Untyped))
}

fn row_to_json(row: &PgRow) -> Map<String, Value> {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    Value::Null
}
