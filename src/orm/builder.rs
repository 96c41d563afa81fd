//! Builds the per-call SQL for find, find_all and find_number on top of the precomputed templates.

use crate::error::AppError;
use crate::orm::schema::{quoted, ModelMeta};
use serde_json::Value;

/// Alias of the scalar computed by `find_number`.
pub const NUM_ALIAS: &str = "__num__";

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Row limit for `find_all`: first N rows, or `count` rows after skipping `offset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Limit {
    First(i64),
    Range { offset: i64, count: i64 },
}

impl TryFrom<&Value> for Limit {
    type Error = AppError;

    /// An integer means "first N"; a two-element array means `[offset, count]`.
    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        let invalid = || AppError::InvalidArgument(format!("invalid limit value: {}", v));
        match v {
            Value::Number(n) => n.as_i64().map(Limit::First).ok_or_else(invalid),
            Value::Array(items) if items.len() == 2 => match (items[0].as_i64(), items[1].as_i64()) {
                (Some(offset), Some(count)) => Ok(Limit::Range { offset, count }),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }
}

impl From<i64> for Limit {
    fn from(n: i64) -> Self {
        Limit::First(n)
    }
}

impl From<(i64, i64)> for Limit {
    fn from((offset, count): (i64, i64)) -> Self {
        Limit::Range { offset, count }
    }
}

/// Optional clauses for `find_all`. Appended as `where`, `order by`, `limit` in that order.
#[derive(Clone, Debug, Default)]
pub struct FindAll {
    pub where_clause: Option<String>,
    pub args: Vec<Value>,
    pub order_by: Option<String>,
    pub limit: Option<Limit>,
}

impl FindAll {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `where` expression with `?` placeholders, e.g. `"email=?"`.
    pub fn filter(mut self, where_clause: &str, args: Vec<Value>) -> Self {
        self.where_clause = Some(where_clause.to_string());
        self.args = args;
        self
    }

    pub fn order_by(mut self, order_by: &str) -> Self {
        self.order_by = Some(order_by.to_string());
        self
    }

    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }
}

/// SELECT by primary key. The key is the sole param.
pub fn select_by_id(meta: &ModelMeta, id: Value) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "{} where {} = ?",
            meta.select_sql,
            quoted(meta.column(&meta.primary_key))
        ),
        params: vec![id],
    }
}

pub fn select_all(meta: &ModelMeta, query: &FindAll) -> QueryBuf {
    let mut sql = vec![meta.select_sql.clone()];
    let mut params = query.args.clone();
    if let Some(w) = query.where_clause.as_deref().filter(|w| !w.is_empty()) {
        sql.push("where".into());
        sql.push(w.to_string());
    }
    if let Some(o) = query.order_by.as_deref().filter(|o| !o.is_empty()) {
        sql.push("order by".into());
        sql.push(o.to_string());
    }
    match query.limit {
        Some(Limit::First(n)) => {
            sql.push("limit ?".into());
            params.push(Value::from(n));
        }
        Some(Limit::Range { offset, count }) => {
            sql.push("limit ? offset ?".into());
            params.push(Value::from(count));
            params.push(Value::from(offset));
        }
        None => {}
    }
    QueryBuf {
        sql: sql.join(" "),
        params,
    }
}

/// `select <expr> __num__ from <table> [where ...]`.
pub fn select_number(
    meta: &ModelMeta,
    select_expr: &str,
    where_clause: Option<&str>,
    args: Vec<Value>,
) -> QueryBuf {
    let mut sql = format!(
        "select {} {} from {}",
        select_expr,
        quoted(NUM_ALIAS),
        quoted(&meta.table_name)
    );
    if let Some(w) = where_clause.filter(|w| !w.is_empty()) {
        sql.push_str(" where ");
        sql.push_str(w);
    }
    QueryBuf { sql, params: args }
}

/// Replace `?` placeholders with PostgreSQL's `$1`, `$2`, ... Quoted literals and identifiers are left alone.
pub fn to_native_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match (quote, c) {
            (Some(q), _) if c == q => {
                quote = None;
                out.push(c);
            }
            (Some(_), _) => out.push(c),
            (None, '\'') | (None, '"') => {
                quote = Some(c);
                out.push(c);
            }
            (None, '?') => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            (None, _) => out.push(c),
        }
    }
    out
}
