//! Active record operations shared by every declared model.

use crate::error::AppError;
use crate::orm::builder::{select_all, select_by_id, select_number, FindAll, NUM_ALIAS};
use crate::orm::params::{ColumnKind, PgBindValue};
use crate::orm::pool::Pool;
use crate::orm::record::Record;
use crate::orm::schema::ModelMeta;
use async_trait::async_trait;
use serde_json::Value;

/// A typed model over a [`Record`]. Each operation issues exactly one statement.
#[async_trait]
pub trait Model: Sized + Send + Sync + 'static {
    fn meta() -> &'static ModelMeta;
    fn from_record(record: Record) -> Self;
    fn record(&self) -> &Record;
    fn record_mut(&mut self) -> &mut Record;

    /// Find one row by primary key. `None` when nothing matches.
    async fn find(pool: &Pool, pk: Value) -> Result<Option<Self>, AppError> {
        let meta = Self::meta();
        let args = [column_arg(meta, &meta.primary_key, &pk)?];
        let q = select_by_id(meta, pk);
        let mut rows = pool.select(&q.sql, &args, Some(1)).await?;
        Ok(rows
            .pop()
            .map(|row| Self::from_record(Record::from_row(Self::meta(), row))))
    }

    async fn find_all(pool: &Pool, query: FindAll) -> Result<Vec<Self>, AppError> {
        let q = select_all(Self::meta(), &query);
        let rows = pool.select(&q.sql, &free_args(&q.params), None).await?;
        Ok(rows
            .into_iter()
            .map(|row| Self::from_record(Record::from_row(Self::meta(), row)))
            .collect())
    }

    /// Aggregate such as `count(id)`; the first row's value, or `None` when no row came back.
    async fn find_number(
        pool: &Pool,
        select_expr: &str,
        where_clause: Option<&str>,
        args: Vec<Value>,
    ) -> Result<Option<Value>, AppError> {
        let q = select_number(Self::meta(), select_expr, where_clause, args);
        let mut rows = pool.select(&q.sql, &free_args(&q.params), Some(1)).await?;
        Ok(rows.pop().and_then(|mut row| row.remove(NUM_ALIAS)))
    }

    /// Insert this row using current-or-default values, primary key last.
    async fn save(&mut self, pool: &Pool) -> Result<(), AppError> {
        let meta = Self::meta();
        let args = column_args(meta, insert_args(self.record_mut()))?;
        let rows = pool.execute(&meta.insert_sql, &args).await?;
        if rows != 1 {
            tracing::warn!(table = %meta.table_name, rows, "failed to insert record: affected rows");
        }
        Ok(())
    }

    /// Update this row by primary key using current values only.
    async fn update(&self, pool: &Pool) -> Result<(), AppError> {
        let meta = Self::meta();
        let args = column_args(meta, update_args(self.record()))?;
        let rows = pool.execute(&meta.update_sql, &args).await?;
        if rows != 1 {
            tracing::warn!(table = %meta.table_name, rows, "failed to update record: affected rows");
        }
        Ok(())
    }

    async fn remove(&self, pool: &Pool) -> Result<(), AppError> {
        let meta = Self::meta();
        let args = [column_arg(meta, &meta.primary_key, &self.record().value(&meta.primary_key))?];
        let rows = pool.execute(&meta.delete_sql, &args).await?;
        if rows != 1 {
            tracing::warn!(table = %meta.table_name, rows, "failed to remove by primary key: affected rows");
        }
        Ok(())
    }
}

/// Values for the insert template: non-key fields in order, then the primary key.
pub fn insert_args(record: &mut Record) -> Vec<Value> {
    let meta = record.meta();
    let mut args: Vec<Value> = meta
        .fields
        .iter()
        .map(|f| record.value_or_default(f))
        .collect();
    args.push(record.value_or_default(&meta.primary_key));
    args
}

/// Values for the update template: non-key fields in order, then the primary key.
pub fn update_args(record: &Record) -> Vec<Value> {
    let meta = record.meta();
    let mut args: Vec<Value> = meta.fields.iter().map(|f| record.value(f)).collect();
    args.push(record.value(&meta.primary_key));
    args
}

fn column_arg(meta: &ModelMeta, attr: &str, value: &Value) -> Result<PgBindValue, AppError> {
    let kind = meta
        .field(attr)
        .map_or(ColumnKind::Untyped, |f| ColumnKind::of(&f.column_type));
    PgBindValue::for_column(value, kind, meta.column(attr))
}

/// Bind insert/update values with their columns' types, in template order.
pub fn column_args(meta: &ModelMeta, values: Vec<Value>) -> Result<Vec<PgBindValue>, AppError> {
    meta.fields
        .iter()
        .chain(std::iter::once(&meta.primary_key))
        .zip(values.iter())
        .map(|(attr, v)| column_arg(meta, attr, v))
        .collect()
}

/// Caller-supplied `where`/`limit` arguments carry no column, so they bind by value.
fn free_args(values: &[Value]) -> Vec<PgBindValue> {
    values.iter().map(PgBindValue::from_json).collect()
}

/// Declares a typed model over a [`Record`] with its schema resolved once on first use.
#[macro_export]
macro_rules! declare_model {
    ($(#[$attr:meta])* $name:ident, $schema:expr) => {
        $(#[$attr])*
        #[derive(Clone, Debug)]
        pub struct $name($crate::orm::Record);

        impl $name {
            pub fn new() -> Self {
                $name($crate::orm::Record::new(<$name as $crate::orm::Model>::meta()))
            }

            pub fn schema() -> $crate::orm::ModelSchema {
                $schema
            }

            /// Set a value; usable as a builder.
            pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
                self.0.set(key, value);
                self
            }

            pub fn set(&mut self, key: &str, value: impl Into<serde_json::Value>) {
                self.0.set(key, value);
            }

            pub fn value(&self, key: &str) -> serde_json::Value {
                self.0.value(key)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            /// Resolved metadata, or the declaration error. Resolution runs once.
            pub fn try_meta() -> Result<&'static $crate::orm::ModelMeta, $crate::error::SchemaError> {
                static META: std::sync::LazyLock<
                    Result<$crate::orm::ModelMeta, $crate::error::SchemaError>,
                > = std::sync::LazyLock::new(|| $crate::orm::resolve(&$name::schema()));
                META.as_ref().map_err(Clone::clone)
            }
        }

        impl $crate::orm::Model for $name {
            /// Startup calls `try_meta` for every model first, so a bad declaration is
            /// reported as an error before any record is built.
            fn meta() -> &'static $crate::orm::ModelMeta {
                match $name::try_meta() {
                    Ok(meta) => meta,
                    Err(e) => panic!("invalid model declaration: {}", e),
                }
            }

            fn from_record(record: $crate::orm::Record) -> Self {
                $name(record)
            }

            fn record(&self) -> &$crate::orm::Record {
                &self.0
            }

            fn record_mut(&mut self) -> &mut $crate::orm::Record {
                &mut self.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.0.serialize(serializer)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::{Field, ModelSchema};
    use serde_json::json;

    crate::declare_model!(
        Note,
        ModelSchema::new("Note")
            .table("notes")
            .field("id", Field::string().ddl("varchar(50)").primary_key().default_with(|| json!("n-1")))
            .field("title", Field::string())
            .field("pinned", Field::boolean())
            .field("body", Field::text())
    );

    #[test]
    fn declared_model_resolves_once() {
        let a = Note::meta() as *const ModelMeta;
        let b = Note::meta() as *const ModelMeta;
        assert_eq!(a, b);
        assert_eq!(Note::meta().table_name, "notes");
    }

    crate::declare_model!(
        Keyless,
        ModelSchema::new("Keyless").field("title", Field::string())
    );

    #[test]
    fn bad_declaration_is_an_error_before_use() {
        assert_eq!(
            Keyless::try_meta().unwrap_err(),
            crate::error::SchemaError::MissingPrimaryKey { model: "Keyless".into() }
        );
        assert!(Note::try_meta().is_ok());
    }

    #[test]
    fn insert_args_use_defaults_and_put_key_last() {
        let mut note = Note::new().with("title", "hello");
        let args = insert_args(note.record_mut());
        assert_eq!(args, vec![json!("hello"), json!(false), Value::Null, json!("n-1")]);
        assert_eq!(note.value("id"), json!("n-1"));
    }

    #[test]
    fn update_args_skip_defaults() {
        let note = Note::new().with("id", "n-9").with("body", "text");
        let args = update_args(note.record());
        assert_eq!(args, vec![Value::Null, Value::Null, json!("text"), json!("n-9")]);
    }

    #[test]
    fn column_args_follow_declared_types() {
        let note = Note::new().with("id", "n-3").with("pinned", 1);
        let args = column_args(Note::meta(), update_args(note.record())).unwrap();
        assert_eq!(
            args,
            vec![
                PgBindValue::Null(ColumnKind::Text),
                PgBindValue::Bool(true),
                PgBindValue::Null(ColumnKind::Text),
                PgBindValue::String("n-3".into()),
            ]
        );
    }

    #[test]
    fn serializes_through_record_values() {
        let note = Note::new().with("id", "n-2").with("title", "t");
        assert_eq!(serde_json::to_value(&note).unwrap(), json!({ "id": "n-2", "title": "t" }));
    }

    crate::declare_model!(
        Counter,
        ModelSchema::new("Counter")
            .table("counters")
            .field("id", Field::string().ddl("varchar(50)").primary_key())
            .field("hits", Field::integer())
            .field("score", Field::float())
    );

    /// Runs only when `TEST_DATABASE_URL` points at a scratch PostgreSQL database.
    #[tokio::test]
    async fn updates_alternate_null_and_values_on_numeric_columns() {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            return;
        };
        let pg = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .unwrap();
        let pool = Pool::from_pg(pg);
        crate::migration::ensure_tables(&pool, &[Counter::meta()], &[]).await.unwrap();
        let id = crate::models::next_id();

        let mut counter = Counter::new().with("id", id.as_str());
        counter.save(&pool).await.unwrap();

        Counter::new().with("id", id.as_str()).update(&pool).await.unwrap();
        let row = Counter::find(&pool, json!(id)).await.unwrap().unwrap();
        assert_eq!(row.value("hits"), Value::Null);

        Counter::new()
            .with("id", id.as_str())
            .with("hits", 7)
            .with("score", 2.5)
            .update(&pool)
            .await
            .unwrap();
        Counter::new()
            .with("id", id.as_str())
            .with("hits", 8)
            .with("score", 3)
            .update(&pool)
            .await
            .unwrap();
        let row = Counter::find(&pool, json!(id)).await.unwrap().unwrap();
        assert_eq!(row.value("hits"), json!(8));
        assert_eq!(row.value("score"), json!(3.0));

        row.remove(&pool).await.unwrap();
        pool.close().await;
    }
}
