//! Schema bootstrap: tables and indexes generated from model metadata.
//! Idempotent (IF NOT EXISTS); existing tables are never altered.

use crate::error::AppError;
use crate::models::{Blog, Comment, User};
use crate::orm::schema::quoted;
use crate::orm::{Model, ModelMeta, Pool};

/// Secondary index on one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexDef {
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDef {
    pub fn new(table: &str, columns: &[&str], unique: bool) -> Self {
        IndexDef {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique,
        }
    }

    fn name(&self) -> String {
        format!("idx_{}_{}", self.table, self.columns.join("_"))
    }

    pub fn sql(&self) -> String {
        let cols: Vec<String> = self.columns.iter().map(|c| quoted(c)).collect();
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            quoted(&self.name()),
            quoted(&self.table),
            cols.join(", ")
        )
    }
}

/// `CREATE TABLE IF NOT EXISTS` with the primary key first, column types verbatim.
pub fn create_table_sql(meta: &ModelMeta) -> String {
    let cols: Vec<String> = meta
        .all_fields()
        .filter_map(|attr| {
            let field = meta.field(attr)?;
            let mut def = format!("{} {}", quoted(meta.column(attr)), field.column_type);
            if field.primary_key {
                def.push_str(" NOT NULL PRIMARY KEY");
            }
            Some(def)
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quoted(&meta.table_name),
        cols.join(", ")
    )
}

/// Indexes the blog relies on: unique email, plus creation time on every table.
pub fn default_indexes() -> Vec<IndexDef> {
    vec![
        IndexDef::new(&User::meta().table_name, &["email"], true),
        IndexDef::new(&User::meta().table_name, &["created_at"], false),
        IndexDef::new(&Blog::meta().table_name, &["created_at"], false),
        IndexDef::new(&Comment::meta().table_name, &["created_at"], false),
    ]
}

/// Create any missing tables and indexes.
pub async fn ensure_tables(pool: &Pool, metas: &[&ModelMeta], indexes: &[IndexDef]) -> Result<(), AppError> {
    for meta in metas {
        tracing::info!(table = %meta.table_name, "ensuring table");
        pool.execute(&create_table_sql(meta), &[]).await?;
    }
    for idx in indexes {
        pool.execute(&idx.sql(), &[]).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_table_ddl() {
        assert_eq!(
            create_table_sql(User::meta()),
            "CREATE TABLE IF NOT EXISTS \"users\" (\"id\" varchar(50) NOT NULL PRIMARY KEY, \
             \"email\" varchar(50), \"passwd\" varchar(50), \"admin\" Boolean, \"name\" varchar(50), \
             \"image\" varchar(500), \"created_at\" float)"
        );
    }

    #[test]
    fn blog_content_is_text() {
        let sql = create_table_sql(Blog::meta());
        assert!(sql.contains("\"summary\" varchar(200)"));
        assert!(sql.contains("\"content\" text"));
    }

    #[test]
    fn index_statements() {
        let idx = default_indexes();
        assert_eq!(
            idx[0].sql(),
            "CREATE UNIQUE INDEX IF NOT EXISTS \"idx_users_email\" ON \"users\" (\"email\")"
        );
        assert_eq!(
            idx[3].sql(),
            "CREATE INDEX IF NOT EXISTS \"idx_comments_created_at\" ON \"comments\" (\"created_at\")"
        );
    }
}
